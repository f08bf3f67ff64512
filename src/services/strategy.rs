use image::imageops::FilterType;
use image::DynamicImage;
use std::str::FromStr;

/// Raised when an algorithm identifier does not name a registered strategy.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown resize algorithm: {0}")]
pub struct UnknownAlgorithm(pub String);

/// The closed set of resize strategies, selected by identifier.
///
/// Registration is static: every capability is a variant here, looked up
/// through one pure string mapping. The registry is stateless and safe for
/// unsynchronized concurrent use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ResizeAlgorithm {
    Nearest,
    Bilinear,
    Bicubic,
    // The image crate only ships a three-lobe Lanczos, so both identifiers
    // resolve to the same filter.
    #[strum(serialize = "lanczos2", serialize = "lanczos3")]
    Lanczos3,
}

impl ResizeAlgorithm {
    /// Resolve an algorithm identifier to its strategy.
    pub fn resolve(identifier: &str) -> Result<Self, UnknownAlgorithm> {
        Self::from_str(identifier).map_err(|_| UnknownAlgorithm(identifier.to_string()))
    }

    fn filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Bilinear => FilterType::Triangle,
            Self::Bicubic => FilterType::CatmullRom,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }

    /// Resize `img` to exactly `width` x `height` with this strategy.
    pub fn resize(self, img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        img.resize_exact(width, height, self.filter())
    }
}
