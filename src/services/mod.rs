pub mod pipeline;
pub mod producer;
pub mod queue;
pub mod storage;
pub mod strategy;
