pub mod checkpoint;
pub mod collector;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use collector::Collector;
