// Simulated order execution
pub mod paper;

pub use paper::{Fill, FillSide, PaperExecutor};
