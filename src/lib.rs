// Core modules
pub mod aggregation;
pub mod engine;
pub mod error;
pub mod features;
pub mod models;
pub mod regime;

// Re-export commonly used types
pub use aggregation::SignalAggregator;
pub use engine::{EngineFactory, EngineSelector, SignalEngine};
pub use error::{EngineError, Result};
pub use models::*;
