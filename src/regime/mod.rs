// Per-symbol regime classification (stage A of the scoring pipeline)
pub mod leveraged;
pub mod swing;

pub use leveraged::{LeveragedRegimeConfig, LeveragedRegimeDetector};
pub use swing::{SwingRegimeConfig, SwingRegimeDetector};
