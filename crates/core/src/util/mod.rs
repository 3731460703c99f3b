pub mod cancel;
pub mod stats;

pub use cancel::CancelFlag;
