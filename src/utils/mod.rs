pub mod error;

pub use error::{BiometricError, Result};
