pub mod matching;
pub mod models;
pub mod processing;
pub mod security;
pub mod storage;
pub mod template_manager;
pub mod utils;

pub use template_manager::TemplateManager;
pub use utils::{BiometricError, Result};
