pub mod config;
pub mod data;

pub use config::*;
pub use data::*;
