pub mod config;
pub mod error;
pub mod types;

pub use config::SageConfig;
pub use error::{ErrorKind, Result, SageError};
pub use types::*;
