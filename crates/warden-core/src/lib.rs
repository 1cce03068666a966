pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::WardenConfig;
pub use error::{WardenError, WardenResult};
pub use types::{Algorithm, KeyState};
