pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{default_config_toml, load_config, load_config_sync};
pub use models::*;
pub use validation::{ServerConfigValidator, ValidationError, ValidationResult};
