mod raw;
mod loader;
pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use loader::{
    load_settings, load_settings_with, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_SUBSCRIPTION_ID, ENV_TENANT_ID,
};
pub use settings::{Endpoints, RetrySettings, Settings};
