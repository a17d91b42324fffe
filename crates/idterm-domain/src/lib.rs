pub mod duration;
pub mod error;
pub mod types;


pub use duration::{credential_window, parse_duration, CredentialWindow};
pub use error::DomainError;
pub use types::*;
