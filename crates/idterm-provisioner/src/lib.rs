pub mod error;
pub mod provisioner;
pub mod retry;
pub mod secret;


pub use error::{PartialProvision, ProvisionError};
pub use provisioner::Provisioner;
pub use retry::{classify, Disposition, RetryPolicy};
pub use secret::generate_secret;
