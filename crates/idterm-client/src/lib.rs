pub mod auth;
pub mod authorization;
pub mod directory;
pub mod error;

pub use auth::{Authorizer, AuthorizerProvider, AzureCredentials, StaticToken};
pub use authorization::{
    ArmAuthorizationClient, AuthorizationClient, RoleAssignmentCreateParameters, RoleAssignmentRecord,
};
pub use directory::{
    Application, ApplicationCreateParameters, DirectoryClient, GraphDirectoryClient, PasswordCredential,
    ServicePrincipalCreateParameters, ServicePrincipalRecord,
};
pub use error::ClientError;
