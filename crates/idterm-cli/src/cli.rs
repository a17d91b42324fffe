use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "idterm",
    about = "Provision short-lived Azure AD identities scoped to a resource group",
    version
)]
pub struct Cli {
    /// YAML settings file.
    #[arg(long, env = "IDTERM_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory tenant. Overrides the settings file.
    #[arg(long, env = "AZURE_TENANT_ID", global = true)]
    pub tenant_id: Option<String>,

    /// Subscription holding the target resource group. Overrides the settings file.
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID", global = true)]
    pub subscription_id: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an application, its service principal and a role assignment.
    Provision {
        /// Display name of the application registration.
        #[arg(long)]
        display_name: String,

        /// Secret lifetime, e.g. "24h" or "90m".
        #[arg(long)]
        duration: String,

        /// Resource group the principal is granted access to.
        #[arg(long)]
        resource_group: String,

        /// Tag attached to the service principal. Repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Write the resulting state here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Remove the role assignment and application recorded in a state file.
    Deprovision {
        /// State file written by `provision`.
        #[arg(long)]
        state: PathBuf,
    },

    /// Print a freshly generated client secret.
    Secret,
}
