use std::path::PathBuf;

use anyhow::{Context, Result};
use idterm_client::AzureCredentials;
use idterm_config::{load_settings_with, Settings, ENV_SUBSCRIPTION_ID, ENV_TENANT_ID};
use idterm_domain::App;
use idterm_provisioner::{generate_secret, Provisioner};
use tracing::info;

use crate::output;

/// Global flags that feed settings loading.
pub struct Overrides {
    pub config:          Option<PathBuf>,
    pub tenant_id:       Option<String>,
    pub subscription_id: Option<String>,
}

// ── Provision ─────────────────────────────────────────────────────────────────

pub async fn provision(
    overrides: &Overrides,
    display_name: String,
    duration: String,
    resource_group: String,
    tags: Vec<String>,
    output_path: Option<PathBuf>,
) -> Result<()> {
    let provisioner = build_provisioner(overrides)?;
    let app = App::new(display_name, duration, tags, resource_group);

    match provisioner.provision(app).await {
        Ok(app) => {
            output::write_state(&app, output_path.as_deref())?;
            eprint!("{}", output::render_summary(&app, &provisioner.scope_for(&app)));
            Ok(())
        }
        Err(partial) => {
            // Whatever was created must stay discoverable for cleanup.
            output::write_state(&partial.app, output_path.as_deref())
                .context("Failed to record partial state")?;
            eprint!("{}", output::render_summary(&partial.app, &provisioner.scope_for(&partial.app)));
            Err(anyhow::Error::new(partial).context("Provisioning failed"))
        }
    }
}

// ── Deprovision ───────────────────────────────────────────────────────────────

pub async fn deprovision(overrides: &Overrides, state: PathBuf) -> Result<()> {
    let mut app = output::read_state(&state)?;
    let provisioner = build_provisioner(overrides)?;
    let result = provisioner.deprovision(&mut app).await;

    // Record what is already gone so a rerun picks up where this one stopped.
    output::write_state(&app, Some(&state)).context("Failed to update state file")?;
    result.with_context(|| format!("Failed to deprovision {:?}", app.display_name))?;
    println!("Deprovisioned {}.", app.display_name);
    Ok(())
}

// ── Secret ────────────────────────────────────────────────────────────────────

pub fn secret() -> Result<()> {
    println!("{}", generate_secret());
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load(overrides: &Overrides) -> Result<Settings> {
    let settings = load_settings_with(overrides.config.as_deref(), |key| match key {
        ENV_TENANT_ID => overrides.tenant_id.clone(),
        ENV_SUBSCRIPTION_ID => overrides.subscription_id.clone(),
        _ => std::env::var(key).ok(),
    })
    .context("Failed to load settings")?;
    Ok(settings)
}

fn build_provisioner(overrides: &Overrides) -> Result<Provisioner> {
    let settings = load(overrides)?;
    let credentials =
        AzureCredentials::from_settings(&settings).context("Failed to initialise Azure credentials")?;
    info!(
        tenant_id = %settings.tenant_id,
        subscription_id = %settings.subscription_id,
        credentials = credentials.source(),
        "Using Azure credentials"
    );
    Provisioner::from_provider(settings, &credentials).context("Failed to build Azure clients")
}
