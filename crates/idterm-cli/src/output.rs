use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use idterm_domain::App;

/// Serialize the aggregate as pretty JSON to `path`, or stdout when `None`.
///
/// The JSON includes the client secret, so on Unix the file is readable by
/// its owner only.
pub fn write_state(app: &App, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(app)?;
    match path {
        Some(p) => {
            let mut file = create_private(p)
                .with_context(|| format!("Failed to open {} for writing", p.display()))?;
            writeln!(file, "{}", json)
                .with_context(|| format!("Failed to write state to {}", p.display()))?;
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies to newly created files.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

pub fn read_state(path: &Path) -> Result<App> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse state in {}", path.display()))
}

/// Human-readable summary without the secret.
pub fn render_summary(app: &App, scope: &str) -> String {
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    let expires = app
        .service_principal
        .client_secret_expiration
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".into());

    let mut out = String::new();
    out.push_str(&format!("application      {} ({})\n", app.display_name, app.phase()));
    out.push_str(&format!("  client id      {}\n", or_dash(&app.client_id)));
    out.push_str(&format!("  object id      {}\n", or_dash(&app.object_id)));
    out.push_str(&format!("  tenant         {}\n", or_dash(&app.tenant_id)));
    out.push_str(&format!("service principal {}\n", or_dash(&app.service_principal.object_id)));
    out.push_str(&format!("  expires        {}\n", expires));
    out.push_str(&format!("role assignment  {}\n", or_dash(&app.role_assignment.name)));
    out.push_str(&format!("  scope          {}\n", scope));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn provisioned() -> App {
        let mut app = App::new("svc-test", "24h", vec!["env:test".into()], "rg-test");
        app.client_id = "client-123".into();
        app.object_id = "app-obj-1".into();
        app.tenant_id = "tenant-1".into();
        app.service_principal.object_id = "sp-obj-1".into();
        app.service_principal.client_secret = "s3cr3t-value".into();
        app.service_principal.client_secret_expiration =
            Some(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap());
        app.role_assignment.name = "ra-1".into();
        app.role_assignment.object_id = "/subscriptions/sub-1/resourceGroups/rg-test/providers/Microsoft.Authorization/roleAssignments/ra-1".into();
        app
    }

    #[test]
    fn state_file_roundtrips_the_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let app = provisioned();

        write_state(&app, Some(&path)).unwrap();
        assert_eq!(read_state(&path).unwrap(), app);
    }

    #[cfg(unix)]
    #[test]
    fn state_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "stale").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        write_state(&provisioned(), Some(&path)).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(read_state(&path).unwrap(), provisioned());
    }

    #[test]
    fn read_state_reports_path_on_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = read_state(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("state.json"), "got: {:#}", err);
    }

    #[test]
    fn summary_omits_secret() {
        let out = render_summary(&provisioned(), "/subscriptions/sub-1/resourceGroups/rg-test");
        assert!(out.contains("client-123"));
        assert!(out.contains("role_assigned"));
        assert!(out.contains("/subscriptions/sub-1/resourceGroups/rg-test"));
        assert!(!out.contains("s3cr3t-value"));
    }

    #[test]
    fn summary_of_pending_app_uses_dashes() {
        let app = App::new("svc-test", "24h", vec![], "rg-test");
        let out = render_summary(&app, "/subscriptions/sub-1/resourceGroups/rg-test");
        assert!(out.contains("(pending)"));
        assert!(out.contains("client id      -"));
    }
}
