//! Prints one broken-build snapshot as JSON.
//!
//! ```bash
//! cargo run --example snapshot -- config.json
//! ```
//!
//! The config path defaults to `config.json`; a missing file means an empty
//! dashboard. `CCD_USERNAME`, `CCD_PASSWORD` and `CCD_DEBUG` override the file.
//! `RUST_LOG` controls log output (default: `info`).

use ci_dashboard::{Dashboard, DashboardConfig};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_owned());

    let mut loaded = DashboardConfig::from_path_or_default(&path)?;
    loaded.warnings.extend(loaded.config.apply_env(std::env::vars()));

    let default_level = if loaded.config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    for warning in &loaded.warnings {
        eprintln!("config warning: {warning}");
    }

    let dashboard = Dashboard::from_config(&loaded.config)?;
    let (job_servers, hosted_builds) = tokio::join!(
        dashboard.broken_job_server_builds(),
        dashboard.broken_hosted_build_builds()
    );

    let snapshot = json!({
        "jobServers": job_servers,
        "hostedBuilds": hosted_builds,
    });
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
