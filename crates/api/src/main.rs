use std::sync::Arc;

use anyhow::Context;

use navguard_access::{AccessConfig, InMemoryPermissionStore, RoleRegistry};
use navguard_api::app::{build_app, AppState};

/// Fallback configuration for local development.
const DEV_CONFIG: &str = r#"{
    "resources": [
        { "key": "page:home", "label": "Dashboard" },
        { "key": "page:parties", "label": "Parties", "parent": "page:home" },
        { "key": "page:ledger", "label": "Ledger", "parent": "page:home" },
        { "key": "page:sales", "label": "Sales", "parent": "page:home" }
    ],
    "routes": [
        { "path": "/", "resource": "page:home" },
        { "path": "/parties", "resource": "page:parties" },
        { "path": "/ledger", "resource": "page:ledger" },
        { "path": "/sales", "resource": "page:sales" }
    ],
    "root_patterns": ["/"],
    "allow_list": [
        { "resource": "page:sales", "roles": ["restricted"] }
    ],
    "landing_route": "/sales",
    "pending_route": "/pending"
}"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    navguard_observability::init();

    let raw = match std::env::var("NAVGUARD_CONFIG") {
        Ok(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading access configuration from {path}"))?,
        Err(_) => {
            tracing::warn!("NAVGUARD_CONFIG not set; using built-in dev configuration");
            DEV_CONFIG.to_string()
        }
    };

    let engine = AccessConfig::from_json(&raw)
        .context("parsing access configuration")?
        .build()
        .context("invalid access configuration")?;

    let state = Arc::new(AppState::new(
        engine,
        Arc::new(InMemoryPermissionStore::new()),
        RoleRegistry::new(),
    ));
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .context("failed to bind 0.0.0.0:8080")?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
