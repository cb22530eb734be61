use anyhow::Result;
use proofmark_core::config::validate_config;
use proofmark_registry::{RegistryBackend, Settings};
use proofmark_store::{ObjectStore, ProofRepository};
use serde::Serialize;

use crate::output;

#[derive(Debug, Serialize)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorOut {
    pub ok: bool,
    pub checks: Vec<Check>,
}

impl Check {
    fn new(name: &str, result: Result<String, String>) -> Self {
        let (ok, detail) = match result {
            Ok(d) => (true, d),
            Err(d) => (false, d),
        };
        Self {
            name: name.to_string(),
            ok,
            detail,
        }
    }
}

pub async fn run() -> Result<()> {
    let mut checks = Vec::new();

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            checks.push(Check::new("environment", Err(e.to_string())));
            return finish(checks);
        }
    };
    checks.push(Check::new("environment", Ok("PROOFMARK_* variables parsed".to_string())));
    checks.push(Check::new(
        "config",
        validate_config(&settings.core)
            .map(|_| "valid".to_string())
            .map_err(|e| e.to_string()),
    ));

    checks.push(Check::new(
        "signing key",
        settings
            .signer()
            .map(|s| format!("{} ({})", s.fingerprint(), s.rotation().state_name()))
            .map_err(|e| e.to_string()),
    ));

    checks.push(Check::new(
        "database",
        match settings.open_repository() {
            Ok(repo) => repo
                .count_proofs()
                .await
                .map(|n| format!("{} ({n} proofs)", settings.database_path.display()))
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        },
    ));

    let registry = match &settings.registry {
        RegistryBackend::None => Err("not configured (publish and registry lookups disabled)".to_string()),
        backend => match settings.core.registry.require() {
            Err(e) => Err(e.to_string()),
            Ok(target) => match settings.open_registry().await {
                Ok(Some(store)) => store
                    .list_keys(&format!("{}/", target.prefix))
                    .await
                    .map(|keys| format!("{backend:?} reachable ({} objects under {})", keys.len(), target.prefix))
                    .map_err(|e| e.to_string()),
                Ok(None) => Err("not configured".to_string()),
                Err(e) => Err(e.to_string()),
            },
        },
    };
    checks.push(Check::new("registry", registry));

    for store in settings.open_mirrors() {
        let name = store.name().to_string();
        let res = store
            .list_keys("")
            .await
            .map(|keys| format!("{} objects", keys.len()))
            .map_err(|e| e.to_string());
        checks.push(Check::new(&name, res));
    }

    finish(checks)
}

fn finish(checks: Vec<Check>) -> Result<()> {
    // the registry is optional for verification, so it does not fail the run
    let ok = checks.iter().all(|c| c.ok || c.name == "registry");
    for c in &checks {
        output::status(c.ok, &c.name, &c.detail)?;
    }
    output::print(&DoctorOut { ok, checks })?;
    Ok(())
}
