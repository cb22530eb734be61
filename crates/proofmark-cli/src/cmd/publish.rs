use anyhow::{anyhow, Result};
use proofmark_core::model::SnapshotManifest;
use proofmark_registry::{Settings, SnapshotPublisher};
use serde::Serialize;

use crate::output;

#[derive(Debug, Serialize)]
pub struct PublishOut {
    pub published: bool,
    pub manifest: Option<SnapshotManifest>,
}

pub async fn run(max: usize, batch: Option<u64>) -> Result<()> {
    if max == 0 {
        return Err(anyhow!("--max must be at least 1"));
    }
    let settings = Settings::from_env()?;
    let ctx = settings.context()?;
    let repo = settings.open_repository()?;
    let store = settings
        .open_registry()
        .await?
        .ok_or_else(|| anyhow!("no registry configured; set PROOFMARK_REGISTRY_DIR or PROOFMARK_REGISTRY_BUCKET"))?;
    let publisher = SnapshotPublisher::new(ctx, store);

    let pb = output::spinner("publishing snapshot");
    let res = match batch {
        Some(id) => publisher.republish(repo.as_ref(), id).await.map(Some),
        None => publisher.roll_next_batch(repo.as_ref(), max).await,
    };
    pb.finish_and_clear();
    let manifest = res?;

    match &manifest {
        Some(m) => output::status(true, "published", &format!("batch {} ({} proofs) root {}", m.batch, m.count, m.merkle_root))?,
        None => output::status(true, "up to date", "no pending proofs")?,
    }
    output::print(&PublishOut {
        published: manifest.is_some(),
        manifest,
    })?;
    Ok(())
}
