use std::path::Path;

use anyhow::Result;
use proofmark_core::model::Subject;
use proofmark_registry::{IssueRequest, ProofIssuer, Settings};
use serde::Serialize;

use crate::io::input;
use crate::output;

pub struct IssueArgs {
    pub path: String,
    pub subject_type: String,
    pub namespace: String,
    pub id: Option<String>,
    pub meta: Vec<String>,
    pub metadata_file: Option<String>,
    pub user: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IssueOut {
    pub id: i64,
    pub proof: serde_json::Value,
}

pub async fn run(args: IssueArgs) -> Result<()> {
    let settings = Settings::from_env()?;
    let ctx = settings.context()?;
    let issuer = ProofIssuer::new(ctx.clone(), settings.open_repository()?);

    let metadata = input::build_metadata(args.metadata_file.as_deref(), &args.meta, &ctx.config().limits)?;
    let subject_id = args.id.unwrap_or_else(|| {
        Path::new(&args.path)
            .file_name()
            .map_or_else(|| args.path.clone(), |n| n.to_string_lossy().into_owned())
    });

    let pb = output::spinner("hashing");
    let hash = input::hash_file(&args.path).await?;
    pb.set_message("signing");
    let issued = issuer
        .issue(IssueRequest {
            hash,
            subject: Subject::new(args.subject_type, args.namespace, subject_id),
            metadata,
            user_id: args.user,
        })
        .await;
    pb.finish_and_clear();
    let issued = issued?;

    output::status(true, "issued", &format!("#{} {}", issued.id, issued.proof.hash_full))?;
    output::print(&IssueOut {
        id: issued.id,
        proof: issued.proof.to_json(),
    })?;
    Ok(())
}
