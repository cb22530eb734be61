use anyhow::{anyhow, Result};
use proofmark_core::hash::HashHex;
use proofmark_core::verify::INVALID_HASH;
use proofmark_registry::{Settings, VerificationEngine};
use serde::Serialize;

use crate::io::{input, remote};
use crate::output;

#[derive(Debug, Serialize)]
pub struct VerifyOut {
    pub hash: String,
    pub valid: bool,
    pub signer: Option<String>,
    pub issued_at: Option<String>,
    pub latency_ms: u64,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

pub async fn run(hash: Option<&str>, file: Option<&str>, remote_url: Option<&str>) -> Result<()> {
    let digest = match (hash, file) {
        (Some(_), Some(_)) => return Err(anyhow!("give either a hash or --file, not both")),
        (None, None) => return Err(anyhow!("Hash parameter or file is required")),
        (Some(h), None) => HashHex::parse_user_input(h).map_err(|_| anyhow!(INVALID_HASH))?,
        (None, Some(path)) => {
            let pb = output::spinner("hashing");
            let h = input::hash_file(path).await;
            pb.finish_and_clear();
            h?
        }
    };

    let out = match remote_url {
        Some(base) => {
            let r = remote::verify(base, &digest).await?;
            VerifyOut {
                hash: digest.to_string(),
                valid: r.valid,
                signer: r.signer,
                issued_at: r.issued_at,
                latency_ms: r.latency_ms,
                errors: r.errors,
                source: Some(base.to_string()),
            }
        }
        None => {
            let settings = Settings::from_env()?;
            let ctx = settings.context()?;
            let engine = VerificationEngine::new(ctx, settings.open_registry().await?, settings.open_repository()?);
            let o = engine.verify_digest(&digest).await;
            VerifyOut {
                hash: digest.to_string(),
                valid: o.valid,
                signer: o.signer,
                issued_at: o.issued_at,
                latency_ms: o.latency_ms,
                errors: o.errors,
                source: o.source,
            }
        }
    };

    let detail = if out.valid {
        format!("{} signed {}", out.hash, out.issued_at.as_deref().unwrap_or("?"))
    } else {
        format!("{}: {}", out.hash, out.errors.join("; "))
    };
    output::status(out.valid, if out.valid { "valid" } else { "invalid" }, &detail)?;
    output::print(&out)?;
    if !out.valid {
        std::process::exit(2);
    }
    Ok(())
}
