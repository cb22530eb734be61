use std::fs;

use anyhow::{anyhow, Result};
use proofmark_core::signer::{PublicKey, SigningKeyPair};
use serde::Serialize;

use crate::args::KeysCommand;
use crate::io::export;
use crate::output;

#[derive(Debug, Serialize)]
pub struct GenerateOut {
    pub fingerprint: String,
    pub private_key: String,
    pub public_key: String,
}

#[derive(Debug, Serialize)]
pub struct FingerprintOut {
    pub fingerprint: String,
    pub kind: &'static str,
}

pub async fn run(action: KeysCommand) -> Result<()> {
    match action {
        KeysCommand::Generate { out, name } => {
            let key = SigningKeyPair::generate();
            let (private, public) = export::write_key_pair(&out, &name, &key)?;
            output::print(&GenerateOut {
                fingerprint: key.fingerprint().to_string(),
                private_key: private.display().to_string(),
                public_key: public.display().to_string(),
            })?;
            Ok(())
        }
        KeysCommand::Fingerprint { path } => {
            let pem = fs::read_to_string(&path)?;
            let out = if pem.contains("PRIVATE KEY") {
                FingerprintOut {
                    fingerprint: SigningKeyPair::from_pkcs8_pem(&pem)?.fingerprint().to_string(),
                    kind: "private",
                }
            } else if pem.contains("PUBLIC KEY") {
                FingerprintOut {
                    fingerprint: PublicKey::from_public_key_pem(&pem)?.fingerprint().to_string(),
                    kind: "public",
                }
            } else {
                return Err(anyhow!("{path} is not a PEM key"));
            };
            output::print(&out)?;
            Ok(())
        }
    }
}
