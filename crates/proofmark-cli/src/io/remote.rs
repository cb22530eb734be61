use anyhow::{anyhow, Result};
use proofmark_core::hash::HashHex;
use serde::Deserialize;
use url::Url;

/// Body of a completed remote verification.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteVerify {
    pub valid: bool,
    pub signer: Option<String>,
    pub issued_at: Option<String>,
    pub latency_ms: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    error: String,
}

pub fn verify_url(base: &str, hash: &HashHex) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| anyhow!("invalid --remote url {base:?}: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("--remote must be an http(s) url"));
    }
    url.path_segments_mut()
        .map_err(|_| anyhow!("--remote cannot be a base url"))?
        .pop_if_empty()
        .extend(["v1", "verify"]);
    url.query_pairs_mut().clear().append_pair("hash", hash.as_str());
    Ok(url)
}

pub async fn verify(base: &str, hash: &HashHex) -> Result<RemoteVerify> {
    let url = verify_url(base, hash)?;
    let resp = reqwest::get(url).await?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<RemoteVerify>().await?);
    }
    match resp.json::<RemoteError>().await {
        Ok(e) => Err(anyhow!("remote rejected request ({status}): {}", e.error)),
        Err(_) => Err(anyhow!("http error: {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofmark_core::hash::sha256_hex;

    #[test]
    fn url_is_built_under_base_path() {
        let h = sha256_hex(b"x");
        let u = verify_url("https://proofs.example.com/api/", &h).unwrap();
        assert_eq!(u.as_str(), format!("https://proofs.example.com/api/v1/verify?hash={h}"));

        let u = verify_url("http://localhost:8080", &h).unwrap();
        assert_eq!(u.path(), "/v1/verify");
    }

    #[test]
    fn non_http_remote_is_rejected() {
        assert!(verify_url("ftp://example.com", &sha256_hex(b"x")).is_err());
        assert!(verify_url("not a url", &sha256_hex(b"x")).is_err());
    }
}
