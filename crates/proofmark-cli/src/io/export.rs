use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use proofmark_core::signer::SigningKeyPair;

/// Write `<name>.pem` (PKCS#8 private) and `<name>.pub.pem` (SPKI public).
/// Refuses to overwrite an existing private key.
pub fn write_key_pair<P: AsRef<Path>>(out_dir: P, name: &str, key: &SigningKeyPair) -> Result<(PathBuf, PathBuf)> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)?;

    let private = out_dir.join(format!("{name}.pem"));
    let public = out_dir.join(format!("{name}.pub.pem"));
    if private.exists() {
        return Err(anyhow!("{} already exists", private.display()));
    }

    fs::write(&private, key.to_pkcs8_pem()?)?;
    restrict_permissions(&private)?;
    fs::write(&public, key.public_key().to_public_key_pem()?)?;
    Ok((private, public))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofmark_core::signer::PublicKey;

    #[test]
    fn written_keys_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let key = SigningKeyPair::from_bytes(&[4; 32]);
        let (private, public) = write_key_pair(dir.path(), "signing", &key).unwrap();

        let back = SigningKeyPair::from_pkcs8_pem(&fs::read_to_string(private).unwrap()).unwrap();
        assert_eq!(back.fingerprint(), key.fingerprint());
        let public = PublicKey::from_public_key_pem(&fs::read_to_string(public).unwrap()).unwrap();
        assert_eq!(public.fingerprint(), key.fingerprint());

        assert!(write_key_pair(dir.path(), "signing", &key).is_err());
    }
}
