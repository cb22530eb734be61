//! Process-wide state shared by every registry component.
//!
//! Built once at startup and passed around as `Arc<RegistryContext>`. It is
//! read-mostly: only key rotation takes the write lock.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use proofmark_core::clock::{format_rfc3339, Clock, SystemClock};
use proofmark_core::codec::ProofCodec;
use proofmark_core::config::{validate_config, CoreConfig};
use proofmark_core::hash::HashHex;
use proofmark_core::signer::{Signer, SigningKeyPair};
use proofmark_core::ProofmarkResult;
use time::OffsetDateTime;
use tracing::info;

#[derive(Debug)]
pub struct RegistryContext {
    codec: ProofCodec,
    signer: RwLock<Signer>,
    config: CoreConfig,
    clock: Arc<dyn Clock>,
}

impl RegistryContext {
    pub fn new(config: CoreConfig, signer: Signer, clock: Arc<dyn Clock>) -> ProofmarkResult<Arc<Self>> {
        validate_config(&config)?;
        let codec = ProofCodec::from_config(&config)?;
        Ok(Arc::new(Self {
            codec,
            signer: RwLock::new(signer),
            config,
            clock,
        }))
    }

    /// Context on the wall clock.
    pub fn with_system_clock(config: CoreConfig, signer: Signer) -> ProofmarkResult<Arc<Self>> {
        Self::new(config, signer, Arc::new(SystemClock))
    }

    pub fn codec(&self) -> &ProofCodec {
        &self.codec
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Read access to the signer. Do not hold across an `.await`.
    pub fn signer(&self) -> RwLockReadGuard<'_, Signer> {
        self.signer.read()
    }

    /// Apply any rotation transition that is due now.
    pub fn advance_rotation(&self) -> bool {
        let now = self.now();
        let mut signer = self.signer.write();
        let moved = signer.rotation_mut().advance(now);
        if moved {
            info!(
                primary = %signer.fingerprint(),
                at = %format_rfc3339(now),
                "signing key cut over"
            );
        }
        moved
    }

    /// Start rotating to `secondary`, which takes over signing at `cutoff_at`.
    pub fn begin_rotation(&self, secondary: SigningKeyPair, cutoff_at: OffsetDateTime) -> ProofmarkResult<()> {
        let mut signer = self.signer.write();
        let next_fp = secondary.fingerprint().clone();
        let next = signer.rotation().clone().begin_rotation(secondary, cutoff_at)?;
        *signer.rotation_mut() = next;
        info!(secondary = %next_fp, cutoff = %format_rfc3339(cutoff_at), "key rotation started");
        Ok(())
    }

    /// Sign `digest` with whichever key is primary right now.
    pub fn sign(&self, digest: &HashHex) -> (String, HashHex) {
        self.advance_rotation();
        let signer = self.signer();
        (signer.sign(digest), signer.fingerprint().clone())
    }
}
