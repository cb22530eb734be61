//! Gzip-compressed newline-delimited proof export.
//!
//! One canonical proof JSON per line, in batch order. The gzip header carries
//! no file name and a zero mtime, so equal input gives equal bytes.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use proofmark_core::codec::ProofCodec;
use proofmark_core::model::CanonicalProof;
use proofmark_core::{ProofmarkError, ProofmarkResult};

pub fn encode_export(codec: &ProofCodec, proofs: &[CanonicalProof]) -> ProofmarkResult<Vec<u8>> {
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    for p in proofs {
        let line = codec.to_json_bytes(p)?;
        gz.write_all(&line)
            .and_then(|_| gz.write_all(b"\n"))
            .map_err(|e| ProofmarkError::serialization(format!("gzip export: {e}")))?;
    }
    gz.finish()
        .map_err(|e| ProofmarkError::serialization(format!("gzip export: {e}")))
}

/// Decode and validate every line of an export.
pub fn decode_export(codec: &ProofCodec, bytes: &[u8]) -> ProofmarkResult<Vec<CanonicalProof>> {
    let mut text = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut text)
        .map_err(|e| ProofmarkError::serialization(format!("gzip export: {e}")))?;

    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| codec.decode(l.as_bytes()).map_err(ProofmarkError::from))
        .collect()
}
