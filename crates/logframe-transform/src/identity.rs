//! Deterministic row identity.
//!
//! Ids are the first 128 bits of a SHA-256 digest over a length-prefixed
//! encoding of the labels (in key order), the raw nanosecond timestamp and
//! the line. Every part is preceded by its byte length as a little-endian
//! `u64`, so no choice of label values or line text can make two different
//! rows serialize to the same bytes.

use sha2::{Digest, Sha256};

use logframe_types::LabelSet;

const ID_BYTES: usize = 16;

/// Content hash for (labels, timestamp, line) triples
pub struct RowIdentity;

impl RowIdentity {
    /// 32 lowercase hex characters
    pub fn compute_id(labels: &LabelSet, nanos: &str, line: &str) -> String {
        let mut hasher = Sha256::new();

        hasher.update((labels.len() as u64).to_le_bytes());
        for (name, value) in labels.iter() {
            update_part(&mut hasher, name.as_bytes());
            update_part(&mut hasher, value.as_bytes());
        }
        update_part(&mut hasher, nanos.as_bytes());
        update_part(&mut hasher, line.as_bytes());

        let digest = hasher.finalize();
        hex::encode(&digest[..ID_BYTES])
    }
}

fn update_part(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
