//! Single-line text packaging of snapshots for sharing and offline replay.

use std::fmt;

use adaptive_arena_core::Snapshot;
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};
use thiserror::Error;

const PACKAGE_DOMAIN: &str = "arena";
const PACKAGE_VERSION: &str = "v1";
const FIELD_DELIMITER: char = ':';

/// Identifier prefix emitted before the encoded snapshot payload.
pub const PACKAGE_HEADER: &str = "arena:v1";

/// Errors raised while packaging or unpacking snapshots.
#[derive(Debug, Error)]
pub enum SnapshotTransferError {
    /// The provided string was empty or contained only whitespace.
    #[error("snapshot package was empty")]
    EmptyPayload,
    /// The package did not contain a version segment.
    #[error("snapshot package is missing the version")]
    MissingVersion,
    /// The package did not contain the payload segment.
    #[error("snapshot package is missing the payload")]
    MissingPayload,
    /// The package used an unexpected prefix segment.
    #[error("snapshot prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The package used an unsupported version identifier.
    #[error("snapshot version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The base64 payload could not be decoded.
    #[error("could not decode snapshot payload: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    /// The payload could not be serialised or parsed.
    #[error("could not process snapshot payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Encodes the snapshot as `arena:v1:<base64 json>`.
pub fn encode(snapshot: &Snapshot) -> Result<String, SnapshotTransferError> {
    let json = serde_json::to_vec(snapshot)?;
    let encoded = STANDARD_NO_PAD.encode(json);
    Ok(format!("{PACKAGE_HEADER}{FIELD_DELIMITER}{encoded}"))
}

/// Decodes a snapshot previously produced by [`encode`].
pub fn decode(value: &str) -> Result<Snapshot, SnapshotTransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SnapshotTransferError::EmptyPayload);
    }

    let mut parts = trimmed.splitn(3, FIELD_DELIMITER);
    let domain = parts.next().unwrap_or_default();
    let version = parts.next().ok_or(SnapshotTransferError::MissingVersion)?;
    let payload = parts.next().ok_or(SnapshotTransferError::MissingPayload)?;

    if domain != PACKAGE_DOMAIN {
        return Err(SnapshotTransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != PACKAGE_VERSION {
        return Err(SnapshotTransferError::UnsupportedVersion(version.to_owned()));
    }

    let bytes = STANDARD_NO_PAD.decode(payload.as_bytes())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Stable content fingerprint of a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SnapshotDigest(u64);

impl SnapshotDigest {
    /// Raw digest value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SnapshotDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Hashes the snapshot's canonical JSON encoding with SHA-256.
pub fn digest(snapshot: &Snapshot) -> Result<SnapshotDigest, SnapshotTransferError> {
    let json = serde_json::to_vec(snapshot)?;
    let mut hasher = Sha256::new();
    hasher.update(PACKAGE_HEADER.as_bytes());
    hasher.update(&json);
    let hashed = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&hashed[..8]);
    Ok(SnapshotDigest(u64::from_le_bytes(bytes)))
}
