/*!
 * Streaming checksum calculation for hashing during copy and verification
 */

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::control::{CancelToken, PauseGate};
use crate::error::{CustodyError, Result};

/// Digest algorithm, fixed for the duration of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// Default; the only algorithm accepted by current evidence registers
    Sha256,
    /// Legacy registers still key on MD5
    Md5,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Md5 => "md5",
        }
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Sha256
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Streaming hasher that calculates a digest incrementally
pub enum StreamingHasher {
    Sha256(Sha256),
    Md5(Md5),
}

impl StreamingHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Md5 => Self::Md5(Md5::new()),
        }
    }

    /// Update the hash with new data
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Md5(h) => h.update(data),
        }
    }

    /// Finalize and return the lowercase hex digest
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Md5(h) => hex::encode(h.finalize()),
        }
    }
}

/// Digest an in-memory buffer
pub fn digest_hex(algorithm: HashAlgorithm, data: &[u8]) -> String {
    let mut hasher = StreamingHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize_hex()
}

/// Calculate a file's digest with a streaming read, observing pause and cancel
/// at every chunk boundary
pub fn hash_file_streaming(
    path: &Path,
    algorithm: HashAlgorithm,
    buffer_size: usize,
    cancel: &CancelToken,
    pause: &PauseGate,
) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = StreamingHasher::new(algorithm);
    let mut buffer = vec![0u8; buffer_size];

    loop {
        pause.wait_while_paused(cancel);
        if cancel.is_cancelled() {
            return Err(CustodyError::Cancelled);
        }

        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize_hex())
}
