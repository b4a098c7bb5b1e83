//! Optional post-download verification beyond the mandatory size check the
//! Download Manager already performs (§4.10).

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Extension point for checking a completed download beyond its size.
/// The Download Manager calls this after a successful transfer when a
/// caller supplies one; returning `Err` does not retry the transfer.
pub trait Verifier: Send + Sync {
    fn verify(&self, path: &Path) -> Result<()>;
}

/// Verifies a file's SHA-256 digest against an expected hex string.
pub struct Sha256Verifier {
    pub expected_hex: String,
}

impl Verifier for Sha256Verifier {
    fn verify(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::open(path).map_err(|e| Error::io_with_path(e, path))?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher).map_err(|e| Error::io_with_path(e, path))?;
        let actual = hex::encode(hasher.finalize());

        if actual.eq_ignore_ascii_case(&self.expected_hex) {
            Ok(())
        } else {
            Err(Error::IntegrityFailure {
                path: path.to_path_buf(),
                expected: 0,
                actual: 0,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn matching_digest_passes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let verifier = Sha256Verifier {
            expected_hex: "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde"
                .to_string(),
        };
        assert!(verifier.verify(file.path()).is_ok());
    }

    #[test]
    fn mismatched_digest_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"goodbye world").unwrap();
        let verifier = Sha256Verifier {
            expected_hex: "0000000000000000000000000000000000000000000000000000000000000000"
                .to_string(),
        };
        assert!(verifier.verify(file.path()).is_err());
    }
}
