use sha2::{Digest, Sha256};

use crate::error::{HubError, Result};

const SHA256_HEX_LEN: usize = 64;

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// True for a 64 character hex digest, the only shape a manifest checksum may
/// take before it ends up in a cache file name.
#[must_use]
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == SHA256_HEX_LEN && value.bytes().all(|byte| byte.is_ascii_hexdigit())
}

/// Compares `bytes` against the manifest size and checksum, whichever are
/// present. The size is checked first since it needs no hashing.
pub(crate) fn verify_artifact(
    model: &str,
    expected_sha: Option<&str>,
    expected_len: Option<u64>,
    bytes: &[u8],
    hint: &'static str,
) -> Result<()> {
    let integrity = |expected: String, actual: String| HubError::Integrity {
        model: model.to_string(),
        expected,
        actual,
        hint,
    };

    if let Some(expected_len) = expected_len {
        let actual_len = bytes.len() as u64;
        if actual_len != expected_len {
            return Err(integrity(
                format!("{expected_len} bytes"),
                format!("{actual_len} bytes"),
            ));
        }
    }

    if let Some(expected_sha) = expected_sha {
        let actual = sha256_hex(bytes);
        if !actual.eq_ignore_ascii_case(expected_sha) {
            return Err(integrity(
                format!("sha256 {expected_sha}"),
                format!("sha256 {actual}"),
            ));
        }
    }
    Ok(())
}
