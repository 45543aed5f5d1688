use anyhow::anyhow;
use rand::{rngs::OsRng, RngCore};
use scrypt::Params;
use tracing::error;

/// Stored passwords are `"<salt-hex>.<key-hex>"`: a random 8-byte salt and a
/// 32-byte scrypt key, both hex-encoded. The salt travels with the hash, so
/// verification needs nothing but the stored string.
const SALT_BYTES: usize = 8;
const KEY_BYTES: usize = 32;

// scrypt cost: N = 2^14, r = 8, p = 1
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

fn derive_key(plain: &str, salt_hex: &str) -> anyhow::Result<[u8; KEY_BYTES]> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_BYTES).map_err(|e| {
        error!(error = %e, "invalid scrypt params");
        anyhow!(e.to_string())
    })?;
    let mut key = [0u8; KEY_BYTES];
    // the salt is the hex string itself, not the decoded bytes
    scrypt::scrypt(plain.as_bytes(), salt_hex.as_bytes(), &params, &mut key).map_err(|e| {
        error!(error = %e, "scrypt derive error");
        anyhow!(e.to_string())
    })?;
    Ok(key)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let mut salt = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    let salt = hex::encode(salt);
    let key = derive_key(plain, &salt)?;
    Ok(format!("{}.{}", salt, hex::encode(key)))
}

/// Checks `plain` against a stored `salt.hash` string. A stored value without
/// a separator can never verify, so malformed records fail closed instead of
/// erroring.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let Some((salt, expected)) = stored.split_once('.') else {
        return Ok(false);
    };
    let key = derive_key(plain, salt)?;
    Ok(hex::encode(key) == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let stored = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &stored).expect("verify should succeed"));
    }

    #[test]
    fn hash_is_never_the_plaintext() {
        let stored = hash_password("validPassword").expect("hashing should succeed");
        assert_ne!(stored, "validPassword");
    }

    #[test]
    fn stored_format_is_two_hex_parts() {
        let stored = hash_password("asdaqwe").expect("hashing should succeed");
        let (salt, hash) = stored.split_once('.').expect("salt.hash format");
        assert_eq!(salt.len(), 16);
        assert_eq!(hash.len(), 64);
        assert!(salt.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn same_password_salts_differently() {
        let a = hash_password("samePassword").expect("hashing should succeed");
        let b = hash_password("samePassword").expect("hashing should succeed");
        assert_ne!(a, b);
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let stored = hash_password("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &stored).expect("verify should not error"));
    }

    #[test]
    fn verify_fails_closed_on_malformed_stored_value() {
        // no separator at all, like a record written outside signup
        assert!(!verify_password("asdasd", "a").expect("verify should not error"));
    }
}
