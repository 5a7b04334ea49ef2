//! Credential hashing and code generation
//!
//! Pure functions only. The HTTP-facing key check lives in the API crate.
//!
//! - Passwords are stored as base64(SHA-256(password))
//! - API keys are stored as lowercase hex SHA3-256 digests
//! - Verification codes are 21-character nanoids
//! - Class codes are v5 UUIDs derived from the educator and class name

use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};
use sha3::Sha3_256;
use uuid::Uuid;

/// Length of generated verification codes
pub const VERIFICATION_CODE_LENGTH: usize = 21;

/// Namespace for class-code UUIDs
pub const CLASS_CODE_NAMESPACE: Uuid = Uuid::from_u128(0x0a69782c_f1af_48c5_9aaf_078a4e511518);

/// Hash a plaintext password for storage and comparison
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    STANDARD.encode(digest)
}

/// Hash a presented API key into the form stored in `api_keys.hashed_key`
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha3_256::digest(key.as_bytes());
    format!("{:x}", digest)
}

/// Generate a random verification code
///
/// Uniqueness is not guaranteed here; callers retry until the code is unused.
pub fn create_verification_code() -> String {
    nanoid::nanoid!(VERIFICATION_CODE_LENGTH)
}

/// Deterministic class code for an educator's class name
pub fn class_code(educator_id: i64, class_name: &str) -> String {
    let name = format!("{}_{}", educator_id, class_name);
    Uuid::new_v5(&CLASS_CODE_NAMESPACE, name.as_bytes()).to_string()
}

/// True when an API key's permission root admits the request path
///
/// A key without a root may access everything.
pub fn key_permits_path(permissions_root: Option<&str>, path: &str) -> bool {
    match permissions_root {
        None => true,
        Some(root) => path.starts_with(root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_is_base64_sha256() {
        // SHA-256("password") in base64
        assert_eq!(
            hash_password("password"),
            "XohImNooBHFR0OVvjcYpJ3NgPQ1qq73WKhHvch0VQtg="
        );
    }

    #[test]
    fn test_api_key_hash_is_hex_sha3() {
        // SHA3-256("abc")
        let hashed = hash_api_key("abc");
        assert_eq!(hashed.len(), 64);
        assert_eq!(
            hashed,
            "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532"
        );
    }

    #[test]
    fn test_verification_code_shape() {
        let code = create_verification_code();
        assert_eq!(code.len(), VERIFICATION_CODE_LENGTH);
        assert!(code.chars().all(|c| nanoid::alphabet::SAFE.contains(&c)));
        assert_ne!(code, create_verification_code());
    }

    #[test]
    fn test_class_code_is_deterministic() {
        let a = class_code(7, "Astronomy 101");
        let b = class_code(7, "Astronomy 101");
        let c = class_code(8, "Astronomy 101");
        assert_eq!(a, b);
        assert_ne!(a, c);
        let parsed = Uuid::parse_str(&a).unwrap();
        assert_eq!(parsed.get_version_num(), 5);
    }

    #[test]
    fn test_key_permission_roots() {
        assert!(key_permits_path(None, "/students"));
        assert!(key_permits_path(Some("/hubbles_law"), "/hubbles_law/galaxies"));
        assert!(!key_permits_path(Some("/hubbles_law"), "/students"));
    }
}
