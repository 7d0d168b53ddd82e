use crate::error::CrudError;
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Argon2,
};

/// Opaque hash/verify capability used by the auth service.
pub trait PasswordHasher: Send + Sync + 'static {
    fn hash(&self, password: &str) -> Result<String, CrudError>;

    /// `false` for a wrong password and for an unparseable hash alike.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id with default parameters; the salt is embedded in the hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, CrudError> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CrudError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Stored password hash is malformed: {}", e);
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2() {
        let hash = Argon2Hasher.hash("mySecurePassword123").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2"));
    }

    #[test]
    fn test_verify_password() {
        let hash = Argon2Hasher.hash("mySecurePassword123").expect("Failed to hash password");

        assert!(Argon2Hasher.verify("mySecurePassword123", &hash));
        assert!(!Argon2Hasher.verify("wrongPassword", &hash));
    }

    #[test]
    fn test_same_password_gets_fresh_salt() {
        let first = Argon2Hasher.hash("pw").expect("Failed to hash password");
        let second = Argon2Hasher.hash("pw").expect("Failed to hash password");

        assert_ne!(first, second);
        assert!(Argon2Hasher.verify("pw", &first));
        assert!(Argon2Hasher.verify("pw", &second));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!Argon2Hasher.verify("pw", "not-a-hash"));
    }
}
