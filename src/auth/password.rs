use argon2::{
    Argon2,
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Argon2id hash in PHC string form. Used for passwords and recovery codes.
pub fn hash_secret(secret: &str) -> Result<String, password_hash::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    Ok(argon2.hash_password(secret.as_bytes(), &salt)?.to_string())
}

pub fn verify_secret(secret: &str, hashed: &str) -> Result<(), password_hash::Error> {
    let argon2 = Argon2::default();
    let parsed = PasswordHash::new(hashed)?;

    argon2.verify_password(secret.as_bytes(), &parsed)
}

/// Index of the first hash `candidate` matches.
pub fn find_matching(candidate: &str, hashes: &[String]) -> Option<usize> {
    hashes
        .iter()
        .position(|hash| verify_secret(candidate, hash).is_ok())
}
