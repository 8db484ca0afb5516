use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// PBKDF2-SHA256 iteration count for stored password hashes.
pub const PBKDF2_ITERATIONS: u32 = 100_000;
const KEY_LENGTH: usize = 32;

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn derive(salt: &str, password: &str) -> String {
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), PBKDF2_ITERATIONS, &mut key);
    to_hex(&key)
}

/// Hash a password with a fresh random salt. Output format: `salt$key`, both hex.
pub fn hash_password(password: &str) -> String {
    let salt = to_hex(&rand::random::<[u8; 16]>());
    let derived = derive(&salt, password);
    format!("{salt}${derived}")
}

/// Check `password` against a `salt$key` string in constant time.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, expected)) => derive(salt, password)
            .as_bytes()
            .ct_eq(expected.as_bytes())
            .into(),
        None => false,
    }
}

/// Generate an opaque session token for the cookie.
pub fn new_session_token() -> String {
    to_hex(&rand::random::<[u8; 32]>())
}

/// Hash of a session token, as stored in the `sessions` collection.
pub fn hash_token(token: &str) -> String {
    to_hex(&Sha256::digest(token.as_bytes()))
}
