use std::fmt::{self, Write};

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

const TOKEN_PREFIX: &str = "edg_";
const TOKEN_BYTES: usize = 32;

/// Plaintext node token, handed to the caller exactly once at registration.
///
/// Debug and Display are redacted so the value cannot end up in logs by accident.
/// Not `Clone`: the only way to read it is [`IssuedToken::expose_secret`].
pub struct IssuedToken(String);

impl IssuedToken {
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Generates a fresh token: `edg_` followed by 256 random bits in hex.
pub fn generate_token() -> IssuedToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);

    let mut token = String::with_capacity(TOKEN_PREFIX.len() + TOKEN_BYTES * 2);
    token.push_str(TOKEN_PREFIX);
    for byte in bytes {
        // writing to a String cannot fail
        let _ = write!(token, "{byte:02x}");
    }
    IssuedToken(token)
}

/// SHA-256 hex digest of a token. This is the only form that is persisted.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}
