//! Shared-secret authentication for the control plane.
//!
//! One key per backend process lifetime. The key is the sole access
//! control, which is why the server binds loopback only; it must never be
//! persisted or logged.

use uuid::Uuid;

/// Header carrying the signing key on every authenticated request.
pub const KEY_HEADER: &str = "x-mdq-key";

/// The shared secret distributed through the handshake channel.
#[derive(Clone)]
pub struct SigningKey(String);

impl SigningKey {
    /// Generate a fresh random key (256 bits from two v4 UUIDs).
    pub fn generate() -> Self {
        let a = Uuid::new_v4().simple().to_string();
        let b = Uuid::new_v4().simple().to_string();
        Self(format!("{a}{b}"))
    }

    /// Wrap a secret received over the handshake channel (client side).
    pub fn from_secret(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw key, for the handshake line and client headers only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a presented header value.
    pub fn verify(&self, presented: Option<&str>) -> bool {
        match presented {
            Some(p) => constant_time_eq(self.0.as_bytes(), p.as_bytes()),
            None => false,
        }
    }
}

// Keep the key out of debug output and logs.
impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
