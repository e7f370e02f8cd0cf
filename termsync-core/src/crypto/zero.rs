//! Zeroization utilities for secure memory handling.
//!
//! Holds the unlocked master password and clears derived keys.

use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// The master password of an unlocked sync session
///
/// The buffer is overwritten when [`MasterPassword::clear`] is called and
/// again on drop. It is intentionally neither `Clone` nor `Debug`-printable.
pub struct MasterPassword {
    secret: Zeroizing<String>,
}

impl MasterPassword {
    /// Take ownership of a password
    pub fn new(password: String) -> Self {
        Self {
            secret: Zeroizing::new(password),
        }
    }

    /// Borrow the password (use carefully!)
    pub fn expose(&self) -> &str {
        self.secret.as_str()
    }

    /// Check if the holder is empty (never set, or already cleared)
    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }

    /// Overwrite the password in place
    pub fn clear(&mut self) {
        self.secret.zeroize();
    }
}

impl From<String> for MasterPassword {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Debug for MasterPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterPassword(<redacted>)")
    }
}

/// Zeroize a byte slice
///
/// This function will overwrite the provided bytes with zeros.
pub fn zeroize_bytes(data: &mut [u8]) {
    data.zeroize();
}
