//! Stored user accounts and the AIM password digest.
//!
//! AIM clients never send the password itself. At login they send
//! `md5(auth_key || md5(password) || "AOL Instant Messenger (SM)")`, where
//! `auth_key` is the per-account challenge string handed out during the BUCP
//! challenge phase. The server stores that final digest and compares
//! byte-for-byte.

use md5::{Digest, Md5};

use crate::ScreenName;

/// Constant trailer the client appends when digesting the password.
const AIM_MD5_TRAILER: &[u8] = b"AOL Instant Messenger (SM)";

/// A stored user account.
#[derive(Debug, Clone)]
pub struct User {
    /// The account's screen name.
    pub screen_name: ScreenName,
    /// Challenge string issued during BUCP sign-on.
    pub auth_key: String,
    /// `md5(auth_key || md5(password) || trailer)`.
    pub pass_hash: Vec<u8>,
}

impl User {
    /// Create a user, deriving `pass_hash` from a cleartext password.
    pub fn new_with_password(
        screen_name: ScreenName,
        auth_key: impl Into<String>,
        password: &str,
    ) -> Self {
        let auth_key = auth_key.into();
        let pass_hash = password_digest(&auth_key, password);
        Self {
            screen_name,
            auth_key,
            pass_hash,
        }
    }

    /// Check a client-supplied login digest against the stored hash.
    pub fn verify_digest(&self, digest: &[u8]) -> bool {
        self.pass_hash == digest
    }
}

/// Compute the AIM login digest for `password` under `auth_key`.
///
/// This is the exact scheme period clients implement; compatibility
/// requires reproducing it verbatim, insecurity included.
pub fn password_digest(auth_key: &str, password: &str) -> Vec<u8> {
    let inner = Md5::digest(password.as_bytes());
    let mut outer = Md5::new();
    outer.update(auth_key.as_bytes());
    outer.update(inner);
    outer.update(AIM_MD5_TRAILER);
    outer.finalize().to_vec()
}
