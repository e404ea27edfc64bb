//! TURN credential minting.
//!
//! The relay hub never forwards media itself; peers talk directly or
//! through a separate TURN/STUN deployment this crate does not run. This
//! module only mints the short-lived username/password pair that
//! deployment expects: HMAC-SHA1 over an expiry-stamped username,
//! base64-encoded.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// How long a minted credential remains valid for, from the moment it is
/// issued.
pub const CREDENTIAL_TTL_SECS: u64 = 86_400;

/// Errors minting a credential can return.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// The configured shared secret could not be used as an HMAC key.
    #[error("invalid TURN shared secret")]
    InvalidKey,
}

/// A short-lived username/password pair for a relay server, scoped to one
/// `user_uuid`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TurnCredentials {
    /// `"<expiry-unix-seconds>:<user_uuid>"`.
    pub turn_username: String,
    /// base64(HMAC-SHA1(shared_secret, `turn_username`)).
    pub turn_password: String,
}

/// Mints a credential pair for `user_uuid`, expiring [`CREDENTIAL_TTL_SECS`]
/// seconds after `now_unix`.
///
/// # Errors
/// Returns [`TurnError::InvalidKey`] if `secret` cannot be used as an HMAC
/// key (in practice `Hmac<Sha1>` accepts keys of any length, so this never
/// actually fails, but the caller still gets a `Result` rather than a
/// signature that would need to change if that ever stopped being true).
pub fn mint(secret: &str, user_uuid: &str, now_unix: u64) -> Result<TurnCredentials, TurnError> {
    let expiry = now_unix + CREDENTIAL_TTL_SECS;
    let turn_username = format!("{expiry}:{user_uuid}");

    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| TurnError::InvalidKey)?;
    mac.update(turn_username.as_bytes());
    let turn_password = STANDARD.encode(mac.finalize().into_bytes());

    Ok(TurnCredentials {
        turn_username,
        turn_password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_embeds_expiry_and_uuid() {
        let creds = mint("secret", "user-1", 1_000).unwrap();
        assert_eq!(creds.turn_username, format!("{}:user-1", 1_000 + CREDENTIAL_TTL_SECS));
    }

    #[test]
    fn same_inputs_produce_same_credentials() {
        let a = mint("secret", "user-1", 1_000).unwrap();
        let b = mint("secret", "user-1", 1_000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_secrets_produce_different_passwords() {
        let a = mint("secret-a", "user-1", 1_000).unwrap();
        let b = mint("secret-b", "user-1", 1_000).unwrap();
        assert_ne!(a.turn_password, b.turn_password);
    }

    #[test]
    fn password_is_valid_base64() {
        let creds = mint("secret", "user-1", 1_000).unwrap();
        assert!(STANDARD.decode(&creds.turn_password).is_ok());
    }
}
