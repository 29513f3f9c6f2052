//! Per-session CSRF tokens.
//!
//! Every session gets one random token, created on first request and kept in
//! the session cookie. Forms render it as a hidden `csrf_token` field and
//! every state-changing handler calls `validate_csrf_token` before touching
//! the database. Login and registration run before a user-visible session
//! exists and are exempt.

use actix_web::{error, Error};
use rand::{distributions::Alphanumeric, Rng};

pub const CSRF_TOKEN_LENGTH: usize = 32;
const CSRF_SESSION_KEY: &str = "csrf_token";

pub fn generate_csrf_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Token for the current session, minting one if the session has none.
/// Called from the request middleware, so handlers always find a token.
pub fn get_or_create_csrf_token(session: &actix_session::Session) -> Result<String, Error> {
    match session.get::<String>(CSRF_SESSION_KEY) {
        Ok(Some(token)) => Ok(token),
        _ => {
            let token = generate_csrf_token();
            session
                .insert(CSRF_SESSION_KEY, token.clone())
                .map_err(|_| error::ErrorInternalServerError("Failed to store CSRF token"))?;
            Ok(token)
        }
    }
}

/// Compare a submitted token against the session's. Missing or mismatched
/// tokens are a 403; the request body is never processed.
pub fn validate_csrf_token(session: &actix_session::Session, submitted: &str) -> Result<(), Error> {
    let expected = session
        .get::<String>(CSRF_SESSION_KEY)
        .map_err(|_| error::ErrorInternalServerError("Failed to get CSRF token"))?
        .ok_or_else(|| error::ErrorForbidden("CSRF token not found in session"))?;

    if submitted != expected {
        log::warn!("CSRF token validation failed");
        return Err(error::ErrorForbidden("Invalid CSRF token"));
    }

    Ok(())
}
