//! Session management — the identity boundary of the relay.
//!
//! ARCHITECTURE
//! ============
//! Identity issuance lives outside this system. The relay only validates a
//! session token once, at websocket upgrade, and trusts the resolved user id
//! as the `from` of every subsequent frame on that connection.
//!
//! TRADE-OFFS
//! ==========
//! Tokens are long-lived bearer secrets passed as a query parameter on the
//! upgrade request; there is no per-frame re-authentication. A revoked token
//! only takes effect on the next connect.

use std::fmt::Write;

use rand::Rng;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// User row resolved from a session token.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionUser {
    /// Unique user identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
}

/// Create a session for the given user, returning the token.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_session(pool: &PgPool, user_id: Uuid) -> Result<String, sqlx::Error> {
    let token = generate_token();
    sqlx::query("INSERT INTO sessions (token, user_id) VALUES ($1, $2)")
        .bind(&token)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(token)
}

/// Validate a session token and return the associated user.
///
/// # Errors
///
/// Returns a database error if the query fails. An unknown token is
/// `Ok(None)`, not an error.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<SessionUser>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT u.id, u.name
         FROM sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = $1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| SessionUser { id: r.get("id"), name: r.get("name") }))
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
