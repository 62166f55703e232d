//! Access token helpers: client-credentials exchange and team discovery.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde::Deserialize;

use super::ApiError;

/// Group that every token carries besides the team it belongs to.
const SANDBOX_GROUP: &str = "sandbox";

#[derive(Deserialize)]
pub(super) struct TokenResponse {
    pub(super) access_token: Option<String>,
}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    groups: Vec<String>,
}

/// Reads the team from the `groups` claim of a JWT access token.
///
/// Returns `Ok(None)` when the token is well formed but names no team.
pub(super) fn team_from_access_token(token: &str) -> Result<Option<String>, ApiError> {
    let malformed = || ApiError::Auth(String::from("access token is not a JWT"));
    let payload = token.split('.').nth(1).ok_or_else(malformed)?;
    let trimmed = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .map_err(|_| malformed())?;
    let claims: Claims = serde_json::from_slice(&bytes).map_err(|_| malformed())?;
    Ok(claims
        .groups
        .into_iter()
        .find(|group| group != SANDBOX_GROUP))
}

/// Picks the team for `token`, preferring the token's own claim over the
/// configured value.
pub(super) fn resolve_team(token: &str, configured: Option<&str>) -> Result<String, ApiError> {
    match (team_from_access_token(token), configured) {
        (Ok(Some(team)), _) => Ok(team),
        (Ok(None) | Err(_), Some(team)) => Ok(team.to_owned()),
        (Ok(None), None) => Err(ApiError::Auth(String::from(
            "no teamId found in the access token",
        ))),
        (Err(err), None) => Err(err),
    }
}
