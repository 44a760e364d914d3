use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "custom:role")]
    pub role: Option<String>,
    #[serde(default, alias = "custom:department")]
    pub department: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Decode ID token claims without verifying the signature. The backend
/// verifies it on every call.
pub fn decode_id_token_claims(token: &str) -> Result<IdTokenClaims> {
    let parts: Vec<&str> = token.split('.').collect();

    if parts.len() != 3 {
        return Err(anyhow::anyhow!("Invalid JWT format"));
    }

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| anyhow::anyhow!("Failed to decode JWT payload: {}", e))?;

    let claims: IdTokenClaims = serde_json::from_slice(&payload)
        .map_err(|e| anyhow::anyhow!("Failed to parse JWT claims: {}", e))?;

    Ok(claims)
}
