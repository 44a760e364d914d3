use crate::config::AuthSettings;
use crate::error::AppError;
use crate::session::StaffSession;
use crate::utils::jwt::decode_id_token_claims;
use billing_core::observability::TraceContextExt;
use billing_core::roles::{Department, Role};
use reqwest::Client;
use serde_json::Value;
use tower_sessions::Session;

pub struct AuthClient {
    client: Client,
    settings: AuthSettings,
}

impl AuthClient {
    pub fn new(settings: AuthSettings) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build auth client: {}", e)))?;
        Ok(Self { client, settings })
    }

    pub fn base_url(&self) -> &str {
        self.settings.base_url.trim_end_matches('/')
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response, AppError> {
        let url = format!("{}{}", self.base_url(), path);

        self.client
            .post(&url)
            .with_trace_context()
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", url, e);
                AppError::Upstream(format!("Auth service unreachable: {}", e))
            })
    }

    /// Exchange credentials for tokens and build the session record.
    ///
    /// Role and department come from the response's `user` object when
    /// present, otherwise from the ID token claims.
    pub async fn login(&self, email: &str, password: &str) -> Result<StaffSession, AppError> {
        let response = self
            .post(
                "/auth/login",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Login rejected");
            return Err(AppError::Unauthorized("Invalid email or password".to_string()));
        }

        let tokens: Value = response.json().await?;
        let id_token = token_field(&tokens, &["idToken", "id_token", "access_token", "token"])
            .ok_or_else(|| AppError::Upstream("Login response carried no token".to_string()))?;
        let refresh_token = token_field(&tokens, &["refreshToken", "refresh_token"]);

        let claims = decode_id_token_claims(&id_token).map_err(|e| {
            tracing::error!("Failed to decode ID token claims: {}", e);
            AppError::Unauthorized("Authentication error".to_string())
        })?;

        let user = tokens.get("user").cloned().unwrap_or(Value::Null);
        let user_text = |key: &str| user.get(key).and_then(Value::as_str).map(str::to_string);

        let staff = StaffSession {
            user_id: user_text("id").unwrap_or_else(|| claims.sub.clone()),
            email: user_text("email")
                .or(claims.email)
                .unwrap_or_else(|| email.to_string()),
            name: user_text("name").or(claims.name),
            role: Role::from_string(&user_text("role").or(claims.role).unwrap_or_default()),
            department: Department::from_string(
                &user_text("department").or(claims.department).unwrap_or_default(),
            ),
            id_token,
            refresh_token,
        };

        tracing::info!(
            user_id = %staff.user_id,
            role = staff.role.as_str(),
            department = staff.department.as_str(),
            "User logged in successfully"
        );

        Ok(staff)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        let response = self
            .post(
                "/auth/refresh",
                serde_json::json!({ "refreshToken": refresh_token }),
            )
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Unauthorized(format!(
                "Token refresh rejected with {}",
                response.status()
            )));
        }

        let tokens: Value = response.json().await?;
        token_field(&tokens, &["idToken", "id_token", "access_token", "token"])
            .ok_or_else(|| AppError::Unauthorized("Refresh response carried no token".to_string()))
    }

    /// Revoke the token. Failures are logged, never surfaced: logout always
    /// succeeds locally.
    pub async fn logout(&self, id_token: &str) {
        match self
            .post("/auth/logout", serde_json::json!({ "token": id_token }))
            .await
        {
            Ok(res) if res.status().is_success() => tracing::info!("Token revoked successfully"),
            Ok(res) => tracing::warn!(status = %res.status(), "Token revocation rejected"),
            Err(e) => tracing::error!("Failed to revoke token during logout: {}", e),
        }
    }

    /// A token to call the backend with.
    ///
    /// With per-request refresh enabled the refresh token is exchanged first
    /// and the new ID token stored in the session. A rejected refresh ends
    /// the session.
    pub async fn token_for(&self, session: &Session, staff: &mut StaffSession) -> Result<String, AppError> {
        if !self.settings.refresh_per_request {
            return Ok(staff.id_token.clone());
        }
        let Some(refresh_token) = staff.refresh_token.clone() else {
            return Ok(staff.id_token.clone());
        };

        match self.refresh(&refresh_token).await {
            Ok(id_token) => {
                staff.update_token(session, id_token.clone()).await?;
                Ok(id_token)
            }
            Err(AppError::Unauthorized(reason)) => {
                tracing::warn!(user_id = %staff.user_id, "Refresh failed, ending session: {}", reason);
                StaffSession::end(session).await?;
                Err(AppError::Unauthorized(reason))
            }
            Err(e) => Err(e),
        }
    }
}

fn token_field(tokens: &Value, keys: &[&str]) -> Option<String> {
    let holders = [Some(tokens), tokens.get("tokens"), tokens.get("data")];
    holders.iter().flatten().find_map(|holder| {
        keys.iter()
            .find_map(|k| holder.get(*k).and_then(Value::as_str))
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_field_looks_inside_common_envelopes() {
        assert_eq!(
            token_field(&json!({ "idToken": "a" }), &["idToken"]).as_deref(),
            Some("a")
        );
        assert_eq!(
            token_field(&json!({ "tokens": { "id_token": "b" } }), &["idToken", "id_token"]).as_deref(),
            Some("b")
        );
        assert_eq!(token_field(&json!({ "idToken": "" }), &["idToken"]), None);
    }
}
