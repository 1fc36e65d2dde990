//! OAuth client-credentials token for app-only IMAP access.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::info;

use crate::config::{ImapAuth, OAuthConfig};
use crate::error::MailError;
use crate::mail::imap::Login;

/// Scope granting IMAP access to Exchange Online mailboxes.
pub const IMAP_SCOPE: &str = "https://outlook.office365.com/.default";

pub fn token_url(tenant_id: &str) -> String {
    format!("https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token")
}

/// Token endpoint reply; success and error share one shape.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    correlation_id: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Result<SecretString, MailError> {
        if let Some(token) = self.access_token.filter(|t| !t.is_empty()) {
            return Ok(SecretString::from(token));
        }
        Err(MailError::AuthFailed {
            reason: format!(
                "no access token (error: {}, description: {}, correlation id: {}); \
                 check TENANT_ID, CLIENT_ID, CLIENT_SECRET and the app's IMAP permissions",
                self.error.as_deref().unwrap_or("unknown"),
                self.error_description.as_deref().unwrap_or("none"),
                self.correlation_id.as_deref().unwrap_or("none"),
            ),
        })
    }
}

/// Request an access token for the service principal.
pub async fn acquire_token(
    http: &reqwest::Client,
    oauth: &OAuthConfig,
) -> Result<SecretString, MailError> {
    info!(tenant = %oauth.tenant_id, "Acquiring OAuth token for service principal");

    let params = [
        ("client_id", oauth.client_id.as_str()),
        ("client_secret", oauth.client_secret.expose_secret()),
        ("scope", IMAP_SCOPE),
        ("grant_type", "client_credentials"),
    ];
    let response = http
        .post(token_url(&oauth.tenant_id))
        .form(&params)
        .send()
        .await
        .map_err(|e| MailError::AuthFailed {
            reason: format!("token request failed: {e}"),
        })?;

    let status = response.status();
    let body: TokenResponse = response.json().await.map_err(|e| MailError::AuthFailed {
        reason: format!("unreadable token response (HTTP {status}): {e}"),
    })?;

    let token = body.into_token()?;
    info!("OAuth token acquired");
    Ok(token)
}

/// Turn configured credentials into a session login, fetching a token if needed.
pub async fn resolve_login(http: &reqwest::Client, auth: &ImapAuth) -> Result<Login, MailError> {
    match auth {
        ImapAuth::Password(password) => Ok(Login::Password(SecretString::from(
            password.expose_secret().to_string(),
        ))),
        ImapAuth::OAuth(oauth) => acquire_token(http, oauth).await.map(Login::Bearer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_url_embeds_tenant() {
        assert_eq!(
            token_url("contoso"),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
        );
    }

    #[test]
    fn success_response_yields_token() {
        let body: TokenResponse = serde_json::from_str(
            r#"{"token_type":"Bearer","expires_in":3599,"access_token":"eyJ0eXAi"}"#,
        )
        .unwrap();
        assert_eq!(body.into_token().unwrap().expose_secret(), "eyJ0eXAi");
    }

    #[test]
    fn error_response_carries_diagnostics() {
        let body: TokenResponse = serde_json::from_str(
            r#"{
                "error": "invalid_client",
                "error_description": "AADSTS7000215: Invalid client secret provided.",
                "correlation_id": "5f0c-42"
            }"#,
        )
        .unwrap();

        let err = body.into_token().unwrap_err();
        let MailError::AuthFailed { reason } = err else {
            panic!("expected AuthFailed");
        };
        assert!(reason.contains("invalid_client"));
        assert!(reason.contains("AADSTS7000215"));
        assert!(reason.contains("5f0c-42"));
    }

    #[tokio::test]
    async fn password_login_needs_no_token() {
        let auth = ImapAuth::Password(SecretString::from("pw".to_string()));
        let login = resolve_login(&reqwest::Client::new(), &auth).await.unwrap();
        assert!(matches!(login, Login::Password(ref p) if p.expose_secret() == "pw"));
    }
}
