//! Credentials and bearer-token acquisition

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::error::{DataverseError, DataverseResult};
use crate::protocol::uri::ServiceEndpoint;

/// How the session obtains its bearer token
#[derive(Debug, Clone)]
pub enum Credentials {
    /// A token acquired elsewhere, used as-is
    AccessToken(SecretString),

    /// OAuth2 client-credentials grant for an app registration
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: SecretString,
        /// Token authority, e.g. https://login.microsoftonline.com
        authority_host: String,
    },
}

/// Raw credential inputs gathered from flags, environment and config
#[derive(Debug, Clone, Default)]
pub struct CredentialInputs {
    pub access_token: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub authority_host: String,
}

impl Credentials {
    /// Pick a credential kind from the inputs.
    ///
    /// An access token wins when present. Otherwise all three client-secret
    /// values are required.
    pub fn resolve(inputs: CredentialInputs) -> DataverseResult<Self> {
        let CredentialInputs {
            access_token,
            tenant_id,
            client_id,
            client_secret,
            authority_host,
        } = inputs;

        if let Some(token) = non_empty(access_token) {
            return Ok(Credentials::AccessToken(SecretString::new(
                token.into_boxed_str(),
            )));
        }

        match (non_empty(tenant_id), non_empty(client_id), non_empty(client_secret)) {
            (Some(tenant_id), Some(client_id), Some(secret)) => Ok(Credentials::ClientSecret {
                tenant_id,
                client_id,
                client_secret: SecretString::new(secret.into_boxed_str()),
                authority_host: authority_host.trim_end_matches('/').to_string(),
            }),
            (None, None, None) => Err(DataverseError::InvalidConfig(
                "no credentials: pass --access-token, or --tenant-id, --client-id and --client-secret"
                    .to_string(),
            )),
            (tenant, client, secret) => {
                let missing: Vec<&str> = [
                    ("--tenant-id", tenant.is_none()),
                    ("--client-id", client.is_none()),
                    ("--client-secret", secret.is_none()),
                ]
                .into_iter()
                .filter_map(|(flag, absent)| absent.then_some(flag))
                .collect();
                Err(DataverseError::InvalidConfig(format!(
                    "incomplete client credentials, missing {}",
                    missing.join(", ")
                )))
            }
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::AccessToken(_) => "access token",
            Credentials::ClientSecret { .. } => "client secret",
        }
    }

    /// Token endpoint of the client-credentials grant
    pub fn token_url(&self) -> Option<String> {
        match self {
            Credentials::AccessToken(_) => None,
            Credentials::ClientSecret {
                tenant_id,
                authority_host,
                ..
            } => Some(format!("{}/{}/oauth2/v2.0/token", authority_host, tenant_id)),
        }
    }

    /// Return a bearer token for `endpoint`, requesting one if needed
    pub async fn acquire_token(
        &self,
        http: &Client,
        endpoint: &ServiceEndpoint,
    ) -> DataverseResult<SecretString> {
        let (client_id, client_secret) = match self {
            Credentials::AccessToken(token) => return Ok(token.clone()),
            Credentials::ClientSecret {
                client_id,
                client_secret,
                ..
            } => (client_id, client_secret),
        };
        let token_url = self.token_url().unwrap_or_default();
        let scope = endpoint.token_scope();
        debug!(token_url = %token_url, scope = %scope, client_id = %client_id, "requesting token");

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.expose_secret()),
            ("scope", scope.as_str()),
        ];
        let response = http.post(&token_url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Any rejection by the authority is a credential problem
            let err = DataverseError::from_status(status.as_u16(), &body);
            return Err(match err {
                DataverseError::Service { status, message } => {
                    DataverseError::Authentication(format!("token request failed ({}): {}", status, message))
                }
                other => other,
            });
        }

        parse_token_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

fn parse_token_response(body: &str) -> DataverseResult<SecretString> {
    let token: TokenResponse = serde_json::from_str(body)?;
    if token.access_token.is_empty() {
        return Err(DataverseError::Authentication(
            "token endpoint returned an empty access token".to_string(),
        ));
    }
    debug!(expires_in = ?token.expires_in, "token acquired");
    Ok(SecretString::new(token.access_token.into_boxed_str()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
