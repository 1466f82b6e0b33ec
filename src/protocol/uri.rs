/*!
 * Service URI parsing
 */

use url::Url;

use crate::error::{FlowError, Result};

/// A validated environment address, e.g. `https://contoso.crm.dynamics.com`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    url: Url,
    api_version: String,
}

impl ServiceEndpoint {
    /// Parse an environment URL. Only the scheme, host and port are kept.
    pub fn from_uri(uri: &str, api_version: &str) -> Result<Self> {
        let trimmed = uri.trim();
        let url = Url::parse(trimmed)
            .map_err(|e| FlowError::InvalidEndpoint(format!("{}: {}", trimmed, e)))?;

        match url.scheme() {
            "https" | "http" => {}
            other => {
                return Err(FlowError::InvalidEndpoint(format!(
                    "unsupported scheme '{}' in {}, expected https",
                    other, trimmed
                )))
            }
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(FlowError::InvalidEndpoint(format!(
                "{} has no host",
                trimmed
            )));
        }
        if api_version.is_empty() || api_version.contains('/') {
            return Err(FlowError::InvalidEndpoint(format!(
                "invalid API version '{}'",
                api_version
            )));
        }

        let mut url = url;
        url.set_path("/");
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self {
            url,
            api_version: api_version.to_string(),
        })
    }

    /// `scheme://host[:port]` without a trailing slash
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Web API root, `{origin}/api/data/{version}/`
    pub fn api_base(&self) -> Result<Url> {
        self.url
            .join(&format!("api/data/{}/", self.api_version))
            .map_err(|e| FlowError::InvalidEndpoint(e.to_string()))
    }

    /// OAuth scope granting access to this environment
    pub fn token_scope(&self) -> String {
        format!("{}/.default", self.origin())
    }
}

impl std::fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.origin())
    }
}
