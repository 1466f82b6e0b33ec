//! Authenticated Web API session

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::auth::Credentials;
use super::error::{DataverseError, DataverseResult};
use super::fetch::{linked_key, FetchQuery};
use crate::core::pagination::{Cursor, Page, PagingInfo, RecordSource};
use crate::core::record::RawRecord;
use crate::protocol::uri::ServiceEndpoint;

const MORE_RECORDS: &str = "@Microsoft.Dynamics.CRM.morerecords";
const PAGING_COOKIE: &str = "@Microsoft.Dynamics.CRM.fetchxmlpagingcookie";
const TOTAL_RECORD_COUNT: &str = "@Microsoft.Dynamics.CRM.totalrecordcount";

/// Session against one environment
pub struct DataverseClient {
    http: Client,
    endpoint: ServiceEndpoint,
    api_base: Url,
    token: SecretString,
    organization: String,
}

impl DataverseClient {
    /// Authenticate and resolve the organization name
    pub async fn connect(
        endpoint: ServiceEndpoint,
        credentials: &Credentials,
        timeout: Duration,
    ) -> DataverseResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .default_headers(default_headers())
            .user_agent(concat!("desktopflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataverseError::InvalidConfig(format!("failed to build HTTP client: {}", e)))?;
        let api_base = endpoint
            .api_base()
            .map_err(|e| DataverseError::InvalidConfig(e.to_string()))?;

        info!(endpoint = %endpoint, credentials = credentials.kind(), "connecting");
        let token = credentials.acquire_token(&http, &endpoint).await?;

        let mut client = Self {
            http,
            endpoint,
            api_base,
            token,
            organization: String::new(),
        };
        client.organization = client.fetch_organization_name().await?;
        info!(organization = %client.organization, "connected");
        Ok(client)
    }

    /// Request URL for one page of `query`
    pub fn page_url(&self, query: &FetchQuery, paging: &PagingInfo) -> DataverseResult<Url> {
        let mut url = self
            .api_base
            .join(&query.entity_set())
            .map_err(|e| DataverseError::InvalidConfig(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("fetchXml", &query.to_fetch_xml(paging));
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> DataverseResult<Value> {
        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DataverseError::from_status(status.as_u16(), &body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_organization_name(&self) -> DataverseResult<String> {
        let mut url = self
            .api_base
            .join("organizations")
            .map_err(|e| DataverseError::InvalidConfig(e.to_string()))?;
        url.query_pairs_mut().append_pair("$select", "name");

        let body = self.get_json(url).await?;
        match organization_name(&body) {
            Some(name) => Ok(name),
            None => {
                warn!("organization name not returned, using host name");
                Ok(self.endpoint.host().to_string())
            }
        }
    }
}

#[async_trait]
impl RecordSource for DataverseClient {
    fn organization_name(&self) -> &str {
        &self.organization
    }

    async fn retrieve_page(&self, query: &FetchQuery, paging: &PagingInfo) -> DataverseResult<Page> {
        let url = self.page_url(query, paging)?;
        debug!(entity = query.entity(), page = paging.page_number, "GET {}", url.path());
        let body = self.get_json(url).await?;
        parse_page(&body, query)
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static("odata-version"),
        HeaderValue::from_static("4.0"),
    );
    headers.insert(
        HeaderName::from_static("odata-maxversion"),
        HeaderValue::from_static("4.0"),
    );
    headers.insert(
        HeaderName::from_static("prefer"),
        HeaderValue::from_static("odata.include-annotations=\"*\""),
    );
    headers
}

fn organization_name(body: &Value) -> Option<String> {
    body.get("value")?
        .as_array()?
        .first()?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

/// Decode a query response into a [`Page`].
///
/// Rows keep the service's order. The owner value is read from the first
/// linked column of the first join.
pub fn parse_page(body: &Value, query: &FetchQuery) -> DataverseResult<Page> {
    let rows = body
        .get("value")
        .and_then(Value::as_array)
        .ok_or_else(|| DataverseError::Decode("response has no 'value' array".to_string()))?;

    let primary_key = query.primary_key();
    let owner_key = query
        .links()
        .first()
        .and_then(|link| link.attributes.first().map(|column| linked_key(&link.alias, column)));

    let records = rows
        .iter()
        .map(|row| {
            let row = row
                .as_object()
                .ok_or_else(|| DataverseError::Decode("row is not an object".to_string()))?;
            parse_record(row, &primary_key, owner_key.as_deref())
        })
        .collect::<DataverseResult<Vec<_>>>()?;

    let more_records = body
        .get(MORE_RECORDS)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let cursor = body
        .get(PAGING_COOKIE)
        .and_then(Value::as_str)
        .map(Cursor::new);
    // -1 means the count was not computed
    let total_record_count = body
        .get(TOTAL_RECORD_COUNT)
        .and_then(Value::as_i64)
        .and_then(|count| u64::try_from(count).ok());

    Ok(Page {
        records,
        more_records,
        cursor,
        total_record_count,
    })
}

fn parse_record(
    row: &Map<String, Value>,
    primary_key: &str,
    owner_key: Option<&str>,
) -> DataverseResult<RawRecord> {
    let id = string_field(row, primary_key)
        .ok_or_else(|| DataverseError::Decode(format!("row without '{}'", primary_key)))?;

    let mut record = RawRecord::new(id);
    if let Some(name) = string_field(row, "name") {
        record = record.with_name(name);
    }
    if let Some(payload) = string_field(row, "clientdata") {
        record = record.with_payload(payload);
    }
    if let Some(owner) = owner_key.and_then(|key| string_field(row, key)) {
        record = record.with_owner(owner);
    }
    if let Some(modified) = string_field(row, "modifiedon") {
        let parsed = DateTime::parse_from_rfc3339(&modified).map_err(|e| {
            DataverseError::Decode(format!("invalid modifiedon '{}': {}", modified, e))
        })?;
        record = record.with_modified_on(parsed.with_timezone(&Utc));
    }
    Ok(record)
}

fn string_field(row: &Map<String, Value>, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OwnerLabel;
    use chrono::TimeZone;
    use serde_json::json;

    fn query() -> FetchQuery {
        FetchQuery::desktop_flows(OwnerLabel::Email, true)
    }

    #[test]
    fn test_parse_page_with_annotations() {
        let body = json!({
            "@odata.context": "https://contoso.crm.dynamics.com/api/data/v9.2/$metadata#workflows",
            "@Microsoft.Dynamics.CRM.totalrecordcount": 3,
            "@Microsoft.Dynamics.CRM.morerecords": true,
            "@Microsoft.Dynamics.CRM.fetchxmlpagingcookie": "<cookie pagenumber=\"2\" pagingcookie=\"%253ccookie%253e\" />",
            "value": [
                {
                    "workflowid": "a1",
                    "name": "Invoice bot",
                    "clientdata": "{\"k\":1}",
                    "modifiedon": "2024-03-01T08:30:00Z",
                    "owner.internalemailaddress": "ada@contoso.com"
                },
                {
                    "workflowid": "b2",
                    "name": "Empty",
                    "clientdata": null,
                    "owner.internalemailaddress": "grace@contoso.com"
                }
            ]
        });

        let page = parse_page(&body, &query()).unwrap();
        assert!(page.more_records);
        assert_eq!(page.total_record_count, Some(3));
        assert_eq!(
            page.cursor.as_ref().map(Cursor::as_str),
            Some("<cookie pagenumber=\"2\" pagingcookie=\"%253ccookie%253e\" />")
        );
        assert_eq!(page.records.len(), 2);

        let first = &page.records[0];
        assert_eq!(first.id, "a1");
        assert_eq!(first.name.as_deref(), Some("Invoice bot"));
        assert_eq!(first.payload.as_deref(), Some("{\"k\":1}"));
        assert_eq!(first.owner.as_deref(), Some("ada@contoso.com"));
        assert_eq!(
            first.modified_on,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap())
        );

        let second = &page.records[1];
        assert_eq!(second.payload, None);
        assert_eq!(second.modified_on, None);
    }

    #[test]
    fn test_parse_last_page() {
        let body = json!({
            "@Microsoft.Dynamics.CRM.totalrecordcount": -1,
            "value": []
        });
        let page = parse_page(&body, &query()).unwrap();
        assert!(!page.more_records);
        assert!(page.cursor.is_none());
        assert_eq!(page.total_record_count, None);
        assert!(page.records.is_empty());
    }

    #[test]
    fn test_parse_owner_by_name() {
        let body = json!({
            "value": [{"workflowid": "a1", "owner.fullname": "Ada Lovelace", "owner.internalemailaddress": "x"}]
        });
        let query = FetchQuery::desktop_flows(OwnerLabel::Name, false);
        let page = parse_page(&body, &query).unwrap();
        assert_eq!(page.records[0].owner.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_parse_rejects_bad_rows() {
        assert!(matches!(
            parse_page(&json!({"error": {}}), &query()),
            Err(DataverseError::Decode(_))
        ));
        assert!(matches!(
            parse_page(&json!({"value": [{"name": "no id"}]}), &query()),
            Err(DataverseError::Decode(_))
        ));
        assert!(matches!(
            parse_page(
                &json!({"value": [{"workflowid": "a", "modifiedon": "yesterday"}]}),
                &query()
            ),
            Err(DataverseError::Decode(_))
        ));
    }

    #[test]
    fn test_organization_name() {
        let body = json!({"value": [{"name": "Contoso Production", "organizationid": "1"}]});
        assert_eq!(organization_name(&body).as_deref(), Some("Contoso Production"));
        assert_eq!(organization_name(&json!({"value": []})), None);
    }

    #[test]
    fn test_default_headers() {
        let headers = default_headers();
        assert_eq!(headers["accept"], "application/json");
        assert_eq!(headers["odata-version"], "4.0");
        assert_eq!(headers["prefer"], "odata.include-annotations=\"*\"");
    }
}
