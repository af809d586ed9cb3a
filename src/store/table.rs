// SPDX-License-Identifier: GPL-3.0-only

//! Table storage record store
//!
//! Talks to the table service REST API with SharedKeyLite authorization.
//! Upserts are insert-or-replace `PUT`s on the entity URL; scans are paged
//! `GET` queries following the continuation headers, exposed as a lazy stream
//! so pages are only fetched while the consumer keeps polling.

use super::{EntityStream, RecordStore, TableEntity};
use crate::config::TableAccount;
use crate::constants::table;
use crate::errors::InfrastructureError;
use async_stream::try_stream;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info, trace};

type HmacSha256 = Hmac<Sha256>;

/// Continuation token returned by a partial query page
#[derive(Debug, Clone, PartialEq, Eq)]
struct Continuation {
    next_partition_key: String,
    next_row_key: Option<String>,
}

/// One page of a query
struct QueryPage {
    entities: Vec<TableEntity>,
    next: Option<Continuation>,
}

#[derive(Deserialize)]
struct QueryBody {
    #[serde(default)]
    value: Vec<TableEntity>,
}

/// Record store backed by the table storage service
pub struct TableRecordStore {
    client: reqwest::Client,
    account: TableAccount,
    table_name: String,
    /// Decoded shared key
    key: Vec<u8>,
}

impl std::fmt::Debug for TableRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableRecordStore")
            .field("endpoint", &self.account.table_endpoint)
            .field("table", &self.table_name)
            .finish()
    }
}

impl TableRecordStore {
    /// Create a store for `table_name` in the given account
    pub fn new(
        account: TableAccount,
        table_name: impl Into<String>,
    ) -> Result<Self, InfrastructureError> {
        let table_name = table_name.into();
        validate_table_name(&table_name)?;

        let key = BASE64.decode(account.account_key.as_bytes()).map_err(|e| {
            InfrastructureError::new(format!("AccountKey is not valid base64: {}", e))
        })?;

        info!(
            endpoint = %account.table_endpoint,
            table = %table_name,
            "Created table record store"
        );

        Ok(Self {
            client: reqwest::Client::new(),
            account,
            table_name,
            key,
        })
    }

    /// URL addressing a single entity
    fn entity_url(&self, partition_key: &str, row_key: &str) -> Result<Url, InfrastructureError> {
        parse_url(&format!(
            "{}/{}(PartitionKey='{}',RowKey='{}')",
            self.account.table_endpoint,
            self.table_name,
            quote_key(partition_key),
            quote_key(row_key)
        ))
    }

    fn query_url(&self) -> Result<Url, InfrastructureError> {
        parse_url(&format!(
            "{}/{}()",
            self.account.table_endpoint, self.table_name
        ))
    }

    fn tables_url(&self) -> Result<Url, InfrastructureError> {
        parse_url(&format!("{}/Tables", self.account.table_endpoint))
    }

    /// Compute the SharedKeyLite authorization header value
    fn authorization(&self, date: &str, url: &Url) -> Result<String, InfrastructureError> {
        let string_to_sign = string_to_sign(date, &self.account.account_name, url);
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| InfrastructureError::new(format!("invalid AccountKey: {}", e)))?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());
        Ok(format!(
            "SharedKeyLite {}:{}",
            self.account.account_name, signature
        ))
    }

    /// Start a request carrying the protocol and authorization headers
    fn signed(&self, method: Method, url: Url) -> Result<RequestBuilder, InfrastructureError> {
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        let authorization = self.authorization(&date, &url)?;

        Ok(self
            .client
            .request(method, url)
            .header("x-ms-date", date)
            .header("x-ms-version", table::API_VERSION)
            .header("DataServiceVersion", table::DATA_SERVICE_VERSION)
            .header("MaxDataServiceVersion", table::DATA_SERVICE_VERSION)
            .header(ACCEPT, table::ACCEPT_NO_METADATA)
            .header(AUTHORIZATION, authorization))
    }

    async fn fetch_page(
        &self,
        filter: &str,
        continuation: Option<&Continuation>,
    ) -> Result<QueryPage, InfrastructureError> {
        let mut query: Vec<(&str, &str)> = vec![("$filter", filter)];
        if let Some(next) = continuation {
            query.push(("NextPartitionKey", &next.next_partition_key));
            if let Some(row) = &next.next_row_key {
                query.push(("NextRowKey", row));
            }
        }

        let response = self
            .signed(Method::GET, self.query_url()?)?
            .query(&query)
            .send()
            .await?;
        let response = check_status(response).await?;

        let next = response
            .headers()
            .get(table::CONTINUATION_PARTITION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|pk| Continuation {
                next_partition_key: pk.to_string(),
                next_row_key: response
                    .headers()
                    .get(table::CONTINUATION_ROW_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
            });

        let body: QueryBody = response.json().await?;
        trace!(
            count = body.value.len(),
            more = next.is_some(),
            "Fetched query page"
        );

        Ok(QueryPage {
            entities: body.value,
            next,
        })
    }
}

#[async_trait]
impl RecordStore for TableRecordStore {
    async fn upsert_replace(&self, entity: TableEntity) -> Result<(), InfrastructureError> {
        let url = self.entity_url(&entity.partition_key, &entity.row_key)?;
        let body = serde_json::to_vec(&entity)
            .map_err(|e| InfrastructureError::new(format!("failed to encode entity: {}", e)))?;

        debug!(row = %entity.row_key, "Upserting entity");

        // A PUT without If-Match is insert-or-replace
        let response = self
            .signed(Method::PUT, url)?
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    fn scan<'a>(&'a self, partition_key: &'a str) -> EntityStream<'a> {
        let filter = format!("PartitionKey eq '{}'", partition_key.replace('\'', "''"));

        let stream = try_stream! {
            let mut continuation: Option<Continuation> = None;
            loop {
                let page = self.fetch_page(&filter, continuation.as_ref()).await?;
                for entity in page.entities {
                    yield entity;
                }
                match page.next {
                    Some(next) => continuation = Some(next),
                    None => break,
                }
            }
        };
        Box::pin(stream)
    }

    async fn ensure_ready(&self) -> Result<(), InfrastructureError> {
        let body = serde_json::json!({ "TableName": self.table_name }).to_string();
        let response = self
            .signed(Method::POST, self.tables_url()?)?
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return-no-content")
            .body(body)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            debug!(table = %self.table_name, "Table already exists");
            return Ok(());
        }
        check_status(response).await?;
        info!(table = %self.table_name, "Created table");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "table"
    }
}

/// Build the SharedKeyLite string to sign: `date\n/{account}{path}`
fn string_to_sign(date: &str, account_name: &str, url: &Url) -> String {
    format!("{}\n/{}{}", date, account_name, url.path())
}

/// Quote a key for use inside an entity URL
///
/// Single quotes are doubled per the OData literal rules, then the result
/// is percent-encoded.
pub fn quote_key(key: &str) -> String {
    urlencoding::encode(&key.replace('\'', "''")).into_owned()
}

fn parse_url(raw: &str) -> Result<Url, InfrastructureError> {
    Url::parse(raw).map_err(|e| InfrastructureError::new(format!("invalid table URL '{}': {}", raw, e)))
}

/// Table names: 3-63 alphanumerics, starting with a letter
fn validate_table_name(name: &str) -> Result<(), InfrastructureError> {
    let valid = (3..=63).contains(&name.len())
        && name.chars().all(|c| c.is_ascii_alphanumeric())
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if valid {
        Ok(())
    } else {
        Err(InfrastructureError::new(format!(
            "invalid table name '{}'",
            name
        )))
    }
}

#[derive(Deserialize)]
struct ServiceErrorBody {
    #[serde(rename = "odata.error")]
    error: ServiceError,
}

#[derive(Deserialize)]
struct ServiceError {
    code: String,
    message: ServiceErrorMessage,
}

#[derive(Deserialize)]
struct ServiceErrorMessage {
    value: String,
}

/// Turn a non-success response into an error carrying the service message
async fn check_status(response: Response) -> Result<Response, InfrastructureError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ServiceErrorBody>(&text) {
        Ok(body) => format!("{}: {}", body.error.code, body.error.message.value),
        Err(_) if text.trim().is_empty() => status.to_string(),
        Err(_) => text.trim().to_string(),
    };
    Err(InfrastructureError::new(format!(
        "table service returned {}: {}",
        status.as_u16(),
        message
    )))
}
