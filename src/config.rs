// SPDX-License-Identifier: GPL-3.0-only

//! Service configuration
//!
//! Store settings come from a storage connection string and a table name,
//! both usually supplied through the environment.

use crate::constants::{server, table};
use crate::errors::InfrastructureError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

/// Which record store backs the directory
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum StoreBackend {
    /// Table storage service reached over HTTP
    #[default]
    Table,
    /// Process-local store, lost on exit
    Memory,
}

/// Record store settings
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Raw connection string; required for the table backend
    #[serde(skip_serializing)]
    pub connection_string: Option<String>,
    pub table_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            connection_string: None,
            table_name: table::DEFAULT_TABLE_NAME.to_string(),
        }
    }
}

impl StoreConfig {
    /// Validate presence of everything the selected backend needs
    ///
    /// Returns the parsed account settings for the table backend.
    pub fn validate(&self) -> Result<Option<TableAccount>, InfrastructureError> {
        match self.backend {
            StoreBackend::Memory => Ok(None),
            StoreBackend::Table => {
                let conn = self
                    .connection_string
                    .as_deref()
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| {
                        InfrastructureError::new(format!("{} not set", table::CONNECTION_ENV))
                    })?;
                if self.table_name.trim().is_empty() {
                    return Err(InfrastructureError::new(format!(
                        "{} is empty",
                        table::TABLE_NAME_ENV
                    )));
                }
                TableAccount::from_connection_string(conn).map(Some)
            }
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 7071)),
        }
    }
}

impl ServerConfig {
    pub fn from_bind(bind: &str) -> Result<Self, InfrastructureError> {
        let bind = bind.parse().map_err(|e| {
            InfrastructureError::new(format!("invalid {} '{}': {}", server::BIND_ENV, bind, e))
        })?;
        Ok(Self { bind })
    }
}

/// Storage account resolved from a connection string
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableAccount {
    pub account_name: String,
    /// Base64 encoded shared key
    pub account_key: String,
    /// Table service endpoint without trailing slash
    pub table_endpoint: String,
}

impl TableAccount {
    /// Parse a `key=value;key=value` storage connection string
    ///
    /// `AccountName` and `AccountKey` are required unless the string selects
    /// the local development emulator.
    pub fn from_connection_string(conn: &str) -> Result<Self, InfrastructureError> {
        let parts = parse_connection_string(conn);

        if parts
            .get("UseDevelopmentStorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Ok(Self {
                account_name: table::DEV_ACCOUNT_NAME.to_string(),
                account_key: table::DEV_ACCOUNT_KEY.to_string(),
                table_endpoint: table::DEV_TABLE_ENDPOINT.to_string(),
            });
        }

        let (Some(account_name), Some(account_key)) = (
            parts.get("AccountName").filter(|v| !v.is_empty()),
            parts.get("AccountKey").filter(|v| !v.is_empty()),
        ) else {
            return Err(InfrastructureError::new(
                "AccountName/AccountKey missing in connection string",
            ));
        };

        let table_endpoint = match parts.get("TableEndpoint").filter(|v| !v.is_empty()) {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => {
                let protocol = parts
                    .get("DefaultEndpointsProtocol")
                    .map(String::as_str)
                    .unwrap_or(table::DEFAULT_PROTOCOL);
                let suffix = parts
                    .get("EndpointSuffix")
                    .map(String::as_str)
                    .unwrap_or(table::DEFAULT_ENDPOINT_SUFFIX);
                format!("{}://{}.table.{}", protocol, account_name, suffix)
            }
        };

        Ok(Self {
            account_name: account_name.clone(),
            account_key: account_key.clone(),
            table_endpoint,
        })
    }
}

/// Split a connection string into its key/value pairs
///
/// Values may themselves contain `=` (base64 keys end in padding).
pub fn parse_connection_string(conn: &str) -> HashMap<String, String> {
    conn.split(';')
        .filter(|kv| !kv.trim().is_empty())
        .filter_map(|kv| {
            let (key, value) = kv.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
