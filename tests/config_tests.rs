// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use asset_tracker::config::{ServerConfig, StoreBackend, StoreConfig, TableAccount};

#[test]
fn test_store_config_default() {
    let config = StoreConfig::default();

    assert_eq!(config.backend, StoreBackend::Table);
    assert_eq!(config.table_name, "Assets", "Default table should be Assets");
    assert!(config.connection_string.is_none());
}

#[test]
fn test_table_backend_fails_fast_without_connection_string() {
    let err = StoreConfig::default().validate().unwrap_err();
    assert_eq!(err.message, "AzureWebJobsStorage not set");

    let blank = StoreConfig {
        connection_string: Some("   ".into()),
        ..StoreConfig::default()
    };
    assert!(blank.validate().is_err(), "Blank connection string counts as unset");
}

#[test]
fn test_memory_backend_needs_nothing() {
    let config = StoreConfig {
        backend: StoreBackend::Memory,
        ..StoreConfig::default()
    };
    assert_eq!(config.validate().unwrap(), None);
}

#[test]
fn test_development_storage_uses_emulator() {
    let account = TableAccount::from_connection_string("UseDevelopmentStorage=true").unwrap();
    assert_eq!(account.account_name, "devstoreaccount1");
    assert_eq!(
        account.table_endpoint,
        "http://127.0.0.1:10002/devstoreaccount1"
    );
}

#[test]
fn test_connection_string_is_not_serialized() {
    let config = StoreConfig {
        connection_string: Some("AccountName=acme;AccountKey=c2VjcmV0".into()),
        ..StoreConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert!(!json.contains("c2VjcmV0"), "Secrets must not leak: {}", json);
}

#[test]
fn test_server_config_bind() {
    assert_eq!(ServerConfig::default().bind.port(), 7071);
    assert_eq!(
        ServerConfig::from_bind("127.0.0.1:8080").unwrap().bind.to_string(),
        "127.0.0.1:8080"
    );
    let err = ServerConfig::from_bind("not-an-address").unwrap_err();
    assert!(err.message.contains("ASSET_TRACKER_BIND"));
}
