use crate::config::SupabaseConfig;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use zapline_core::auth::CredentialStore;
use zapline_core::error::BridgeError;
use zapline_core::leads::{HistoryEntry, Lead, LeadStore};

/// Shared PostgREST client; the two stores wrap it with their tables.
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
}

impl SupabaseClient {
    pub fn new(cfg: &SupabaseConfig) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|_| BridgeError::Storage)?;
        Ok(Self {
            http,
            base_url: cfg.url.trim_end_matches('/').to_string(),
            key: cfg.key.clone(),
        })
    }

    fn request(&self, method: Method, table: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        self.http
            .request(method, url)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }
}

/// Session credentials in a `<table>(id text primary key, data text)` row
/// per key, values base64-encoded so binary material survives the JSON
/// transport byte-for-byte.
pub struct SupabaseCredentialStore {
    client: Arc<SupabaseClient>,
    table: String,
}

impl SupabaseCredentialStore {
    pub fn new(client: Arc<SupabaseClient>, table: String) -> Self {
        Self { client, table }
    }
}

#[derive(Deserialize)]
struct SessionRow {
    data: String,
}

#[async_trait]
impl CredentialStore for SupabaseCredentialStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, BridgeError> {
        let id_filter = format!("eq.{}", key);
        let response = self
            .client
            .request(Method::GET, &self.table)
            .query(&[("select", "data"), ("id", id_filter.as_str())])
            .send()
            .await
            .map_err(|err| {
                log::warn!("session read failed: {}", err);
                BridgeError::Storage
            })?;
        if !response.status().is_success() {
            log::warn!("session read status {}", response.status());
            return Err(BridgeError::Storage);
        }
        let rows: Vec<SessionRow> = response.json().await.map_err(|_| BridgeError::Codec)?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let bytes = STANDARD
            .decode(row.data.as_bytes())
            .map_err(|_| BridgeError::Codec)?;
        Ok(Some(bytes))
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), BridgeError> {
        let body = serde_json::json!([{ "id": key, "data": STANDARD.encode(value) }]);
        let response = self
            .client
            .request(Method::POST, &self.table)
            .header("Prefer", "resolution=merge-duplicates")
            .json(&body)
            .send()
            .await
            .map_err(|_| BridgeError::Storage)?;
        if !response.status().is_success() {
            log::warn!("session write status {}", response.status());
            return Err(BridgeError::Storage);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BridgeError> {
        let id_filter = format!("eq.{}", key);
        let response = self
            .client
            .request(Method::DELETE, &self.table)
            .query(&[("id", id_filter.as_str())])
            .send()
            .await
            .map_err(|_| BridgeError::Storage)?;
        if !response.status().is_success() {
            return Err(BridgeError::Storage);
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), BridgeError> {
        let response = self
            .client
            .request(Method::DELETE, &self.table)
            .query(&[("id", "not.is.null")])
            .send()
            .await
            .map_err(|_| BridgeError::Storage)?;
        if !response.status().is_success() {
            return Err(BridgeError::Storage);
        }
        Ok(())
    }
}

/// Read-mostly view of the CRM `leads` table; only `stage` and
/// `historico` are ever written back.
pub struct SupabaseLeadStore {
    client: Arc<SupabaseClient>,
    table: String,
}

impl SupabaseLeadStore {
    pub fn new(client: Arc<SupabaseClient>, table: String) -> Self {
        Self { client, table }
    }
}

#[async_trait]
impl LeadStore for SupabaseLeadStore {
    async fn leads_not_in(&self, stages: &[String]) -> Result<Vec<Lead>, BridgeError> {
        let stage_filter = format!("not.in.({})", stages.join(","));
        let response = self
            .client
            .request(Method::GET, &self.table)
            .query(&[
                ("select", "id,nome,telefone,stage,historico"),
                ("stage", stage_filter.as_str()),
            ])
            .send()
            .await
            .map_err(|err| {
                log::warn!("lead query failed: {}", err);
                BridgeError::Storage
            })?;
        if !response.status().is_success() {
            log::warn!("lead query status {}", response.status());
            return Err(BridgeError::Storage);
        }
        response.json().await.map_err(|_| BridgeError::Codec)
    }

    async fn update_stage(
        &self,
        id: i64,
        stage: &str,
        historico: &[HistoryEntry],
    ) -> Result<(), BridgeError> {
        let id_filter = format!("eq.{}", id);
        let body = serde_json::json!({ "stage": stage, "historico": historico });
        let response = self
            .client
            .request(Method::PATCH, &self.table)
            .query(&[("id", id_filter.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|_| BridgeError::Storage)?;
        if !response.status().is_success() {
            return Err(BridgeError::Storage);
        }
        Ok(())
    }
}
