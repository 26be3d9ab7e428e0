use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::jid::digits_only;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One pipeline movement in a lead's history log.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    /// ISO-8601 timestamp.
    pub data: String,
    pub acao: String,
    pub stage: String,
}

/// A CRM lead as the backing `leads` table stores it. The bridge reads a
/// filtered subset and only ever writes `stage` and `historico`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Lead {
    pub id: i64,
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub telefone: String,
    pub stage: String,
    #[serde(default)]
    pub historico: Vec<HistoryEntry>,
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Leads whose stage is NOT in `stages`.
    async fn leads_not_in(&self, stages: &[String]) -> Result<Vec<Lead>, BridgeError>;
    async fn update_stage(
        &self,
        id: i64,
        stage: &str,
        historico: &[HistoryEntry],
    ) -> Result<(), BridgeError>;
}

#[derive(Clone, Default)]
pub struct InMemoryLeadStore {
    leads: Arc<Mutex<Vec<Lead>>>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, lead: Lead) {
        self.leads.lock().await.push(lead);
    }

    pub async fn get(&self, id: i64) -> Option<Lead> {
        self.leads.lock().await.iter().find(|l| l.id == id).cloned()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn leads_not_in(&self, stages: &[String]) -> Result<Vec<Lead>, BridgeError> {
        Ok(self
            .leads
            .lock()
            .await
            .iter()
            .filter(|lead| !stages.iter().any(|s| s == &lead.stage))
            .cloned()
            .collect())
    }

    async fn update_stage(
        &self,
        id: i64,
        stage: &str,
        historico: &[HistoryEntry],
    ) -> Result<(), BridgeError> {
        let mut leads = self.leads.lock().await;
        let lead = leads
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(BridgeError::Storage)?;
        lead.stage = stage.to_string();
        lead.historico = historico.to_vec();
        Ok(())
    }
}

/// Digits-only comparison accepting a tail match in either direction, to
/// absorb differing country/area-code prefixes. Known to admit false
/// positives across leads sharing a shortened suffix.
pub fn phones_match(a: &str, b: &str) -> bool {
    let a = digits_only(a);
    let b = digits_only(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.ends_with(&b) || b.ends_with(&a)
}

/// Auto-classification on an inbound reply: find the lead whose stored
/// phone matches the sender and whose stage is still in the early set,
/// advance it to the responded stage, and append the history entry.
/// Store failures are logged and swallowed; the caller keeps going.
pub async fn advance_on_reply(
    store: &dyn LeadStore,
    config: &BridgeConfig,
    sender_phone: &str,
) -> Option<(i64, String)> {
    let digits = digits_only(sender_phone);
    if digits.is_empty() {
        return None;
    }
    let mut excluded = config.advanced_stages.clone();
    excluded.push(config.responded_stage.clone());
    let leads = match store.leads_not_in(&excluded).await {
        Ok(leads) => leads,
        Err(err) => {
            log::warn!("lead lookup failed: {}", err);
            return None;
        }
    };
    let lead = leads.into_iter().find(|lead| {
        phones_match(&lead.telefone, &digits) && config.early_stages.iter().any(|s| s == &lead.stage)
    })?;
    let mut historico = lead.historico.clone();
    historico.push(HistoryEntry {
        data: Utc::now().to_rfc3339(),
        acao: format!("Movido para {}", config.responded_stage),
        stage: config.responded_stage.clone(),
    });
    if let Err(err) = store
        .update_stage(lead.id, &config.responded_stage, &historico)
        .await
    {
        log::warn!("lead update failed for {}: {}", lead.id, err);
        return None;
    }
    log::info!("lead {} advanced to {}", lead.id, config.responded_stage);
    Some((lead.id, config.responded_stage.clone()))
}
