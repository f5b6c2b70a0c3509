//! Deposit persistence through the Supabase PostgREST surface.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;

const DEPOSITS_TABLE: &str = "eco_transactions";

/// Row written once per deposit. No update or delete path exists.
#[derive(Debug, Serialize)]
pub(crate) struct DepositRecord {
    pub(crate) wallet_id: String,
    pub(crate) material_type: String,
    pub(crate) gseed_amount: f64,
    pub(crate) transaction_hash: String,
}

/// Narrow interface for the row-insert persistence collaborator.
pub(crate) trait DepositStore: Send + Sync {
    /// Insert the record and return the stored rows as reported by the
    /// backend.
    fn insert(&self, record: &DepositRecord) -> Result<Value>;
}

pub(crate) struct SupabaseStore {
    http: reqwest::blocking::Client,
    endpoint: String,
    service_key: String,
}

impl SupabaseStore {
    pub(crate) fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            endpoint: format!(
                "{}/rest/v1/{DEPOSITS_TABLE}",
                base_url.trim_end_matches('/')
            ),
            service_key: service_key.to_string(),
        }
    }
}

impl DepositStore for SupabaseStore {
    fn insert(&self, record: &DepositRecord) -> Result<Value> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "return=representation")
            .json(record)
            .send()
            .context("deposit insert request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("persistence backend returned status {status}: {body}");
        }

        response
            .json()
            .context("failed to decode persistence response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serialises_with_table_column_names() {
        let record = DepositRecord {
            wallet_id: "0xabc".to_string(),
            material_type: "Aluminio".to_string(),
            gseed_amount: 3.0,
            transaction_hash: "0xfeed".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "wallet_id": "0xabc",
                "material_type": "Aluminio",
                "gseed_amount": 3.0,
                "transaction_hash": "0xfeed",
            })
        );
    }

    #[test]
    fn endpoint_targets_the_deposits_table() {
        let store = SupabaseStore::new("https://proj.supabase.co/", "key");
        assert_eq!(store.endpoint, "https://proj.supabase.co/rest/v1/eco_transactions");
    }
}
