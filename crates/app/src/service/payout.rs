//! GSEED token payout via the transfer signer service.
//!
//! Transaction construction and signing live behind the signer's HTTP
//! surface; this side only submits `{to, amount}` and receives the
//! transaction hash.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Narrow interface for the on-chain token transfer collaborator.
pub(crate) trait TokenTransfer: Send + Sync {
    /// Transfer `amount` GSEED to `to`, returning the transaction hash.
    fn transfer(&self, to: &str, amount: f64) -> Result<String>;
}

#[derive(Serialize)]
struct TransferRequest<'a> {
    to: &'a str,
    amount: f64,
}

#[derive(Deserialize)]
struct TransferResponse {
    transaction_hash: String,
}

/// HTTP client for the signer service.
pub(crate) struct SignerClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    token: String,
}

impl SignerClient {
    pub(crate) fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            endpoint: format!("{}/transfer", base_url.trim_end_matches('/')),
            token: token.to_string(),
        }
    }
}

impl TokenTransfer for SignerClient {
    fn transfer(&self, to: &str, amount: f64) -> Result<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&TransferRequest { to, amount })
            .send()
            .context("transfer request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("signer returned status {status}: {body}");
        }

        let parsed: TransferResponse = response
            .json()
            .context("failed to decode signer response")?;
        if parsed.transaction_hash.is_empty() {
            bail!("signer returned an empty transaction hash");
        }
        Ok(parsed.transaction_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_request_wire_shape() {
        let json = serde_json::to_value(TransferRequest {
            to: "0xabc",
            amount: 3.0,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"to": "0xabc", "amount": 3.0}));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let client = SignerClient::new("http://signer:7000/", "secret");
        assert_eq!(client.endpoint, "http://signer:7000/transfer");
    }
}
