//! Deposit flow: validate against the reward table, pay out GSEED, record
//! the transaction.

use std::time::Instant;

use actix_web::{http::header, web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use crate::service::{persist::DepositRecord, rewards, server::ServerState};

#[derive(Deserialize)]
pub(crate) struct DepositRequest {
    material: Option<String>,
    wallet: Option<String>,
}

#[derive(Serialize)]
struct DepositAccepted {
    success: bool,
    material: String,
    gseed_amount: f64,
    transaction_hash: String,
    db_result: Value,
}

#[derive(Serialize)]
struct DepositFailed {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_hash: Option<String>,
}

/// Answer the browser preflight for cross-origin deposit posts.
pub(crate) async fn deposit_preflight() -> HttpResponse {
    HttpResponse::NoContent()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
        .finish()
}

/// Handle a deposit: transfer first, persist second, no transactional
/// linkage between the two. There is no idempotency key tying a deposit to
/// a detection, so repeated calls for the same item are each paid and
/// recorded.
pub(crate) async fn deposit_handler(
    state: web::Data<ServerState>,
    body: web::Json<DepositRequest>,
) -> HttpResponse {
    let material = body.material.as_deref().map(str::trim).unwrap_or("");
    let wallet = body.wallet.as_deref().map(str::trim).unwrap_or("");

    let amount = if material.is_empty() || wallet.is_empty() {
        None
    } else {
        rewards::reward_for(material)
    };
    let Some(amount) = amount else {
        metrics::counter!("greenseed_deposits_total", "result" => "invalid").increment(1);
        return HttpResponse::BadRequest()
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
            .json(DepositFailed {
                success: false,
                error: "invalid material or wallet".to_string(),
                transaction_hash: None,
            });
    };

    let payer = state.payer.clone();
    let to = wallet.to_string();
    let transfer_start = Instant::now();
    let transfer = web::block(move || payer.transfer(&to, amount))
        .await
        .map_err(anyhow::Error::new)
        .and_then(|inner| inner);
    metrics::histogram!("greenseed_transfer_seconds")
        .record(transfer_start.elapsed().as_secs_f64());

    let tx_hash = match transfer {
        Ok(hash) => hash,
        Err(err) => {
            error!("GSEED transfer failed for {material} → {wallet}: {err:#}");
            metrics::counter!("greenseed_deposits_total", "result" => "transfer_failed")
                .increment(1);
            return HttpResponse::InternalServerError()
                .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
                .json(DepositFailed {
                    success: false,
                    error: err.to_string(),
                    transaction_hash: None,
                });
        }
    };

    let record = DepositRecord {
        wallet_id: wallet.to_string(),
        material_type: material.to_string(),
        gseed_amount: amount,
        transaction_hash: tx_hash.clone(),
    };
    let store = state.store.clone();
    let insert = web::block(move || store.insert(&record))
        .await
        .map_err(anyhow::Error::new)
        .and_then(|inner| inner);

    let db_result = match insert {
        Ok(rows) => rows,
        Err(err) => {
            // The payment is on-chain at this point; the row is simply lost.
            warn!("transfer {tx_hash} succeeded but was not recorded: {err:#}");
            metrics::counter!("greenseed_deposits_total", "result" => "persist_failed")
                .increment(1);
            return HttpResponse::InternalServerError()
                .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
                .json(DepositFailed {
                    success: false,
                    error: err.to_string(),
                    transaction_hash: Some(tx_hash),
                });
        }
    };

    metrics::counter!("greenseed_deposits_total", "result" => "accepted").increment(1);
    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .json(DepositAccepted {
            success: true,
            material: material.to_string(),
            gseed_amount: amount,
            transaction_hash: tx_hash,
            db_result,
        })
}
