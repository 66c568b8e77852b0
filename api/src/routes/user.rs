use std::time::Duration;

use actix_web::{
    get, post,
    web::{Json, Query},
    HttpResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use core_types::{msat_to_sat, DecodedInvoice, MSATS_IN_SAT};
use models::transactions::{Direction, Transaction};
use msgs::api::*;
use msgs::{Api, Message};
use xerror::api::FacadeError;

use crate::auth::{authorize, FacadeAuth};
use crate::buffer::Buffer;
use crate::comms::Envelope;
use crate::{ApiSettings, WebDbPool, WebSender};

const PAGE_SIZE: i64 = 100;
const DESC_LIMIT: usize = 256;
/// Invoice creation alone may take the node up to 40 s.
const ENGINE_TIMEOUT: Duration = Duration::from_secs(45);

async fn send_and_wait<F>(
    sender: &WebSender,
    message: Message,
    filter: F,
) -> Result<Message, FacadeError>
where
    F: Send + Fn(&Message) -> bool + 'static,
{
    let (response_tx, mut response_rx) = mpsc::channel(1);

    sender
        .send(Envelope {
            message,
            response_tx: Some(response_tx),
            response_filter: Some(Box::new(filter)),
        })
        .await
        .map_err(|_| FacadeError::Internal)?;

    match timeout(ENGINE_TIMEOUT, response_rx.recv()).await {
        Ok(Some(Ok(message))) => Ok(message),
        _ => Err(FacadeError::Internal),
    }
}

#[derive(Deserialize)]
pub struct AddInvoiceData {
    pub amt: String,
    #[serde(default)]
    pub memo: String,
}

#[post("/addinvoice")]
pub async fn add_invoice(
    pool: WebDbPool,
    settings: actix_web::web::Data<ApiSettings>,
    sender: WebSender,
    auth: FacadeAuth,
    data: Json<AddInvoiceData>,
) -> Result<HttpResponse, FacadeError> {
    let account = authorize(&pool, &settings, &auth)?;

    let sats: i64 = data.amt.parse().map_err(|_| FacadeError::InvalidParams)?;
    if sats < 0 {
        return Err(FacadeError::InvalidParams);
    }

    let req_id = Uuid::new_v4();
    let request = InvoiceRequest {
        req_id,
        uid: account.id,
        msat: if sats == 0 { None } else { Some(sats * MSATS_IN_SAT) },
        memo: data.memo.clone(),
    };

    let response = send_and_wait(
        &sender,
        Message::Api(Api::InvoiceRequest(request)),
        move |message| {
            matches!(message, Message::Api(Api::InvoiceResponse(r)) if r.req_id == req_id)
        },
    )
    .await?;

    let invoice = match response {
        Message::Api(Api::InvoiceResponse(invoice)) => invoice,
        _ => return Err(FacadeError::Internal),
    };
    if let Some(err) = invoice.error {
        return Err(err.into());
    }

    let bolt11 = invoice.bolt11.unwrap_or_default();
    Ok(HttpResponse::Ok().json(json!({
        "pay_req": bolt11,
        "payment_request": bolt11,
        "add_index": "1000",
        "r_hash": Buffer(invoice.payment_hash.unwrap_or_default()),
    })))
}

#[derive(Deserialize)]
pub struct PayInvoiceData {
    pub invoice: String,
    pub amount: Option<i64>,
}

#[post("/payinvoice")]
pub async fn pay_invoice(
    pool: WebDbPool,
    settings: actix_web::web::Data<ApiSettings>,
    sender: WebSender,
    auth: FacadeAuth,
    data: Json<PayInvoiceData>,
) -> Result<HttpResponse, FacadeError> {
    let account = authorize(&pool, &settings, &auth)?;

    if data.invoice.len() > 1024 {
        return Err(FacadeError::InvalidParams);
    }

    let req_id = Uuid::new_v4();
    let request = PaymentRequest {
        req_id,
        uid: account.id,
        bolt11: data.invoice.clone(),
        msat_override: data.amount.filter(|a| *a > 0).map(|a| a * MSATS_IN_SAT),
    };

    let response = send_and_wait(
        &sender,
        Message::Api(Api::PaymentRequest(request)),
        move |message| {
            matches!(message, Message::Api(Api::PaymentResponse(r)) if r.req_id == req_id)
        },
    )
    .await?;

    let payment = match response {
        Message::Api(Api::PaymentResponse(payment)) => payment,
        _ => return Err(FacadeError::Internal),
    };
    if let Some(err) = payment.error {
        return Err(err.into());
    }

    let decoded = decode_via_engine(&sender, &data.invoice).await.ok();

    Ok(HttpResponse::Ok().json(json!({
        "payment_error": "",
        "payment_preimage": Buffer(payment.preimage.unwrap_or_default()),
        "route": {},
        "payment_hash": Buffer(payment.payment_hash.unwrap_or_default()),
        "decoded": decoded,
    })))
}

#[get("/balance")]
pub async fn balance(
    pool: WebDbPool,
    settings: actix_web::web::Data<ApiSettings>,
    auth: FacadeAuth,
) -> Result<HttpResponse, FacadeError> {
    let account = authorize(&pool, &settings, &auth)?;
    let conn = pool.get().map_err(|_| FacadeError::Internal)?;
    let info =
        Transaction::account_info(&conn, account.id).map_err(|_| FacadeError::Internal)?;

    Ok(HttpResponse::Ok().json(json!({
        "BTC": { "AvailableBalance": msat_to_sat(info.balance_msat) }
    })))
}

#[derive(Serialize)]
struct Payment {
    payment_preimage: String,
    r#type: &'static str,
    fee: f64,
    value: f64,
    timestamp: i64,
    memo: String,
}

#[get("/gettxs")]
pub async fn get_txs(
    pool: WebDbPool,
    settings: actix_web::web::Data<ApiSettings>,
    auth: FacadeAuth,
) -> Result<HttpResponse, FacadeError> {
    let account = authorize(&pool, &settings, &auth)?;
    let conn = pool.get().map_err(|_| FacadeError::Internal)?;
    let txns = Transaction::list(&conn, account.id, PAGE_SIZE, 0, Direction::Out, DESC_LIMIT)
        .map_err(|_| FacadeError::Internal)?;

    let payments: Vec<Payment> = txns
        .into_iter()
        .map(|txn| Payment {
            payment_preimage: txn.preimage.unwrap_or_default(),
            r#type: "paid_invoice",
            fee: txn.fees_msat as f64 / MSATS_IN_SAT as f64,
            value: txn.amount_msat as f64 / MSATS_IN_SAT as f64,
            timestamp: txn.created_at / 1000,
            memo: txn.description.unwrap_or_default(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(payments))
}

#[derive(Serialize)]
struct Inv {
    r_hash: Buffer,
    payment_request: String,
    pay_req: String,
    add_index: String,
    description: String,
    payment_hash: String,
    ispaid: bool,
    amt: f64,
    expire_time: i64,
    timestamp: i64,
    r#type: &'static str,
}

#[get("/getuserinvoices")]
pub async fn get_user_invoices(
    pool: WebDbPool,
    settings: actix_web::web::Data<ApiSettings>,
    auth: FacadeAuth,
) -> Result<HttpResponse, FacadeError> {
    let account = authorize(&pool, &settings, &auth)?;
    let conn = pool.get().map_err(|_| FacadeError::Internal)?;
    let txns = Transaction::list(&conn, account.id, PAGE_SIZE, 0, Direction::In, DESC_LIMIT)
        .map_err(|_| FacadeError::Internal)?;

    let invoices: Vec<Inv> = txns
        .into_iter()
        .map(|txn| {
            let hash = txn.payment_hash.unwrap_or_default();
            Inv {
                r_hash: Buffer(hash.clone()),
                payment_request: String::new(),
                pay_req: String::new(),
                add_index: "1000".to_string(),
                description: txn.description.unwrap_or_default(),
                payment_hash: hash,
                ispaid: !txn.pending,
                amt: txn.amount_msat as f64 / MSATS_IN_SAT as f64,
                expire_time: 24 * 3600,
                timestamp: txn.created_at / 1000,
                r#type: "user_invoice",
            }
        })
        .collect();

    Ok(HttpResponse::Ok().json(invoices))
}

/// Single-transaction lookup by hash prefix, scoped to the caller.
#[get("/gettx/{prefix}")]
pub async fn get_tx(
    pool: WebDbPool,
    settings: actix_web::web::Data<ApiSettings>,
    sender: WebSender,
    auth: FacadeAuth,
    path: actix_web::web::Path<String>,
) -> Result<HttpResponse, FacadeError> {
    let account = authorize(&pool, &settings, &auth)?;

    let prefix = path.into_inner();
    if prefix.is_empty() || prefix.len() > 64 || !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(FacadeError::InvalidParams);
    }

    let req_id = Uuid::new_v4();
    let request = TransactionRequest {
        req_id,
        uid: account.id,
        hash_prefix: prefix,
    };

    let response = send_and_wait(
        &sender,
        Message::Api(Api::TransactionRequest(request)),
        move |message| {
            matches!(message, Message::Api(Api::TransactionResponse(r)) if r.req_id == req_id)
        },
    )
    .await?;

    let lookup = match response {
        Message::Api(Api::TransactionResponse(lookup)) => lookup,
        _ => return Err(FacadeError::Internal),
    };
    if let Some(err) = lookup.error {
        return Err(err.into());
    }

    Ok(HttpResponse::Ok().json(lookup.transaction))
}

/// The decoded shape the mobile wallet knows, all-strings as upstream.
#[derive(Serialize)]
pub struct Decoded {
    pub destination: String,
    pub payment_hash: String,
    pub num_satoshis: String,
    pub timestamp: String,
    pub expiry: String,
    pub description: String,
    pub description_hash: String,
    pub fallback_addr: String,
    pub cltv_expiry: String,
    pub route_hints: serde_json::Value,
}

impl From<DecodedInvoice> for Decoded {
    fn from(d: DecodedInvoice) -> Self {
        Decoded {
            destination: d.payee,
            payment_hash: d.payment_hash,
            num_satoshis: msat_to_sat(d.msat.unwrap_or(0)).to_string(),
            timestamp: d.created_at.to_string(),
            expiry: d.expiry.to_string(),
            description: d.description,
            description_hash: d.description_hash.unwrap_or_default(),
            fallback_addr: d.fallback_addr.unwrap_or_default(),
            cltv_expiry: d.min_final_cltv_expiry.to_string(),
            route_hints: d.route_hints,
        }
    }
}

async fn decode_via_engine(sender: &WebSender, bolt11: &str) -> Result<Decoded, FacadeError> {
    let req_id = Uuid::new_v4();
    let request = DecodeRequest {
        req_id,
        bolt11: bolt11.to_string(),
    };

    let response = send_and_wait(
        &sender,
        Message::Api(Api::DecodeRequest(request)),
        move |message| {
            matches!(message, Message::Api(Api::DecodeResponse(r)) if r.req_id == req_id)
        },
    )
    .await?;

    match response {
        Message::Api(Api::DecodeResponse(DecodeResponse {
            decoded: Some(decoded),
            ..
        })) => Ok(decoded.into()),
        _ => Err(FacadeError::Internal),
    }
}

#[derive(Deserialize)]
pub struct DecodeQuery {
    pub invoice: String,
}

#[get("/decodeinvoice")]
pub async fn decode_invoice(
    sender: WebSender,
    query: Query<DecodeQuery>,
) -> Result<HttpResponse, FacadeError> {
    let decoded = decode_via_engine(&sender, &query.invoice).await?;
    Ok(HttpResponse::Ok().json(decoded))
}

#[get("/getpending")]
pub async fn get_pending() -> Result<HttpResponse, FacadeError> {
    Ok(HttpResponse::Ok().json(json!([])))
}
