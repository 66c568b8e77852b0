use std::path::PathBuf;

use rand::RngCore;
use slog::Logger;

use cln_connector::NodeClient;
use core_types::InvoiceLabel;
use xerror::wallet::WalletError;

use crate::qr;
use crate::settings::WalletSettings;

/// What the caller wants invoiced. Only the amount and description are
/// mandatory; everything else is derived.
pub struct NewInvoice<'a> {
    pub account: i64,
    /// `None` produces an any-amount invoice; settlement credits whatever
    /// arrives.
    pub msat: Option<i64>,
    pub description: &'a str,
    pub label: Option<String>,
    pub expiry_secs: Option<i64>,
    pub preimage: Option<String>,
    pub trigger_message: i64,
}

pub struct IssuedInvoice {
    pub bolt11: String,
    pub payment_hash: String,
    pub label: String,
    pub preimage: String,
    pub qr_path: Option<PathBuf>,
}

/// Creates an invoice on the node. Writes nothing to the ledger: a credit
/// row appears only at settlement time, driven by the paid stream.
pub async fn create_invoice(
    node: &dyn NodeClient,
    settings: &WalletSettings,
    logger: &Logger,
    request: NewInvoice<'_>,
) -> Result<IssuedInvoice, WalletError> {
    slog::debug!(
        logger, "generating invoice";
        "account" => request.account, "msat" => ?request.msat, "desc" => request.description
    );

    let preimage = request.preimage.unwrap_or_else(random_preimage);
    let label = request.label.unwrap_or_else(|| {
        InvoiceLabel::wallet(request.account, request.trigger_message, &preimage).to_string()
    });
    let expiry = request.expiry_secs.unwrap_or(settings.invoice_timeout_secs);

    let created = node
        .invoice(request.msat, &label, request.description, expiry, &preimage)
        .await
        .map_err(WalletError::from)?;

    let qr_path = match qr::write_qr(&created.bolt11, &label, &settings.qr_dir) {
        Ok(path) => Some(path),
        Err(err) => {
            slog::warn!(logger, "failed to generate qr: {}", err; "invoice" => &created.bolt11);
            None
        }
    };

    Ok(IssuedInvoice {
        bolt11: created.bolt11,
        payment_hash: created.payment_hash,
        label,
        preimage,
        qr_path,
    })
}

fn random_preimage() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
