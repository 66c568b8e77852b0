//! Key families of the ephemeral store.

/// Pending-admission table: label -> serialized admission record.
pub const TICKET_PENDING: &str = "ticket-pending";

/// Paid-stream checkpoint; restart resumes past this index.
pub const LAST_INVOICE_INDEX: &str = "lastinvoiceindex";

/// bolt11 parked behind a pay-confirmation prompt.
pub fn pay_confirm(hash_prefix: &str) -> String {
    format!("payinvoice:{}", hash_prefix)
}

/// Amount override stored next to the pay-confirmation slot.
pub fn pay_confirm_msats(hash_prefix: &str) -> String {
    format!("payinvoice:{}:msats", hash_prefix)
}

/// Latest routing attempts of an outbound payment, for `/log<prefix>`.
pub fn tries(hash_prefix: &str) -> String {
    format!("tries:{}", hash_prefix)
}

pub fn hidden_message(account: i64, id: &str, sats: i64) -> String {
    format!("hidden:{}:{}:{}", account, id, sats)
}

pub fn coinflip(id: &str) -> String {
    format!("coinflip:{}", id)
}

pub fn fundraise(id: &str) -> String {
    format!("fundraise:{}", id)
}
