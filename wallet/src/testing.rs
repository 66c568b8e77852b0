//! In-process doubles for the engine's three seams: an in-memory store
//! honoring the ledger contract, a scriptable node, and a recording chat
//! adapter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ring::digest;
use slog::{o, Logger};
use tokio::sync::mpsc;

use cln_connector::{
    CreatedInvoice, InvoiceWait, NodeClient, NodeInvoice, PayOutcome, PayResult, PayStatus,
};
use core_types::{ChatAdapter, ChatError, DecodedInvoice, MessageRef, NodeInfo};
use ephemeral::MemKv;
use models::accounts::Account;
use models::transactions::{truncate_description, AccountInfo, Direction, Transaction};
use msgs::Message;
use xerror::node::NodeError;
use xerror::wallet::WalletError;

use crate::engine::WalletEngine;
use crate::settings::WalletSettings;
use crate::store::WalletStore;
use crate::tickets::TicketSupervisor;

// ---------------------------------------------------------------------------
// store

#[derive(Default, Clone)]
struct GroupCfg {
    owner: Option<i64>,
    ticket_price: i64,
    verbose: bool,
}

#[derive(Default)]
struct MemInner {
    rows: Vec<Transaction>,
    accounts: Vec<Account>,
    groups: HashMap<i64, GroupCfg>,
    next_tx: i64,
    next_account: i64,
    next_seed: i64,
}

/// Implements the same contract as the Postgres store: unique payment
/// hashes, balance gate after insert, all-or-nothing mutations.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

fn balance_of(rows: &[Transaction], account: i64) -> i64 {
    let credits: i64 = rows
        .iter()
        .filter(|r| r.payee_id == Some(account) && !r.pending)
        .map(|r| r.amount_msat)
        .sum();
    let debits: i64 = rows
        .iter()
        .filter(|r| r.payer_id == Some(account))
        .map(|r| r.amount_msat + r.fees_msat)
        .sum();
    credits - debits
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, id: i64, chat_id: Option<i64>, username: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        inner.next_account = inner.next_account.max(id);
        inner.accounts.push(Account {
            id,
            chat_id,
            username: username.map(String::from),
            notify_chat_id: chat_id,
            token_salt: "testsalt".to_string(),
            appdata: serde_json::json!({}),
            created_at: 0,
        });
    }

    /// Seeds a settled external credit so the account has spendable funds.
    pub fn seed_balance(&self, account: i64, msat: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.next_tx += 1;
        inner.next_seed += 1;
        let id = inner.next_tx;
        let seed = inner.next_seed;
        inner.rows.push(Transaction {
            id,
            created_at: 0,
            amount_msat: msat,
            payer_id: None,
            payee_id: Some(account),
            description: Some("seed".to_string()),
            payment_hash: Some(format!("seedhash{:056}", seed)),
            preimage: None,
            label: None,
            fees_msat: 0,
            pending: false,
            anonymous: false,
            trigger_message: 0,
            remote_node: None,
        });
    }

    pub fn set_group(&self, chat_id: i64, owner: Option<i64>, ticket_price_sat: i64) {
        self.inner.lock().unwrap().groups.insert(
            chat_id,
            GroupCfg {
                owner,
                ticket_price: ticket_price_sat,
                verbose: false,
            },
        );
    }

    pub fn rows(&self) -> Vec<Transaction> {
        self.inner.lock().unwrap().rows.clone()
    }

    fn push_row(
        inner: &mut MemInner,
        amount_msat: i64,
        payer_id: Option<i64>,
        payee_id: Option<i64>,
        description: Option<String>,
        payment_hash: Option<String>,
        preimage: Option<String>,
        label: Option<String>,
        pending: bool,
        anonymous: bool,
        trigger_message: i64,
        remote_node: Option<String>,
    ) -> Result<usize, WalletError> {
        if let Some(hash) = &payment_hash {
            if inner
                .rows
                .iter()
                .any(|r| r.payment_hash.as_deref() == Some(hash.as_str()))
            {
                return Err(WalletError::DuplicatePayment);
            }
        }
        inner.next_tx += 1;
        let row = Transaction {
            id: inner.next_tx,
            created_at: utils::time::time_now() as i64,
            amount_msat,
            payer_id,
            payee_id,
            description,
            payment_hash,
            preimage,
            label,
            fees_msat: 0,
            pending,
            anonymous,
            trigger_message,
            remote_node,
        };
        inner.rows.push(row);
        Ok(inner.rows.len() - 1)
    }

    fn gate(inner: &mut MemInner, payer: i64, inserted: usize) -> Result<(), WalletError> {
        let balance = balance_of(&inner.rows, payer);
        if balance < 0 {
            inner.rows.remove(inserted);
            return Err(WalletError::InsufficientBalance(-balance));
        }
        Ok(())
    }
}

impl WalletStore for MemStore {
    fn ensure_account(
        &self,
        chat_id: Option<i64>,
        username: Option<&str>,
    ) -> Result<Account, WalletError> {
        let mut inner = self.inner.lock().unwrap();
        let username = username.map(|u| u.to_lowercase());
        if let Some(acc) = inner.accounts.iter().find(|a| {
            (chat_id.is_some() && a.chat_id == chat_id)
                || (username.is_some() && a.username == username)
        }) {
            return Ok(acc.clone());
        }
        inner.next_account += 1;
        let account = Account {
            id: inner.next_account,
            chat_id,
            username,
            notify_chat_id: chat_id,
            token_salt: "testsalt".to_string(),
            appdata: serde_json::json!({}),
            created_at: 0,
        };
        inner.accounts.push(account.clone());
        Ok(account)
    }

    fn account_by_id(&self, id: i64) -> Result<Option<Account>, WalletError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .accounts
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    fn set_notify_chat(&self, account: i64, chat: i64) -> Result<(), WalletError> {
        let mut inner = self.inner.lock().unwrap();
        let acc = inner
            .accounts
            .iter_mut()
            .find(|a| a.id == account)
            .ok_or(WalletError::Database)?;
        acc.notify_chat_id = Some(chat);
        Ok(())
    }

    fn unset_notify_chat(&self, account: i64) -> Result<(), WalletError> {
        let mut inner = self.inner.lock().unwrap();
        let acc = inner
            .accounts
            .iter_mut()
            .find(|a| a.id == account)
            .ok_or(WalletError::Database)?;
        acc.notify_chat_id = None;
        Ok(())
    }

    fn rotate_credential(&self, account: i64, secret: &str) -> Result<String, WalletError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_seed += 1;
        let salt = format!("rotatedsalt{}", inner.next_seed);
        let acc = inner
            .accounts
            .iter_mut()
            .find(|a| a.id == account)
            .ok_or(WalletError::Database)?;
        acc.token_salt = salt;
        Ok(acc.credential(secret))
    }

    fn set_app_data(
        &self,
        account: i64,
        app: &str,
        value: serde_json::Value,
    ) -> Result<(), WalletError> {
        let mut inner = self.inner.lock().unwrap();
        let acc = inner
            .accounts
            .iter_mut()
            .find(|a| a.id == account)
            .ok_or(WalletError::Database)?;
        if !acc.appdata.is_object() {
            acc.appdata = serde_json::json!({});
        }
        acc.appdata[app] = value;
        Ok(())
    }

    fn get_app_data(
        &self,
        account: i64,
        app: &str,
    ) -> Result<Option<serde_json::Value>, WalletError> {
        let inner = self.inner.lock().unwrap();
        let acc = inner
            .accounts
            .iter()
            .find(|a| a.id == account)
            .ok_or(WalletError::Database)?;
        Ok(acc.appdata.get(app).cloned())
    }

    fn ticket_price(&self, chat_id: i64) -> Result<i64, WalletError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .groups
            .get(&chat_id)
            .map(|g| g.ticket_price)
            .unwrap_or(0))
    }

    fn group_owner(&self, chat_id: i64) -> Result<Option<i64>, WalletError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .groups
            .get(&chat_id)
            .and_then(|g| g.owner))
    }

    fn set_ticket_price(
        &self,
        chat_id: i64,
        price_sat: i64,
        owner: i64,
    ) -> Result<(), WalletError> {
        let mut inner = self.inner.lock().unwrap();
        let group = inner.groups.entry(chat_id).or_default();
        group.ticket_price = price_sat;
        group.owner = Some(owner);
        Ok(())
    }

    fn toggle_verbose(&self, chat_id: i64) -> Result<bool, WalletError> {
        let mut inner = self.inner.lock().unwrap();
        let group = inner.groups.entry(chat_id).or_default();
        group.verbose = !group.verbose;
        Ok(group.verbose)
    }

    fn is_verbose(&self, chat_id: i64) -> Result<bool, WalletError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .groups
            .get(&chat_id)
            .map(|g| g.verbose)
            .unwrap_or(false))
    }

    fn debit_pending_external(
        &self,
        payer: i64,
        msat: i64,
        description: &str,
        payment_hash: &str,
        label: &str,
        trigger_message: i64,
        remote_node: &str,
    ) -> Result<(), WalletError> {
        let mut inner = self.inner.lock().unwrap();
        let idx = Self::push_row(
            &mut inner,
            msat,
            Some(payer),
            None,
            Some(description.to_string()),
            Some(payment_hash.to_string()),
            None,
            Some(label.to_string()),
            true,
            false,
            trigger_message,
            Some(remote_node.to_string()),
        )?;
        Self::gate(&mut inner, payer, idx)
    }

    fn transfer_internal(
        &self,
        payer: i64,
        payee: i64,
        msat: i64,
        description: &str,
        payment_hash: &str,
        preimage: Option<&str>,
        label: &str,
        trigger_message: i64,
    ) -> Result<(), WalletError> {
        let mut inner = self.inner.lock().unwrap();
        let idx = Self::push_row(
            &mut inner,
            msat,
            Some(payer),
            Some(payee),
            Some(description.to_string()),
            Some(payment_hash.to_string()),
            preimage.map(String::from),
            Some(label.to_string()),
            true,
            false,
            trigger_message,
            None,
        )?;
        Self::gate(&mut inner, payer, idx)?;
        inner.rows[idx].pending = false;
        Ok(())
    }

    fn send_internal(
        &self,
        payer: i64,
        payee: i64,
        msat: i64,
        description: Option<&str>,
        anonymous: bool,
        trigger_message: i64,
    ) -> Result<(), WalletError> {
        let mut inner = self.inner.lock().unwrap();
        let idx = Self::push_row(
            &mut inner,
            msat,
            Some(payer),
            Some(payee),
            description.map(String::from),
            None,
            None,
            None,
            false,
            anonymous,
            trigger_message,
            None,
        )?;
        Self::gate(&mut inner, payer, idx)
    }

    fn fan_in(
        &self,
        payee: i64,
        payers: &[i64],
        msat_each: i64,
        description: Option<&str>,
    ) -> Result<(), WalletError> {
        let mut inner = self.inner.lock().unwrap();
        let mut inserted = Vec::new();
        for &payer in payers {
            if payer == payee {
                continue;
            }
            let pushed = Self::push_row(
                &mut inner,
                msat_each,
                Some(payer),
                Some(payee),
                description.map(String::from),
                None,
                None,
                None,
                false,
                false,
                0,
                None,
            );
            let result = match pushed {
                Ok(idx) => Self::gate(&mut inner, payer, idx).map(|_| idx),
                Err(err) => Err(err),
            };
            match result {
                Ok(idx) => inserted.push(idx),
                Err(err) => {
                    // all or nothing
                    for idx in inserted.into_iter().rev() {
                        inner.rows.remove(idx);
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn mark_paid(
        &self,
        payment_hash: &str,
        preimage: &str,
        fees_msat: i64,
    ) -> Result<(), WalletError> {
        let mut inner = self.inner.lock().unwrap();
        for row in inner
            .rows
            .iter_mut()
            .filter(|r| r.payment_hash.as_deref() == Some(payment_hash))
        {
            row.pending = false;
            row.preimage = Some(preimage.to_string());
            row.fees_msat = fees_msat;
        }
        Ok(())
    }

    fn cancel(&self, payment_hash: &str) -> Result<(), WalletError> {
        self.inner
            .lock()
            .unwrap()
            .rows
            .retain(|r| !(r.payment_hash.as_deref() == Some(payment_hash) && r.pending));
        Ok(())
    }

    fn credit_settled(
        &self,
        payee: i64,
        msat: i64,
        description: &str,
        payment_hash: &str,
        preimage: &str,
        label: &str,
    ) -> Result<(), WalletError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(row) = inner
            .rows
            .iter_mut()
            .find(|r| r.payment_hash.as_deref() == Some(payment_hash))
        {
            row.payee_id = Some(payee);
            return Ok(());
        }
        Self::push_row(
            &mut inner,
            msat,
            None,
            Some(payee),
            Some(description.to_string()),
            Some(payment_hash.to_string()),
            Some(preimage.to_string()),
            Some(label.to_string()),
            false,
            false,
            0,
            None,
        )?;
        Ok(())
    }

    fn balance_msat(&self, account: i64) -> Result<i64, WalletError> {
        Ok(balance_of(&self.inner.lock().unwrap().rows, account))
    }

    fn account_info(&self, account: i64) -> Result<AccountInfo, WalletError> {
        let inner = self.inner.lock().unwrap();
        let total_received_msat: i64 = inner
            .rows
            .iter()
            .filter(|r| r.payee_id == Some(account) && !r.pending)
            .map(|r| r.amount_msat)
            .sum();
        let total_sent_msat: i64 = inner
            .rows
            .iter()
            .filter(|r| r.payer_id == Some(account))
            .map(|r| r.amount_msat)
            .sum();
        let total_fees_msat: i64 = inner
            .rows
            .iter()
            .filter(|r| r.payer_id == Some(account))
            .map(|r| r.fees_msat)
            .sum();
        Ok(AccountInfo {
            balance_msat: total_received_msat - total_sent_msat - total_fees_msat,
            total_received_msat,
            total_sent_msat,
            total_fees_msat,
        })
    }

    fn find_by_hash(&self, payment_hash: &str) -> Result<Option<Transaction>, WalletError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .rows
            .iter()
            .find(|r| r.payment_hash.as_deref() == Some(payment_hash))
            .cloned())
    }

    fn find_by_hash_prefix(
        &self,
        account: i64,
        prefix: &str,
    ) -> Result<Option<Transaction>, WalletError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .rows
            .iter()
            .find(|r| {
                r.payment_hash
                    .as_deref()
                    .map_or(false, |h| h.starts_with(prefix))
                    && (r.payer_id == Some(account) || r.payee_id == Some(account))
            })
            .cloned())
    }

    fn pending_external(&self) -> Result<Vec<Transaction>, WalletError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|r| r.pending && r.payee_id.is_none() && r.remote_node.is_some())
            .cloned()
            .collect())
    }

    fn list(
        &self,
        account: i64,
        limit: i64,
        offset: i64,
        direction: Direction,
        desc_limit: usize,
    ) -> Result<Vec<Transaction>, WalletError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Transaction> = inner
            .rows
            .iter()
            .filter(|r| match direction {
                Direction::In => r.payee_id == Some(account),
                Direction::Out => r.payer_id == Some(account),
                Direction::Both => {
                    r.payee_id == Some(account) || r.payer_id == Some(account)
                }
            })
            .cloned()
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse((r.created_at, r.id)));
        let mut rows: Vec<Transaction> = rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        rows.reverse();
        for row in &mut rows {
            if let Some(desc) = &row.description {
                row.description = Some(truncate_description(desc, desc_limit));
            }
        }
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// node

pub struct MockNode {
    pub node_id: String,
    pub decodes: Mutex<HashMap<String, DecodedInvoice>>,
    pub node_invoices: Mutex<Vec<NodeInvoice>>,
    pub pay_results: Mutex<HashMap<String, PayResult>>,
    pub pay_calls: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub wait_results: Mutex<HashMap<String, InvoiceWait>>,
    pub pay_statuses: Mutex<HashMap<String, PayStatus>>,
}

impl MockNode {
    pub fn new(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            decodes: Mutex::new(HashMap::new()),
            node_invoices: Mutex::new(Vec::new()),
            pay_results: Mutex::new(HashMap::new()),
            pay_calls: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            wait_results: Mutex::new(HashMap::new()),
            pay_statuses: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a foreign (external) invoice for decoding.
    pub fn add_external_invoice(&self, bolt11: &str, payee: &str, msat: Option<i64>, hash: &str) {
        self.decodes.lock().unwrap().insert(
            bolt11.to_string(),
            DecodedInvoice {
                payee: payee.to_string(),
                msat,
                payment_hash: hash.to_string(),
                description: "test invoice".to_string(),
                created_at: 0,
                expiry: 3600,
                min_final_cltv_expiry: 9,
                description_hash: None,
                fallback_addr: None,
                route_hints: serde_json::Value::Null,
            },
        );
    }

    pub fn set_pay_result(&self, bolt11: &str, result: PayResult) {
        self.pay_results
            .lock()
            .unwrap()
            .insert(bolt11.to_string(), result);
    }

    pub fn set_wait_result(&self, label: &str, result: InvoiceWait) {
        self.wait_results
            .lock()
            .unwrap()
            .insert(label.to_string(), result);
    }

    pub fn invoice_by_label(&self, label: &str) -> Option<NodeInvoice> {
        self.node_invoices
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.label == label)
            .cloned()
    }
}

fn sha256_hex(preimage_hex: &str) -> String {
    let bytes = hex::decode(preimage_hex).unwrap_or_default();
    hex::encode(digest::digest(&digest::SHA256, &bytes).as_ref())
}

#[async_trait]
impl NodeClient for MockNode {
    async fn get_info(&self) -> Result<NodeInfo, NodeError> {
        Ok(NodeInfo {
            id: self.node_id.clone(),
            alias: "mock".to_string(),
        })
    }

    async fn invoice(
        &self,
        msat: Option<i64>,
        label: &str,
        description: &str,
        _expiry_secs: i64,
        preimage: &str,
    ) -> Result<CreatedInvoice, NodeError> {
        let payment_hash = sha256_hex(preimage);
        let bolt11 = format!("lnbcmock{}", &payment_hash[..16]);
        self.node_invoices.lock().unwrap().push(NodeInvoice {
            label: label.to_string(),
            payment_hash: payment_hash.clone(),
            status: "unpaid".to_string(),
            msat,
            description: description.to_string(),
            preimage: Some(preimage.to_string()),
        });
        // invoices we issue decode as payments to ourselves
        self.decodes.lock().unwrap().insert(
            bolt11.clone(),
            DecodedInvoice {
                payee: self.node_id.clone(),
                msat,
                payment_hash: payment_hash.clone(),
                description: description.to_string(),
                created_at: 0,
                expiry: 900,
                min_final_cltv_expiry: 9,
                description_hash: None,
                fallback_addr: None,
                route_hints: serde_json::Value::Null,
            },
        );
        Ok(CreatedInvoice {
            bolt11,
            payment_hash,
            expires_at: 0,
        })
    }

    async fn decodepay(&self, bolt11: &str) -> Result<DecodedInvoice, NodeError> {
        self.decodes
            .lock()
            .unwrap()
            .get(bolt11)
            .cloned()
            .ok_or(NodeError::Rpc {
                code: -32602,
                message: "Invalid bolt11: bad bech32 string".to_string(),
            })
    }

    async fn pay_wait(
        &self,
        bolt11: &str,
        _msat_override: Option<i64>,
        _label: &str,
    ) -> Result<PayResult, NodeError> {
        self.pay_calls.lock().unwrap().push(bolt11.to_string());
        Ok(self
            .pay_results
            .lock()
            .unwrap()
            .get(bolt11)
            .cloned()
            .unwrap_or(PayResult {
                outcome: PayOutcome::Failed,
                attempts: Vec::new(),
            }))
    }

    async fn pay_status(&self, payment_hash: &str) -> Result<PayStatus, NodeError> {
        Ok(self
            .pay_statuses
            .lock()
            .unwrap()
            .get(payment_hash)
            .cloned()
            .unwrap_or(PayStatus::Unknown))
    }

    async fn find_invoice(&self, payment_hash: &str) -> Result<Option<NodeInvoice>, NodeError> {
        Ok(self
            .node_invoices
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.payment_hash == payment_hash)
            .cloned())
    }

    async fn wait_invoice(&self, label: &str, timeout: Duration) -> Result<InvoiceWait, NodeError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(result) = self.wait_results.lock().unwrap().remove(label) {
                return Ok(result);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(NodeError::Unavailable);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn delete_invoice(&self, label: &str) -> Result<(), NodeError> {
        self.deleted.lock().unwrap().push(label.to_string());
        self.node_invoices.lock().unwrap().retain(|i| i.label != label);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// chat

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Message { chat: i64, html: String },
    Photo { chat: i64 },
    Edit { msg: MessageRef, html: String },
    Delete(MessageRef),
    Callback,
    Kick { chat: i64, user: i64, until: i64 },
}

#[derive(Default)]
pub struct RecordingChat {
    next_id: AtomicI64,
    pub events: Mutex<Vec<ChatEvent>>,
}

impl RecordingChat {
    fn next_ref(&self, chat: i64) -> MessageRef {
        MessageRef {
            chat_id: chat,
            message_id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kicks(&self) -> Vec<ChatEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, ChatEvent::Kick { .. }))
            .collect()
    }

    pub fn deletions(&self) -> Vec<MessageRef> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ChatEvent::Delete(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatAdapter for RecordingChat {
    async fn send_message(
        &self,
        chat: i64,
        html: &str,
        _reply_to: Option<i64>,
    ) -> Result<MessageRef, ChatError> {
        self.events.lock().unwrap().push(ChatEvent::Message {
            chat,
            html: html.to_string(),
        });
        Ok(self.next_ref(chat))
    }

    async fn send_photo(
        &self,
        chat: i64,
        _photo_path: &str,
        _caption: &str,
    ) -> Result<MessageRef, ChatError> {
        self.events.lock().unwrap().push(ChatEvent::Photo { chat });
        Ok(self.next_ref(chat))
    }

    async fn edit_message(&self, msg: &MessageRef, html: &str) -> Result<(), ChatError> {
        self.events.lock().unwrap().push(ChatEvent::Edit {
            msg: *msg,
            html: html.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, msg: &MessageRef) -> Result<(), ChatError> {
        self.events.lock().unwrap().push(ChatEvent::Delete(*msg));
        Ok(())
    }

    async fn answer_callback(&self, _callback_id: &str, _text: &str) -> Result<(), ChatError> {
        self.events.lock().unwrap().push(ChatEvent::Callback);
        Ok(())
    }

    async fn kick_member_until(
        &self,
        chat: i64,
        user: i64,
        until_unix: i64,
    ) -> Result<(), ChatError> {
        self.events.lock().unwrap().push(ChatEvent::Kick {
            chat,
            user,
            until: until_unix,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// wiring

pub struct TestBed {
    pub engine: WalletEngine,
    pub store: Arc<MemStore>,
    pub node: Arc<MockNode>,
    pub chat: Arc<RecordingChat>,
    pub kv: Arc<MemKv>,
    pub loopback_rx: mpsc::Receiver<Message>,
}

pub fn testbed(node_id: &str) -> TestBed {
    let store = Arc::new(MemStore::new());
    let node = Arc::new(MockNode::new(node_id));
    let chat = Arc::new(RecordingChat::default());
    let kv = Arc::new(MemKv::new());
    let settings = Arc::new(WalletSettings::test_defaults());
    let logger = Logger::root(slog::Discard, o!());
    let (loopback_tx, loopback_rx) = mpsc::channel(64);

    let tickets = TicketSupervisor::new(
        store.clone(),
        node.clone(),
        chat.clone(),
        kv.clone(),
        settings.clone(),
        logger.clone(),
    );
    let engine = WalletEngine::new(
        store.clone(),
        node.clone(),
        chat.clone(),
        kv.clone(),
        tickets,
        node_id.to_string(),
        settings,
        loopback_tx,
        logger,
    );

    TestBed {
        engine,
        store,
        node,
        chat,
        kv,
        loopback_rx,
    }
}
