use core_types::DbPool;
use models::accounts::Account;
use models::groups::GroupChat;
use models::transactions::{AccountInfo, Direction, NewTransaction, Transaction};
use xerror::wallet::WalletError;

/// The relational store behind the wallet: accounts, group configuration
/// and the double-entry ledger. Every balance-mutating method is one
/// serializable transaction with the same commit order: insert, re-read the
/// payer balance, abort with the deficit if it went negative.
pub trait WalletStore: Send + Sync {
    fn ensure_account(
        &self,
        chat_id: Option<i64>,
        username: Option<&str>,
    ) -> Result<Account, WalletError>;

    fn account_by_id(&self, id: i64) -> Result<Option<Account>, WalletError>;

    /// Repoints the account's notification channel at the given chat.
    fn set_notify_chat(&self, account: i64, chat: i64) -> Result<(), WalletError>;

    fn unset_notify_chat(&self, account: i64) -> Result<(), WalletError>;

    /// Re-salts the account and returns the new façade credential; every
    /// credential issued before stops verifying.
    fn rotate_credential(&self, account: i64, secret: &str) -> Result<String, WalletError>;

    /// Opaque per-integration state on the account blob.
    fn set_app_data(
        &self,
        account: i64,
        app: &str,
        value: serde_json::Value,
    ) -> Result<(), WalletError>;

    fn get_app_data(
        &self,
        account: i64,
        app: &str,
    ) -> Result<Option<serde_json::Value>, WalletError>;

    fn ticket_price(&self, chat_id: i64) -> Result<i64, WalletError>;

    fn group_owner(&self, chat_id: i64) -> Result<Option<i64>, WalletError>;

    /// Upserts the entry fee and records the issuing admin as chat owner.
    fn set_ticket_price(&self, chat_id: i64, price_sat: i64, owner: i64)
        -> Result<(), WalletError>;

    /// Flips the verbose flag and returns the new value.
    fn toggle_verbose(&self, chat_id: i64) -> Result<bool, WalletError>;

    fn is_verbose(&self, chat_id: i64) -> Result<bool, WalletError>;

    /// Outbound external attempt: the debit becomes visible (pending) before
    /// the node is asked to pay, so the payer cannot double-spend while the
    /// payment is in flight.
    #[allow(clippy::too_many_arguments)]
    fn debit_pending_external(
        &self,
        payer: i64,
        msat: i64,
        description: &str,
        payment_hash: &str,
        label: &str,
        trigger_message: i64,
        remote_node: &str,
    ) -> Result<(), WalletError>;

    /// Internal shortcut: both sides settle in the same commit that gates
    /// the payer balance.
    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<(), WalletError>;

    /// Plain peer transfer (send/tip); no invoice, no hash.
    fn send_internal(
        &self,
        payer: i64,
        payee: i64,
        msat: i64,
        description: Option<&str>,
        anonymous: bool,
        trigger_message: i64,
    ) -> Result<(), WalletError>;

    /// Many payers fund one payee, each gated on their own balance, all or
    /// nothing.
    fn fan_in(
        &self,
        payee: i64,
        payers: &[i64],
        msat_each: i64,
        description: Option<&str>,
    ) -> Result<(), WalletError>;

    fn mark_paid(&self, payment_hash: &str, preimage: &str, fees_msat: i64)
        -> Result<(), WalletError>;

    fn cancel(&self, payment_hash: &str) -> Result<(), WalletError>;

    /// Credit for an externally settled invoice; keyed by hash so replays
    /// and the internal-shortcut race cannot credit twice.
    fn credit_settled(
        &self,
        payee: i64,
        msat: i64,
        description: &str,
        payment_hash: &str,
        preimage: &str,
        label: &str,
    ) -> Result<(), WalletError>;

    fn balance_msat(&self, account: i64) -> Result<i64, WalletError>;

    fn account_info(&self, account: i64) -> Result<AccountInfo, WalletError>;

    fn find_by_hash(&self, payment_hash: &str) -> Result<Option<Transaction>, WalletError>;

    /// `/tx<prefix>`-style lookup, scoped to the asking account.
    fn find_by_hash_prefix(
        &self,
        account: i64,
        prefix: &str,
    ) -> Result<Option<Transaction>, WalletError>;

    fn pending_external(&self) -> Result<Vec<Transaction>, WalletError>;

    fn list(
        &self,
        account: i64,
        limit: i64,
        offset: i64,
        direction: Direction,
        desc_limit: usize,
    ) -> Result<Vec<Transaction>, WalletError>;
}

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
    ) -> Result<r2d2::PooledConnection<diesel::r2d2::ConnectionManager<diesel::PgConnection>>, WalletError>
    {
        self.pool.get().map_err(|_| WalletError::Database)
    }
}

fn gate_balance(conn: &diesel::PgConnection, payer: i64) -> Result<(), WalletError> {
    let balance = Transaction::balance_msat(conn, payer)?;
    if balance < 0 {
        return Err(WalletError::InsufficientBalance(-balance));
    }
    Ok(())
}

impl WalletStore for PgStore {
    fn ensure_account(
        &self,
        chat_id: Option<i64>,
        username: Option<&str>,
    ) -> Result<Account, WalletError> {
        Account::ensure(&*self.conn()?, chat_id, username)
    }

    fn account_by_id(&self, id: i64) -> Result<Option<Account>, WalletError> {
        use diesel::OptionalExtension;
        Ok(Account::get_by_id(&*self.conn()?, id).optional()?)
    }

    fn set_notify_chat(&self, account: i64, chat: i64) -> Result<(), WalletError> {
        let conn = self.conn()?;
        Account::get_by_id(&conn, account)?.set_notify_chat(&conn, chat)?;
        Ok(())
    }

    fn unset_notify_chat(&self, account: i64) -> Result<(), WalletError> {
        let conn = self.conn()?;
        Account::get_by_id(&conn, account)?.unset_notify_chat(&conn)?;
        Ok(())
    }

    fn rotate_credential(&self, account: i64, secret: &str) -> Result<String, WalletError> {
        let conn = self.conn()?;
        Ok(Account::get_by_id(&conn, account)?.rotate_credential(&conn, secret)?)
    }

    fn set_app_data(
        &self,
        account: i64,
        app: &str,
        value: serde_json::Value,
    ) -> Result<(), WalletError> {
        let conn = self.conn()?;
        Account::get_by_id(&conn, account)?.set_app_data(&conn, app, value)?;
        Ok(())
    }

    fn get_app_data(
        &self,
        account: i64,
        app: &str,
    ) -> Result<Option<serde_json::Value>, WalletError> {
        let conn = self.conn()?;
        Ok(Account::get_by_id(&conn, account)?.get_app_data(&conn, app)?)
    }

    fn ticket_price(&self, chat_id: i64) -> Result<i64, WalletError> {
        Ok(GroupChat::ticket_price(&*self.conn()?, chat_id)?)
    }

    fn group_owner(&self, chat_id: i64) -> Result<Option<i64>, WalletError> {
        Ok(GroupChat::owner(&*self.conn()?, chat_id)?)
    }

    fn set_ticket_price(
        &self,
        chat_id: i64,
        price_sat: i64,
        owner: i64,
    ) -> Result<(), WalletError> {
        Ok(GroupChat::set_ticket_price(&*self.conn()?, chat_id, price_sat, owner)?)
    }

    fn toggle_verbose(&self, chat_id: i64) -> Result<bool, WalletError> {
        Ok(GroupChat::toggle_verbose(&*self.conn()?, chat_id)?)
    }

    fn is_verbose(&self, chat_id: i64) -> Result<bool, WalletError> {
        Ok(GroupChat::is_verbose(&*self.conn()?, chat_id)?)
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
        let conn = self.conn()?;
        conn.build_transaction()
            .serializable()
            .run::<_, WalletError, _>(|| {
                NewTransaction {
                    amount_msat: msat,
                    payer_id: Some(payer),
                    description: Some(description.to_string()),
                    payment_hash: Some(payment_hash.to_string()),
                    label: Some(label.to_string()),
                    pending: true,
                    trigger_message,
                    remote_node: Some(remote_node.to_string()),
                    ..Default::default()
                }
                .insert(&conn)?;
                gate_balance(&conn, payer)
            })
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
        let conn = self.conn()?;
        conn.build_transaction()
            .serializable()
            .run::<_, WalletError, _>(|| {
                NewTransaction {
                    amount_msat: msat,
                    payer_id: Some(payer),
                    payee_id: Some(payee),
                    description: Some(description.to_string()),
                    payment_hash: Some(payment_hash.to_string()),
                    label: Some(label.to_string()),
                    pending: true,
                    trigger_message,
                    ..Default::default()
                }
                .insert(&conn)?;
                gate_balance(&conn, payer)?;
                Transaction::settle_internal(&conn, payment_hash, preimage)?;
                Ok(())
            })
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
        let conn = self.conn()?;
        conn.build_transaction()
            .serializable()
            .run::<_, WalletError, _>(|| {
                NewTransaction {
                    amount_msat: msat,
                    payer_id: Some(payer),
                    payee_id: Some(payee),
                    description: description.map(String::from),
                    anonymous,
                    trigger_message,
                    ..Default::default()
                }
                .insert(&conn)?;
                gate_balance(&conn, payer)
            })
    }

    fn fan_in(
        &self,
        payee: i64,
        payers: &[i64],
        msat_each: i64,
        description: Option<&str>,
    ) -> Result<(), WalletError> {
        let conn = self.conn()?;
        conn.build_transaction()
            .serializable()
            .run::<_, WalletError, _>(|| {
                for &payer in payers {
                    if payer == payee {
                        continue;
                    }
                    NewTransaction {
                        amount_msat: msat_each,
                        payer_id: Some(payer),
                        payee_id: Some(payee),
                        description: description.map(String::from),
                        ..Default::default()
                    }
                    .insert(&conn)?;
                    gate_balance(&conn, payer)?;
                }
                Ok(())
            })
    }

    fn mark_paid(
        &self,
        payment_hash: &str,
        preimage: &str,
        fees_msat: i64,
    ) -> Result<(), WalletError> {
        Transaction::mark_paid(&*self.conn()?, payment_hash, preimage, fees_msat)?;
        Ok(())
    }

    fn cancel(&self, payment_hash: &str) -> Result<(), WalletError> {
        Transaction::cancel(&*self.conn()?, payment_hash)?;
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
        let new = NewTransaction {
            amount_msat: msat,
            payee_id: Some(payee),
            description: Some(description.to_string()),
            payment_hash: Some(payment_hash.to_string()),
            preimage: Some(preimage.to_string()),
            label: Some(label.to_string()),
            ..Default::default()
        };
        Transaction::credit_settled(&*self.conn()?, payee, &new)?;
        Ok(())
    }

    fn balance_msat(&self, account: i64) -> Result<i64, WalletError> {
        Ok(Transaction::balance_msat(&*self.conn()?, account)?)
    }

    fn account_info(&self, account: i64) -> Result<AccountInfo, WalletError> {
        Ok(Transaction::account_info(&*self.conn()?, account)?)
    }

    fn find_by_hash(&self, payment_hash: &str) -> Result<Option<Transaction>, WalletError> {
        Ok(Transaction::get_by_hash(&*self.conn()?, payment_hash)?)
    }

    fn find_by_hash_prefix(
        &self,
        account: i64,
        prefix: &str,
    ) -> Result<Option<Transaction>, WalletError> {
        Ok(Transaction::get_by_hash_prefix(&*self.conn()?, account, prefix)?)
    }

    fn pending_external(&self) -> Result<Vec<Transaction>, WalletError> {
        Ok(Transaction::pending_external(&*self.conn()?)?)
    }

    fn list(
        &self,
        account: i64,
        limit: i64,
        offset: i64,
        direction: Direction,
        desc_limit: usize,
    ) -> Result<Vec<Transaction>, WalletError> {
        Ok(Transaction::list(
            &*self.conn()?,
            account,
            limit,
            offset,
            direction,
            desc_limit,
        )?)
    }
}
