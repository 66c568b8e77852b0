use crate::schema::{accounts, transactions};

use diesel::prelude::*;
use rand::{distributions::Alphanumeric, Rng};
use ring::digest;
use serde::{Deserialize, Serialize};

use xerror::wallet::WalletError;

#[derive(Queryable, Identifiable, Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub chat_id: Option<i64>,
    pub username: Option<String>,
    pub notify_chat_id: Option<i64>,
    pub token_salt: String,
    pub appdata: serde_json::Value,
    pub created_at: i64,
}

#[derive(Insertable, Debug)]
#[table_name = "accounts"]
pub struct InsertableAccount {
    pub chat_id: Option<i64>,
    pub username: Option<String>,
    pub token_salt: String,
    pub appdata: serde_json::Value,
    pub created_at: i64,
}

fn new_salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

impl Account {
    pub fn get_by_id(conn: &diesel::PgConnection, id: i64) -> Result<Self, diesel::result::Error> {
        accounts::dsl::accounts.find(id).first::<Self>(conn)
    }

    pub fn get_by_chat_id(
        conn: &diesel::PgConnection,
        chat_id: i64,
    ) -> Result<Self, diesel::result::Error> {
        accounts::dsl::accounts
            .filter(accounts::chat_id.eq(chat_id))
            .first::<Self>(conn)
    }

    pub fn get_by_username(
        conn: &diesel::PgConnection,
        username: &str,
    ) -> Result<Self, diesel::result::Error> {
        accounts::dsl::accounts
            .filter(accounts::username.eq(username.to_lowercase()))
            .first::<Self>(conn)
    }

    /// Returns the account for the given identity pair, creating, updating
    /// or merging as needed. Cases by number of matching rows:
    ///
    /// 0. insert a fresh account;
    /// 1. update whichever of {chat id, username} changed;
    /// 2. one row matched by chat id and another by username: the chat-id
    ///    row survives, the other row's ledger entries are re-parented onto
    ///    it and the loser is deleted, all in one serializable transaction;
    /// 3+ never happens with the unique constraints in place.
    pub fn ensure(
        conn: &diesel::PgConnection,
        chat_id: Option<i64>,
        username: Option<&str>,
    ) -> Result<Self, WalletError> {
        let username = username
            .map(|u| u.to_lowercase())
            .filter(|u| !u.is_empty());
        if chat_id.is_none() && username.is_none() {
            return Err(WalletError::InternalConsistency);
        }

        let mut rows: Vec<Account> = Vec::new();
        if let Some(cid) = chat_id {
            rows.extend(
                accounts::dsl::accounts
                    .filter(accounts::chat_id.eq(cid))
                    .load::<Account>(conn)?,
            );
        }
        if let Some(uname) = &username {
            for acc in accounts::dsl::accounts
                .filter(accounts::username.eq(uname))
                .load::<Account>(conn)?
            {
                if !rows.iter().any(|r| r.id == acc.id) {
                    rows.push(acc);
                }
            }
        }

        match rows.len() {
            0 => {
                let new = InsertableAccount {
                    chat_id,
                    username,
                    token_salt: new_salt(),
                    appdata: serde_json::json!({}),
                    created_at: utils::time::time_now() as i64,
                };
                Ok(diesel::insert_into(accounts::table)
                    .values(&new)
                    .get_result::<Account>(conn)?)
            }
            1 => {
                let acc = rows.remove(0);
                let chat_changed = chat_id.is_some() && acc.chat_id != chat_id;
                let name_changed = username.is_some() && acc.username != username;
                if !chat_changed && !name_changed {
                    return Ok(acc);
                }
                Ok(diesel::update(accounts::dsl::accounts.find(acc.id))
                    .set((
                        accounts::chat_id.eq(chat_id.or(acc.chat_id)),
                        accounts::username.eq(username.or(acc.username)),
                    ))
                    .get_result::<Account>(conn)?)
            }
            2 => Self::merge(conn, rows, chat_id, username),
            _ => Err(WalletError::InternalConsistency),
        }
    }

    fn merge(
        conn: &diesel::PgConnection,
        rows: Vec<Account>,
        chat_id: Option<i64>,
        username: Option<String>,
    ) -> Result<Self, WalletError> {
        // The chat-id row survives; ledger totals are preserved because
        // every row naming the loser is re-parented before it goes away.
        let (survivor, loser) = split_survivor(rows, chat_id);

        conn.build_transaction()
            .serializable()
            .run::<Account, WalletError, _>(|| {
                diesel::update(
                    transactions::dsl::transactions.filter(transactions::payee_id.eq(loser.id)),
                )
                .set(transactions::payee_id.eq(survivor.id))
                .execute(conn)?;

                diesel::update(
                    transactions::dsl::transactions.filter(transactions::payer_id.eq(loser.id)),
                )
                .set(transactions::payer_id.eq(survivor.id))
                .execute(conn)?;

                diesel::delete(accounts::dsl::accounts.find(loser.id)).execute(conn)?;

                Ok(diesel::update(accounts::dsl::accounts.find(survivor.id))
                    .set((
                        accounts::chat_id.eq(chat_id.or(survivor.chat_id)),
                        accounts::username.eq(username.clone().or(survivor.username.clone())),
                    ))
                    .get_result::<Account>(conn)?)
            })
    }

    /// Display handle used in notifications.
    pub fn at_name(&self) -> String {
        match (&self.username, self.chat_id) {
            (Some(name), _) => format!("@{}", name),
            (None, Some(cid)) => format!("user:{}", cid),
            (None, None) => format!("user:{}", self.id),
        }
    }

    /// Credential for the compatibility façade; never stored, always
    /// derived from the service secret, the account id and the salt.
    pub fn credential(&self, secret: &str) -> String {
        let input = format!("{}?{}?{}", secret, self.id, self.token_salt);
        hex::encode(digest::digest(&digest::SHA256, input.as_bytes()).as_ref())
    }

    /// Replaces the salt, which invalidates every previously issued
    /// credential for this account.
    pub fn rotate_credential(
        &self,
        conn: &diesel::PgConnection,
        secret: &str,
    ) -> Result<String, diesel::result::Error> {
        let updated: Account = diesel::update(accounts::dsl::accounts.find(self.id))
            .set(accounts::token_salt.eq(new_salt()))
            .get_result(conn)?;
        Ok(updated.credential(secret))
    }

    pub fn set_notify_chat(
        &self,
        conn: &diesel::PgConnection,
        chat: i64,
    ) -> Result<usize, diesel::result::Error> {
        diesel::update(accounts::dsl::accounts.find(self.id))
            .set(accounts::notify_chat_id.eq(chat))
            .execute(conn)
    }

    pub fn unset_notify_chat(&self, conn: &diesel::PgConnection) -> Result<usize, diesel::result::Error> {
        diesel::update(accounts::dsl::accounts.find(self.id))
            .set(accounts::notify_chat_id.eq(None::<i64>))
            .execute(conn)
    }

    /// Stores one third-party integration's opaque state under its own key
    /// of the account blob.
    pub fn set_app_data(
        &self,
        conn: &diesel::PgConnection,
        app: &str,
        value: serde_json::Value,
    ) -> Result<(), diesel::result::Error> {
        conn.transaction(|| {
            let mut data: serde_json::Value = accounts::dsl::accounts
                .find(self.id)
                .select(accounts::appdata)
                .first(conn)?;
            if !data.is_object() {
                data = serde_json::json!({});
            }
            data[app] = value;
            diesel::update(accounts::dsl::accounts.find(self.id))
                .set(accounts::appdata.eq(data))
                .execute(conn)?;
            Ok(())
        })
    }

    pub fn get_app_data(
        &self,
        conn: &diesel::PgConnection,
        app: &str,
    ) -> Result<Option<serde_json::Value>, diesel::result::Error> {
        let data: serde_json::Value = accounts::dsl::accounts
            .find(self.id)
            .select(accounts::appdata)
            .first(conn)?;
        Ok(data.get(app).cloned())
    }
}

/// Of two colliding rows, the one already carrying the chat id wins.
fn split_survivor(mut rows: Vec<Account>, chat_id: Option<i64>) -> (Account, Account) {
    if chat_id.is_some() && rows[1].chat_id == chat_id {
        rows.swap(0, 1);
    }
    let loser = rows.pop().expect("two rows");
    let survivor = rows.pop().expect("two rows");
    (survivor, loser)
}
