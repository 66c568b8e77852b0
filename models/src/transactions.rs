use crate::schema::transactions;

use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use serde::{Deserialize, Serialize};

/// One signed ledger entry. Direction is encoded by which side is set:
/// internal rows carry both, external-out rows carry only the payer plus
/// the remote node, external-in rows carry only the payee.
#[derive(Queryable, Identifiable, Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub created_at: i64,
    pub amount_msat: i64,
    pub payer_id: Option<i64>,
    pub payee_id: Option<i64>,
    pub description: Option<String>,
    pub payment_hash: Option<String>,
    pub preimage: Option<String>,
    pub label: Option<String>,
    pub fees_msat: i64,
    pub pending: bool,
    pub anonymous: bool,
    pub trigger_message: i64,
    pub remote_node: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[table_name = "transactions"]
pub struct NewTransaction {
    pub created_at: i64,
    pub amount_msat: i64,
    pub payer_id: Option<i64>,
    pub payee_id: Option<i64>,
    pub description: Option<String>,
    pub payment_hash: Option<String>,
    pub preimage: Option<String>,
    pub label: Option<String>,
    pub fees_msat: i64,
    pub pending: bool,
    pub anonymous: bool,
    pub trigger_message: i64,
    pub remote_node: Option<String>,
}

impl Default for NewTransaction {
    fn default() -> Self {
        Self {
            created_at: utils::time::time_now() as i64,
            amount_msat: 0,
            payer_id: None,
            payee_id: None,
            description: None,
            payment_hash: None,
            preimage: None,
            label: None,
            fees_msat: 0,
            pending: false,
            anonymous: false,
            trigger_message: 0,
            remote_node: None,
        }
    }
}

impl NewTransaction {
    pub fn insert(&self, conn: &diesel::PgConnection) -> Result<i64, diesel::result::Error> {
        diesel::insert_into(transactions::table)
            .values(self)
            .returning(transactions::id)
            .get_result(conn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    In,
    Out,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub balance_msat: i64,
    pub total_received_msat: i64,
    pub total_sent_msat: i64,
    pub total_fees_msat: i64,
}

impl Transaction {
    pub fn get_by_hash(
        conn: &diesel::PgConnection,
        hash: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        transactions::dsl::transactions
            .filter(transactions::payment_hash.eq(hash))
            .first::<Self>(conn)
            .optional()
    }

    /// Lookup by hash prefix, scoped to one account (`/tx<prefix>`).
    pub fn get_by_hash_prefix(
        conn: &diesel::PgConnection,
        account: i64,
        prefix: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        transactions::dsl::transactions
            .filter(transactions::payment_hash.like(format!("{}%", prefix)))
            .filter(
                transactions::payer_id
                    .eq(account)
                    .or(transactions::payee_id.eq(account)),
            )
            .order(transactions::created_at.asc())
            .first::<Self>(conn)
            .optional()
    }

    /// Pending-outbound rows debit the payer but do not yet count as income
    /// anywhere, so the payer's spendable balance drops the moment an
    /// outbound attempt is inserted and recovers only if it is cancelled.
    pub fn balance_msat(
        conn: &diesel::PgConnection,
        account: i64,
    ) -> Result<i64, diesel::result::Error> {
        let credits: i64 = transactions::dsl::transactions
            .filter(
                transactions::payee_id
                    .eq(account)
                    .and(transactions::pending.eq(false)),
            )
            .select(sql::<BigInt>("coalesce(sum(amount_msat), 0)::bigint"))
            .first(conn)?;

        let debits: i64 = transactions::dsl::transactions
            .filter(transactions::payer_id.eq(account))
            .select(sql::<BigInt>(
                "coalesce(sum(amount_msat + fees_msat), 0)::bigint",
            ))
            .first(conn)?;

        Ok(credits - debits)
    }

    pub fn account_info(
        conn: &diesel::PgConnection,
        account: i64,
    ) -> Result<AccountInfo, diesel::result::Error> {
        let total_received_msat: i64 = transactions::dsl::transactions
            .filter(
                transactions::payee_id
                    .eq(account)
                    .and(transactions::pending.eq(false)),
            )
            .select(sql::<BigInt>("coalesce(sum(amount_msat), 0)::bigint"))
            .first(conn)?;

        let total_sent_msat: i64 = transactions::dsl::transactions
            .filter(transactions::payer_id.eq(account))
            .select(sql::<BigInt>("coalesce(sum(amount_msat), 0)::bigint"))
            .first(conn)?;

        let total_fees_msat: i64 = transactions::dsl::transactions
            .filter(transactions::payer_id.eq(account))
            .select(sql::<BigInt>("coalesce(sum(fees_msat), 0)::bigint"))
            .first(conn)?;

        Ok(AccountInfo {
            balance_msat: total_received_msat - total_sent_msat - total_fees_msat,
            total_received_msat,
            total_sent_msat,
            total_fees_msat,
        })
    }

    /// Newest first for the page window, then re-sorted oldest first for
    /// display; descriptions cut at `desc_limit` characters with an
    /// ellipsis.
    pub fn list(
        conn: &diesel::PgConnection,
        account: i64,
        limit: i64,
        offset: i64,
        direction: Direction,
        desc_limit: usize,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        let mut query = transactions::dsl::transactions.into_boxed();
        query = match direction {
            Direction::In => query.filter(transactions::payee_id.eq(account)),
            Direction::Out => query.filter(transactions::payer_id.eq(account)),
            Direction::Both => query.filter(
                transactions::payee_id
                    .eq(account)
                    .or(transactions::payer_id.eq(account)),
            ),
        };

        let mut rows: Vec<Self> = query
            .order(transactions::created_at.desc())
            .limit(limit)
            .offset(offset)
            .load(conn)?;
        rows.reverse();

        for row in &mut rows {
            if let Some(desc) = &row.description {
                row.description = Some(truncate_description(desc, desc_limit));
            }
        }
        Ok(rows)
    }

    /// Clears `pending`, stores the settlement proof and fees. Idempotent:
    /// repeating the update writes the same values again.
    pub fn mark_paid(
        conn: &diesel::PgConnection,
        hash: &str,
        preimage: &str,
        fees_msat: i64,
    ) -> Result<usize, diesel::result::Error> {
        diesel::update(
            transactions::dsl::transactions.filter(transactions::payment_hash.eq(hash)),
        )
        .set((
            transactions::pending.eq(false),
            transactions::preimage.eq(preimage),
            transactions::fees_msat.eq(fees_msat),
        ))
        .execute(conn)
    }

    /// Settles an internal row inside the same transaction that inserted
    /// it; the preimage is stored only when the node still had it.
    pub fn settle_internal(
        conn: &diesel::PgConnection,
        hash: &str,
        preimage: Option<&str>,
    ) -> Result<usize, diesel::result::Error> {
        diesel::update(
            transactions::dsl::transactions.filter(transactions::payment_hash.eq(hash)),
        )
        .set((
            transactions::pending.eq(false),
            transactions::preimage.eq(preimage),
        ))
        .execute(conn)
    }

    /// Removes a pending row after a terminal routing failure. Idempotent:
    /// a second call matches nothing.
    pub fn cancel(conn: &diesel::PgConnection, hash: &str) -> Result<usize, diesel::result::Error> {
        diesel::delete(
            transactions::dsl::transactions
                .filter(transactions::payment_hash.eq(hash))
                .filter(transactions::pending.eq(true)),
        )
        .execute(conn)
    }

    /// Credit row for an externally settled invoice. Keyed by hash: if the
    /// internal shortcut already recorded this payment, the duplicate
    /// settlement event only re-points the payee and cannot credit twice.
    pub fn credit_settled(
        conn: &diesel::PgConnection,
        payee: i64,
        new: &NewTransaction,
    ) -> Result<usize, diesel::result::Error> {
        diesel::insert_into(transactions::table)
            .values(new)
            .on_conflict(transactions::payment_hash)
            .do_update()
            .set(transactions::payee_id.eq(payee))
            .execute(conn)
    }

    /// Outbound rows whose resolution may have been lost to a crash.
    pub fn pending_external(
        conn: &diesel::PgConnection,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        transactions::dsl::transactions
            .filter(transactions::pending.eq(true))
            .filter(transactions::payee_id.is_null())
            .filter(transactions::remote_node.is_not_null())
            .load(conn)
    }
}

pub fn truncate_description(desc: &str, limit: usize) -> String {
    if desc.chars().count() <= limit {
        return desc.to_string();
    }
    let mut out: String = desc.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_appends_ellipsis() {
        assert_eq!(truncate_description("short", 16), "short");
        assert_eq!(truncate_description("exactly sixteen!", 16), "exactly sixteen!");
        assert_eq!(
            truncate_description("a very long description indeed", 16),
            "a very long des…"
        );
        assert_eq!(truncate_description("a very long description indeed", 16).chars().count(), 16);
    }

    #[test]
    fn truncation_respects_multibyte_chars() {
        let desc = "émojis and ünïcode everywhere";
        let cut = truncate_description(desc, 12);
        assert_eq!(cut.chars().count(), 12);
        assert!(cut.ends_with('…'));
    }
}
