use crate::schema::groups;

use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::Bool;
use serde::{Deserialize, Serialize};

/// Per-group chat configuration. Group chat ids are negative on the chat
/// platform; they are stored as-is.
#[derive(Queryable, Insertable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[primary_key(chat_id)]
#[table_name = "groups"]
pub struct GroupChat {
    pub chat_id: i64,
    pub owner_id: Option<i64>,
    pub verbose: bool,
    pub ticket_price: i64,
}

impl GroupChat {
    pub fn get(
        conn: &diesel::PgConnection,
        chat_id: i64,
    ) -> Result<Option<Self>, diesel::result::Error> {
        groups::dsl::groups.find(chat_id).first::<Self>(conn).optional()
    }

    /// Entry fee in satoshis; unknown groups are free to join.
    pub fn ticket_price(
        conn: &diesel::PgConnection,
        chat_id: i64,
    ) -> Result<i64, diesel::result::Error> {
        Ok(Self::get(conn, chat_id)?.map(|g| g.ticket_price).unwrap_or(0))
    }

    /// Sets the fee and records the admin who set it as the chat owner;
    /// ticket invoices are issued on the owner's account.
    pub fn set_ticket_price(
        conn: &diesel::PgConnection,
        chat_id: i64,
        price_sat: i64,
        owner: i64,
    ) -> Result<(), diesel::result::Error> {
        let row = GroupChat {
            chat_id,
            owner_id: Some(owner),
            verbose: false,
            ticket_price: price_sat,
        };
        diesel::insert_into(groups::table)
            .values(&row)
            .on_conflict(groups::chat_id)
            .do_update()
            .set((
                groups::ticket_price.eq(price_sat),
                groups::owner_id.eq(owner),
            ))
            .execute(conn)?;
        Ok(())
    }

    pub fn owner(
        conn: &diesel::PgConnection,
        chat_id: i64,
    ) -> Result<Option<i64>, diesel::result::Error> {
        Ok(Self::get(conn, chat_id)?.and_then(|g| g.owner_id))
    }

    /// Flips the verbose flag, creating the row on first use, and returns
    /// the new value.
    pub fn toggle_verbose(
        conn: &diesel::PgConnection,
        chat_id: i64,
    ) -> Result<bool, diesel::result::Error> {
        let row = GroupChat {
            chat_id,
            owner_id: None,
            verbose: true,
            ticket_price: 0,
        };
        let updated: GroupChat = diesel::insert_into(groups::table)
            .values(&row)
            .on_conflict(groups::chat_id)
            .do_update()
            .set(groups::verbose.eq(sql::<Bool>("NOT groups.verbose")))
            .get_result(conn)?;
        Ok(updated.verbose)
    }

    pub fn is_verbose(
        conn: &diesel::PgConnection,
        chat_id: i64,
    ) -> Result<bool, diesel::result::Error> {
        Ok(Self::get(conn, chat_id)?.map(|g| g.verbose).unwrap_or(false))
    }
}
