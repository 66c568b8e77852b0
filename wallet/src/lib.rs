pub mod chat_log;
pub mod engine;
pub mod invoices;
pub mod payments;
pub mod qr;
pub mod settings;
pub mod settlement;
pub mod store;
pub mod tickets;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;
use std::time::Duration;

use diesel::{r2d2::ConnectionManager, PgConnection};
use tokio::sync::{broadcast, mpsc};

use cln_connector::{ClnConnector, ClnConnectorSettings, NodeClient};
use core_types::ChatAdapter;
use ephemeral::{keys, KvStore, RedisKv};
use msgs::Message;
use utils::xlogging::init_log;

use crate::engine::WalletEngine;
use crate::settings::WalletSettings;
use crate::store::{PgStore, WalletStore};
use crate::tickets::TicketSupervisor;

pub async fn start(
    settings: WalletSettings,
    cln_settings: ClnConnectorSettings,
    chat: Arc<dyn ChatAdapter>,
    msg_tx: mpsc::Sender<Message>,
    mut msg_rx: mpsc::Receiver<Message>,
    resp_tx: broadcast::Sender<Message>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = settings;
    settings.logging_settings.name = String::from("Wallet");
    let logger = init_log(&settings.logging_settings);

    let pool = r2d2::Pool::builder()
        .build(ConnectionManager::<PgConnection>::new(settings.psql_url.clone()))
        .expect("Failed to create pool.");
    {
        let conn = pool.get()?;
        models::init(&conn)?;
    }
    let store: Arc<dyn WalletStore> = Arc::new(PgStore::new(pool));

    let connector = ClnConnector::new(cln_settings);
    let node_info = loop {
        match connector.get_info().await {
            Ok(info) => break info,
            Err(err) => {
                slog::warn!(logger, "can't talk to lightningd, retrying: {}", err);
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    };
    slog::info!(
        logger, "lightning node connected";
        "id" => &node_info.id, "alias" => &node_info.alias
    );

    let kv: Arc<dyn KvStore> = Arc::new(RedisKv::connect(&settings.redis_url).await?);
    let settings = Arc::new(settings);

    let tickets = TicketSupervisor::new(
        store.clone(),
        Arc::new(connector.clone()),
        chat.clone(),
        kv.clone(),
        settings.clone(),
        logger.clone(),
    );
    tickets.restore().await;

    let engine = WalletEngine::new(
        store,
        Arc::new(connector.clone()),
        chat,
        kv.clone(),
        tickets,
        node_info.id,
        settings,
        msg_tx.clone(),
        logger.clone(),
    );

    engine.reconcile_pending().await;

    // a persisted checkpoint is authoritative, however small; only a
    // wallet without one trusts the node's view of what was consumed
    let last_index: i64 = match kv.get(keys::LAST_INVOICE_INDEX).await? {
        Some(value) => value.parse().unwrap_or(0),
        None => connector.max_pay_index().await.unwrap_or(0),
    };
    {
        let connector = connector.clone();
        let stream_tx = msg_tx;
        let stream_logger = logger.clone();
        tokio::spawn(async move {
            connector
                .sub_paid_invoices(last_index, stream_tx, stream_logger)
                .await;
        });
    }

    let mut listener = |msg: Message| {
        // no façade waiter alive is fine
        let _ = resp_tx.send(msg);
    };

    while let Some(msg) = msg_rx.recv().await {
        engine.process_msg(msg, &mut listener).await;
    }
    Ok(())
}
