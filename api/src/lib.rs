use actix_cors::Cors;
use actix_web::web::Data;
use actix_web::{web, App, HttpServer};
use diesel::{r2d2::ConnectionManager, PgConnection};
use serde::{Deserialize, Serialize};

use tokio::sync::{broadcast, mpsc};

use core_types::DbPool;
use msgs::Message;

pub mod auth;
pub mod buffer;
pub mod comms;
pub mod routes;

use comms::*;

#[derive(Serialize, Deserialize, Clone)]
pub struct ApiSettings {
    pub psql_url: String,
    /// Secret the account credentials are derived from (the bot token).
    pub service_secret: String,
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

pub type WebDbPool = web::Data<DbPool>;
pub type WebSender = web::Data<mpsc::Sender<Envelope>>;

pub async fn start(
    settings: ApiSettings,
    engine_tx: mpsc::Sender<Message>,
    engine_responses: broadcast::Sender<Message>,
) -> std::io::Result<()> {
    let pool: DbPool = r2d2::Pool::builder()
        .build(ConnectionManager::<PgConnection>::new(settings.psql_url.clone()))
        .expect("Failed to create pool.");

    {
        let conn = pool.get().expect("Failed to get DB connection to initialize models");
        models::init(&conn).expect("Failed to initialize models");
    }

    let (tx, rx) = mpsc::channel(1024);

    tokio::task::spawn(CommsActor::start(
        rx,
        engine_responses.subscribe(),
        engine_tx,
    ));

    let bind = (settings.listen_address.clone(), settings.port);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(tx.clone()))
            .app_data(Data::new(settings.clone()))
            .service(routes::auth::getinfo)
            .service(routes::auth::auth)
            .service(routes::user::add_invoice)
            .service(routes::user::pay_invoice)
            .service(routes::user::balance)
            .service(routes::user::get_txs)
            .service(routes::user::get_tx)
            .service(routes::user::get_user_invoices)
            .service(routes::user::decode_invoice)
            .service(routes::user::get_pending)
    })
    .bind(bind)?
    .run()
    .await
}
