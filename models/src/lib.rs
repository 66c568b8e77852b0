#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;

pub mod accounts;
pub mod groups;
mod schema;
pub mod transactions;

embed_migrations!("./migrations");

/// Must be called once at startup; runs pending migrations.
pub fn init(conn: &diesel::PgConnection) -> Result<(), diesel_migrations::RunMigrationsError> {
    embedded_migrations::run(conn)
}
