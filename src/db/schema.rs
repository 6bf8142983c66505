use sea_orm::sea_query::{Expr, TableCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, DbErr, Schema};
use tracing::info;

use crate::db::entities::channel;

/// `CREATE TABLE IF NOT EXISTS` for `channels`, with a check keeping every
/// admin inside the member list. `users` is owned by another system and is
/// expected to exist already.
pub fn channels_table(backend: DbBackend) -> TableCreateStatement {
    let mut stmt = Schema::new(backend).create_table_from_entity(channel::Entity);
    stmt.if_not_exists()
        .check(Expr::cust(r#""admins" <@ "members""#));
    stmt
}

/// Creates the `channels` table when it is missing. An existing table is
/// left exactly as it is.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    db.execute(backend.build(&channels_table(backend))).await?;
    info!(table = "channels", "Ensured table exists.");
    Ok(())
}
