//! Database configuration module.
//!
//! Handles store connections and table creation using `SeaORM`. Tables are generated
//! from the entity definitions with `Schema::create_table_from_entity`, so the schema
//! always matches the Rust structs. The one constraint entities cannot express, the
//! composite unique key on conversations, is created here as an explicit index.

use crate::entities::{
    Conversation, FeedPost, Message, Notification, Order, Product, SystemState, User,
    conversation,
};
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::info;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/harvest_market.sqlite?mode=rwc";

/// Name of the unique index backing idempotent conversation creation.
pub const CONVERSATION_PAIR_INDEX: &str = "idx_conversations_pair_context";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling back to
/// a local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the store named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    info!(backend = %database_url.split(':').next().unwrap_or("unknown"), "Connecting to database");
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table_for<C, E>(db: &C, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

fn conversation_pair_index() -> IndexCreateStatement {
    Index::create()
        .name(CONVERSATION_PAIR_INDEX)
        .table(Conversation)
        .col(conversation::Column::ParticipantOneId)
        .col(conversation::Column::ParticipantTwoId)
        .col(conversation::Column::ContextKey)
        .unique()
        .if_not_exists()
        .to_owned()
}

/// Creates every table (if missing) plus the conversation uniqueness index.
///
/// Tables are created parents-first so foreign keys generated from `belongs_to`
/// relations always point at an existing table.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    create_table_for(db, User).await?;
    create_table_for(db, Product).await?;
    create_table_for(db, Order).await?;
    create_table_for(db, Conversation).await?;
    create_table_for(db, Message).await?;
    create_table_for(db, Notification).await?;
    create_table_for(db, FeedPost).await?;
    create_table_for(db, SystemState).await?;

    let builder = db.get_database_backend();
    db.execute(builder.build(&conversation_pair_index())).await?;

    Ok(())
}
