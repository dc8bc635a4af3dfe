//! Store capabilities the engine relies on beyond plain CRUD.
//!
//! Two things differ per backend: how a transaction asks for READ COMMITTED
//! isolation, and which errors mean "lost a lock race, try again". Both are
//! answered here so the engine and the retry wrapper stay backend-agnostic.

use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction, DbErr,
    IsolationLevel, RuntimeErr, TransactionTrait,
};

/// Opens a transaction for an operation that takes row locks.
///
/// Postgres and MySQL run it at READ COMMITTED. `SQLite` has no isolation levels to
/// choose from (writers are serialized database-wide), so the default is used there.
pub async fn begin_locked(db: &DatabaseConnection) -> Result<DatabaseTransaction> {
    let isolation = match db.get_database_backend() {
        DatabaseBackend::Sqlite => None,
        _ => Some(IsolationLevel::ReadCommitted),
    };
    Ok(db.begin_with_config(isolation, None).await?)
}

/// Decides whether a store error is a transient lock failure worth retrying.
pub trait TransientClassifier: Send + Sync {
    /// `true` for deadlocks, lock-wait timeouts and serialization failures.
    fn is_transient(&self, err: &DbErr) -> bool;
}

/// Error code reported by the driver for a database-side failure, if any.
fn driver_code(err: &DbErr) -> Option<String> {
    let runtime = match err {
        DbErr::Conn(e) | DbErr::Exec(e) | DbErr::Query(e) => e,
        _ => return None,
    };
    match runtime {
        RuntimeErr::SqlxError(sea_orm::sqlx::Error::Database(db_err)) => {
            db_err.code().map(|code| code.into_owned())
        }
        _ => None,
    }
}

/// Pool exhaustion behaves like a lock wait: the resource frees up on its own.
fn is_acquire_timeout(err: &DbErr) -> bool {
    matches!(err, DbErr::ConnectionAcquire(_))
}

/// Postgres: deadlock_detected, serialization_failure, lock_not_available.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresClassifier;

impl TransientClassifier for PostgresClassifier {
    fn is_transient(&self, err: &DbErr) -> bool {
        is_acquire_timeout(err)
            || matches!(
                driver_code(err).as_deref(),
                Some("40P01" | "40001" | "55P03")
            )
    }
}

/// MySQL: deadlock (SQLSTATE 40001) and lock wait timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlClassifier;

impl TransientClassifier for MySqlClassifier {
    fn is_transient(&self, err: &DbErr) -> bool {
        is_acquire_timeout(err)
            || matches!(driver_code(err).as_deref(), Some("40001" | "1213" | "1205"))
            || err.to_string().contains("Lock wait timeout exceeded")
    }
}

/// `SQLite`: `SQLITE_BUSY` and `SQLITE_LOCKED`, including their extended codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteClassifier;

impl TransientClassifier for SqliteClassifier {
    fn is_transient(&self, err: &DbErr) -> bool {
        if is_acquire_timeout(err) {
            return true;
        }
        driver_code(err)
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, 5 | 6))
    }
}

/// Classifier matching the backend of a connection.
#[must_use]
pub fn classifier_for(backend: DatabaseBackend) -> &'static dyn TransientClassifier {
    match backend {
        DatabaseBackend::Postgres => &PostgresClassifier,
        DatabaseBackend::MySql => &MySqlClassifier,
        DatabaseBackend::Sqlite => &SqliteClassifier,
    }
}
