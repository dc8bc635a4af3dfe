//! Core business logic - framework-agnostic marketplace operations.
//!
//! Every operation is a free async function taking the store handle and an
//! [`EngineContext`]. Operations that mutate related rows open their own
//! transaction, lock rows in a fixed order (order before product, conversations by
//! id), and either commit everything or drop the transaction, which rolls it back.

use std::sync::Arc;

use crate::config::MarketConfig;

/// Maintenance job: expires feed posts, archives idle conversations, cancels stale orders
pub mod cleanup;
/// Time source
pub mod clock;
/// Conversations and messages
pub mod conversation;
/// Read-only consistency scan
pub mod integrity;
/// Notification sink and notices
pub mod notify;
/// Order lifecycle: create, confirm, advance, cancel
pub mod order;
/// Product listings
pub mod product;
/// Retry-with-backoff wrapper
pub mod retry;
/// Typed status values and the order state machine
pub mod status;
/// Stock adjustments
pub mod stock;
/// Backend-specific transaction setup and error classification
pub mod store;
/// User accounts
pub mod user;

use clock::{Clock, SystemClock};
use notify::{NoopNotifier, Notice, NotificationSink};

/// Collaborators and settings shared by every operation.
///
/// Holds no marketplace state; cloning it is cheap.
#[derive(Clone)]
pub struct EngineContext {
    /// Source of every timestamp written
    pub clock: Arc<dyn Clock>,
    /// Receives notices after a successful commit
    pub notifier: Arc<dyn NotificationSink>,
    /// Fee table, preview length, maintenance windows
    pub config: MarketConfig,
}

impl EngineContext {
    /// Context using wall-clock time.
    #[must_use]
    pub fn new(notifier: Arc<dyn NotificationSink>, config: MarketConfig) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            notifier,
            config,
        }
    }

    /// Context that drops notices and uses default settings.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(Arc::new(NoopNotifier), MarketConfig::default())
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Delivers notices gathered by a committed operation.
    pub(crate) async fn notify_all(&self, notices: &[Notice]) {
        notify::dispatch(self.notifier.as_ref(), notices, self.clock.now()).await;
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
