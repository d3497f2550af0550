//! Service wiring: event store selection, projections replay and the
//! notification worker.

use std::sync::Arc;

use commerce_infra::event_store::{EventStore, EventStoreError, InMemoryEventStore, PostgresEventStore};
use commerce_infra::notifications::{LoggingNotifier, NotificationDispatcher, NotificationWorker};
use commerce_infra::services::{CommerceServices, ServiceError, ServiceResult};
use thiserror::Error;

use crate::app::errors::ApiResult;
use crate::config::{ApiConfig, Persistence};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("event store unavailable: {0}")]
    Store(#[from] EventStoreError),

    #[error("service startup failed: {0}")]
    Services(#[from] ServiceError),

    #[error("startup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("notification worker failed to start: {0}")]
    Worker(#[from] std::io::Error),
}

#[derive(Debug)]
pub struct AppServices {
    core: Arc<CommerceServices>,
    _notifications: NotificationWorker,
}

impl AppServices {
    /// Run a service call on the blocking pool. Services hold a writer lock
    /// and the Postgres store drives its queries with `block_on`, so neither
    /// may run on an async worker thread.
    pub async fn run<T, F>(&self, f: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&CommerceServices) -> ServiceResult<T> + Send + 'static,
    {
        let core = self.core.clone();
        let result = tokio::task::spawn_blocking(move || f(&core)).await?;
        Ok(result?)
    }

    /// Read-only call against the in-memory projections.
    pub fn read<T>(&self, f: impl FnOnce(&CommerceServices) -> T) -> T {
        f(&self.core)
    }
}

pub async fn build_services(config: &ApiConfig) -> Result<AppServices, BuildError> {
    let store: Arc<dyn EventStore> = match &config.persistence {
        Persistence::InMemory => Arc::new(InMemoryEventStore::new()),
        Persistence::Postgres { database_url } => {
            tracing::info!("using postgres event store");
            Arc::new(PostgresEventStore::connect(database_url).await?)
        }
    };

    let services_config = config.services.clone();
    let core = tokio::task::spawn_blocking(move || CommerceServices::new(store, services_config))
        .await??;
    let core = Arc::new(core);

    let dispatcher = NotificationDispatcher::new(Arc::new(LoggingNotifier), core.projections().clone());
    let notifications = dispatcher.spawn(core.subscribe())?;

    Ok(AppServices {
        core,
        _notifications: notifications,
    })
}
