use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use loanflow::config::StoreConfig;
use loanflow::error::AppError;
use loanflow::workflows::lending::{
    AuditStore, IdentityStore, InMemoryAuditStore, InMemoryIdentityStore,
    LoanApplicationService, PgAuditStore, PgIdentityStore,
};
use tracing::{info, warn};

pub(crate) type LendingService = LoanApplicationService<dyn IdentityStore, dyn AuditStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Store adapters selected from configuration, plus the Postgres pools to close on exit.
pub(crate) struct StoreHandles {
    pub(crate) identity: Arc<dyn IdentityStore>,
    pub(crate) audit: Arc<dyn AuditStore>,
    postgres_identity: Option<PgIdentityStore>,
    postgres_audit: Option<PgAuditStore>,
}

impl StoreHandles {
    pub(crate) fn in_memory() -> Self {
        Self {
            identity: Arc::new(InMemoryIdentityStore::default()),
            audit: Arc::new(InMemoryAuditStore::default()),
            postgres_identity: None,
            postgres_audit: None,
        }
    }

    pub(crate) async fn open(config: &StoreConfig) -> Result<Self, AppError> {
        let mut handles = Self::in_memory();

        match config.identity_url.as_deref() {
            Some(url) => {
                let store = PgIdentityStore::connect(url, config.max_connections).await?;
                info!("identity store connected to postgres");
                handles.identity = Arc::new(store.clone());
                handles.postgres_identity = Some(store);
            }
            None => warn!("IDENTITY_STORE_URL not set; identity records are kept in memory"),
        }

        match config.audit_url.as_deref() {
            Some(url) => {
                let store = PgAuditStore::connect(url, config.max_connections).await?;
                info!("audit store connected to postgres");
                handles.audit = Arc::new(store.clone());
                handles.postgres_audit = Some(store);
            }
            None => warn!("AUDIT_STORE_URL not set; audit snapshots are kept in memory"),
        }

        Ok(handles)
    }

    pub(crate) async fn close(&self) {
        if let Some(store) = &self.postgres_identity {
            store.pool().close().await;
        }
        if let Some(store) = &self.postgres_audit {
            store.pool().close().await;
        }
    }
}
