use std::sync::Arc;

use parcelhub_core::{
    AuditHandle, AuditStore, Authenticator, Config, HistoryLogger, HistoryStore, OrderIntake,
    OrderStore, SanitizedConfig, ScanProcessor, TransitionExecutor,
};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    audit: AuditHandle,
    audit_store: Arc<dyn AuditStore>,
    orders: Arc<dyn OrderStore>,
    executor: Arc<TransitionExecutor>,
    intake: OrderIntake,
    scans: ScanProcessor,
}

impl AppState {
    /// Wire the order services on top of the stores.
    ///
    /// `orders` and `history` are normally the same `SqliteOrderStore`, which
    /// is what makes a transition and its history entry one transaction.
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        audit: AuditHandle,
        audit_store: Arc<dyn AuditStore>,
        orders: Arc<dyn OrderStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let mut executor =
            TransitionExecutor::new(Arc::clone(&orders), HistoryLogger::new(history))
                .with_audit(audit.clone());
        if config.audit.record_rejections {
            executor = executor.with_rejection_log(Arc::clone(&audit_store));
        }
        let executor = Arc::new(executor);
        let intake = OrderIntake::new(Arc::clone(&orders)).with_audit(audit.clone());
        let scans = ScanProcessor::new(Arc::clone(&orders), Arc::clone(&executor));

        Self {
            config,
            authenticator,
            audit,
            audit_store,
            orders,
            executor,
            intake,
            scans,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn audit(&self) -> &AuditHandle {
        &self.audit
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    pub fn orders(&self) -> &dyn OrderStore {
        self.orders.as_ref()
    }

    pub fn executor(&self) -> &TransitionExecutor {
        &self.executor
    }

    pub fn intake(&self) -> &OrderIntake {
        &self.intake
    }

    pub fn scans(&self) -> &ScanProcessor {
        &self.scans
    }
}
