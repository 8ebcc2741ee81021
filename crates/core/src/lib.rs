pub mod actor;
pub mod audit;
pub mod auth;
pub mod config;
mod db;
pub mod history;
pub mod intake;
pub mod metrics;
pub mod order;
pub mod policy;
pub mod scan;
pub mod testing;
pub mod transition;

pub use actor::{Actor, ActorType, Role};
pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditFilter, AuditHandle, AuditRecord,
    AuditStore, AuditWriter, SqliteAuditStore,
};
pub use auth::{
    create_authenticator, AuthError, AuthRequest, Authenticator, Identity, NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use history::{
    HistoryError, HistoryLogger, HistoryStore, ScanData, ScanScope, StatusHistoryEntry,
};
pub use intake::{IntakeError, NewOrder, OrderIntake};
pub use order::{
    CreateOrderRequest, Order, OrderError, OrderFilter, OrderStatus, OrderStore,
    SqliteOrderStore,
};
pub use policy::{valid_next_statuses, AllowedStatuses};
pub use scan::{ScanCode, ScanError, ScanOutcome, ScanProcessor, ScanRequest};
pub use transition::{TransitionContext, TransitionError, TransitionExecutor};
