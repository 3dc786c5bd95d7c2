//! ---
//! ems_section: "05-alerting-reconciliation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Alert lifecycle reconciliation and durable state."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Alert lifecycle reconciliation for the F-EMS fleet monitoring core.
//!
//! The simulator rederives alert conditions from scratch on every tick; this
//! crate folds that volatile stream into a durable overlay of operator state
//! (acknowledged / resolved) keyed by the structured [`AlertKey`] identity,
//! so operator actions survive regeneration, restarts, and condition
//! recovery.
//!
//! [`AlertKey`]: f_ems_model::AlertKey

/// Shared result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;

/// Error type for the alerting subsystem.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// Wrapper for IO errors encountered while reading/writing state files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// Raised when a rendering-time alert id cannot be located.
    #[error("unknown alert id: {0}")]
    UnknownAlert(uuid::Uuid),
}

pub mod reconciler;
pub mod state;
pub mod store;

pub use reconciler::{merge, AlertReconciler, FreshAlert};
pub use state::{AlertStatus, DurableAlertState, FleetAlert};
pub use store::{InMemoryStore, JsonFileStore, StateStore};
