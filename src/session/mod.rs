// src/session/mod.rs — Session lifecycle core

pub mod call_id;
pub mod orchestrator;
pub mod reconcile;
pub mod types;

pub use orchestrator::{CreateSession, EndOutcome, SessionOrchestrator};
pub use reconcile::{ReconcileReport, Reconciler};
pub use types::{Caller, Difficulty, Session, SessionStatus, SessionView};
