//! Security module for the intake desk — abuse throttling and audit logging.
//!
//! Provides:
//! - **Rate gate**: per-actor cooldown with escalating lockout, applied before
//!   any event reaches the conversation engine
//! - **Audit logging**: structured record of gate denials, rejected actions,
//!   client creation and application submission

pub mod audit;
pub mod rate_gate;

pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
pub use rate_gate::{GateDecision, RateGate, RateState};
