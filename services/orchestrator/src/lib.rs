//! Tenant lifecycle provisioning orchestrator.
//!
//! Starts, cancels, and reports on long-running provisioning workflows. The
//! orchestrator itself is stateless: durability lives in the execution
//! engine's persisted workflow state and in the tenant row's transactionally
//! updated status column. Deterministic workflow ids make every start call
//! safe under at-least-once delivery from callers.

pub mod config;
pub mod engine;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod onboarding;
pub mod projection;
pub mod store;
pub mod tier;
pub mod workflow_id;
