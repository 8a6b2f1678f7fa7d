//! Edusight - AI-generated student insight service
//!
//! Educators authenticate with bearer tokens, trigger analytical reports
//! over a student's aggregated record (grades, activity evaluations,
//! observations) and list previously generated reports. The hard parts
//! live between the HTTP surface and the generation provider: scoped
//! authorization, deterministic prompt assembly, bounded retry against the
//! provider's overload signal, and audit-faithful persistence.

pub mod auth;
pub mod config;
pub mod errors;
pub mod generation;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod records;
pub mod storage;
pub mod validation;
