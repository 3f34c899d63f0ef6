//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, policy and gateway calls into use-case level APIs.
//! - Keep UI layers decoupled from storage and entitlement details.

pub mod journal_service;
