//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep callers decoupled from storage details.
//!
//! # Invariants
//! - Services never bypass repository validation/persistence contracts.
//! - One service parametrized by `Role` serves every respondent population.

pub mod catalog_service;
pub mod publication_service;
pub mod submission_service;
