//! Domain model for the evaluation publication & aggregation core.
//!
//! # Responsibility
//! - Define canonical catalog, publication, and submission structures.
//! - Keep validation rules next to the data they protect.
//!
//! # Invariants
//! - Every aggregate is identified by a stable UUID type alias.
//! - Answer values are numeric XOR text, decided by the question type.

pub mod formation;
pub mod publication;
pub mod submission;
pub mod template;
