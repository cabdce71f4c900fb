//! Out-of-band synchronization seams.
//!
//! The formation directory is owned by an external event-driven job; this
//! module holds the consumer that applies its events into the local store
//! the publication gate reads.

pub mod directory_sync;
