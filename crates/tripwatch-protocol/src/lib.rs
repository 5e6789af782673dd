//! Wire types for the Tripwatch trip and driver service.
//!
//! This crate defines trips, drivers, schedule entries and the JSON
//! envelopes the service wraps them in. Decoding is deliberately lenient:
//! identifiers may be strings or numbers, timestamps come in several
//! formats, and missing collections decode as empty.

pub mod driver;
pub mod envelope;
pub mod ids;
pub mod schedule;
pub mod timestamp;
pub mod trip;

pub use driver::*;
pub use envelope::*;
pub use ids::*;
pub use schedule::*;
pub use timestamp::{Timestamp, TimestampError};
pub use trip::*;
