//! Abstract interfaces shared by the chunked matrix crates
//!
//! Traits here are pure interfaces plus a couple of trivial stock
//! implementations. Nothing in this module allocates slabs or touches chunks.

pub mod element;
pub mod oracle;

pub use element::MatrixElement;
pub use oracle::{ConsecutiveOracle, FixedOracle, Oracle};
