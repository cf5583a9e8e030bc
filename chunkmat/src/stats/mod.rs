//! Per-row and per-column statistics over any [`Matrix`](crate::Matrix)
//!
//! When the matrix prefers the same dimension as the statistic, each target
//! element is extracted and reduced directly. Otherwise the statistic is
//! accumulated in a single pass over the other dimension with one of the
//! `Running*` types, so chunks are not re-read for every target element.
//! Work is split over contiguous blocks of the target dimension with
//! [`parallelize`](crate::parallelize).

pub mod counts;
pub mod grouped_medians;
pub mod grouped_sums;
pub mod medians;
pub mod ranges;
pub mod sums;
pub mod utils;
pub mod variances;

pub use utils::{tabulate_groups, total_groups};
