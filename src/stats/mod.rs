//! Response-time statistics.
//!
//! Nearest-rank percentiles, aggregate reductions, chart bucketing and
//! summary recomputation. Everything here is pure and allocation-bounded by
//! the input size.

mod bucket;
mod percentile;
mod summary;

pub use bucket::*;
pub use percentile::*;
pub use summary::*;
