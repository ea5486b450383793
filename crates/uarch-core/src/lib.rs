//! uarch-core
//!
//! Shared pieces of the experiment analyzers: the results-block loader, the
//! host registry, display ordering, statistics and LaTeX cell formatting.

pub mod error;
pub mod latex;
pub mod ordering;
pub mod registry;
pub mod results;
pub mod stats;

pub use error::{DataError, LoadError, RegistryError, StatsError};
pub use ordering::{order_records, order_result_sets, unmatched_hosts, HostRecord};
pub use registry::{CoreDescriptor, HostEntry, HostRegistry};
pub use results::{load_out_dir, ResultSet};
pub use stats::{Direction, Signal};
