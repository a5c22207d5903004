//! Contract tests for Strata datastores.
//!
//! Every [`Datastore`](strata_store::Datastore) implementation, backend or
//! decorator, should pass [`run_all`]:
//!
//! ```ignore
//! #[test]
//! fn conforms() {
//!     strata_conformance::run_all(MemoryDatastore::new);
//! }
//! ```
//!
//! The individual checks are public so a backend with known gaps can run a
//! subset. [`FaultyDatastore`] injects backend failures for testing how
//! decorators propagate them.

pub mod faulty;
pub mod suite;

pub use faulty::FaultyDatastore;
pub use suite::*;

use tracing_subscriber::filter::LevelFilter;

/// Install a test-friendly `tracing` subscriber at debug level.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(LevelFilter::DEBUG)
        .try_init();
}
