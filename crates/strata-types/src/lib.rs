//! Foundation types for Strata datastores.
//!
//! Every other Strata crate depends on `strata-types`. It holds the
//! identifier and record types that cross the datastore contract boundary.
//!
//! # Key Types
//!
//! - [`Key`] -- Immutable hierarchical path identifier (`/Comedy/MontyPython/Actor:JohnCleese`)
//! - [`Pair`] -- A key with its value, the unit written to a datastore
//! - [`Entry`] -- A query result: a key with its value, or a bare key for keys-only queries
//! - [`KeyError`] -- Rejection of a malformed key string

pub mod error;
pub mod key;
pub mod pair;

pub use error::KeyError;
pub use key::Key;
pub use pair::{Entry, Pair};
