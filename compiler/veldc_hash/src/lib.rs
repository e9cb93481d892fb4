//! This crate contains re-exports for the hash map/set types that use the
//! more optimized hash function from the `fnv` crate. The default hash
//! map/set uses `RandomState`, which is cryptographically stronger but
//! slower, and its per-process randomization is useless to a compiler that
//! must behave identically run after run.

/// A type alias for a hash map that uses the `fnv` hash function.
pub type HashMap<K, V> = std::collections::HashMap<K, V, fnv::FnvBuildHasher>;

/// A type alias for a hash set that uses the `fnv` hash function.
pub type HashSet<T> = std::collections::HashSet<T, fnv::FnvBuildHasher>;
