pub use std::collections::{BTreeMap, BTreeSet, hash_map};

pub use indexmap::{IndexMap, IndexSet};

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;
