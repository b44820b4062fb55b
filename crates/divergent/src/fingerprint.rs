use std::collections::BTreeMap;
use std::hash::Hasher;

use fnv::FnvHasher;

const SEPARATOR: &[u8] = b"\n";

/// Computes the series identity used as the cache key.
///
/// FNV-1a over the name and every tag pair in key order. Each component is
/// terminated by a separator so that shifting bytes between name, key and
/// value changes the hashed input. Collisions between distinct series are
/// not detected.
pub fn fingerprint(name: &str, tags: &BTreeMap<String, String>) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(name.as_bytes());
    hasher.write(SEPARATOR);
    for (key, value) in tags {
        hasher.write(key.as_bytes());
        hasher.write(SEPARATOR);
        hasher.write(value.as_bytes());
        hasher.write(SEPARATOR);
    }
    hasher.finish()
}
