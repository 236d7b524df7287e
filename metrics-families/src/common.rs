use std::fmt;
use std::hash::{BuildHasherDefault, Hash, Hasher};

use hashbrown::HashMap;
use rapidhash::fast::RapidHasher;

/// A no-op hasher for fingerprints.
///
/// Fingerprints are already well-distributed 64-bit hashes, so indexing by them only needs the
/// value passed through as-is.  `finish` returns whatever was last handed to `write_u64`.
///
/// # Panics
///
/// Panics if any write method other than `write_u64` is called.  This hasher is only for
/// pre-hashed `u64` keys.
#[derive(Debug, Default)]
pub(crate) struct FingerprintHasher {
    hash: u64,
}

impl Hasher for FingerprintHasher {
    #[inline(always)]
    fn finish(&self) -> u64 {
        self.hash
    }

    fn write(&mut self, _bytes: &[u8]) {
        panic!("FingerprintHasher::write() called; FingerprintHasher only supports write_u64()");
    }

    #[inline(always)]
    fn write_u64(&mut self, i: u64) {
        self.hash = i;
    }
}

/// Maps a fingerprint to a position in an ordered sequence.
pub(crate) type FingerprintMap<V> = HashMap<u64, V, BuildHasherDefault<FingerprintHasher>>;

/// Streaming fingerprint builder.
///
/// Every string fed in is terminated, so `["ab", "c"]` and `["a", "bc"]` produce different
/// fingerprints.
pub(crate) struct Fingerprinter(RapidHasher<'static>);

impl Fingerprinter {
    pub(crate) fn new() -> Self {
        Fingerprinter(RapidHasher::default())
    }

    pub(crate) fn feed(&mut self, s: &str) {
        s.hash(&mut self.0);
    }

    pub(crate) fn finish(&self) -> u64 {
        self.0.finish()
    }
}

/// The display name of a metric family.
///
/// Derived once from a family's namespace, subsystem and base name.  Families are ordered by this
/// name in a [`Registry`][crate::Registry], and its fingerprint is the family's identity there.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FamilyName(String);

impl FamilyName {
    /// Composes a name as `namespace_subsystem_name`, omitting absent components along with their
    /// separators.
    pub fn compose(namespace: Option<&str>, subsystem: Option<&str>, name: &str) -> FamilyName {
        let mut composed = String::with_capacity(name.len() + 16);
        for part in [namespace, subsystem].into_iter().flatten().filter(|p| !p.is_empty()) {
            composed.push_str(part);
            composed.push('_');
        }
        composed.push_str(name);

        FamilyName(composed)
    }

    /// Fingerprint of this name.
    pub fn fingerprint(&self) -> u64 {
        let mut fp = Fingerprinter::new();
        fp.feed(&self.0);
        fp.finish()
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FamilyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FamilyName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::{FamilyName, Fingerprinter, FingerprintMap};

    #[test]
    fn test_compose_family_name() {
        let cases = [
            (Some("api"), Some("http"), "requests", "api_http_requests"),
            (Some("api"), None, "requests", "api_requests"),
            (None, Some("http"), "requests", "http_requests"),
            (None, None, "requests", "requests"),
            (Some(""), Some("http"), "requests", "http_requests"),
        ];

        for (namespace, subsystem, name, expected) in cases {
            assert_eq!(FamilyName::compose(namespace, subsystem, name).as_str(), expected);
        }
    }

    #[test]
    fn test_family_name_fingerprint_is_stable() {
        let a = FamilyName::compose(Some("api"), None, "requests");
        let b = FamilyName::compose(None, None, "api_requests");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), FamilyName::compose(None, None, "requests").fingerprint());
    }

    #[test]
    fn test_fingerprinter_terminates_strings() {
        let mut left = Fingerprinter::new();
        left.feed("ab");
        left.feed("c");

        let mut right = Fingerprinter::new();
        right.feed("a");
        right.feed("bc");

        assert_ne!(left.finish(), right.finish());
    }

    #[test]
    fn test_fingerprint_map_passes_through() {
        let mut map = FingerprintMap::default();
        map.insert(7u64, "seven");
        map.insert(u64::MAX, "max");
        assert_eq!(map.get(&7), Some(&"seven"));
        assert_eq!(map.get(&u64::MAX), Some(&"max"));
        assert_eq!(map.get(&8), None);
    }
}
