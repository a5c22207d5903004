use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KeyError;

const SEPARATOR: char = '/';
const ROOT: &str = "/";

/// Hierarchical identifier of a stored record.
///
/// Keys are modelled on file system paths: `/Comedy/MontyPython` is a child
/// of `/Comedy`. Each segment ("namespace") may carry a `type:name` pair,
/// e.g. `/Comedy/MontyPython/Actor:JohnCleese`.
///
/// A `Key` is always held in canonical form: it starts with `/`, has no
/// trailing `/` (except the root key itself), no empty segments, and `.` /
/// `..` segments are resolved. Two keys are equal iff their canonical
/// strings are equal. Keys are never mutated; every derivation returns a
/// new key.
///
/// Ordering compares segment by segment; a strict prefix sorts before any
/// of its extensions (`/a < /a/b`, `/a/b/c > /a/b`).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Key {
    repr: String,
}

impl Key {
    /// Build a key from any string, cleaning it into canonical form.
    ///
    /// An empty string is the root key. A missing leading `/` is added.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self {
            repr: clean(raw.as_ref()),
        }
    }

    /// The root key `/`.
    pub fn root() -> Self {
        Self {
            repr: ROOT.to_string(),
        }
    }

    /// Accept a string only if it is already canonical.
    pub fn try_canonical(raw: &str) -> Result<Self, KeyError> {
        let reason = if raw.is_empty() {
            Some("key is empty")
        } else if !raw.starts_with(SEPARATOR) {
            Some("key must start with '/'")
        } else if clean(raw) != raw {
            Some("key is not in canonical form")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(KeyError::InvalidKey {
                key: raw.to_string(),
                reason,
            }),
            None => Ok(Self {
                repr: raw.to_string(),
            }),
        }
    }

    /// Build a key out of a list of namespaces.
    ///
    /// `Key::with_namespaces(["one", "two"])` is `/one/two`.
    pub fn with_namespaces<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut raw = String::new();
        for ns in namespaces {
            raw.push(SEPARATOR);
            raw.push_str(ns.as_ref());
        }
        Self::new(raw)
    }

    /// A key with a single random (UUID v4, no dashes) namespace.
    pub fn random() -> Self {
        Self::new(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Canonical string form.
    pub fn as_str(&self) -> &str {
        &self.repr
    }

    /// Canonical string form as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.repr.as_bytes()
    }

    /// Returns `true` for the root key `/`.
    pub fn is_root(&self) -> bool {
        self.repr == ROOT
    }

    /// Iterate over the namespaces of this key. The root key has none.
    pub fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        self.repr[1..].split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// The namespaces making up this key.
    ///
    /// `/Comedy/MontyPython/Actor:JohnCleese` gives
    /// `["Comedy", "MontyPython", "Actor:JohnCleese"]`.
    pub fn namespaces(&self) -> Vec<&str> {
        self.segments().collect()
    }

    /// Alias of [`Self::namespaces`].
    pub fn list(&self) -> Vec<&str> {
        self.namespaces()
    }

    /// Number of namespaces.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// The last namespace, or `""` for the root key.
    pub fn base_namespace(&self) -> &str {
        match self.repr.rfind(SEPARATOR) {
            Some(idx) => &self.repr[idx + 1..],
            None => "",
        }
    }

    /// The type of the last namespace: `Actor` in `.../Actor:JohnCleese`.
    ///
    /// Empty when the last namespace has no `:`.
    pub fn type_name(&self) -> &str {
        namespace_type(self.base_namespace())
    }

    /// The name of the last namespace: `JohnCleese` in `.../Actor:JohnCleese`.
    pub fn name(&self) -> &str {
        namespace_value(self.base_namespace())
    }

    /// Append `:name` to the last namespace.
    ///
    /// `/Comedy/MontyPython/Actor` with `JohnCleese` gives
    /// `/Comedy/MontyPython/Actor:JohnCleese`.
    pub fn instance(&self, name: &str) -> Self {
        Self::new(format!("{}:{}", self.repr, name))
    }

    /// The parent key plus the type of the last namespace.
    ///
    /// `/Comedy/MontyPython/Actor:JohnCleese` gives `/Comedy/MontyPython/Actor`.
    pub fn path(&self) -> Self {
        let parent = self.parent();
        Self::new(format!("{}/{}", parent.repr, self.type_name()))
    }

    /// The key with its last namespace removed. The root is its own parent.
    pub fn parent(&self) -> Self {
        match self.repr.rfind(SEPARATOR) {
            Some(0) | None => Self::root(),
            Some(idx) => Self {
                repr: self.repr[..idx].to_string(),
            },
        }
    }

    /// Append `child`'s namespaces to this key.
    pub fn child(&self, child: &Key) -> Self {
        if self.is_root() {
            child.clone()
        } else if child.is_root() {
            self.clone()
        } else {
            Self {
                repr: format!("{}{}", self.repr, child.repr),
            }
        }
    }

    /// Chain several keys after this one.
    pub fn concat<'a, I>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = &'a Key>,
    {
        keys.into_iter().fold(self.clone(), |acc, k| acc.child(k))
    }

    /// The key with its namespaces in reverse order.
    ///
    /// `/Comedy/MontyPython/Actor:JohnCleese` gives
    /// `/Actor:JohnCleese/MontyPython/Comedy`.
    pub fn reverse(&self) -> Self {
        let mut namespaces = self.namespaces();
        namespaces.reverse();
        Self::with_namespaces(namespaces)
    }

    /// Returns `true` if this key is a strict string prefix of `other`.
    ///
    /// `/a` is an ancestor of both `/a/b` and `/ab`, and no key is its own
    /// ancestor. See [`Key::is_namespace_ancestor_of`] for the test that
    /// follows namespace boundaries.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        self != other && other.repr.starts_with(&self.repr)
    }

    /// Returns `true` if `other` is a strict string prefix of this key.
    pub fn is_descendant_of(&self, other: &Key) -> bool {
        other.is_ancestor_of(self)
    }

    /// Returns `true` if `other` lies strictly below this key in the
    /// namespace tree: `/a` covers `/a/b` but not `/ab`.
    pub fn is_namespace_ancestor_of(&self, other: &Key) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other.repr.len() > self.repr.len()
            && other.repr.starts_with(&self.repr)
            && other.repr.as_bytes()[self.repr.len()] == b'/'
    }

    /// Returns `true` if the key has exactly one namespace.
    pub fn is_top_level(&self) -> bool {
        !self.is_root() && self.repr.rfind(SEPARATOR) == Some(0)
    }

    /// This key expressed relative to `ancestor`.
    ///
    /// Returns the root key when `ancestor == self`, and `None` when
    /// `ancestor` is not a namespace ancestor of this key.
    pub fn relative_to(&self, ancestor: &Key) -> Option<Key> {
        if ancestor == self {
            Some(Self::root())
        } else if ancestor.is_root() {
            Some(self.clone())
        } else if ancestor.is_namespace_ancestor_of(self) {
            Some(Self {
                repr: self.repr[ancestor.repr.len()..].to_string(),
            })
        } else {
            None
        }
    }

    /// Returns `true` if this key sorts strictly before `other`.
    pub fn less(&self, other: &Key) -> bool {
        self < other
    }
}

/// The portion of a namespace before its last `:`, `foo` in `foo:bar`.
fn namespace_type(ns: &str) -> &str {
    match ns.rfind(':') {
        Some(idx) => &ns[..idx],
        None => "",
    }
}

/// The portion of a namespace after its last `:`, `baz` in `foo:bar:baz`.
fn namespace_value(ns: &str) -> &str {
    match ns.rfind(':') {
        Some(idx) => &ns[idx + 1..],
        None => ns,
    }
}

/// Normalise a raw path into canonical key form.
fn clean(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for part in raw.split(SEPARATOR) {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            seg => segments.push(seg),
        }
    }
    if segments.is_empty() {
        return ROOT.to_string();
    }
    let mut out = String::with_capacity(raw.len() + 1);
    for seg in segments {
        out.push(SEPARATOR);
        out.push_str(seg);
    }
    out
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments().cmp(other.segments())
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Default for Key {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.repr)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.repr
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Key {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.repr
    }
}

impl FromStr for Key {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // -----------------------------------------------------------------------
    // Canonical form
    // -----------------------------------------------------------------------

    #[test]
    fn cleans_into_canonical_form() {
        assert_eq!(Key::new("").as_str(), "/");
        assert_eq!(Key::new("abcde").as_str(), "/abcde");
        assert_eq!(Key::new("a/b/c/d/").as_str(), "/a/b/c/d");
        assert_eq!(Key::new("//a//b/").as_str(), "/a/b");
        assert_eq!(Key::new("/a/./b/../c").as_str(), "/a/c");
        assert_eq!(Key::new("/..").as_str(), "/");
    }

    #[test]
    fn try_canonical_rejects_unclean_strings() {
        assert!(Key::try_canonical("/a/b").is_ok());
        assert!(Key::try_canonical("/").is_ok());
        for bad in ["", "a/b", "/a/", "/a//b", "/a/./b", "/a/.."] {
            let err = Key::try_canonical(bad).unwrap_err();
            assert!(matches!(err, KeyError::InvalidKey { .. }), "{bad}");
        }
    }

    #[test]
    fn serde_uses_canonical_string() {
        let key = Key::new("/a/b");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"/a/b\"");
        let back: Key = serde_json::from_str("\"a/b/\"").unwrap();
        assert_eq!(back, key);
    }

    // -----------------------------------------------------------------------
    // Namespaces, type and name
    // -----------------------------------------------------------------------

    #[test]
    fn namespaces_type_and_name() {
        let k = Key::new("/Comedy/MontyPython/Actor:JohnCleese");
        assert_eq!(k.namespaces(), vec!["Comedy", "MontyPython", "Actor:JohnCleese"]);
        assert_eq!(k.base_namespace(), "Actor:JohnCleese");
        assert_eq!(k.type_name(), "Actor");
        assert_eq!(k.name(), "JohnCleese");
        assert_eq!(k.path(), Key::new("/Comedy/MontyPython/Actor"));
        assert_eq!(k.depth(), 3);
    }

    #[test]
    fn type_joins_all_but_last_colon_part() {
        let k = Key::new("/a/foo:bar:baz");
        assert_eq!(k.type_name(), "foo:bar");
        assert_eq!(k.name(), "baz");

        let bare = Key::new("/a/plain");
        assert_eq!(bare.type_name(), "");
        assert_eq!(bare.name(), "plain");
        assert_eq!(bare.path(), Key::new("/a"));
    }

    #[test]
    fn trailing_colon_has_empty_name() {
        let k = Key::new("4215432143214321432143214321:");
        assert_eq!(k.type_name(), "4215432143214321432143214321");
        assert_eq!(k.name(), "");
        assert_eq!(k.instance("inst").as_str(), "/4215432143214321432143214321::inst");
    }

    #[test]
    fn instance_appends_name() {
        let k = Key::new("/Comedy/MontyPython/Actor");
        assert_eq!(
            k.instance("JohnCleese"),
            Key::new("/Comedy/MontyPython/Actor:JohnCleese")
        );
    }

    #[test]
    fn root_has_no_namespaces() {
        let root = Key::root();
        assert!(root.is_root());
        assert!(root.namespaces().is_empty());
        assert_eq!(root.parent(), root);
        assert!(!root.is_top_level());
        assert_eq!(root.base_namespace(), "");
    }

    // -----------------------------------------------------------------------
    // Derivations
    // -----------------------------------------------------------------------

    #[test]
    fn ancestry() {
        let k1 = Key::new("/A/B/C");
        let k2 = Key::new("/A/B/C/D");
        let a = Key::new("/A");

        assert!(k1.is_ancestor_of(&k2));
        assert!(k2.is_descendant_of(&k1));
        assert!(a.is_ancestor_of(&k2));
        assert!(a.is_ancestor_of(&k1));
        assert!(!a.is_descendant_of(&k2));
        assert!(k2.is_descendant_of(&a));
        assert!(!k2.is_ancestor_of(&a));
        assert!(!k2.is_ancestor_of(&k2));
        assert!(!k1.is_ancestor_of(&k1));

        assert_eq!(k1.child(&Key::new("D")), k2);
        assert_eq!(k1, k2.parent());
        assert_eq!(k1.path(), k2.parent().path());
    }

    #[test]
    fn ancestry_is_a_string_prefix_test() {
        assert!(Key::new("/a").is_ancestor_of(&Key::new("/ab")));
        assert!(Key::new("/ab").is_descendant_of(&Key::new("/a")));
        assert!(Key::root().is_ancestor_of(&Key::new("/ab")));
        assert!(!Key::root().is_ancestor_of(&Key::root()));
        assert!(!Key::new("/ab").is_ancestor_of(&Key::new("/a")));
    }

    #[test]
    fn namespace_ancestry_respects_boundaries() {
        let a = Key::new("/a");
        assert!(!a.is_namespace_ancestor_of(&Key::new("/ab")));
        assert!(a.is_namespace_ancestor_of(&Key::new("/a/b")));
        assert!(!a.is_namespace_ancestor_of(&a));
        assert!(Key::root().is_namespace_ancestor_of(&a));
        assert!(!Key::root().is_namespace_ancestor_of(&Key::root()));
        assert_eq!(Key::new("/ab").relative_to(&a), None);
    }

    #[test]
    fn typed_ancestry() {
        let k1 = Key::new("/A/B/C:c");
        let k2 = Key::new("/A/B/C:c/D:d");
        assert!(k1.is_ancestor_of(&k2));
        assert!(k2.is_descendant_of(&k1));
        assert_eq!(k1.type_name(), "C");
        assert_eq!(k2.type_name(), "D");
        assert_eq!(k1.type_name(), k2.parent().type_name());
    }

    #[test]
    fn child_with_root_is_identity() {
        let k = Key::new("/a/b");
        assert_eq!(Key::root().child(&k), k);
        assert_eq!(k.child(&Key::root()), k);
    }

    #[test]
    fn concat_chains_keys() {
        let k = Key::new("/a").concat([&Key::new("/b/c"), &Key::root(), &Key::new("d")]);
        assert_eq!(k, Key::new("/a/b/c/d"));
    }

    #[test]
    fn reverse_and_with_namespaces() {
        let k = Key::new("/Comedy/MontyPython/Actor:JohnCleese");
        assert_eq!(k.reverse(), Key::new("/Actor:JohnCleese/MontyPython/Comedy"));
        assert_eq!(Key::with_namespaces(["one", "two"]), Key::new("/one/two"));
        assert_eq!(Key::with_namespaces(Vec::<String>::new()), Key::root());
    }

    #[test]
    fn top_level() {
        assert!(Key::new("/a").is_top_level());
        assert!(!Key::new("/a/b").is_top_level());
    }

    #[test]
    fn relative_to_strips_ancestor() {
        let k = Key::new("/cool/hello/world");
        assert_eq!(k.relative_to(&Key::new("/cool")), Some(Key::new("/hello/world")));
        assert_eq!(k.relative_to(&k), Some(Key::root()));
        assert_eq!(k.relative_to(&Key::root()), Some(k.clone()));
        assert_eq!(k.relative_to(&Key::new("/fail")), None);
        assert_eq!(k.relative_to(&Key::new("/coo")), None);
    }

    #[test]
    fn random_keys_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            let k = Key::random();
            assert!(k.is_top_level());
            assert!(seen.insert(k));
        }
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn prefix_sorts_first() {
        assert!(Key::new("/a").less(&Key::new("/a/b")));
        assert!(!Key::new("/a/b/c").less(&Key::new("/a/b")));
        assert!(Key::new("/a/b").less(&Key::new("/a/b/c")));
        assert!(Key::new("/a/b").less(&Key::new("/a/c")));
        assert!(Key::root().less(&Key::new("/a")));
    }

    #[test]
    fn ordering_is_segment_wise_not_string_wise() {
        // As strings "/a/b" > "/a-b", but segment "a" < "a-b".
        assert!(Key::new("/a/b").less(&Key::new("/a-b")));
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn raw_key() -> impl Strategy<Value = String> {
        proptest::collection::vec("[a-zA-Z0-9:._-]{0,6}", 0..6)
            .prop_map(|parts| parts.join("/"))
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9:_-]{1,6}"
    }

    proptest! {
        #[test]
        fn canonicalisation_is_idempotent(raw in raw_key()) {
            let k = Key::new(&raw);
            prop_assert_eq!(Key::new(k.to_string()), k.clone());
            prop_assert!(Key::try_canonical(k.as_str()).is_ok());
        }

        #[test]
        fn parent_child_round_trip(raw in raw_key(), leaf in segment()) {
            let k = Key::new(&raw).child(&Key::new(&leaf));
            let last = Key::new(k.base_namespace());
            prop_assert_eq!(k.parent().child(&last), k.clone());
            prop_assert!(k.parent().is_ancestor_of(&k));
        }

        #[test]
        fn ancestor_of_any_child(raw in raw_key(), leaf in segment()) {
            let k = Key::new(&raw);
            prop_assert!(k.is_ancestor_of(&k.child(&Key::new(&leaf))));
        }

        #[test]
        fn less_is_a_strict_total_order(a in raw_key(), b in raw_key(), c in raw_key()) {
            let (a, b, c) = (Key::new(&a), Key::new(&b), Key::new(&c));
            prop_assert!(!a.less(&a));
            if a != b {
                prop_assert!(a.less(&b) ^ b.less(&a));
            }
            if a.less(&b) && b.less(&c) {
                prop_assert!(a.less(&c));
            }
        }
    }
}
