//! Boolean condition sets and their canonical encoding.
//!
//! A [`ConditionSet`] maps flag names to booleans. Flags are kept sorted by
//! name, so two sets with the same content always encode to the same
//! [`CanonicalKey`] no matter the order their flags were added in:
//!
//! ```text
//! isBrown:true,isGreen:false
//! ```
//!
//! Pairs are joined by `,` and sorted byte-wise by name. Inside a name the
//! characters `\`, `,` and `:` are escaped with a leading `\`. The empty set
//! encodes to a single space so that it never collides with an empty string.
//!
//! Flag names starting with `@` are reserved. The engine adds
//! `@origin.<stage>` = true to the context it resolves against, naming the
//! stage the asset was in when the action was taken.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Prefix of the flag injected for the asset's stage before a transition.
pub const ORIGIN_PREFIX: &str = "@origin.";

/// Prefix shared by all engine-owned flag names.
pub const RESERVED_PREFIX: char = '@';

/// Encoding of the empty set.
const EMPTY_KEY: &str = " ";

/// Returns the reserved flag naming `stage` as the origin of a transition.
pub fn origin_flag(stage: &str) -> String {
    format!("{}{}", ORIGIN_PREFIX, stage)
}

/// Returns true if `name` belongs to the engine rather than to flag authors.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Canonical, order-independent encoding of a [`ConditionSet`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the key back into a condition set.
    pub fn decode(&self) -> Result<ConditionSet, CoreError> {
        ConditionSet::decode(&self.0)
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A set of named boolean flags.
///
/// Flags can be added or overwritten but never removed. Cloning produces an
/// independent copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConditionSet {
    flags: BTreeMap<String, bool>,
}

impl ConditionSet {
    /// Creates an empty set. It is satisfied by every context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set from `(name, value)` pairs. Later pairs win.
    pub fn from_pairs<I, N>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, bool)>,
        N: Into<String>,
    {
        pairs.into_iter().collect()
    }

    /// Inserts or overwrites a flag.
    pub fn add(&mut self, name: impl Into<String>, value: bool) {
        self.flags.insert(name.into(), value);
    }

    /// Returns a copy of this set with one more flag.
    pub fn with(mut self, name: impl Into<String>, value: bool) -> Self {
        self.add(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Iterates flags in canonical (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Returns true iff every flag in `required` is present here with the
    /// same value. Flags only present in `self` are ignored.
    pub fn satisfies(&self, required: &ConditionSet) -> bool {
        required
            .flags
            .iter()
            .all(|(name, value)| self.flags.get(name) == Some(value))
    }

    /// Returns true if some context could satisfy both sets.
    ///
    /// Two sets are incompatible when they disagree on a shared flag, or
    /// when they require different origin stages.
    pub fn is_compatible_with(&self, other: &ConditionSet) -> bool {
        let disagree = self
            .flags
            .iter()
            .any(|(name, value)| matches!(other.flags.get(name), Some(v) if v != value));
        if disagree {
            return false;
        }

        // A context has exactly one origin.
        let mut origins = self.required_origins().chain(other.required_origins());
        match origins.next() {
            Some(first) => origins.all(|origin| origin == first),
            None => true,
        }
    }

    /// Returns the origin stage this set requires, if it requires exactly one.
    pub fn required_origin(&self) -> Option<&str> {
        let mut origins = self.required_origins();
        match (origins.next(), origins.next()) {
            (Some(origin), None) => Some(origin),
            _ => None,
        }
    }

    /// Every origin stage this set requires. More than one means the set
    /// can never be satisfied by a context the engine builds.
    pub fn required_origins(&self) -> impl Iterator<Item = &str> {
        self.flags
            .iter()
            .filter(|(name, value)| **value && name.starts_with(ORIGIN_PREFIX))
            .map(|(name, _)| &name[ORIGIN_PREFIX.len()..])
    }

    /// Produces the canonical key for this set.
    pub fn encode(&self) -> CanonicalKey {
        if self.flags.is_empty() {
            return CanonicalKey(EMPTY_KEY.to_string());
        }

        let mut out = String::new();
        for (i, (name, value)) in self.flags.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            for c in name.chars() {
                if matches!(c, '\\' | ',' | ':') {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push(':');
            out.push_str(if *value { "true" } else { "false" });
        }
        CanonicalKey(out)
    }

    /// Parses a canonical key.
    pub fn decode(key: &str) -> Result<Self, CoreError> {
        if key == EMPTY_KEY {
            return Ok(Self::new());
        }
        if key.is_empty() {
            return Err(CoreError::format(key, "empty key"));
        }

        let mut set = Self::new();
        let mut name = String::new();
        let mut value = String::new();
        let mut in_value = false;
        let mut chars = key.chars();

        while let Some(c) = chars.next() {
            match c {
                '\\' if !in_value => match chars.next() {
                    Some(escaped) => name.push(escaped),
                    None => return Err(CoreError::format(key, "dangling escape")),
                },
                ':' if !in_value => in_value = true,
                ',' => {
                    set.push_decoded(key, &name, &value, in_value)?;
                    name.clear();
                    value.clear();
                    in_value = false;
                }
                _ if in_value => value.push(c),
                _ => name.push(c),
            }
        }
        set.push_decoded(key, &name, &value, in_value)?;

        Ok(set)
    }

    fn push_decoded(
        &mut self,
        key: &str,
        name: &str,
        value: &str,
        has_value: bool,
    ) -> Result<(), CoreError> {
        if !has_value {
            return Err(CoreError::format(
                key,
                format!("flag '{}' has no value", name),
            ));
        }
        let flag = value.parse::<bool>().map_err(|_| {
            CoreError::format(key, format!("invalid boolean '{}' for flag '{}'", value, name))
        })?;
        if self.flags.insert(name.to_string(), flag).is_some() {
            return Err(CoreError::format(key, format!("duplicate flag '{}'", name)));
        }
        Ok(())
    }
}

impl<N: Into<String>> FromIterator<(N, bool)> for ConditionSet {
    fn from_iter<I: IntoIterator<Item = (N, bool)>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<N: Into<String>> Extend<(N, bool)> for ConditionSet {
    fn extend<I: IntoIterator<Item = (N, bool)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.add(name, value);
        }
    }
}

impl fmt::Display for ConditionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode().as_str())
    }
}

impl FromStr for ConditionSet {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for ConditionSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.encode().as_str())
    }
}

impl<'de> Deserialize<'de> for ConditionSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct ConditionSetVisitor;

        impl<'de> Visitor<'de> for ConditionSetVisitor {
            type Value = ConditionSet;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a canonical condition key or a map of flags to booleans")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                ConditionSet::decode(v).map_err(E::custom)
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut set = ConditionSet::new();
                while let Some((name, value)) = map.next_entry::<String, bool>()? {
                    set.add(name, value);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_any(ConditionSetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn big_set() -> ConditionSet {
        ConditionSet::from_pairs([
            ("first", true),
            ("second", true),
            ("third", false),
            ("fourth", false),
            ("fifth", true),
        ])
    }

    #[test]
    fn test_empty_set_sentinel() {
        let set = ConditionSet::new();
        assert_eq!(set.encode().as_str(), " ");
        assert_eq!(ConditionSet::decode(" ").unwrap(), set);
        assert!(ConditionSet::decode("").is_err());
    }

    #[test]
    fn test_encoding_is_sorted() {
        let set = ConditionSet::from_pairs([("isGreen", false), ("isBrown", true)]);
        assert_eq!(set.encode().as_str(), "isBrown:true,isGreen:false");
    }

    #[test]
    fn test_add_order_does_not_change_key() {
        let scrambled = ConditionSet::from_pairs([
            ("fourth", false),
            ("third", false),
            ("first", true),
            ("fifth", true),
            ("second", true),
        ]);
        assert_eq!(big_set().encode(), scrambled.encode());
    }

    #[test]
    fn test_add_overwrites() {
        let mut set = ConditionSet::from_pairs([("isBrown", true)]);
        set.add("isBrown", false);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("isBrown"), Some(false));
    }

    #[test]
    fn test_superset_matching() {
        let candidate = ConditionSet::from_pairs([("a", true), ("b", true), ("c", false)]);

        assert!(candidate.satisfies(&ConditionSet::from_pairs([("a", true), ("b", true)])));
        assert!(!candidate.satisfies(&ConditionSet::from_pairs([("a", true), ("b", false)])));
        assert!(!candidate.satisfies(&ConditionSet::from_pairs([("a", true), ("d", true)])));
        assert!(candidate.satisfies(&ConditionSet::new()));
    }

    #[test]
    fn test_missing_flags_do_not_match() {
        let missing_false =
            ConditionSet::from_pairs([("first", true), ("second", true), ("third", false), ("fifth", true)]);
        assert!(!missing_false.satisfies(&big_set()));

        let missing_true = ConditionSet::from_pairs([
            ("first", true),
            ("second", true),
            ("third", false),
            ("fourth", false),
        ]);
        assert!(!missing_true.satisfies(&big_set()));

        let wrong = ConditionSet::from_pairs([("first", false)]);
        assert!(!wrong.satisfies(&big_set()));
        assert!(!big_set().satisfies(&wrong));
    }

    #[test]
    fn test_copy_isolation() {
        let original = ConditionSet::from_pairs([("isBrown", true)]);
        let mut copy = original.clone();
        copy.add("isBrown", false);
        copy.add("isGreen", true);

        assert_eq!(original.get("isBrown"), Some(true));
        assert_eq!(original.get("isGreen"), None);
        assert_eq!(original.len(), 1);
    }

    #[test]
    fn test_escaped_names() {
        let set = ConditionSet::from_pairs([("a,b", true), ("c:d", false), ("e\\f", true)]);
        let key = set.encode();
        assert_eq!(key.as_str(), "a\\,b:true,c\\:d:false,e\\\\f:true");
        assert_eq!(key.decode().unwrap(), set);
    }

    #[test]
    fn test_decode_errors() {
        for bad in ["isBrown", "isBrown:yes", "isBrown:TRUE", "a:true,", "a:true,a:false", "a\\"] {
            let err = ConditionSet::decode(bad).unwrap_err();
            assert!(
                matches!(err, CoreError::Format { .. }),
                "expected format error for {:?}, got {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_origin_flag() {
        let set = ConditionSet::new().with(origin_flag("cocoon"), true);
        assert_eq!(set.required_origin(), Some("cocoon"));
        assert!(is_reserved(&origin_flag("egg")));
        assert!(!is_reserved("isBrown"));
        assert_eq!(set.encode().as_str(), "@origin.cocoon:true");
    }

    #[test]
    fn test_compatibility() {
        let brown = ConditionSet::from_pairs([("isBrown", true)]);
        let not_brown = ConditionSet::from_pairs([("isBrown", false)]);
        let green = ConditionSet::from_pairs([("isGreen", true)]);

        assert!(!brown.is_compatible_with(&not_brown));
        assert!(brown.is_compatible_with(&green));
        assert!(brown.is_compatible_with(&ConditionSet::new()));

        let from_egg = brown.clone().with(origin_flag("egg"), true);
        let from_cocoon = brown.clone().with(origin_flag("cocoon"), true);
        assert!(!from_egg.is_compatible_with(&from_cocoon));
        assert!(from_egg.is_compatible_with(&brown));

        let from_both = from_egg.clone().with(origin_flag("cocoon"), true);
        assert_eq!(from_both.required_origin(), None);
        assert_eq!(from_both.required_origins().collect::<Vec<_>>(), vec!["cocoon", "egg"]);
        assert!(!from_both.is_compatible_with(&brown));
        assert!(!from_both.is_compatible_with(&ConditionSet::new()));
    }

    #[test]
    fn test_serde_accepts_key_or_map() {
        let from_key: ConditionSet = serde_json::from_str("\"isBrown:true\"").unwrap();
        let from_map: ConditionSet = serde_json::from_str(r#"{"isBrown": true}"#).unwrap();
        assert_eq!(from_key, from_map);
        assert_eq!(serde_json::to_string(&from_map).unwrap(), "\"isBrown:true\"");

        let bad: Result<ConditionSet, _> = serde_json::from_str("\"isBrown:maybe\"");
        assert!(bad.is_err());
    }

    fn flag_name() -> impl Strategy<Value = String> {
        "[a-zA-Z:,\\\\@. ]{0,8}"
    }

    proptest! {
        #[test]
        fn prop_order_independent(
            (ordered, shuffled) in prop::collection::btree_map(flag_name(), any::<bool>(), 0..10)
                .prop_flat_map(|m| {
                    let pairs: Vec<(String, bool)> = m.into_iter().collect();
                    (Just(pairs.clone()), Just(pairs).prop_shuffle())
                })
        ) {
            let a = ConditionSet::from_pairs(ordered);
            let b = ConditionSet::from_pairs(shuffled);
            prop_assert_eq!(a.encode(), b.encode());
        }

        #[test]
        fn prop_decode_inverts_encode(
            flags in prop::collection::btree_map(flag_name(), any::<bool>(), 0..10)
        ) {
            let set = ConditionSet::from_pairs(flags);
            let decoded = ConditionSet::decode(set.encode().as_str()).unwrap();
            prop_assert_eq!(&decoded, &set);
            prop_assert_eq!(decoded.encode(), set.encode());
        }

        #[test]
        fn prop_superset_satisfies_subset(
            flags in prop::collection::btree_map(flag_name(), any::<bool>(), 0..10),
            keep in prop::collection::vec(any::<bool>(), 10)
        ) {
            let full = ConditionSet::from_pairs(flags.clone());
            let subset: ConditionSet = flags
                .into_iter()
                .zip(keep)
                .filter(|(_, k)| *k)
                .map(|(pair, _)| pair)
                .collect();
            prop_assert!(full.satisfies(&subset));
        }
    }
}
