//! Ordered multi-maps for headers and query parameters.
//!
//! Proxy events encode headers and query parameters either as flat
//! `name -> value` objects or as `name -> [values]` objects. Internally both
//! are folded into a [`MultiValueMap`], which keeps first-seen name order and
//! every value in arrival order.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// Ordered multi-map keyed by name.
///
/// Header maps compare names ASCII case-insensitively and keep the spelling
/// of the first insertion; query maps are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiValueMap {
    entries: Vec<(String, Vec<String>)>,
    case_insensitive: bool,
}

impl MultiValueMap {
    /// Creates an empty case-sensitive map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            case_insensitive: false,
        }
    }

    /// Creates an empty map whose names compare case-insensitively.
    #[must_use]
    pub const fn headers() -> Self {
        Self {
            entries: Vec::new(),
            case_insensitive: true,
        }
    }

    fn matches(&self, stored: &str, name: &str) -> bool {
        if self.case_insensitive {
            stored.eq_ignore_ascii_case(name)
        } else {
            stored == name
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| self.matches(k, name))
    }

    /// Appends a value, keeping every earlier value for the same name.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].1.push(value.into()),
            None => self.entries.push((name, vec![value.into()])),
        }
    }

    /// Replaces every value stored for `name` with `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].1 = vec![value.into()],
            None => self.entries.push((name, vec![value.into()])),
        }
    }

    /// Removes `name`, returning its values.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.position(name).map(|idx| self.entries.remove(idx).1)
    }

    /// First value stored for `name`.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// Every value stored for `name`, in arrival order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> &[String] {
        match self.position(name) {
            Some(idx) => &self.entries[idx].1,
            None => &[],
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, values)` in first-insertion order.
    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Iterates every `(name, value)` pair, repeating names with several values.
    #[must_use]
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Switches the map to case-insensitive names, merging entries that
    /// only differed by case.
    #[must_use]
    pub fn into_headers(self) -> Self {
        let mut folded = Self::headers();
        for (name, values) in self.entries {
            for value in values {
                folded.add(name.clone(), value);
            }
        }
        folded
    }

    /// Folds a flat map into one-element entries.
    #[must_use]
    pub fn from_flat(flat: &FlatMap) -> Self {
        let mut map = Self::new();
        for (name, value) in flat.iter() {
            map.add(name, value);
        }
        map
    }

    /// Collapses the map to one value per name, joining repeats with `", "`.
    #[must_use]
    pub fn to_flat(&self) -> FlatMap {
        FlatMap(
            self.entries
                .iter()
                .map(|(k, values)| (k.clone(), values.join(", ")))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MultiValueMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.add(k, v);
        }
        map
    }
}

impl Serialize for MultiValueMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MultiValueMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let visitor = OrderedVisitor::<Option<Vec<Option<String>>>>::new();
        let pairs = deserializer.deserialize_map(visitor)?;
        let mut map = Self::new();
        for (name, values) in pairs {
            // A null list still records the name so "present but empty" survives.
            let values = values.unwrap_or_default();
            if values.is_empty() {
                map.entries.push((name, Vec::new()));
                continue;
            }
            for value in values {
                map.add(name.clone(), value.unwrap_or_default());
            }
        }
        Ok(map)
    }
}

/// Single-valued map as used by the flat `headers` and
/// `queryStringParameters` fields. Keeps JSON order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatMap(pub Vec<(String, String)>);

impl FlatMap {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FlatMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Serialize for FlatMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FlatMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pairs = deserializer.deserialize_map(OrderedVisitor::<Option<String>>::new())?;
        Ok(Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k, v.unwrap_or_default()))
                .collect(),
        ))
    }
}

/// Reads a JSON object into `(key, value)` pairs without losing key order.
struct OrderedVisitor<V> {
    marker: PhantomData<V>,
}

impl<V> OrderedVisitor<V> {
    const fn new() -> Self {
        Self {
            marker: PhantomData,
        }
    }
}

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
    type Value = Vec<(String, V)>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            pairs.push((key, value));
        }
        Ok(pairs)
    }
}
