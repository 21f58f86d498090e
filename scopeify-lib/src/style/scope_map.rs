// src/style/scope_map.rs: the rename table shared by the engines and the DOM passes.
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// An insertion-ordered mapping from original selector fragments to their scoped names.
///
/// Keys are unique; inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default)]
pub struct SelectorMap {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl SelectorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a mapping, returning the previous replacement for `original`.
    pub fn insert(&mut self, original: impl Into<String>, scoped: impl Into<String>) -> Option<String> {
        let original = original.into();
        let scoped = scoped.into();
        match self.positions.get(&original) {
            Some(&position) => Some(std::mem::replace(&mut self.entries[position].1, scoped)),
            None => {
                self.positions.insert(original.clone(), self.entries.len());
                self.entries.push((original, scoped));
                None
            }
        }
    }

    /// Returns the replacement for `original`, creating it with `make` on first use.
    pub fn get_or_insert_with(&mut self, original: &str, make: impl FnOnce() -> String) -> &str {
        let position = match self.positions.get(original) {
            Some(&position) => position,
            None => {
                self.positions
                    .insert(original.to_string(), self.entries.len());
                self.entries.push((original.to_string(), make()));
                self.entries.len() - 1
            }
        };
        &self.entries[position].1
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.positions
            .get(original)
            .map(|&position| self.entries[position].1.as_str())
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(original, scoped)| (original.as_str(), scoped.as_str()))
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, scoped)| scoped.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for SelectorMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for SelectorMap {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SelectorMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = SelectorMap::new();
        for (original, scoped) in iter {
            map.insert(original, scoped);
        }
        map
    }
}

impl Serialize for SelectorMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (original, scoped) in &self.entries {
            map.serialize_entry(original, scoped)?;
        }
        map.end()
    }
}

struct SelectorMapVisitor;

impl<'de> Visitor<'de> for SelectorMapVisitor {
    type Value = SelectorMap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of original selector names to scoped names")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = SelectorMap::new();
        while let Some((original, scoped)) = access.next_entry::<String, String>()? {
            map.insert(original, scoped);
        }
        Ok(map)
    }
}

impl<'de> Deserialize<'de> for SelectorMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SelectorMapVisitor)
    }
}

/// The rename table produced by a scoping engine for one stylesheet.
///
/// Read-only once DOM rewriting begins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopeMap {
    /// Class selector key (possibly several space-separated tokens) => replacement class.
    pub classes: SelectorMap,
    /// Lowercase tag name or `*` => class added to every matching element.
    pub elements: SelectorMap,
    /// Original id => replacement id.
    pub ids: SelectorMap,
    /// Original `@font-face` family name => replacement name.
    pub font_faces: SelectorMap,
    /// Original `@keyframes` name => replacement name.
    pub keyframes: SelectorMap,
}

impl ScopeMap {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
            && self.elements.is_empty()
            && self.ids.is_empty()
            && self.font_faces.is_empty()
            && self.keyframes.is_empty()
    }
}

/// What an engine hands back: the rename table plus the scoped CSS text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedStyles {
    pub map: ScopeMap,
    pub css: String,
}

impl ScopedStyles {
    /// The scoped CSS text, ready to be put back into the document.
    pub fn css(&self) -> &str {
        &self.css
    }
}

impl fmt::Display for ScopeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections = [
            ("classes", &self.classes),
            ("elements", &self.elements),
            ("ids", &self.ids),
            ("fontFaces", &self.font_faces),
            ("keyframes", &self.keyframes),
        ];
        for (name, map) in sections {
            writeln!(f, "{name}:")?;
            for (original, scoped) in map.iter() {
                writeln!(f, "  {original} => {scoped}")?;
            }
        }
        Ok(())
    }
}
