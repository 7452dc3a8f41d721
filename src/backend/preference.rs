//! Preferences - named configuration values tuning a backend

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single named configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Preference {
    name: String,
    value: String,
}

impl Preference {
    /// Create a new preference.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Get the preference name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the preference value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Immutable set of preferences keyed by name.
///
/// Iteration is sorted by name, so the string form and every derived
/// collection (cross products, labelling orders) are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PreferenceSet {
    entries: BTreeMap<String, Preference>,
}

impl PreferenceSet {
    /// The empty preference set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a builder accumulating preferences.
    #[must_use]
    pub fn builder() -> PreferenceSetBuilder {
        PreferenceSetBuilder::new()
    }

    /// Look up a preference by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Preference> {
        self.entries.get(name)
    }

    /// Number of preferences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the preferences in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Preference> {
        self.entries.values()
    }
}

impl fmt::Display for PreferenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, pref) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{pref}")?;
        }
        f.write_str("]")
    }
}

impl FromIterator<Preference> for PreferenceSet {
    fn from_iter<I: IntoIterator<Item = Preference>>(iter: I) -> Self {
        iter.into_iter()
            .fold(PreferenceSetBuilder::new(), PreferenceSetBuilder::add)
            .assemble()
    }
}

impl<'a> IntoIterator for &'a PreferenceSet {
    type Item = &'a Preference;
    type IntoIter = std::collections::btree_map::Values<'a, String, Preference>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

/// Builder for `PreferenceSet`.
///
/// Later preferences with an already seen name replace the earlier value.
#[derive(Debug, Default)]
pub struct PreferenceSetBuilder {
    entries: BTreeMap<String, Preference>,
}

impl PreferenceSetBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a preference.
    #[must_use]
    pub fn add(mut self, preference: Preference) -> Self {
        self.entries
            .insert(preference.name().to_string(), preference);
        self
    }

    /// Add a preference from its name and value.
    #[must_use]
    pub fn set(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(Preference::new(name, value))
    }

    /// Add every preference of an existing set.
    #[must_use]
    pub fn extend(self, preferences: &PreferenceSet) -> Self {
        preferences.iter().cloned().fold(self, Self::add)
    }

    /// Freeze the accumulated preferences.
    #[must_use]
    pub fn assemble(self) -> PreferenceSet {
        PreferenceSet {
            entries: self.entries,
        }
    }
}
