//! Backend descriptors: kind + preferences, spec-string parsing and
//! preference cross products.
//!
//! Spec-string grammar:
//!
//! ```text
//! spec  := name | name '[' [entry (',' entry)*] ']'
//! entry := key '=' value
//! ```
//!
//! `name` is matched case-insensitively against the known backend kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::preference::{Preference, PreferenceSet, PreferenceSetBuilder};
use crate::{Error, Result};

/// The known decision backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendKind {
    /// ProB constraint solver (default backend)
    Prob,
    /// Kodkod relational model finder
    Kodkod,
    /// Z3 SMT solver
    Z3,
    /// Combined ProB/SMT interpreter
    Smt,
}

impl BackendKind {
    /// All kinds, in keyword order.
    pub const ALL: [Self; 4] = [Self::Prob, Self::Kodkod, Self::Z3, Self::Smt];

    /// Upper-case keyword identifying the kind.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Prob => "PROB",
            Self::Kodkod => "KODKOD",
            Self::Z3 => "Z3",
            Self::Smt => "SMT",
        }
    }

    /// Match a backend name case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for unknown names
    pub fn from_name(name: &str) -> Result<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.keyword().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::Config(format!("unknown backend '{name}'")))
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// Classify free text by the first backend keyword it contains.
///
/// Keywords only match whole alphanumeric tokens (case-insensitive), so
/// `Problem` is not `PROB`; the earliest matching token wins.
///
/// # Errors
///
/// Returns `Error::Config` if no keyword occurs in the line
pub fn match_backend(line: &str) -> Result<BackendKind> {
    line.split(|c: char| !c.is_ascii_alphanumeric())
        .find_map(|token| {
            BackendKind::ALL
                .into_iter()
                .find(|kind| kind.keyword().eq_ignore_ascii_case(token))
        })
        .ok_or_else(|| Error::Config(format!("no backend keyword in '{line}'")))
}

/// Largest preference set [`cross_produce`] expands (`2^16` variants).
pub const MAX_CROSS_PREFERENCES: usize = 16;

/// Power set of a preference set, one subset per backend variant.
///
/// Yields `2^n` distinct sets for `n` preferences, from the empty set
/// (bitmask `0`) to the full set, in bitmask order over the name-sorted
/// preferences.
///
/// # Errors
///
/// Returns `Error::Config` for sets of more than [`MAX_CROSS_PREFERENCES`]
/// preferences
pub fn cross_produce(preferences: &PreferenceSet) -> Result<Vec<PreferenceSet>> {
    let prefs: Vec<&Preference> = preferences.iter().collect();
    if prefs.len() > MAX_CROSS_PREFERENCES {
        return Err(Error::Config(format!(
            "cannot cross-produce {} preferences (at most {MAX_CROSS_PREFERENCES})",
            prefs.len()
        )));
    }
    let variants = 1usize << prefs.len();

    Ok((0..variants)
        .map(|mask| {
            prefs
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .fold(PreferenceSetBuilder::new(), |builder, (_, pref)| {
                    builder.add((*pref).clone())
                })
                .assemble()
        })
        .collect())
}

/// Identifies a backend variant: its kind plus the preferences it applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendDescriptor {
    kind: BackendKind,
    preferences: PreferenceSet,
}

impl BackendDescriptor {
    /// Create a descriptor.
    #[must_use]
    pub const fn new(kind: BackendKind, preferences: PreferenceSet) -> Self {
        Self { kind, preferences }
    }

    /// Descriptor of a kind without preferences.
    #[must_use]
    pub fn plain(kind: BackendKind) -> Self {
        Self::new(kind, PreferenceSet::empty())
    }

    /// Parse `name` or `name[K1=V1,K2=V2,...]`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the name is unknown or the preference list
    /// is malformed
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let Some(open) = spec.find('[') else {
            return Ok(Self::plain(BackendKind::from_name(spec)?));
        };

        let kind = BackendKind::from_name(&spec[..open])?;
        let rest = &spec[open + 1..];
        let close = rest
            .find(']')
            .ok_or_else(|| Error::Config(format!("missing ']' in backend spec '{spec}'")))?;
        if !rest[close + 1..].trim().is_empty() {
            return Err(Error::Config(format!(
                "unexpected text after ']' in backend spec '{spec}'"
            )));
        }

        let body = rest[..close].trim();
        let mut builder = PreferenceSetBuilder::new();
        if !body.is_empty() {
            for entry in body.split(',') {
                let (key, value) = entry.split_once('=').ok_or_else(|| {
                    Error::Config(format!("preference '{}' lacks '=' in '{spec}'", entry.trim()))
                })?;
                let key = key.trim();
                if key.is_empty() {
                    return Err(Error::Config(format!("empty preference name in '{spec}'")));
                }
                builder = builder.set(key, value.trim());
            }
        }

        Ok(Self::new(kind, builder.assemble()))
    }

    /// Get the backend kind.
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Get the preferences applied by this backend.
    #[must_use]
    pub const fn preferences(&self) -> &PreferenceSet {
        &self.preferences
    }

    /// One descriptor of the same kind per subset of the preferences.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if there are too many preferences to expand
    pub fn cross_produce(&self) -> Result<Vec<Self>> {
        Ok(cross_produce(&self.preferences)?
            .into_iter()
            .map(|prefs| Self::new(self.kind, prefs))
            .collect())
    }
}

impl fmt::Display for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.preferences.is_empty() {
            f.write_str("[")?;
            for (i, pref) in self.preferences.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{pref}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl FromStr for BackendDescriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_plain_name_case_insensitive() {
        let desc = BackendDescriptor::parse("kodKod").unwrap();
        assert_eq!(desc.kind(), BackendKind::Kodkod);
        assert!(desc.preferences().is_empty());
    }

    #[test]
    fn test_parse_with_preferences() {
        let desc = BackendDescriptor::parse("prob[TIME_OUT=2500, CLPFD=TRUE]").unwrap();
        assert_eq!(desc.kind(), BackendKind::Prob);
        assert_eq!(desc.preferences().len(), 2);
        assert_eq!(desc.to_string(), "PROB[CLPFD=TRUE,TIME_OUT=2500]");
    }

    #[test]
    fn test_parse_empty_brackets() {
        let desc = BackendDescriptor::parse("Z3[]").unwrap();
        assert_eq!(desc, BackendDescriptor::plain(BackendKind::Z3));
    }

    #[test]
    fn test_parse_rejects_malformed_specs() {
        for spec in [
            "",
            "cvc5",
            "prob[A=1",
            "prob[A]",
            "prob[=1]",
            "prob[A=1]x",
        ] {
            let result = BackendDescriptor::parse(spec);
            assert!(
                matches!(result, Err(Error::Config(_))),
                "spec '{spec}' should be rejected"
            );
        }
    }

    #[test]
    fn test_display_parses_back() {
        let desc = BackendDescriptor::parse("SMT[SMT_SUPPORTED_INTERPRETER=TRUE]").unwrap();
        let reparsed: BackendDescriptor = desc.to_string().parse().unwrap();
        assert_eq!(desc, reparsed);
    }

    #[test]
    fn test_match_backend_first_keyword_wins() {
        assert_eq!(match_backend("Using z3 after ProB").unwrap(), BackendKind::Z3);
        assert_eq!(
            match_backend("prob backend, kodkod disabled").unwrap(),
            BackendKind::Prob
        );
        assert!(match_backend("no solver here").is_err());
    }

    #[test]
    fn test_match_backend_whole_tokens_only() {
        assert_eq!(
            match_backend("Problem: kodkod failed").unwrap(),
            BackendKind::Kodkod
        );
        assert_eq!(match_backend("[z3-4.12] sat").unwrap(), BackendKind::Z3);
        assert!(match_backend("Problems with SMTLIB").is_err());
    }

    #[test]
    fn test_cross_produce_small() {
        let prefs = PreferenceSet::builder().set("A", "1").set("B", "2").assemble();
        let subsets = cross_produce(&prefs).unwrap();

        assert_eq!(subsets.len(), 4);
        assert_eq!(subsets[0], PreferenceSet::empty());
        assert_eq!(subsets[3], prefs);
    }

    #[test]
    fn test_descriptor_cross_produce_keeps_kind() {
        let desc = BackendDescriptor::parse("kodkod[A=1,B=2,C=3]").unwrap();
        let variants = desc.cross_produce().unwrap();
        assert_eq!(variants.len(), 8);
        assert!(variants.iter().all(|v| v.kind() == BackendKind::Kodkod));
        assert_eq!(variants.iter().collect::<HashSet<_>>().len(), 8);
    }

    #[test]
    fn test_cross_produce_rejects_oversized_sets() {
        let prefs: PreferenceSet = (0..64)
            .map(|i| Preference::new(format!("P{i:02}"), "1"))
            .collect();
        assert!(matches!(cross_produce(&prefs), Err(Error::Config(_))));

        let at_cap: PreferenceSet = (0..MAX_CROSS_PREFERENCES)
            .map(|i| Preference::new(format!("P{i:02}"), "1"))
            .collect();
        assert_eq!(cross_produce(&at_cap).unwrap().len(), 1 << MAX_CROSS_PREFERENCES);

        let desc = BackendDescriptor::new(BackendKind::Prob, prefs);
        assert!(desc.cross_produce().is_err());
    }

    // Property-based tests (Toyota Way: Jidoka)
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: cross product of n preferences has 2^n distinct members
            #[test]
            fn prop_cross_produce_power_set(
                names in prop::collection::btree_set("[A-Z]{1,6}", 0..8)
            ) {
                let prefs: PreferenceSet = names
                    .iter()
                    .map(|n| Preference::new(n.clone(), "TRUE"))
                    .collect();

                let subsets = cross_produce(&prefs).unwrap();
                let distinct: HashSet<_> = subsets.iter().cloned().collect();

                prop_assert_eq!(subsets.len(), 1 << names.len());
                prop_assert_eq!(distinct.len(), subsets.len());
                prop_assert!(distinct.contains(&PreferenceSet::empty()));
                prop_assert!(distinct.contains(&prefs));
            }

            /// Property: cross product is deterministic run-to-run
            #[test]
            fn prop_cross_produce_deterministic(
                names in prop::collection::btree_set("[A-Z]{1,6}", 0..6)
            ) {
                let prefs: PreferenceSet = names
                    .iter()
                    .map(|n| Preference::new(n.clone(), "1"))
                    .collect();
                prop_assert_eq!(cross_produce(&prefs).unwrap(), cross_produce(&prefs).unwrap());
            }
        }
    }
}
