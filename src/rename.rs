//! Rename table - maps candidate names through ordered old -> new pairs.
//!
//! A [`NamePattern`] is one of the closed set of ways a module identifier can
//! be embedded in a symbolic name. Each pattern carries its own match and
//! substitution rule; [`RenameTable::resolve`] applies the first pair whose
//! substitution changes the candidate, skipping pairs whose target already
//! prefixes it so an already-renamed name is never rewritten twice.

use crate::{Error, Result};

/// The closed set of substitution patterns for embedded identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePattern {
    /// A namespace position: the identifier itself, or an `Old.` lead.
    Namespace,
    /// An `Old.` prefix at the start of the name (string literals).
    DottedPrefix,
    /// Any embedded `Old.` segment (member names, dotted full names).
    DottedMember,
    /// A compiler-synthesized display-class prefix `<Old-`.
    BracketDisplay,
    /// A compiler-synthesized backing-field segment `<Old.`.
    BracketBacking,
    /// A generic explicit-override segment `<Old`.
    BracketOverride,
    /// Bare containment anywhere in the name (generic constraints).
    Bare,
}

impl NamePattern {
    /// Apply this pattern's substitution of `old` with `new` to `candidate`.
    /// Returns `None` when the pattern does not match.
    pub fn substitute(&self, candidate: &str, old: &str, new: &str) -> Option<String> {
        match self {
            NamePattern::Namespace => {
                if candidate == old {
                    return Some(new.to_string());
                }
                candidate
                    .strip_prefix(old)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .map(|rest| format!("{new}.{rest}"))
            }
            NamePattern::DottedPrefix => candidate
                .strip_prefix(&format!("{old}."))
                .map(|rest| format!("{new}.{rest}")),
            NamePattern::DottedMember => {
                replace_all(candidate, &format!("{old}."), &format!("{new}."))
            }
            NamePattern::BracketDisplay => candidate
                .strip_prefix(&format!("<{old}-"))
                .map(|rest| format!("<{new}-{rest}")),
            NamePattern::BracketBacking => {
                replace_all(candidate, &format!("<{old}."), &format!("<{new}."))
            }
            NamePattern::BracketOverride => {
                replace_all(candidate, &format!("<{old}"), &format!("<{new}"))
            }
            NamePattern::Bare => replace_all(candidate, old, new),
        }
    }
}

fn replace_all(candidate: &str, needle: &str, replacement: &str) -> Option<String> {
    if needle.is_empty() || !candidate.contains(needle) {
        return None;
    }
    Some(candidate.replace(needle, replacement))
}

/// One old -> new identifier pair.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RenamePair {
    old: String,
    new: String,
}

/// An ordered old -> new identifier mapping, one pair per rewrite job.
#[derive(Debug, Clone, Default)]
pub struct RenameTable {
    pairs: Vec<RenamePair>,
}

impl RenameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(old, new)` pairs, keeping declaration order.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let mut table = Self::new();
        for (old, new) in pairs {
            table.insert(old, new)?;
        }
        Ok(table)
    }

    /// Append a pair. Old identifiers must be unique across the table.
    pub fn insert(&mut self, old: String, new: String) -> Result<()> {
        if self.pairs.iter().any(|pair| pair.old == old) {
            return Err(Error::DuplicateJob(old));
        }
        self.pairs.push(RenamePair { old, new });
        Ok(())
    }

    /// Rewrite `candidate` with the first pair whose substitution changes it.
    ///
    /// Pairs whose target already prefixes the candidate are skipped, so
    /// e.g. `Foo -> Foo2` never touches a name starting with `Foo2`.
    pub fn resolve(&self, candidate: &str, pattern: NamePattern) -> Option<String> {
        for pair in &self.pairs {
            if candidate.starts_with(&pair.new) {
                continue;
            }
            if let Some(renamed) = pattern.substitute(candidate, &pair.old, &pair.new) {
                if renamed != candidate {
                    return Some(renamed);
                }
            }
        }
        None
    }

    /// Whether any pair would rewrite `candidate` under `pattern`.
    pub fn is_rewritable(&self, candidate: &str, pattern: NamePattern) -> bool {
        self.resolve(candidate, pattern).is_some()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
