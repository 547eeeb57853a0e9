//! Prerequisite rules as normalized boolean trees.
//!
//! Catalog rules arrive as free text, nested structures, or not at all.
//! [`parse`] turns any of those into a [`PrerequisiteRule`]; evaluation
//! against a set of available courses is a pure recursive walk.

mod parse;

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::code::{base_code, normalize};

pub use parse::{parse, parse_text};

/// A normalized prerequisite expression.
///
/// Leaves hold a normalized course code, or a prefix pattern ending in `%`
/// that matches any course starting with that prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrereqTree {
    Leaf(String),
    All(Vec<PrereqTree>),
    Any(Vec<PrereqTree>),
}

/// A course's prerequisite rule after parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PrerequisiteRule {
    /// No prerequisite; always satisfied.
    #[default]
    None,
    /// A parsed boolean tree.
    Tree(PrereqTree),
    /// Rule text that could not be parsed. Always reported as satisfied;
    /// the text is kept for display.
    Unparsed(String),
}

/// The set of courses a prerequisite is checked against.
///
/// Exact leaves match on [`base_code`]; prefix leaves match any held code
/// that starts with the prefix.
#[derive(Debug, Clone, Default)]
pub struct Available {
    bases: HashSet<String>,
    codes: Vec<String>,
}

impl Available {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: &str) {
        let code = normalize(code);
        if self.bases.insert(base_code(&code)) || !self.codes.contains(&code) {
            self.codes.push(code);
        }
    }

    pub fn extend<I, S>(&mut self, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for code in codes {
            self.insert(code.as_ref());
        }
    }

    /// Returns `true` if `leaf` is satisfied by a held course.
    pub fn satisfies(&self, leaf: &str) -> bool {
        match leaf.strip_suffix('%') {
            Some(prefix) => self.codes.iter().any(|c| c.starts_with(prefix)),
            None => self.bases.contains(&base_code(leaf)),
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Available {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut available = Self::new();
        available.extend(iter);
        available
    }
}

impl PrereqTree {
    pub fn is_satisfied(&self, available: &Available) -> bool {
        match self {
            Self::Leaf(code) => available.satisfies(code),
            Self::All(children) => children.iter().all(|c| c.is_satisfied(available)),
            Self::Any(children) => children.iter().any(|c| c.is_satisfied(available)),
        }
    }

    /// The leaves that still need to be taken for this tree to hold.
    ///
    /// Empty when satisfied. For an unsatisfied `Any`, the cheapest branch
    /// (fewest missing leaves, earliest on ties) is reported.
    pub fn missing(&self, available: &Available) -> BTreeSet<String> {
        match self {
            Self::Leaf(code) => {
                if available.satisfies(code) {
                    BTreeSet::new()
                } else {
                    BTreeSet::from([code.clone()])
                }
            }
            Self::All(children) => children
                .iter()
                .flat_map(|c| c.missing(available))
                .collect(),
            Self::Any(children) => {
                let mut best: Option<BTreeSet<String>> = None;
                for child in children {
                    let missing = child.missing(available);
                    if missing.is_empty() {
                        return missing;
                    }
                    if best.as_ref().is_none_or(|b| missing.len() < b.len()) {
                        best = Some(missing);
                    }
                }
                best.unwrap_or_default()
            }
        }
    }

    /// Every leaf in the tree, in order of appearance.
    pub fn leaves(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Leaf(code) => out.push(code),
            Self::All(children) | Self::Any(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Flatten nested groups of the same kind, drop duplicate children and
    /// collapse single-child groups. Empty groups normalize to `None`.
    pub fn normalized(self) -> Option<Self> {
        match self {
            Self::Leaf(code) => Some(Self::Leaf(code)),
            Self::All(children) => Self::group(children, true),
            Self::Any(children) => Self::group(children, false),
        }
    }

    fn group(children: Vec<Self>, all: bool) -> Option<Self> {
        let mut flat: Vec<Self> = Vec::with_capacity(children.len());
        for child in children.into_iter().filter_map(Self::normalized) {
            let nested = match child {
                Self::All(inner) if all => inner,
                Self::Any(inner) if !all => inner,
                other => vec![other],
            };
            for node in nested {
                if !flat.contains(&node) {
                    flat.push(node);
                }
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ if all => Some(Self::All(flat)),
            _ => Some(Self::Any(flat)),
        }
    }
}

impl std::fmt::Display for PrereqTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Leaf(code) => f.write_str(code),
            Self::All(children) | Self::Any(children) => {
                let sep = if matches!(self, Self::All(_)) { " and " } else { " or " };
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl PrerequisiteRule {
    pub fn from_tree(tree: PrereqTree) -> Self {
        match tree.normalized() {
            Some(tree) => Self::Tree(tree),
            None => Self::None,
        }
    }

    pub fn tree(&self) -> Option<&PrereqTree> {
        match self {
            Self::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    /// `None` and `Unparsed` rules are always satisfied.
    pub fn is_satisfied(&self, available: &Available) -> bool {
        self.tree().is_none_or(|t| t.is_satisfied(available))
    }

    pub fn missing(&self, available: &Available) -> BTreeSet<String> {
        self.tree()
            .map(|t| t.missing(available))
            .unwrap_or_default()
    }

    /// Leaves of the tree, empty for `None`/`Unparsed`.
    pub fn leaves(&self) -> Vec<&str> {
        self.tree().map(PrereqTree::leaves).unwrap_or_default()
    }

    /// Human-readable rule text.
    pub fn describe(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Tree(tree) => tree.to_string(),
            Self::Unparsed(text) => text.clone(),
        }
    }
}
