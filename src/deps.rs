//! Dependency specifications and their translation into build requests
//!
//! A [`Dependencies`] set maps a module name to a version constraint. The
//! `k6` entry names the primary module; every other entry is an extension
//! handed to the build service. Constraint text is kept exactly as given:
//! the build service owns its syntax.

use crate::build::BuildDependency;
use crate::error::{ProviderError, ProviderResult};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Name of the primary module
pub const K6_MODULE: &str = "k6";

/// Constraint used when the primary module is not listed
pub const ANY_VERSION: &str = "*";

/// Characters that start a constraint and never appear in a module name
const CONSTRAINT_CHARS: &[char] = &['<', '>', '=', '!', '~', '^', '*', ':', ',', '|'];

/// A named dependency with its version constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub constraints: String,
}

impl Dependency {
    /// Create a dependency from a name and a constraint expression.
    ///
    /// An empty constraint means any version.
    pub fn new(name: impl Into<String>, constraints: &str) -> ProviderResult<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ProviderError::dependency(name, "empty dependency name"));
        }
        if let Some(c) = trimmed
            .chars()
            .find(|c| c.is_whitespace() || CONSTRAINT_CHARS.contains(c))
        {
            return Err(ProviderError::dependency(
                trimmed,
                format!("unexpected {c:?} in dependency name"),
            ));
        }

        let constraints = match constraints.trim() {
            "" => ANY_VERSION,
            expr => expr,
        };

        Ok(Self {
            name: trimmed.to_string(),
            constraints: constraints.to_string(),
        })
    }
}

/// Parses `NAME`, `NAME:CONSTRAINT`, `NAME=CONSTRAINT` or `NAME<op>VERSION`.
///
/// The name ends at the first `:`, `=` or operator character. A `:` or `=`
/// there is a separator and is dropped, so `k6==0.50.0` yields the
/// constraint `=0.50.0`; any other operator starts the constraint, so
/// `k6>=0.50.0` yields `>=0.50.0`. A bare name means any version.
impl FromStr for Dependency {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.find(|c: char| CONSTRAINT_CHARS.contains(&c) && c != ',' && c != '|') {
            Some(at) => {
                let (name, rest) = s.split_at(at);
                let constraints = rest
                    .strip_prefix(':')
                    .or_else(|| rest.strip_prefix('='))
                    .unwrap_or(rest);
                Self::new(name, constraints)
            }
            None => Self::new(s, ANY_VERSION),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.constraints)
    }
}

/// A set of dependencies keyed by name, iterated in name order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    entries: BTreeMap<String, Dependency>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency, replacing any previous entry with the same name
    pub fn insert(&mut self, dep: Dependency) -> Option<Dependency> {
        self.entries.insert(dep.name.clone(), dep)
    }

    /// Parse a list of dependency arguments
    pub fn parse_all<S: AsRef<str>>(args: &[S]) -> ProviderResult<Self> {
        let mut deps = Self::new();
        for arg in args {
            deps.insert(arg.as_ref().parse()?);
        }
        Ok(deps)
    }

    /// Build from a name → constraint mapping
    pub fn from_pairs<I, K, V>(pairs: I) -> ProviderResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut deps = Self::new();
        for (name, constraints) in pairs {
            deps.insert(Dependency::new(name, constraints.as_ref())?);
        }
        Ok(deps)
    }

    pub fn get(&self, name: &str) -> Option<&Dependency> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.entries.values()
    }
}

/// Split a dependency set into the primary `k6` constraint and the
/// extensions to build with it.
///
/// The primary constraint defaults to `*` when `k6` is absent. Extension
/// constraints are copied verbatim, in name order.
pub fn translate(deps: &Dependencies) -> (String, Vec<BuildDependency>) {
    let mut k6_constraint = ANY_VERSION.to_string();
    let mut build_deps = Vec::with_capacity(deps.len());

    for dep in deps.iter() {
        if dep.name == K6_MODULE {
            k6_constraint = dep.constraints.clone();
            continue;
        }

        build_deps.push(BuildDependency {
            name: dep.name.clone(),
            constraints: dep.constraints.clone(),
        });
    }

    (k6_constraint, build_deps)
}
