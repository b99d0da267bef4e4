//! Spatial domains carried by every symbol.
//!
//! A `Domain` is an ordered list of named regions (for example the negative
//! electrode, separator and positive electrode of a cell). Domains decide
//! which symbols may be combined:
//!
//! - binary operations need equal domains, or one side without a domain
//! - concatenations join children on disjoint regions, in canonical order
//! - broadcasts lift a domain-less symbol onto a domain

use std::fmt;

use itertools::Itertools;

use crate::errors::ConstructionError;

pub const NEGATIVE_ELECTRODE: &str = "negative electrode";
pub const SEPARATOR: &str = "separator";
pub const POSITIVE_ELECTRODE: &str = "positive electrode";
pub const NEGATIVE_PARTICLE: &str = "negative particle";
pub const POSITIVE_PARTICLE: &str = "positive particle";
pub const CURRENT_COLLECTOR: &str = "current collector";

/// Regions making up a full cell, through-thickness.
pub const WHOLE_CELL: [&str; 3] = [NEGATIVE_ELECTRODE, SEPARATOR, POSITIVE_ELECTRODE];

/// Order in which concatenated regions must appear. Regions not listed here
/// rank after all listed ones and keep the order they were given in.
const CANONICAL_ORDER: [&str; 6] = [
    NEGATIVE_ELECTRODE,
    SEPARATOR,
    POSITIVE_ELECTRODE,
    NEGATIVE_PARTICLE,
    POSITIVE_PARTICLE,
    CURRENT_COLLECTOR,
];

fn rank(region: &str) -> usize {
    CANONICAL_ORDER
        .iter()
        .position(|known| *known == region)
        .unwrap_or(CANONICAL_ORDER.len())
}

/// The named spatial region(s) over which a symbol is defined.
///
/// An empty domain means the symbol is not tied to any region (a plain
/// scalar, a parameter, a state entry without spatial meaning).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Domain {
    regions: Vec<String>,
}

impl Domain {
    /// The domain of symbols without spatial meaning.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a domain from a list of regions.
    ///
    /// # Errors
    /// Returns `ConstructionError::DuplicateRegion` if a region is listed twice.
    pub fn new<I, S>(regions: I) -> Result<Self, ConstructionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let regions: Vec<String> = regions.into_iter().map(Into::into).collect();
        if let Some(duplicate) = regions.iter().duplicates().next() {
            return Err(ConstructionError::DuplicateRegion(duplicate.clone()));
        }
        Ok(Self { regions })
    }

    /// A domain made of a single region.
    pub fn region(name: impl Into<String>) -> Self {
        Self {
            regions: vec![name.into()],
        }
    }

    /// Negative electrode, separator and positive electrode.
    pub fn whole_cell() -> Self {
        Self {
            regions: WHOLE_CELL.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn contains(&self, region: &str) -> bool {
        self.regions.iter().any(|r| r == region)
    }

    pub fn is_disjoint(&self, other: &Domain) -> bool {
        !self.regions.iter().any(|r| other.contains(r))
    }

    /// Domain of the result of a binary operation between `self` and `other`.
    ///
    /// # Errors
    /// Returns `ConstructionError::DomainMismatch` when both sides have a
    /// domain and the domains differ.
    pub fn combine(&self, other: &Domain) -> Result<Domain, ConstructionError> {
        if other.is_empty() || self == other {
            Ok(self.clone())
        } else if self.is_empty() {
            Ok(other.clone())
        } else {
            Err(ConstructionError::DomainMismatch {
                left: self.clone(),
                right: other.clone(),
            })
        }
    }

    /// Domain of a concatenation of children living on `parts`.
    ///
    /// Every part must be non-empty, the parts must be pairwise disjoint, and
    /// their regions must follow the canonical order.
    pub fn concatenate(parts: &[&Domain]) -> Result<Domain, ConstructionError> {
        if parts.is_empty() {
            return Err(ConstructionError::EmptyConcatenation);
        }
        if let Some(index) = parts.iter().position(|d| d.is_empty()) {
            return Err(ConstructionError::UndefinedChildDomain { index });
        }

        let regions: Vec<String> = parts
            .iter()
            .flat_map(|d| d.regions.iter().cloned())
            .collect();
        if let Some(overlap) = regions.iter().duplicates().next() {
            return Err(ConstructionError::OverlappingDomains(overlap.clone()));
        }

        let expected: Vec<String> = regions
            .iter()
            .cloned()
            .sorted_by_key(|r| rank(r))
            .collect();
        if expected != regions {
            return Err(ConstructionError::NonCanonicalOrder {
                found: Domain { regions },
                expected: Domain { regions: expected },
            });
        }

        Ok(Domain { regions })
    }

    /// Checks that `parts` partition `self` exactly once, in canonical order.
    pub fn check_partition(&self, parts: &[&Domain]) -> Result<(), ConstructionError> {
        let union = Domain::concatenate(parts)?;
        if &union != self {
            return Err(ConstructionError::PartitionMismatch {
                expected: self.clone(),
                found: union,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.regions.iter().join(", "))
    }
}

impl From<&str> for Domain {
    fn from(region: &str) -> Self {
        Domain::region(region)
    }
}
