//! Loss classification - auditable fidelity claims for every conversion
//!
//! Five levels, ordered from best to worst:
//! - `L0`: byte-identical (raw source replayed verbatim)
//! - `L1`: semantically lossless (regenerated from IR structure)
//! - `L2`: minor loss (some metadata or fine markup dropped)
//! - `L3`: significant loss (text kept, most markup gone)
//! - `L4`: text-only / unconvertible

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fidelity level of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LossClass {
    L0,
    L1,
    L2,
    L3,
    L4,
}

impl LossClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            LossClass::L0 => "L0",
            LossClass::L1 => "L1",
            LossClass::L2 => "L2",
            LossClass::L3 => "L3",
            LossClass::L4 => "L4",
        }
    }

    /// Human-readable summary of the level
    pub fn description(&self) -> &'static str {
        match self {
            LossClass::L0 => "byte-identical round trip",
            LossClass::L1 => "semantically lossless",
            LossClass::L2 => "minor loss",
            LossClass::L3 => "significant loss",
            LossClass::L4 => "text-only",
        }
    }

    /// Get all loss classes
    pub fn all() -> &'static [LossClass] {
        &[LossClass::L0, LossClass::L1, LossClass::L2, LossClass::L3, LossClass::L4]
    }

    /// The lower-fidelity of two classes
    pub fn worst(self, other: LossClass) -> LossClass {
        self.max(other)
    }

    pub fn is_byte_exact(&self) -> bool {
        *self == LossClass::L0
    }
}

impl FromStr for LossClass {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L0" => Ok(LossClass::L0),
            "L1" => Ok(LossClass::L1),
            "L2" => Ok(LossClass::L2),
            "L3" => Ok(LossClass::L3),
            "L4" => Ok(LossClass::L4),
            _ => Err(Error::InvalidArgument(format!("Unknown loss class: {}", s))),
        }
    }
}

impl fmt::Display for LossClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured account of what a conversion preserved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossReport {
    pub source_format: String,
    pub target_format: String,
    pub loss_class: LossClass,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lost_elements: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl LossReport {
    /// A report with nothing lost
    pub fn clean(source_format: impl Into<String>, target_format: impl Into<String>, loss_class: LossClass) -> Self {
        Self {
            source_format: source_format.into(),
            target_format: target_format.into(),
            loss_class,
            lost_elements: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.lost_elements.is_empty() && self.warnings.is_empty()
    }
}

/// Accumulates losses while a codec walks its input.
///
/// Starts at a floor class (L1 for regeneration) and only ever degrades.
/// Each distinct lost element is recorded once.
#[derive(Debug, Clone)]
pub struct LossTracker {
    source_format: String,
    target_format: String,
    class: LossClass,
    lost_elements: Vec<String>,
    warnings: Vec<String>,
}

impl LossTracker {
    pub fn new(source_format: impl Into<String>, target_format: impl Into<String>, floor: LossClass) -> Self {
        Self {
            source_format: source_format.into(),
            target_format: target_format.into(),
            class: floor,
            lost_elements: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record a dropped element and lower the class to at least `class`
    pub fn degrade(&mut self, class: LossClass, element: impl Into<String>) {
        self.class = self.class.worst(class);
        let element = element.into();
        if !self.lost_elements.contains(&element) {
            self.lost_elements.push(element);
        }
    }

    /// Record a free-text warning without changing the class
    pub fn warn(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn class(&self) -> LossClass {
        self.class
    }

    pub fn finish(self) -> (LossClass, LossReport) {
        let report = LossReport {
            source_format: self.source_format,
            target_format: self.target_format,
            loss_class: self.class,
            lost_elements: self.lost_elements,
            warnings: self.warnings,
        };
        (self.class, report)
    }
}
