//! Capability bounds declared by presets and reported by encoders.
//!
//! Encoders describe what they accept either as a closed range (`[ 1, 6 ]`) or
//! as a list of discrete values (`{ 48000, 44100 }`). Both shapes are modelled
//! by [`CapabilityBound`] and can be merged with each other.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Merges never enumerate more values than this; larger unions widen to a range
const MAX_ENUMERATED: u64 = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityBound {
    /// Inclusive range
    Range { min: u32, max: u32 },
    /// Sorted, de-duplicated set of allowed values
    DiscreteSet { values: Vec<u32> },
}

impl CapabilityBound {
    pub fn range(a: u32, b: u32) -> Self {
        Self::Range {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn discrete(values: impl IntoIterator<Item = u32>) -> Self {
        let mut values: Vec<u32> = values.into_iter().collect();
        values.sort_unstable();
        values.dedup();
        Self::DiscreteSet { values }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::DiscreteSet { values } if values.is_empty())
    }

    pub fn min(&self) -> Option<u32> {
        match self {
            Self::Range { min, .. } => Some(*min),
            Self::DiscreteSet { values } => values.first().copied(),
        }
    }

    pub fn max(&self) -> Option<u32> {
        match self {
            Self::Range { max, .. } => Some(*max),
            Self::DiscreteSet { values } => values.last().copied(),
        }
    }

    pub fn contains(&self, value: u32) -> bool {
        match self {
            Self::Range { min, max } => value >= *min && value <= *max,
            Self::DiscreteSet { values } => values.binary_search(&value).is_ok(),
        }
    }

    /// Number of distinct values allowed
    pub fn cardinality(&self) -> u64 {
        match self {
            Self::Range { min, max } => u64::from(*max) - u64::from(*min) + 1,
            Self::DiscreteSet { values } => values.len() as u64,
        }
    }

    /// True when every value allowed by `other` is allowed here
    pub fn covers(&self, other: &CapabilityBound) -> bool {
        match (self, other) {
            (_, Self::DiscreteSet { values }) => values.iter().all(|v| self.contains(*v)),
            (Self::Range { min, max }, Self::Range { min: omin, max: omax }) => {
                min <= omin && max >= omax
            }
            (Self::DiscreteSet { values }, Self::Range { min, max }) => {
                if other.cardinality() > values.len() as u64 {
                    return false;
                }
                (*min..=*max).all(|v| self.contains(v))
            }
        }
    }

    /// Union of two bounds.
    ///
    /// Overlapping or adjacent ranges stay a range, a discrete set that lies
    /// inside a range collapses into that range, everything else becomes a
    /// sorted discrete union. Unions too large to enumerate widen to the
    /// spanning range.
    pub fn merge(&self, other: &CapabilityBound) -> CapabilityBound {
        match (self, other) {
            (Self::DiscreteSet { values }, _) if values.is_empty() => other.clone(),
            (_, Self::DiscreteSet { values }) if values.is_empty() => self.clone(),
            (Self::Range { min: a0, max: a1 }, Self::Range { min: b0, max: b1 }) => {
                let adjacent = u64::from(*a0) <= u64::from(*b1) + 1
                    && u64::from(*b0) <= u64::from(*a1) + 1;
                if adjacent {
                    Self::Range {
                        min: (*a0).min(*b0),
                        max: (*a1).max(*b1),
                    }
                } else {
                    enumerated_union(self, other)
                }
            }
            (Self::DiscreteSet { values: a }, Self::DiscreteSet { values: b }) => {
                Self::discrete(a.iter().chain(b.iter()).copied())
            }
            (range @ Self::Range { .. }, set @ Self::DiscreteSet { .. })
            | (set @ Self::DiscreteSet { .. }, range @ Self::Range { .. }) => {
                if range.covers(set) {
                    range.clone()
                } else {
                    enumerated_union(self, other)
                }
            }
        }
    }

    /// Closest allowed value to `value`; ties go to the larger value
    pub fn fit(&self, value: u32) -> u32 {
        match self {
            Self::Range { min, max } => value.clamp(*min, *max),
            Self::DiscreteSet { values } => values
                .iter()
                .copied()
                .min_by_key(|v| (v.abs_diff(value), u32::MAX - v))
                .unwrap_or(value),
        }
    }

    fn values(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            Self::Range { min, max } => Box::new(*min..=*max),
            Self::DiscreteSet { values } => Box::new(values.iter().copied()),
        }
    }
}

fn enumerated_union(a: &CapabilityBound, b: &CapabilityBound) -> CapabilityBound {
    if a.cardinality() + b.cardinality() > MAX_ENUMERATED {
        let min = a.min().into_iter().chain(b.min()).min().unwrap_or(0);
        let max = a.max().into_iter().chain(b.max()).max().unwrap_or(0);
        return CapabilityBound::range(min, max);
    }
    CapabilityBound::discrete(a.values().chain(b.values()))
}

impl fmt::Display for CapabilityBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range { min, max } => write!(f, "[ {}, {} ]", min, max),
            Self::DiscreteSet { values } => {
                let joined: Vec<String> = values.iter().map(u32::to_string).collect();
                write!(f, "{{ {} }}", joined.join(", "))
            }
        }
    }
}

/// Bound values in preset files may be written as numbers or numeric strings
#[derive(Deserialize)]
#[serde(untagged)]
enum LenientValue {
    Number(u32),
    Text(String),
}

impl LenientValue {
    fn into_u32<E: serde::de::Error>(self) -> Result<u32, E> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid bound value '{}'", s))),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBound {
    List(Vec<LenientValue>),
    Range { min: LenientValue, max: LenientValue },
    Set { values: Vec<LenientValue> },
}

impl Serialize for CapabilityBound {
    /// Two-element lists read back as ranges, so a two-value set is written as an object
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Set<'a> {
            values: &'a [u32],
        }

        match self {
            Self::Range { min, max } => [*min, *max].serialize(serializer),
            Self::DiscreteSet { values } if values.len() == 2 => Set { values }.serialize(serializer),
            Self::DiscreteSet { values } => values.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CapabilityBound {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        fn collect<E: serde::de::Error>(values: Vec<LenientValue>) -> Result<Vec<u32>, E> {
            values.into_iter().map(LenientValue::into_u32).collect()
        }

        match RawBound::deserialize(deserializer)? {
            RawBound::List(values) => {
                let values = collect(values)?;
                if let [min, max] = values[..] {
                    Ok(Self::range(min, max))
                } else {
                    Ok(Self::discrete(values))
                }
            }
            RawBound::Range { min, max } => Ok(Self::range(min.into_u32()?, max.into_u32()?)),
            RawBound::Set { values } => Ok(Self::discrete(collect(values)?)),
        }
    }
}

/// Widen a preset-declared bound with whatever the installed encoder reports.
///
/// The result never rejects a value the encoder supports. When the encoder
/// bound is unknown the declared bound passes through unchanged.
pub fn resolve(declared: &CapabilityBound, reported: Option<&CapabilityBound>) -> CapabilityBound {
    match reported {
        Some(reported) => declared.merge(reported),
        None => declared.clone(),
    }
}

/// Closed `(min, max)` bound on a frame dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionBound {
    pub min: u32,
    pub max: u32,
}

impl DimensionBound {
    pub fn new(a: u32, b: u32) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Narrow this bound so it never exceeds what the encoder reports
    pub fn clamp_to(&self, reported: &CapabilityBound) -> DimensionBound {
        let mut min = self.min;
        let mut max = self.max;
        if let Some(rmin) = reported.min() {
            min = min.max(rmin);
        }
        if let Some(rmax) = reported.max() {
            max = max.min(rmax);
        }
        if min > max {
            min = max;
        }
        DimensionBound { min, max }
    }
}

impl Serialize for DimensionBound {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.min, self.max].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DimensionBound {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [a, b] = <[u32; 2]>::deserialize(deserializer)?;
        Ok(Self::new(a, b))
    }
}

/// One structure of an element's pad capabilities, e.g. `audio/x-raw` with its fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapsStructure {
    pub media_type: String,
    pub fields: BTreeMap<String, CapabilityBound>,
}

impl CapsStructure {
    pub fn new(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, bound: CapabilityBound) -> Self {
        self.fields.insert(name.into(), bound);
        self
    }

    pub fn field(&self, name: &str) -> Option<&CapabilityBound> {
        self.fields.get(name)
    }
}

/// Merge a field across every caps structure that mentions it
pub fn reported_bound(structures: &[CapsStructure], field: &str) -> Option<CapabilityBound> {
    structures
        .iter()
        .filter_map(|s| s.field(field))
        .fold(None, |acc: Option<CapabilityBound>, bound| match acc {
            Some(acc) => Some(acc.merge(bound)),
            None => Some(bound.clone()),
        })
}
