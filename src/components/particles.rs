//! XSD particle occurrence bounds
//!
//! Particles carry `(minOccurs, maxOccurs)`. Arithmetic on the maximum
//! saturates at `unbounded` so bound propagation through nested groups can
//! never overflow.

use std::fmt;

/// Upper occurrence bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaxOccurs {
    /// A finite bound
    Bounded(u32),
    /// `maxOccurs="unbounded"`
    Unbounded,
}

impl MaxOccurs {
    /// Parse from the attribute value
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "unbounded" => Some(MaxOccurs::Unbounded),
            n => n.parse().ok().map(MaxOccurs::Bounded),
        }
    }

    /// The finite bound, if any
    pub fn bound(&self) -> Option<u32> {
        match self {
            MaxOccurs::Bounded(n) => Some(*n),
            MaxOccurs::Unbounded => None,
        }
    }

    /// Saturating sum
    pub fn add(self, other: MaxOccurs) -> MaxOccurs {
        match (self, other) {
            (MaxOccurs::Bounded(a), MaxOccurs::Bounded(b)) => {
                a.checked_add(b).map_or(MaxOccurs::Unbounded, MaxOccurs::Bounded)
            }
            _ => MaxOccurs::Unbounded,
        }
    }

    /// Saturating product; zero absorbs unbounded
    pub fn mul(self, other: MaxOccurs) -> MaxOccurs {
        match (self, other) {
            (MaxOccurs::Bounded(0), _) | (_, MaxOccurs::Bounded(0)) => MaxOccurs::Bounded(0),
            (MaxOccurs::Bounded(a), MaxOccurs::Bounded(b)) => {
                a.checked_mul(b).map_or(MaxOccurs::Unbounded, MaxOccurs::Bounded)
            }
            _ => MaxOccurs::Unbounded,
        }
    }

    /// Larger of two bounds
    pub fn max(self, other: MaxOccurs) -> MaxOccurs {
        match (self, other) {
            (MaxOccurs::Bounded(a), MaxOccurs::Bounded(b)) => MaxOccurs::Bounded(a.max(b)),
            _ => MaxOccurs::Unbounded,
        }
    }

    /// Smaller of two bounds
    pub fn min(self, other: MaxOccurs) -> MaxOccurs {
        match (self, other) {
            (MaxOccurs::Bounded(a), MaxOccurs::Bounded(b)) => MaxOccurs::Bounded(a.min(b)),
            (MaxOccurs::Bounded(a), MaxOccurs::Unbounded)
            | (MaxOccurs::Unbounded, MaxOccurs::Bounded(a)) => MaxOccurs::Bounded(a),
            _ => MaxOccurs::Unbounded,
        }
    }

    /// True if `count` goes past this bound
    pub fn is_exceeded(&self, count: u32) -> bool {
        match self {
            MaxOccurs::Bounded(n) => count > *n,
            MaxOccurs::Unbounded => false,
        }
    }
}

impl fmt::Display for MaxOccurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxOccurs::Bounded(n) => write!(f, "{}", n),
            MaxOccurs::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (default 1)
    pub max: MaxOccurs,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: MaxOccurs) -> Self {
        Self { min, max }
    }

    /// Bounded `{min, max}`
    pub fn range(min: u32, max: u32) -> Self {
        Self::new(min, MaxOccurs::Bounded(max))
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self::range(1, 1)
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self::range(0, 1)
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self::new(0, MaxOccurs::Unbounded)
    }

    /// One or more (1, unbounded)
    pub fn one_or_more() -> Self {
        Self::new(1, MaxOccurs::Unbounded)
    }

    /// Empty (0, 0)
    pub fn empty() -> Self {
        Self::range(0, 0)
    }

    /// Check if this particle can be empty (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if this particle contributes nothing (maxOccurs == 0)
    pub fn is_empty(&self) -> bool {
        self.max == MaxOccurs::Bounded(0)
    }

    /// Check if this is exactly (1, 1)
    pub fn is_once(&self) -> bool {
        self.min == 1 && self.max == MaxOccurs::Bounded(1)
    }

    /// Bounds that need an iteration counter: m > 1 or a finite n > 1
    pub fn needs_counter(&self) -> bool {
        self.min > 1 || matches!(self.max, MaxOccurs::Bounded(n) if n > 1)
    }

    /// Multiply both bounds (nested particle under a group)
    pub fn times(&self, outer: &Occurs) -> Occurs {
        Occurs {
            min: self.min.saturating_mul(outer.min),
            max: self.max.mul(outer.max),
        }
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{},{}}}", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurs_constructors() {
        assert!(Occurs::once().is_once());
        assert!(Occurs::optional().is_emptiable());
        assert!(Occurs::empty().is_empty());
        assert_eq!(Occurs::zero_or_more().max, MaxOccurs::Unbounded);
        assert_eq!(Occurs::default(), Occurs::once());
    }

    #[test]
    fn test_needs_counter() {
        assert!(!Occurs::once().needs_counter());
        assert!(!Occurs::optional().needs_counter());
        assert!(!Occurs::zero_or_more().needs_counter());
        assert!(!Occurs::one_or_more().needs_counter());
        assert!(Occurs::range(1, 2).needs_counter());
        assert!(Occurs::range(2, 2).needs_counter());
        assert!(Occurs::new(2, MaxOccurs::Unbounded).needs_counter());
    }

    #[test]
    fn test_max_saturation() {
        let big = MaxOccurs::Bounded(u32::MAX);
        assert_eq!(big.add(MaxOccurs::Bounded(1)), MaxOccurs::Unbounded);
        assert_eq!(big.mul(MaxOccurs::Bounded(2)), MaxOccurs::Unbounded);
        assert_eq!(MaxOccurs::Unbounded.mul(MaxOccurs::Bounded(0)), MaxOccurs::Bounded(0));
        assert_eq!(
            MaxOccurs::Bounded(3).min(MaxOccurs::Unbounded),
            MaxOccurs::Bounded(3)
        );
        assert_eq!(
            MaxOccurs::Bounded(3).max(MaxOccurs::Bounded(5)),
            MaxOccurs::Bounded(5)
        );
    }

    #[test]
    fn test_times() {
        let inner = Occurs::range(1, 2);
        let outer = Occurs::range(2, 2);
        assert_eq!(inner.times(&outer), Occurs::range(2, 4));
        assert_eq!(
            Occurs::optional().times(&Occurs::one_or_more()),
            Occurs::zero_or_more()
        );
    }

    #[test]
    fn test_parse_max() {
        assert_eq!(MaxOccurs::from_str("unbounded"), Some(MaxOccurs::Unbounded));
        assert_eq!(MaxOccurs::from_str(" 7 "), Some(MaxOccurs::Bounded(7)));
        assert_eq!(MaxOccurs::from_str("-1"), None);
        assert_eq!(Occurs::range(1, 3).to_string(), "{1,3}");
    }
}
