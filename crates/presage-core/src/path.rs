#![forbid(unsafe_code)]

//! Gap-allocated structural node paths.
//!
//! A [`NodePath`] identifies a position in a UI tree. Each segment is a `u32`
//! assigned when the tree is built, not derived from array indices at diff
//! time. The `n`-th child slot of an element receives segment
//! `(n + 1) * PATH_GAP`, which leaves `PATH_GAP - 1` free values between any
//! two siblings. New siblings can be slotted in with [`NodePath::between`]
//! without renumbering anything that already exists.
//!
//! Paths are rendered as dot-joined, zero-padded hex segments:
//!
//! ```
//! use presage_core::path::NodePath;
//!
//! let path = NodePath::root().child(0).child(2);
//! assert_eq!(path.to_string(), "00010000.00030000");
//! assert_eq!(path.parent(), Some(NodePath::root().child(0)));
//! assert_eq!("00010000.00030000".parse::<NodePath>().unwrap(), path);
//! ```
//!
//! The root path has no segments and renders as the empty string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

/// Distance between the segments of two consecutive child slots.
pub const PATH_GAP: u32 = 0x0001_0000;

/// Highest child slot index that still maps to a distinct segment.
pub const MAX_CHILD_SLOTS: usize = (u32::MAX / PATH_GAP) as usize - 1;

/// Error returned when parsing a path string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathParseError {
    /// Two dots in a row, or a leading/trailing dot.
    EmptySegment {
        /// Zero-based index of the offending segment.
        index: usize,
    },
    /// A segment that is not valid hex or does not fit in `u32`.
    InvalidSegment {
        /// Zero-based index of the offending segment.
        index: usize,
        /// The raw segment text.
        segment: String,
    },
}

impl fmt::Display for PathParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySegment { index } => write!(f, "empty path segment at index {index}"),
            Self::InvalidSegment { index, segment } => {
                write!(f, "invalid path segment {segment:?} at index {index}")
            }
        }
    }
}

impl std::error::Error for PathParseError {}

/// Stable structural identifier of a UI tree position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath {
    segments: SmallVec<[u32; 8]>,
}

impl NodePath {
    /// The root path (no segments).
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from raw segments.
    #[must_use]
    pub fn from_segments(segments: &[u32]) -> Self {
        Self {
            segments: SmallVec::from_slice(segments),
        }
    }

    /// Segment assigned to child slot `index`.
    ///
    /// Slots past [`MAX_CHILD_SLOTS`] saturate; tree validation reports them.
    #[inline]
    #[must_use]
    pub fn slot_segment(index: usize) -> u32 {
        u32::try_from(index.saturating_add(1))
            .ok()
            .and_then(|slot| slot.checked_mul(PATH_GAP))
            .unwrap_or(u32::MAX)
    }

    /// First gap-boundary segment strictly after `prev`.
    ///
    /// `0` stands for "no previous sibling", so the first slot is
    /// `PATH_GAP`. Saturates like [`NodePath::slot_segment`].
    #[inline]
    #[must_use]
    pub fn segment_after(prev: u32) -> u32 {
        (prev / PATH_GAP)
            .checked_add(1)
            .and_then(|slot| slot.checked_mul(PATH_GAP))
            .unwrap_or(u32::MAX)
    }

    /// Path of child slot `index` below this path.
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        self.child_segment(Self::slot_segment(index))
    }

    /// Path of the child with an explicit segment value below this path.
    #[must_use]
    pub fn child_segment(&self, segment: u32) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    /// A sibling path strictly between `self` and `next`.
    ///
    /// Both paths must share a parent and `self` must sort before `next`.
    /// Returns `None` when the paths are not siblings or no free segment is
    /// left between them.
    #[must_use]
    pub fn between(&self, next: &Self) -> Option<Self> {
        let (lo, hi) = (self.last_segment()?, next.last_segment()?);
        if self.parent() != next.parent() || hi <= lo || hi - lo < 2 {
            return None;
        }
        self.parent()
            .map(|parent| parent.child_segment(lo + (hi - lo) / 2))
    }

    /// Parent path, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let len = self.segments.len() - 1;
        Some(Self::from_segments(&self.segments[..len]))
    }

    /// Number of segments.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the root path.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Raw segments.
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    /// Last segment, or `None` for the root.
    #[inline]
    #[must_use]
    pub fn last_segment(&self) -> Option<u32> {
        self.segments.last().copied()
    }

    /// Whether `self` equals `prefix` or lies below it.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Whether `self` is the direct parent of `other`.
    #[must_use]
    pub fn is_parent_of(&self, other: &Self) -> bool {
        other.depth() == self.depth() + 1 && other.starts_with(self)
    }

    /// Convert to slot indices when every segment sits on a gap boundary.
    ///
    /// Returns `None` for paths containing inserted (between-gap) segments.
    #[must_use]
    pub fn to_slot_indices(&self) -> Option<Vec<usize>> {
        self.segments
            .iter()
            .map(|&seg| {
                (seg != 0 && seg % PATH_GAP == 0).then(|| (seg / PATH_GAP - 1) as usize)
            })
            .collect()
    }

    /// Build a path from slot indices.
    #[must_use]
    pub fn from_slot_indices(indices: &[usize]) -> Self {
        Self {
            segments: indices.iter().map(|&i| Self::slot_segment(i)).collect(),
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{seg:08x}")?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = SmallVec::new();
        for (index, raw) in s.split('.').enumerate() {
            if raw.is_empty() {
                return Err(PathParseError::EmptySegment { index });
            }
            let seg = u32::from_str_radix(raw, 16).map_err(|_| PathParseError::InvalidSegment {
                index,
                segment: raw.to_string(),
            })?;
            segments.push(seg);
        }
        Ok(Self { segments })
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
