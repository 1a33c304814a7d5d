//! Parallel dimension kinds and the fixed-size bitmap over them.
//!
//! A kernel launch has a two-level hardware hierarchy: a grid of blocks,
//! each a grid of threads, both up to three-dimensional. Every iteration
//! dimension of a tensor may be bound to one of these six axes.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};
use std::str::FromStr;

// ─── ParallelType ─────────────────────────────────────────────────

/// One axis of the block/thread launch hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParallelType {
    BIDx,
    BIDy,
    BIDz,
    TIDx,
    TIDy,
    TIDz,
}

impl ParallelType {
    /// All kinds in bitmap order.
    pub const ALL: [ParallelType; 6] = [
        ParallelType::BIDx,
        ParallelType::BIDy,
        ParallelType::BIDz,
        ParallelType::TIDx,
        ParallelType::TIDy,
        ParallelType::TIDz,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Bit position in `ParallelTypeBitmap`.
    pub fn index(self) -> usize {
        match self {
            ParallelType::BIDx => 0,
            ParallelType::BIDy => 1,
            ParallelType::BIDz => 2,
            ParallelType::TIDx => 3,
            ParallelType::TIDy => 4,
            ParallelType::TIDz => 5,
        }
    }

    /// Block-level (grid) axis.
    pub fn is_block(self) -> bool {
        matches!(
            self,
            ParallelType::BIDx | ParallelType::BIDy | ParallelType::BIDz
        )
    }

    /// Thread-level (within a block) axis.
    pub fn is_thread(self) -> bool {
        !self.is_block()
    }

    /// Name used by the textual fusion format.
    pub fn short_name(self) -> &'static str {
        match self {
            ParallelType::BIDx => "bidx",
            ParallelType::BIDy => "bidy",
            ParallelType::BIDz => "bidz",
            ParallelType::TIDx => "tidx",
            ParallelType::TIDy => "tidy",
            ParallelType::TIDz => "tidz",
        }
    }

    /// CUDA builtin index name (`blockIdx.x`, `threadIdx.z`, ...).
    pub fn cuda_name(self) -> &'static str {
        match self {
            ParallelType::BIDx => "blockIdx.x",
            ParallelType::BIDy => "blockIdx.y",
            ParallelType::BIDz => "blockIdx.z",
            ParallelType::TIDx => "threadIdx.x",
            ParallelType::TIDy => "threadIdx.y",
            ParallelType::TIDz => "threadIdx.z",
        }
    }

    /// Component letter of the axis (`x`, `y` or `z`).
    pub fn axis(self) -> char {
        match self {
            ParallelType::BIDx | ParallelType::TIDx => 'x',
            ParallelType::BIDy | ParallelType::TIDy => 'y',
            ParallelType::BIDz | ParallelType::TIDz => 'z',
        }
    }
}

impl fmt::Display for ParallelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cuda_name())
    }
}

impl FromStr for ParallelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParallelType::ALL
            .into_iter()
            .find(|pt| pt.short_name() == s || pt.cuda_name() == s)
            .ok_or_else(|| format!("unknown parallel type '{}'", s))
    }
}

// ─── ParallelTypeBitmap ───────────────────────────────────────────

/// A set of `ParallelType`s, one bit per kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ParallelTypeBitmap(u8);

impl ParallelTypeBitmap {
    const MASK: u8 = (1 << ParallelType::COUNT) - 1;

    pub fn new() -> Self {
        Self(0)
    }

    /// Bitmap with every kind set.
    pub fn full() -> Self {
        Self(Self::MASK)
    }

    pub fn get(self, pt: ParallelType) -> bool {
        self.0 & (1 << pt.index()) != 0
    }

    pub fn set(&mut self, pt: ParallelType, value: bool) {
        if value {
            self.0 |= 1 << pt.index();
        } else {
            self.0 &= !(1 << pt.index());
        }
    }

    pub fn none(self) -> bool {
        self.0 == 0
    }

    pub fn any(self) -> bool {
        self.0 != 0
    }

    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Every kind paired with its membership, in `ParallelType::ALL` order.
    pub fn iter(self) -> impl Iterator<Item = (ParallelType, bool)> {
        ParallelType::ALL.into_iter().map(move |pt| (pt, self.get(pt)))
    }

    /// Only the kinds present in the set.
    pub fn iter_set(self) -> impl Iterator<Item = ParallelType> {
        self.iter().filter_map(|(pt, on)| on.then_some(pt))
    }
}

impl BitOr for ParallelTypeBitmap {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ParallelTypeBitmap {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ParallelTypeBitmap {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for ParallelTypeBitmap {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for ParallelTypeBitmap {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0 & Self::MASK)
    }
}

impl FromIterator<ParallelType> for ParallelTypeBitmap {
    fn from_iter<I: IntoIterator<Item = ParallelType>>(iter: I) -> Self {
        let mut bits = Self::new();
        for pt in iter {
            bits.set(pt, true);
        }
        bits
    }
}

impl fmt::Display for ParallelTypeBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter_set().map(ParallelType::short_name).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}
