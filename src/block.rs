//! Block identifiers and the two competing subtrees.

use std::fmt::Display;

/// Simulated time, in whole milliseconds.
pub type TimeMs = i64;

/// A unique identifier assigned to each mined block. Directly corresponds to
/// the order in which blocks were mined, starting from the genesis block `0`.
///
/// Negative identifiers never come from mining; they are reserved for
/// synthetic blocks minted by the adversary's borrowing mode.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct BlockId(pub i64);

impl BlockId {
    /// The block every honest node starts from.
    pub const GENESIS: BlockId = BlockId(0);

    /// Returns true if this block was synthesized rather than mined.
    #[inline]
    pub fn is_synthetic(&self) -> bool {
        self.0 < 0
    }
}

impl From<i64> for BlockId {
    fn from(value: i64) -> Self {
        BlockId(value)
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the two competing subtrees under the fork point.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Returns the competing side.
    #[inline]
    pub fn other(&self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "L"),
            Side::Right => write!(f, "R"),
        }
    }
}
