//! Rod identifiers and the reference 1-4-3-3 formation.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::side::Side;

/// Number of rods on the table.
pub const ROD_COUNT: usize = 8;

/// Height of the rod axis above the table origin.
pub const ROD_HEIGHT: f64 = 1.5;

/// Stable identifier of a formation slot, written `rod_<n>` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RodId(u8);

impl RodId {
    pub fn new(index: usize) -> Option<Self> {
        (index < ROD_COUNT).then_some(Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = RodId> {
        (0..ROD_COUNT as u8).map(RodId)
    }
}

impl fmt::Display for RodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rod_{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRodIdError(String);

impl fmt::Display for ParseRodIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown rod id {:?}", self.0)
    }
}

impl std::error::Error for ParseRodIdError {}

impl FromStr for RodId {
    type Err = ParseRodIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("rod_")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(RodId::new)
            .ok_or_else(|| ParseRodIdError(s.to_string()))
    }
}

impl Serialize for RodId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RodId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// One rod of the formation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RodSlot {
    pub id: RodId,
    pub side: Side,
    /// Position along the table-length axis in p1's frame.
    pub z: f64,
    /// Figures mounted on the rod.
    pub figures: u8,
}

impl RodSlot {
    /// Table-length position of the rod in `viewer`'s frame.
    pub fn local_z(&self, viewer: Side) -> f64 {
        match viewer {
            Side::P1 => self.z,
            Side::P2 => -self.z,
        }
    }

    /// Lateral offsets of the figures relative to the rod's own offset.
    pub fn figure_offsets(&self) -> Vec<f64> {
        let spacing = match self.figures {
            1 => 0.0,
            4 => 1.8,
            _ => 2.0,
        };
        let centre = (self.figures as f64 - 1.0) / 2.0;
        (0..self.figures)
            .map(|i| (i as f64 - centre) * spacing)
            .collect()
    }
}

const fn slot(index: u8, side: Side, z: f64, figures: u8) -> RodSlot {
    RodSlot {
        id: RodId(index),
        side,
        z,
        figures,
    }
}

/// Goalkeeper, defence, midfield and attack for both sides, ordered along
/// the table from p1's goal to p2's goal.
pub const FORMATION: [RodSlot; ROD_COUNT] = [
    slot(0, Side::P1, -9.0, 1),
    slot(1, Side::P1, -7.0, 4),
    slot(2, Side::P2, -4.0, 3),
    slot(3, Side::P1, -1.0, 3),
    slot(4, Side::P2, 1.0, 3),
    slot(5, Side::P1, 4.0, 3),
    slot(6, Side::P2, 7.0, 4),
    slot(7, Side::P2, 9.0, 1),
];

pub fn slot_of(id: RodId) -> &'static RodSlot {
    &FORMATION[id.index()]
}
