use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::side::Side;

/// Goal counters for both sides. The relay stores the latest value and every
/// seated peer adopts each broadcast verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ScoreState {
    pub p1: u32,
    pub p2: u32,
}

impl ScoreState {
    pub fn new(p1: u32, p2: u32) -> Self {
        Self { p1, p2 }
    }

    pub fn get(&self, side: Side) -> u32 {
        match side {
            Side::P1 => self.p1,
            Side::P2 => self.p2,
        }
    }

    /// Add one goal for `side` and return its new counter.
    pub fn increment(&mut self, side: Side) -> u32 {
        let counter = match side {
            Side::P1 => &mut self.p1,
            Side::P2 => &mut self.p2,
        };
        *counter = counter.saturating_add(1);
        *counter
    }

    /// The side whose counter has reached `win_score`, if any.
    ///
    /// Only one side can get there within a match because the authority stops
    /// evaluating goals as soon as the first one does.
    pub fn winner(&self, win_score: u32) -> Option<MatchResult> {
        Side::ALL
            .into_iter()
            .find(|side| self.get(*side) >= win_score)
            .map(|winner| MatchResult { winner })
    }
}

impl std::fmt::Display for ScoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.p1, self.p2)
    }
}

/// Outcome of a finished match. Derived from a `ScoreState`, never sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub winner: Side,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Victory,
    Defeat,
}

impl MatchResult {
    /// How the result reads from the point of view of `side`.
    pub fn outcome_for(&self, side: Side) -> Outcome {
        if self.winner == side {
            Outcome::Victory
        } else {
            Outcome::Defeat
        }
    }
}
