//! Goal detection and the round/match state machine.

use foosball_shared::config::TableConfig;
use foosball_shared::score::{MatchResult, ScoreState};
use foosball_shared::side::Side;

/// Which side scored, if the ball at table-length position `z` (in the
/// authority's frame) is inside a goal.
///
/// The authority defends the negative end, so a ball past `+threshold` is a
/// goal for the authority and a ball past `-threshold` is a goal for its
/// opponent. Exactly on the threshold is not a goal.
pub fn detect_goal(z: f64, threshold: f64, authority: Side) -> Option<Side> {
    if z > threshold {
        Some(authority)
    } else if z < -threshold {
        Some(authority.opponent())
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Playing,
    /// Slow-motion presentation after the deciding goal. No gameplay state
    /// changes while it runs.
    Replay { result: MatchResult, remaining: f64 },
    ResultShown { result: MatchResult },
}

/// What the authority does after counting a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalOutcome {
    RoundReset { scorer: Side },
    MatchEnd { result: MatchResult },
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    phase: Phase,
    config: TableConfig,
}

impl Lifecycle {
    pub fn new(config: TableConfig) -> Self {
        Self {
            phase: Phase::Playing,
            config,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase == Phase::Playing
    }

    pub fn is_replaying(&self) -> bool {
        matches!(self.phase, Phase::Replay { .. })
    }

    /// Physics time scale for the current phase.
    pub fn time_scale(&self) -> f64 {
        if self.is_replaying() {
            self.config.replay_time_scale
        } else {
            1.0
        }
    }

    fn start_replay(&mut self, result: MatchResult) {
        tracing::info!("Match won by {}, starting replay", result.winner);
        self.phase = Phase::Replay {
            result,
            remaining: self.config.replay_seconds,
        };
    }

    /// Authority only: a goal has just been counted into `score`.
    pub fn goal_scored(&mut self, scorer: Side, score: &ScoreState) -> GoalOutcome {
        match score.winner(self.config.win_score) {
            Some(result) => {
                self.start_replay(result);
                GoalOutcome::MatchEnd { result }
            }
            None => GoalOutcome::RoundReset { scorer },
        }
    }

    /// A score broadcast arrived. Starts the replay when it decides the match
    /// and play is still running; repeated broadcasts change nothing.
    pub fn score_received(&mut self, score: &ScoreState) -> Option<MatchResult> {
        if !self.is_playing() {
            return None;
        }
        let result = score.winner(self.config.win_score)?;
        self.start_replay(result);
        Some(result)
    }

    /// Advance the replay clock by `real_dt` seconds of wall time. Returns the
    /// result on the frame the replay finishes.
    pub fn advance(&mut self, real_dt: f64) -> Option<MatchResult> {
        let Phase::Replay { result, remaining } = self.phase else {
            return None;
        };
        let remaining = remaining - real_dt;
        if remaining > 0.0 {
            self.phase = Phase::Replay { result, remaining };
            None
        } else {
            self.phase = Phase::ResultShown { result };
            Some(result)
        }
    }

    /// Leave the result screen for a new match. Only valid from `ResultShown`.
    pub fn restart(&mut self) -> bool {
        if matches!(self.phase, Phase::ResultShown { .. }) {
            self.phase = Phase::Playing;
            true
        } else {
            false
        }
    }
}
