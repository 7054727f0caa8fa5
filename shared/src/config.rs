/// Match rules and table geometry both peers must agree on.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    /// Table-length coordinate past which the ball is inside a goal
    pub goal_threshold: f64,
    /// Goals needed to win the match
    pub win_score: u32,
    /// Rod lateral offset is clamped to +/- this value
    pub rod_travel: f64,
    /// Where the ball is dropped after a goal that does not end the match
    pub ball_restart: [f64; 3],
    /// Length of the slow-motion replay after the deciding goal (seconds)
    pub replay_seconds: f64,
    /// Physics time scale while the replay runs
    pub replay_time_scale: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            goal_threshold: 10.5,
            win_score: 5,
            rod_travel: 2.0,
            ball_restart: [0.0, 5.0, 0.0],
            replay_seconds: 5.0,
            replay_time_scale: 0.1,
        }
    }
}

impl TableConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.goal_threshold.is_finite() || self.goal_threshold <= 0.0 {
            return Err("goal_threshold must be finite and > 0".to_string());
        }
        if self.win_score == 0 {
            return Err("win_score must be >= 1".to_string());
        }
        if !self.rod_travel.is_finite() || self.rod_travel <= 0.0 {
            return Err("rod_travel must be finite and > 0".to_string());
        }
        if self.ball_restart.iter().any(|c| !c.is_finite()) {
            return Err("ball_restart must be finite".to_string());
        }
        if self.ball_restart[2].abs() >= self.goal_threshold {
            return Err("ball_restart must lie between the goal lines".to_string());
        }
        if !self.replay_seconds.is_finite() || self.replay_seconds < 0.0 {
            return Err("replay_seconds must be finite and >= 0".to_string());
        }
        if !(self.replay_time_scale > 0.0 && self.replay_time_scale <= 1.0) {
            return Err("replay_time_scale must be in (0, 1]".to_string());
        }
        Ok(())
    }
}
