use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::TableConfig;
use crate::formation::RodId;
use crate::score::ScoreState;
use crate::side::Side;

/// Protocol version - increment when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Connection identity assigned by the relay. Never reused within a process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn from_seq(seq: u64) -> Self {
        Self(seq.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// === Server -> Client ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Sent once to a peer that was given a side.
    Init(InitMsg),
    /// Sent once to a peer that arrived while both sides were taken.
    Spectator,
    RodMoved(RodMovedMsg),
    BallSynced(BallWire),
    ScoreSynced(ScoreState),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InitMsg {
    pub protocol_version: u32,
    pub side: Side,
    pub id: PeerId,
    /// The side whose ball and score updates are ground truth.
    pub authority: Side,
    pub config: TableConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RodMovedMsg {
    /// Connection that moved the rod.
    pub id: PeerId,
    #[ts(type = "string")]
    pub rod_id: RodId,
    pub x: f64,
    pub rotation: f64,
}

/// Ball position and linear velocity in the sender's frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BallWire {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
}

/// Rod lateral offset and rotation in the sender's frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RodWire {
    #[ts(type = "string")]
    pub rod_id: RodId,
    pub x: f64,
    pub rotation: f64,
}

// === Client -> Server ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMsg {
    RodMove(RodWire),
    BallSync(BallWire),
    ScoreUpdate(ScoreState),
}

impl ClientMsg {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMsg::RodMove(_) => "rodMove",
            ClientMsg::BallSync(_) => "ballSync",
            ClientMsg::ScoreUpdate(_) => "scoreUpdate",
        }
    }
}

impl RodMovedMsg {
    /// Tag a rod move with the connection it came from.
    pub fn tagged(id: PeerId, rod: RodWire) -> Self {
        Self {
            id,
            rod_id: rod.rod_id,
            x: rod.x,
            rotation: rod.rotation,
        }
    }

    pub fn rod(&self) -> RodWire {
        RodWire {
            rod_id: self.rod_id,
            x: self.x,
            rotation: self.rotation,
        }
    }
}
