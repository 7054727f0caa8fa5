use foosball_shared::formation::RodId;
use foosball_shared::protocol::{BallWire, RodWire};

/// Ball position and linear velocity, as exchanged with the physics engine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BallState {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

impl BallState {
    pub fn at_rest(position: [f64; 3]) -> Self {
        Self {
            position,
            velocity: [0.0; 3],
        }
    }

    pub fn from_wire(w: &BallWire) -> Self {
        Self {
            position: [w.x, w.y, w.z],
            velocity: [w.vx, w.vy, w.vz],
        }
    }

    pub fn to_wire(&self) -> BallWire {
        BallWire {
            x: self.position[0],
            y: self.position[1],
            z: self.position[2],
            vx: self.velocity[0],
            vy: self.velocity[1],
            vz: self.velocity[2],
        }
    }
}

/// Lateral offset and rotation of one rod.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RodState {
    pub x: f64,
    /// Radians around the rod's own axis. Not wrapped.
    pub rotation: f64,
}

impl RodState {
    pub fn from_wire(w: &RodWire) -> Self {
        Self {
            x: w.x,
            rotation: w.rotation,
        }
    }

    pub fn to_wire(&self, rod_id: RodId) -> RodWire {
        RodWire {
            rod_id,
            x: self.x,
            rotation: self.rotation,
        }
    }

    /// Orientation as an `[x, y, z, w]` quaternion about the rod axis, for
    /// engines that store body rotation as quaternions.
    pub fn quaternion(&self) -> [f64; 4] {
        let half = self.rotation * 0.5;
        [half.sin(), 0.0, 0.0, half.cos()]
    }

    /// Rotation folded into (-PI, PI].
    pub fn wrapped_rotation(&self) -> f64 {
        let tau = std::f64::consts::TAU;
        let r = self.rotation.rem_euclid(tau);
        if r > std::f64::consts::PI {
            r - tau
        } else {
            r
        }
    }
}
