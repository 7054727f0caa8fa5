//! Viewpoint transform between the two ends of the table.
//!
//! Both clients treat their own goal as the negative end of the table-length
//! (z) axis, so anything received from the other side has its z components
//! and its rod rotation sign-inverted. The lateral (x) axis runs parallel to
//! the goal lines and is shared as-is. The transform is its own inverse.

use foosball_shared::side::Side;

use crate::state::{BallState, RodState};

pub trait Mirror: Sized {
    /// The same state seen from the opposite end of the table.
    fn mirrored(self) -> Self;

    /// Convert state expressed in `origin`'s frame into `viewer`'s frame.
    fn to_local(self, origin: Side, viewer: Side) -> Self {
        if origin == viewer {
            self
        } else {
            self.mirrored()
        }
    }
}

impl Mirror for BallState {
    fn mirrored(self) -> Self {
        let [x, y, z] = self.position;
        let [vx, vy, vz] = self.velocity;
        Self {
            position: [x, y, -z],
            velocity: [vx, vy, -vz],
        }
    }
}

impl Mirror for RodState {
    fn mirrored(self) -> Self {
        Self {
            x: self.x,
            rotation: -self.rotation,
        }
    }
}
