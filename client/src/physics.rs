//! Boundary to the physics engine.
//!
//! The sync core never looks inside the engine: it reads and overwrites the
//! ball body, places rod bodies, and asks for a step. Browser and native
//! front ends wrap their own engine behind `TablePhysics`; `KinematicTable`
//! is a small stand-in for headless play and tests.

use foosball_shared::config::TableConfig;
use foosball_shared::formation::{slot_of, RodId, ROD_COUNT, ROD_HEIGHT};

use crate::state::{BallState, RodState};

pub trait TablePhysics {
    fn ball(&self) -> BallState;

    /// Overwrite the ball body wholesale.
    fn set_ball(&mut self, ball: BallState);

    /// Put the ball at `position` with zero linear and angular velocity.
    fn reset_ball(&mut self, position: [f64; 3]);

    /// Place a rod body. `z` is the rod's table-length position in the local
    /// frame.
    fn set_rod(&mut self, id: RodId, z: f64, rod: RodState);

    fn step(&mut self, dt: f64);
}

pub const BALL_RADIUS: f64 = 0.3;
pub const HALF_WIDTH: f64 = 5.0;
pub const GOAL_HALF_WIDTH: f64 = 1.5;
pub const GOAL_HEIGHT: f64 = 1.5;
pub const GOAL_DEPTH: f64 = 1.0;

const GRAVITY: f64 = -9.82;
const FLOOR_Y: f64 = 0.25;
const RESTITUTION: f64 = 0.7;
const ROLLING_DAMPING: f64 = 0.4;
const FIGURE_HALF_WIDTH: f64 = 0.3;
const FIGURE_HALF_DEPTH: f64 = 0.2;
/// Figures stop blocking once swung further than this from hanging down.
const FIGURE_SWING_LIMIT: f64 = 0.6;
const KICK_SPEED: f64 = 6.0;

#[derive(Debug, Clone, Copy)]
struct RodBody {
    z: f64,
    state: RodState,
}

/// Point-mass ball on a walled table with simple figure collisions.
///
/// The end walls stand on the goal lines, so only a ball inside a goal
/// mouth can get past `goal_line`.
#[derive(Debug, Clone)]
pub struct KinematicTable {
    ball: BallState,
    spin: [f64; 3],
    rods: [Option<RodBody>; ROD_COUNT],
    goal_line: f64,
}

impl Default for KinematicTable {
    fn default() -> Self {
        Self::new(TableConfig::default().goal_threshold)
    }
}

impl KinematicTable {
    pub fn new(goal_line: f64) -> Self {
        Self {
            ball: BallState::at_rest([0.0, 2.0, 0.0]),
            spin: [0.0; 3],
            rods: [None; ROD_COUNT],
            goal_line,
        }
    }

    pub fn goal_line(&self) -> f64 {
        self.goal_line
    }

    pub fn spin(&self) -> [f64; 3] {
        self.spin
    }

    fn in_goal_mouth(&self) -> bool {
        let [x, y, _] = self.ball.position;
        x.abs() < GOAL_HALF_WIDTH && y < GOAL_HEIGHT
    }

    fn collide_walls(&mut self) {
        let limit_x = HALF_WIDTH - BALL_RADIUS;
        let [x, _, z] = self.ball.position;
        if x.abs() > limit_x {
            self.ball.position[0] = limit_x.copysign(x);
            self.ball.velocity[0] = -self.ball.velocity[0] * RESTITUTION;
        }

        let limit_z = self.goal_line - BALL_RADIUS;
        if z.abs() > limit_z {
            if self.in_goal_mouth() {
                // Inside the goal box; the back of the net stops it.
                let back = self.goal_line + GOAL_DEPTH - BALL_RADIUS;
                if z.abs() > back {
                    self.ball.position[2] = back.copysign(z);
                    self.ball.velocity[2] = 0.0;
                }
            } else {
                self.ball.position[2] = limit_z.copysign(z);
                self.ball.velocity[2] = -self.ball.velocity[2] * RESTITUTION;
            }
        }

        let floor = FLOOR_Y + BALL_RADIUS;
        if self.ball.position[1] < floor {
            self.ball.position[1] = floor;
            if self.ball.velocity[1] < 0.0 {
                self.ball.velocity[1] = -self.ball.velocity[1] * RESTITUTION;
            }
        }
    }

    fn collide_figures(&mut self) {
        let [bx, by, bz] = self.ball.position;
        if by - BALL_RADIUS > ROD_HEIGHT {
            return;
        }
        for (index, body) in self.rods.iter().enumerate() {
            let Some(body) = body else { continue };
            if body.state.wrapped_rotation().abs() > FIGURE_SWING_LIMIT {
                continue;
            }
            let dz = bz - body.z;
            if dz.abs() > FIGURE_HALF_DEPTH + BALL_RADIUS {
                continue;
            }
            let Some(rod) = RodId::new(index) else { continue };
            let hit = slot_of(rod)
                .figure_offsets()
                .into_iter()
                .any(|offset| (bx - body.state.x - offset).abs() < FIGURE_HALF_WIDTH + BALL_RADIUS);
            if !hit {
                continue;
            }
            // Push the ball out of the figure and send it away from the rod,
            // harder when the rod is mid-swing.
            let away = if dz >= 0.0 { 1.0 } else { -1.0 };
            let swing = body.state.wrapped_rotation().abs() / FIGURE_SWING_LIMIT;
            let speed = (self.ball.velocity[2].abs() * RESTITUTION).max(KICK_SPEED * swing);
            self.ball.position[2] = body.z + away * (FIGURE_HALF_DEPTH + BALL_RADIUS);
            self.ball.velocity[2] = away * speed;
            return;
        }
    }
}

impl TablePhysics for KinematicTable {
    fn ball(&self) -> BallState {
        self.ball
    }

    fn set_ball(&mut self, ball: BallState) {
        self.ball = ball;
    }

    fn reset_ball(&mut self, position: [f64; 3]) {
        self.ball = BallState::at_rest(position);
        self.spin = [0.0; 3];
    }

    fn set_rod(&mut self, id: RodId, z: f64, rod: RodState) {
        self.rods[id.index()] = Some(RodBody { z, state: rod });
    }

    fn step(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        self.ball.velocity[1] += GRAVITY * dt;
        for axis in 0..3 {
            self.ball.position[axis] += self.ball.velocity[axis] * dt;
        }

        let resting = self.ball.position[1] <= FLOOR_Y + BALL_RADIUS + 1e-6;
        if resting {
            let damping = (1.0 - ROLLING_DAMPING * dt).max(0.0);
            self.ball.velocity[0] *= damping;
            self.ball.velocity[2] *= damping;
        }
        // Rolling without slipping, about the axis perpendicular to travel.
        self.spin = [
            self.ball.velocity[2] / BALL_RADIUS,
            0.0,
            -self.ball.velocity[0] / BALL_RADIUS,
        ];

        self.collide_walls();
        self.collide_figures();
    }
}
