//! Rod controller for unattended play.
//!
//! Every own rod slides so that its closest figure lines up with the ball,
//! and swings through the ball when it comes within reach.

use foosball_shared::formation::{slot_of, RodId, ROD_COUNT};

use crate::rods::RodRack;
use crate::state::{BallState, RodState};

/// Lateral rod speed in units per second.
const TRACK_SPEED: f64 = 8.0;
/// Table-length distance at which a rod starts a kick.
const KICK_REACH: f64 = 0.9;
/// Swing angle of a kick, forward towards the opponent.
const KICK_SWING: f64 = 1.2;
const KICK_HOLD: f64 = 0.15;
const KICK_COOLDOWN: f64 = 0.5;
/// Offsets closer than this count as already there.
const SETTLE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RodCommand {
    pub rod: RodId,
    pub x: f64,
    pub rotation: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct KickTimer {
    hold: f64,
    cooldown: f64,
}

#[derive(Debug, Default)]
pub struct Autopilot {
    kicks: [KickTimer; ROD_COUNT],
}

impl Autopilot {
    /// Commands for the own rods that need to move this frame. `ball` is in
    /// the local frame.
    pub fn update(&mut self, dt: f64, ball: &BallState, rods: &RodRack) -> Vec<RodCommand> {
        let [ball_x, _, ball_z] = ball.position;
        let mut out = Vec::new();

        for id in rods.own_rods() {
            let timer = &mut self.kicks[id.index()];
            timer.hold = (timer.hold - dt).max(0.0);
            timer.cooldown = (timer.cooldown - dt).max(0.0);

            if (ball_z - rods.local_z(id)).abs() < KICK_REACH && timer.cooldown <= 0.0 {
                timer.hold = KICK_HOLD;
                timer.cooldown = KICK_COOLDOWN;
            }
            let rotation = if timer.hold > 0.0 { KICK_SWING } else { 0.0 };

            let current = rods.get(id);
            let target = tracking_offset(id, current, ball_x);
            let step = TRACK_SPEED * dt;
            let x = current.x + (target - current.x).clamp(-step, step);

            if (x - current.x).abs() > SETTLE || rotation != current.rotation {
                out.push(RodCommand { rod: id, x, rotation });
            }
        }
        out
    }
}

/// Rod offset that puts the figure nearest the ball directly in its path.
fn tracking_offset(id: RodId, current: RodState, ball_x: f64) -> f64 {
    slot_of(id)
        .figure_offsets()
        .into_iter()
        .map(|figure| ball_x - figure)
        .min_by(|a, b| (a - current.x).abs().total_cmp(&(b - current.x).abs()))
        .unwrap_or(current.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use foosball_shared::side::Side;

    const DT: f64 = 1.0 / 60.0;

    fn rod(index: usize) -> RodId {
        RodId::new(index).unwrap()
    }

    fn ball(x: f64, z: f64) -> BallState {
        BallState::at_rest([x, 0.55, z])
    }

    #[test]
    fn only_commands_own_rods() {
        let rack = RodRack::new(Side::P2, 2.0);
        let mut pilot = Autopilot::default();
        let cmds = pilot.update(DT, &ball(1.0, 0.0), &rack);
        assert!(!cmds.is_empty());
        assert!(cmds.iter().all(|c| rack.is_own(c.rod)));
    }

    #[test]
    fn goalkeeper_slides_toward_ball_at_bounded_speed() {
        let rack = RodRack::new(Side::P1, 2.0);
        let mut pilot = Autopilot::default();
        let cmds = pilot.update(DT, &ball(1.0, 5.0), &rack);
        let keeper = cmds.iter().find(|c| c.rod == rod(0)).unwrap();
        assert!((keeper.x - TRACK_SPEED * DT).abs() < 1e-12);
        assert_eq!(keeper.rotation, 0.0);
    }

    #[test]
    fn settled_rods_stay_quiet() {
        let mut rack = RodRack::new(Side::P1, 2.0);
        let mut pilot = Autopilot::default();
        let far = ball(0.0, 100.0);
        for _ in 0..10 {
            for cmd in pilot.update(DT, &far, &rack) {
                rack.place(cmd.rod, RodState { x: cmd.x, rotation: cmd.rotation })
                    .unwrap();
            }
        }
        assert!(pilot.update(DT, &far, &rack).is_empty());
    }

    #[test]
    fn kicks_when_ball_is_near_then_recovers() {
        let rack = RodRack::new(Side::P1, 2.0);
        let mut pilot = Autopilot::default();
        // Defence rod sits at z = -7 for p1.
        let cmds = pilot.update(DT, &ball(0.0, -7.2), &rack);
        let defence = cmds.iter().find(|c| c.rod == rod(1)).unwrap();
        assert_eq!(defence.rotation, KICK_SWING);

        let mut rotation = KICK_SWING;
        for _ in 0..20 {
            for cmd in pilot.update(DT, &ball(0.0, 3.0), &rack) {
                if cmd.rod == rod(1) {
                    rotation = cmd.rotation;
                }
            }
        }
        assert_eq!(rotation, 0.0);
    }

    #[test]
    fn picks_nearest_figure_to_track_with() {
        // Three-figure rod, figures at -2, 0, 2 relative to the rod.
        let offset = tracking_offset(rod(3), RodState::default(), 1.9);
        assert!((offset - (-0.1)).abs() < 1e-12);
    }
}
