use foosball_shared::formation::{slot_of, RodId, ROD_COUNT};
use foosball_shared::side::Side;

use crate::state::RodState;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum RodError {
    #[error("{rod} belongs to {owner}")]
    NotOwned { rod: RodId, owner: Side },
    #[error("{0} is controlled locally and ignores remote updates")]
    LocallyOwned(RodId),
}

/// Every rod on the table, from one client's point of view.
///
/// Rods of the local side are written only by local moves; the other side's
/// rods are read-only replicas written only by remote updates.
#[derive(Debug, Clone)]
pub struct RodRack {
    viewer: Side,
    travel: f64,
    rods: [RodState; ROD_COUNT],
}

impl RodRack {
    pub fn new(viewer: Side, travel: f64) -> Self {
        Self {
            viewer,
            travel,
            rods: [RodState::default(); ROD_COUNT],
        }
    }

    pub fn get(&self, id: RodId) -> RodState {
        self.rods[id.index()]
    }

    pub fn owner(&self, id: RodId) -> Side {
        slot_of(id).side
    }

    pub fn is_own(&self, id: RodId) -> bool {
        self.owner(id) == self.viewer
    }

    /// Table-length position of the rod in the local frame.
    pub fn local_z(&self, id: RodId) -> f64 {
        slot_of(id).local_z(self.viewer)
    }

    /// Own rods from goalkeeper outwards.
    pub fn own_rods(&self) -> Vec<RodId> {
        let mut own: Vec<RodId> = RodId::all().filter(|id| self.is_own(*id)).collect();
        own.sort_by(|a, b| self.local_z(*a).total_cmp(&self.local_z(*b)));
        own
    }

    pub fn iter(&self) -> impl Iterator<Item = (RodId, RodState)> + '_ {
        RodId::all().map(|id| (id, self.rods[id.index()]))
    }

    fn own_mut(&mut self, id: RodId) -> Result<&mut RodState, RodError> {
        let owner = self.owner(id);
        if owner != self.viewer {
            return Err(RodError::NotOwned { rod: id, owner });
        }
        Ok(&mut self.rods[id.index()])
    }

    /// Slide an own rod by `dx`, clamped to the travel range.
    pub fn slide(&mut self, id: RodId, dx: f64) -> Result<RodState, RodError> {
        let x = self.get(id).x + dx;
        self.set_offset(id, x)
    }

    /// Put an own rod at lateral offset `x`, clamped to the travel range.
    pub fn set_offset(&mut self, id: RodId, x: f64) -> Result<RodState, RodError> {
        let travel = self.travel;
        let rod = self.own_mut(id)?;
        rod.x = x.clamp(-travel, travel);
        Ok(*rod)
    }

    /// Put an own rod at `state`, clamping the offset.
    pub fn place(&mut self, id: RodId, state: RodState) -> Result<RodState, RodError> {
        let travel = self.travel;
        let rod = self.own_mut(id)?;
        rod.x = state.x.clamp(-travel, travel);
        rod.rotation = state.rotation;
        Ok(*rod)
    }

    pub fn rotate(&mut self, id: RodId, angle: f64) -> Result<RodState, RodError> {
        let rod = self.own_mut(id)?;
        rod.rotation += angle;
        Ok(*rod)
    }

    /// Overwrite the replica of an opponent rod. `state` must already be in
    /// the local frame.
    pub fn apply_remote(&mut self, id: RodId, state: RodState) -> Result<(), RodError> {
        if self.is_own(id) {
            return Err(RodError::LocallyOwned(id));
        }
        self.rods[id.index()] = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rod(index: usize) -> RodId {
        RodId::new(index).unwrap()
    }

    #[test]
    fn slide_is_clamped_to_travel() {
        let mut rack = RodRack::new(Side::P1, 2.0);
        assert_eq!(rack.slide(rod(0), 1.5).unwrap().x, 1.5);
        assert_eq!(rack.slide(rod(0), 1.5).unwrap().x, 2.0);
        assert_eq!(rack.slide(rod(0), -10.0).unwrap().x, -2.0);
    }

    #[test]
    fn rotation_is_unbounded() {
        let mut rack = RodRack::new(Side::P2, 2.0);
        for _ in 0..100 {
            rack.rotate(rod(7), 0.2).unwrap();
        }
        assert!((rack.get(rod(7)).rotation - 20.0).abs() < 1e-9);
    }

    #[test]
    fn cannot_move_opponent_rod() {
        let mut rack = RodRack::new(Side::P1, 2.0);
        assert_eq!(
            rack.slide(rod(2), 0.5),
            Err(RodError::NotOwned {
                rod: rod(2),
                owner: Side::P2
            })
        );
        assert_eq!(rack.get(rod(2)), RodState::default());
    }

    #[test]
    fn remote_update_only_touches_replicas() {
        let mut rack = RodRack::new(Side::P2, 2.0);
        let state = RodState {
            x: 1.5,
            rotation: -0.3,
        };
        assert!(rack.apply_remote(rod(0), state).is_ok());
        assert_eq!(rack.get(rod(0)), state);
        assert_eq!(
            rack.apply_remote(rod(7), state),
            Err(RodError::LocallyOwned(rod(7)))
        );
        assert_eq!(rack.get(rod(7)), RodState::default());
    }

    #[test]
    fn own_rods_start_at_goalkeeper() {
        let p1 = RodRack::new(Side::P1, 2.0);
        assert_eq!(p1.own_rods(), vec![rod(0), rod(1), rod(3), rod(5)]);
        let p2 = RodRack::new(Side::P2, 2.0);
        assert_eq!(p2.own_rods(), vec![rod(7), rod(6), rod(4), rod(2)]);
    }

    #[test]
    fn local_z_puts_own_goalkeeper_near_negative_end() {
        for side in Side::ALL {
            let rack = RodRack::new(side, 2.0);
            let keeper = rack.own_rods()[0];
            assert_eq!(rack.local_z(keeper), -9.0);
        }
    }
}
