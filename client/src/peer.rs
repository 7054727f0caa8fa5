//! One client's view of the match: who it is, what it owns, and how it folds
//! remote updates into its local simulation.

use foosball_shared::config::TableConfig;
use foosball_shared::formation::{slot_of, RodId};
use foosball_shared::protocol::{
    ClientMsg, InitMsg, PeerId, RodMovedMsg, ServerMsg, PROTOCOL_VERSION,
};
use foosball_shared::score::{MatchResult, Outcome, ScoreState};
use foosball_shared::side::Side;

use crate::lifecycle::{detect_goal, GoalOutcome, Lifecycle, Phase};
use crate::mirror::Mirror;
use crate::physics::TablePhysics;
use crate::rods::{RodError, RodRack};
use crate::state::{BallState, RodState};

/// Identity handed out by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub side: Side,
    pub id: PeerId,
    /// Side whose ball and score are ground truth.
    pub authority: Side,
}

impl Seat {
    pub fn is_authority(&self) -> bool {
        self.side == self.authority
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Waiting for the relay's greeting.
    Connecting,
    Seated(Seat),
    Spectator,
}

struct Table {
    seat: Seat,
    rods: RodRack,
    lifecycle: Lifecycle,
    config: TableConfig,
}

/// Sync core for one client, driven by a single-threaded frame loop.
///
/// Incoming messages go through `handle`, local input through the rod
/// methods, and time through `frame`. Everything to be sent is collected in
/// an outbox the caller drains once per frame.
pub struct PeerSession<P: TablePhysics> {
    physics: P,
    role: Role,
    table: Option<Table>,
    score: ScoreState,
    outbox: Vec<ClientMsg>,
}

impl<P: TablePhysics> PeerSession<P> {
    pub fn new(physics: P) -> Self {
        Self {
            physics,
            role: Role::Connecting,
            table: None,
            score: ScoreState::default(),
            outbox: Vec::new(),
        }
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn seat(&self) -> Option<&Seat> {
        self.table.as_ref().map(|t| &t.seat)
    }

    pub fn is_authority(&self) -> bool {
        self.seat().is_some_and(Seat::is_authority)
    }

    pub fn score(&self) -> ScoreState {
        self.score
    }

    pub fn phase(&self) -> Option<Phase> {
        self.table.as_ref().map(|t| t.lifecycle.phase())
    }

    pub fn rods(&self) -> Option<&RodRack> {
        self.table.as_ref().map(|t| &t.rods)
    }

    pub fn config(&self) -> Option<&TableConfig> {
        self.table.as_ref().map(|t| &t.config)
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    /// Result of the finished match as seen by this client.
    pub fn outcome(&self) -> Option<Outcome> {
        let table = self.table.as_ref()?;
        match table.lifecycle.phase() {
            Phase::ResultShown { result } => Some(result.outcome_for(table.seat.side)),
            _ => None,
        }
    }

    pub fn drain_outbox(&mut self) -> Vec<ClientMsg> {
        std::mem::take(&mut self.outbox)
    }

    // === Incoming ===

    /// Apply one message from the relay. Each kind has exactly one handler.
    pub fn handle(&mut self, msg: ServerMsg) {
        match msg {
            ServerMsg::Init(init) => self.on_init(init),
            ServerMsg::Spectator => self.on_spectator(),
            ServerMsg::RodMoved(moved) => self.on_rod_moved(moved),
            ServerMsg::BallSynced(ball) => self.on_ball_synced(BallState::from_wire(&ball)),
            ServerMsg::ScoreSynced(score) => self.on_score_synced(score),
        }
    }

    fn on_init(&mut self, init: InitMsg) {
        if self.role != Role::Connecting {
            tracing::warn!("Ignoring repeated init (already {:?})", self.role);
            return;
        }
        if init.protocol_version != PROTOCOL_VERSION {
            tracing::warn!(
                "Server speaks protocol {}, client speaks {}",
                init.protocol_version,
                PROTOCOL_VERSION
            );
        }
        let config = match init.config.validate() {
            Ok(()) => init.config,
            Err(e) => {
                tracing::warn!("Server sent invalid table rules ({}), using defaults", e);
                TableConfig::default()
            }
        };
        let seat = Seat {
            side: init.side,
            id: init.id,
            authority: init.authority,
        };
        tracing::info!(
            "Joined as {} (id {}, authority {})",
            seat.side,
            seat.id,
            seat.authority
        );

        let rods = RodRack::new(seat.side, config.rod_travel);
        for (id, state) in rods.iter() {
            self.physics.set_rod(id, rods.local_z(id), state);
        }
        self.role = Role::Seated(seat.clone());
        self.table = Some(Table {
            seat,
            rods,
            lifecycle: Lifecycle::new(config),
            config,
        });
    }

    fn on_spectator(&mut self) {
        if self.role != Role::Connecting {
            tracing::warn!("Ignoring spectator notice (already {:?})", self.role);
            return;
        }
        tracing::info!("Table is full, spectating");
        self.role = Role::Spectator;
    }

    fn on_rod_moved(&mut self, moved: RodMovedMsg) {
        let Some(table) = self.table.as_mut() else {
            return;
        };
        let owner = slot_of(moved.rod_id).side;
        let state = RodState::from_wire(&moved.rod()).to_local(owner, table.seat.side);
        match table.rods.apply_remote(moved.rod_id, state) {
            Ok(()) => {
                let z = table.rods.local_z(moved.rod_id);
                self.physics.set_rod(moved.rod_id, z, state);
            }
            Err(e) => tracing::warn!("Dropping rod update from {}: {}", moved.id, e),
        }
    }

    fn on_ball_synced(&mut self, ball: BallState) {
        let Some(table) = self.table.as_ref() else {
            return;
        };
        if table.seat.is_authority() {
            tracing::debug!("Authority ignores remote ball state");
            return;
        }
        let local = ball.to_local(table.seat.authority, table.seat.side);
        self.physics.set_ball(local);
    }

    fn on_score_synced(&mut self, score: ScoreState) {
        self.score = score;
        if let Some(table) = self.table.as_mut() {
            table.lifecycle.score_received(&score);
        }
    }

    // === Local input ===

    fn commit_rod(&mut self, id: RodId, state: RodState) {
        if let Some(table) = self.table.as_ref() {
            self.physics.set_rod(id, table.rods.local_z(id), state);
        }
        self.outbox.push(ClientMsg::RodMove(state.to_wire(id)));
    }

    fn with_rods(
        &mut self,
        f: impl FnOnce(&mut RodRack) -> Result<RodState, RodError>,
    ) -> Result<Option<RodState>, RodError> {
        match self.table.as_mut() {
            // The replay only shows what happened; rods stay where they were.
            Some(table) if table.lifecycle.is_replaying() => Ok(None),
            Some(table) => f(&mut table.rods).map(Some),
            None => Ok(None),
        }
    }

    /// Drive an own rod to an absolute offset and rotation. Does nothing
    /// until seated or during the replay.
    pub fn move_rod(&mut self, id: RodId, x: f64, rotation: f64) -> Result<(), RodError> {
        if let Some(state) = self.with_rods(|rods| rods.place(id, RodState { x, rotation }))? {
            self.commit_rod(id, state);
        }
        Ok(())
    }

    /// Slide an own rod by `dx`. Does nothing until seated or
    /// during the replay.
    pub fn slide_rod(&mut self, id: RodId, dx: f64) -> Result<(), RodError> {
        if let Some(state) = self.with_rods(|rods| rods.slide(id, dx))? {
            self.commit_rod(id, state);
        }
        Ok(())
    }

    /// Move an own rod to lateral offset `x`. Does nothing until seated or
    /// during the replay.
    pub fn set_rod_offset(&mut self, id: RodId, x: f64) -> Result<(), RodError> {
        if let Some(state) = self.with_rods(|rods| rods.set_offset(id, x))? {
            self.commit_rod(id, state);
        }
        Ok(())
    }

    /// Spin an own rod by `angle` radians. Does nothing until seated or
    /// during the replay.
    pub fn rotate_rod(&mut self, id: RodId, angle: f64) -> Result<(), RodError> {
        if let Some(state) = self.with_rods(|rods| rods.rotate(id, angle))? {
            self.commit_rod(id, state);
        }
        Ok(())
    }

    // === Time ===

    /// Advance one frame of `dt` wall-clock seconds. Returns the match result
    /// on the frame the result screen is reached.
    pub fn frame(&mut self, dt: f64) -> Option<MatchResult> {
        let table = self.table.as_mut()?;
        self.physics.step(dt * table.lifecycle.time_scale());
        let shown = table.lifecycle.advance(dt);

        if table.seat.is_authority() && table.lifecycle.is_playing() {
            let ball = self.physics.ball();
            self.outbox.push(ClientMsg::BallSync(ball.to_wire()));

            let threshold = table.config.goal_threshold;
            if let Some(scorer) = detect_goal(ball.position[2], threshold, table.seat.authority) {
                self.score_goal(scorer);
            }
        }
        shown
    }

    fn score_goal(&mut self, scorer: Side) {
        let Some(table) = self.table.as_mut() else {
            return;
        };
        self.score.increment(scorer);
        tracing::info!("Goal for {}, score {}", scorer, self.score);
        self.outbox.push(ClientMsg::ScoreUpdate(self.score));

        match table.lifecycle.goal_scored(scorer, &self.score) {
            GoalOutcome::RoundReset { .. } => {
                self.physics.reset_ball(table.config.ball_restart);
            }
            GoalOutcome::MatchEnd { .. } => {}
        }
    }

    /// Start a new match from the result screen. The authority zeroes and
    /// publishes the score and puts the ball back in play; the other side
    /// waits for that broadcast.
    pub fn restart_match(&mut self) -> bool {
        let Some(table) = self.table.as_mut() else {
            return false;
        };
        if !table.lifecycle.restart() {
            return false;
        }
        if table.seat.is_authority() {
            self.score = ScoreState::default();
            self.outbox.push(ClientMsg::ScoreUpdate(self.score));
            self.physics.reset_ball(table.config.ball_restart);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::KinematicTable;
    use foosball_shared::protocol::BallWire;

    /// Records what the sync core asks of the engine.
    #[derive(Default)]
    struct FakePhysics {
        ball: BallState,
        rods: Vec<(RodId, f64, RodState)>,
        steps: Vec<f64>,
        resets: Vec<[f64; 3]>,
    }

    impl TablePhysics for FakePhysics {
        fn ball(&self) -> BallState {
            self.ball
        }
        fn set_ball(&mut self, ball: BallState) {
            self.ball = ball;
        }
        fn reset_ball(&mut self, position: [f64; 3]) {
            self.ball = BallState::at_rest(position);
            self.resets.push(position);
        }
        fn set_rod(&mut self, id: RodId, z: f64, rod: RodState) {
            self.rods.push((id, z, rod));
        }
        fn step(&mut self, dt: f64) {
            self.steps.push(dt);
        }
    }

    fn rod(index: usize) -> RodId {
        RodId::new(index).unwrap()
    }

    fn init(side: Side) -> ServerMsg {
        ServerMsg::Init(InitMsg {
            protocol_version: PROTOCOL_VERSION,
            side,
            id: PeerId::from_seq(side.index() as u64 + 1),
            authority: Side::P1,
            config: TableConfig::default(),
        })
    }

    fn seated(side: Side) -> PeerSession<FakePhysics> {
        let mut peer = PeerSession::new(FakePhysics::default());
        peer.handle(init(side));
        peer
    }

    fn ball_at_z(z: f64) -> BallState {
        BallState {
            position: [0.0, 0.55, z],
            velocity: [0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn init_seats_peer_and_places_all_rods() {
        let peer = seated(Side::P2);
        assert!(matches!(peer.role(), Role::Seated(seat) if seat.side == Side::P2));
        assert!(!peer.is_authority());
        assert_eq!(peer.physics().rods.len(), 8);
        // p1's goalkeeper sits at the far end for p2.
        assert!(peer
            .physics()
            .rods
            .iter()
            .any(|(id, z, _)| *id == rod(0) && *z == 9.0));
    }

    #[test]
    fn second_init_is_ignored() {
        let mut peer = seated(Side::P1);
        peer.handle(init(Side::P2));
        assert_eq!(peer.seat().unwrap().side, Side::P1);
    }

    #[test]
    fn spectator_never_simulates() {
        let mut peer = PeerSession::new(FakePhysics::default());
        peer.handle(ServerMsg::Spectator);
        assert_eq!(peer.role(), &Role::Spectator);
        assert_eq!(peer.frame(1.0 / 60.0), None);
        assert!(peer.physics().steps.is_empty());
        assert!(peer.drain_outbox().is_empty());
    }

    #[test]
    fn local_rod_move_is_clamped_and_published() {
        let mut peer = seated(Side::P1);
        peer.slide_rod(rod(0), 3.0).unwrap();
        let sent = peer.drain_outbox();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            ClientMsg::RodMove(w) => {
                assert_eq!(w.rod_id, rod(0));
                assert_eq!(w.x, 2.0);
            }
            other => panic!("Expected RodMove, got {:?}", other),
        }
    }

    #[test]
    fn move_rod_sets_both_axes_in_one_message() {
        let mut peer = seated(Side::P2);
        peer.move_rod(rod(4), -5.0, 0.7).unwrap();
        assert_eq!(
            peer.drain_outbox(),
            vec![ClientMsg::RodMove(RodState { x: -2.0, rotation: 0.7 }.to_wire(rod(4)))]
        );
        let placed = peer.physics().rods.last().copied().unwrap();
        assert_eq!(placed, (rod(4), -1.0, RodState { x: -2.0, rotation: 0.7 }));
    }

    #[test]
    fn moving_opponent_rod_is_refused() {
        let mut peer = seated(Side::P1);
        assert!(peer.rotate_rod(rod(7), 0.2).is_err());
        assert!(peer.drain_outbox().is_empty());
    }

    #[test]
    fn remote_rod_rotation_is_mirrored_offset_is_not() {
        let mut peer = seated(Side::P2);
        peer.handle(ServerMsg::RodMoved(RodMovedMsg {
            id: PeerId::from_seq(1),
            rod_id: rod(0),
            x: 1.5,
            rotation: 0.3,
        }));
        let state = peer.rods().unwrap().get(rod(0));
        assert_eq!(state, RodState { x: 1.5, rotation: -0.3 });
    }

    #[test]
    fn remote_write_to_own_rod_is_dropped() {
        let mut peer = seated(Side::P1);
        peer.handle(ServerMsg::RodMoved(RodMovedMsg {
            id: PeerId::from_seq(2),
            rod_id: rod(0),
            x: 1.0,
            rotation: 1.0,
        }));
        assert_eq!(peer.rods().unwrap().get(rod(0)), RodState::default());
    }

    #[test]
    fn non_authority_overwrites_ball_with_mirrored_state() {
        let mut peer = seated(Side::P2);
        peer.handle(ServerMsg::BallSynced(BallWire {
            x: 1.0,
            y: 0.5,
            z: 4.0,
            vx: 2.0,
            vy: 0.0,
            vz: -3.0,
        }));
        let ball = peer.physics().ball();
        assert_eq!(ball.position, [1.0, 0.5, -4.0]);
        assert_eq!(ball.velocity, [2.0, 0.0, 3.0]);
    }

    #[test]
    fn authority_ignores_remote_ball() {
        let mut peer = seated(Side::P1);
        peer.physics_mut().set_ball(ball_at_z(1.0));
        peer.handle(ServerMsg::BallSynced(ball_at_z(-5.0).to_wire()));
        assert_eq!(peer.physics().ball(), ball_at_z(1.0));
    }

    #[test]
    fn authority_publishes_ball_every_frame() {
        let mut peer = seated(Side::P1);
        peer.physics_mut().set_ball(ball_at_z(2.0));
        peer.frame(1.0 / 60.0);
        peer.frame(1.0 / 60.0);
        let sent = peer.drain_outbox();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| matches!(m, ClientMsg::BallSync(_))));
    }

    #[test]
    fn non_authority_never_detects_goals() {
        let mut peer = seated(Side::P2);
        peer.physics_mut().set_ball(ball_at_z(11.0));
        peer.frame(1.0 / 60.0);
        assert!(peer.drain_outbox().is_empty());
        assert_eq!(peer.score(), ScoreState::default());
    }

    #[test]
    fn authority_goal_increments_publishes_and_resets() {
        let mut peer = seated(Side::P1);
        peer.physics_mut().set_ball(ball_at_z(10.6));
        peer.frame(1.0 / 60.0);

        let sent = peer.drain_outbox();
        assert!(sent.contains(&ClientMsg::ScoreUpdate(ScoreState::new(1, 0))));
        assert_eq!(peer.score(), ScoreState::new(1, 0));
        assert_eq!(peer.physics().resets, vec![[0.0, 5.0, 0.0]]);
        assert_eq!(peer.phase(), Some(Phase::Playing));
    }

    #[test]
    fn deciding_goal_starts_replay_and_stops_ball_sync() {
        let mut peer = seated(Side::P1);
        peer.handle(ServerMsg::ScoreSynced(ScoreState::new(1, 4)));
        peer.physics_mut().set_ball(ball_at_z(-10.6));
        peer.frame(1.0 / 60.0);

        assert_eq!(peer.score(), ScoreState::new(1, 5));
        assert!(peer.physics().resets.is_empty());
        assert!(matches!(peer.phase(), Some(Phase::Replay { .. })));
        peer.drain_outbox();

        // Slow motion, and no more ball updates while replaying.
        peer.frame(1.0 / 60.0);
        assert!(peer.drain_outbox().is_empty());
        let last_step = *peer.physics().steps.last().unwrap();
        assert!((last_step - 0.1 / 60.0).abs() < 1e-12);

        // The echoed score does not restart anything.
        peer.handle(ServerMsg::ScoreSynced(ScoreState::new(1, 5)));
        assert!(matches!(peer.phase(), Some(Phase::Replay { .. })));

        let shown = peer.frame(10.0);
        assert_eq!(shown, Some(MatchResult { winner: Side::P2 }));
        assert_eq!(peer.outcome(), Some(Outcome::Defeat));
    }

    #[test]
    fn rods_are_frozen_during_replay() {
        let mut peer = seated(Side::P2);
        peer.handle(ServerMsg::ScoreSynced(ScoreState::new(5, 0)));
        assert!(matches!(peer.phase(), Some(Phase::Replay { .. })));

        peer.move_rod(rod(7), 1.0, 0.5).unwrap();
        peer.slide_rod(rod(7), 1.0).unwrap();
        peer.rotate_rod(rod(7), 0.5).unwrap();
        assert!(peer.drain_outbox().is_empty());
        assert_eq!(peer.rods().unwrap().get(rod(7)), RodState::default());

        // Moving again once the result is up.
        peer.frame(6.0);
        peer.slide_rod(rod(7), 1.0).unwrap();
        assert_eq!(peer.drain_outbox().len(), 1);
    }

    #[test]
    fn score_broadcast_is_idempotent() {
        let mut peer = seated(Side::P2);
        let score = ServerMsg::ScoreSynced(ScoreState::new(2, 3));
        peer.handle(score.clone());
        let after_first = (peer.score(), peer.phase());
        peer.handle(score);
        assert_eq!((peer.score(), peer.phase()), after_first);
    }

    #[test]
    fn non_authority_runs_own_replay_on_winning_broadcast() {
        let mut peer = seated(Side::P2);
        peer.handle(ServerMsg::ScoreSynced(ScoreState::new(4, 0)));
        assert_eq!(peer.phase(), Some(Phase::Playing));
        peer.handle(ServerMsg::ScoreSynced(ScoreState::new(5, 0)));
        assert!(matches!(peer.phase(), Some(Phase::Replay { .. })));
        peer.frame(6.0);
        assert_eq!(peer.outcome(), Some(Outcome::Defeat));
    }

    #[test]
    fn authority_restart_zeroes_and_publishes_score() {
        let mut peer = seated(Side::P1);
        peer.handle(ServerMsg::ScoreSynced(ScoreState::new(4, 2)));
        peer.physics_mut().set_ball(ball_at_z(10.6));
        peer.frame(1.0 / 60.0);
        peer.frame(6.0);
        assert_eq!(peer.outcome(), Some(Outcome::Victory));
        peer.drain_outbox();

        assert!(peer.restart_match());
        assert_eq!(peer.score(), ScoreState::default());
        assert_eq!(
            peer.drain_outbox(),
            vec![ClientMsg::ScoreUpdate(ScoreState::default())]
        );
        assert_eq!(peer.phase(), Some(Phase::Playing));
    }

    fn shoot(peer: &mut PeerSession<KinematicTable>, x: f64) {
        peer.physics_mut().set_ball(BallState {
            position: [x, 0.55, 8.0],
            velocity: [0.0, 0.0, 12.0],
        });
        for _ in 0..30 {
            peer.frame(1.0 / 60.0);
        }
    }

    fn seated_on_table(side: Side) -> PeerSession<KinematicTable> {
        let mut peer = PeerSession::new(KinematicTable::default());
        peer.handle(init(side));
        peer
    }

    #[test]
    fn shot_into_end_wall_is_not_a_goal() {
        let mut peer = seated_on_table(Side::P1);
        shoot(&mut peer, 3.5);
        assert_eq!(peer.score(), ScoreState::default());
        assert!(peer
            .drain_outbox()
            .iter()
            .all(|m| matches!(m, ClientMsg::BallSync(_))));
    }

    #[test]
    fn shot_into_goal_mouth_scores_once() {
        let mut peer = seated_on_table(Side::P1);
        shoot(&mut peer, 1.0);
        assert_eq!(peer.score(), ScoreState::new(1, 0));
        let updates = peer
            .drain_outbox()
            .into_iter()
            .filter(|m| matches!(m, ClientMsg::ScoreUpdate(_)))
            .count();
        assert_eq!(updates, 1);
    }

    #[test]
    fn seat_taken_mid_match_continues_from_relayed_score() {
        let mut peer = seated_on_table(Side::P1);
        peer.handle(ServerMsg::ScoreSynced(ScoreState::new(3, 2)));
        shoot(&mut peer, 1.0);
        assert_eq!(peer.score(), ScoreState::new(4, 2));
    }

    #[test]
    fn restart_before_result_is_refused() {
        let mut peer = seated(Side::P1);
        assert!(!peer.restart_match());
        assert!(peer.drain_outbox().is_empty());
    }
}
