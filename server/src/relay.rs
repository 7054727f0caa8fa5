use foosball_shared::protocol::{
    ClientMsg, InitMsg, PeerId, RodMovedMsg, ServerMsg, PROTOCOL_VERSION,
};
use foosball_shared::score::ScoreState;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::config::ServerConfig;
use crate::session::{Seat, Session};

/// Commands from client connections to the relay task
#[derive(Debug)]
pub enum RelayCommand {
    Join {
        response: oneshot::Sender<JoinOutcome>,
    },
    Leave {
        id: PeerId,
    },
    Inbound {
        from: PeerId,
        msg: ClientMsg,
    },
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub id: PeerId,
    pub seat: Seat,
    /// `init` for a seated peer, `spectator` otherwise.
    pub greeting: ServerMsg,
    /// Score of the match in progress, sent right after `init` so a peer
    /// taking a freed seat continues from it instead of 0-0.
    pub catch_up: Option<ServerMsg>,
}

/// A message fanned out to every seated connection except `exclude`.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub exclude: Option<PeerId>,
    pub msg: ServerMsg,
}

impl Delivery {
    pub fn to_all(msg: ServerMsg) -> Self {
        Self { exclude: None, msg }
    }

    pub fn to_others(sender: &PeerId, msg: ServerMsg) -> Self {
        Self {
            exclude: Some(sender.clone()),
            msg,
        }
    }

    pub fn is_for(&self, id: &PeerId) -> bool {
        self.exclude.as_ref() != Some(id)
    }
}

/// Decide what, if anything, an inbound message fans out as.
///
/// Rod and ball updates go to the other seated peer only; score is stored and
/// echoed to every seated peer including the sender. Spectators cannot write.
pub fn route(session: &mut Session, from: &PeerId, msg: ClientMsg) -> Option<Delivery> {
    let Some(side) = session.side_of(from) else {
        tracing::debug!("Dropping {} from spectator {}", msg.kind(), from);
        return None;
    };

    match msg {
        ClientMsg::RodMove(rod) => Some(Delivery::to_others(
            from,
            ServerMsg::RodMoved(RodMovedMsg::tagged(from.clone(), rod)),
        )),
        ClientMsg::BallSync(ball) => {
            if side != session.authority() {
                tracing::debug!("ballSync from non-authority {} ({})", from, side);
            }
            Some(Delivery::to_others(from, ServerMsg::BallSynced(ball)))
        }
        ClientMsg::ScoreUpdate(score) => {
            if side != session.authority() {
                tracing::debug!("scoreUpdate from non-authority {} ({})", from, side);
            }
            session.record_score(score);
            tracing::info!("Score {} (proposed by {})", score, side);
            Some(Delivery::to_all(ServerMsg::ScoreSynced(session.score())))
        }
    }
}

fn greeting(session: &Session, id: &PeerId, seat: Seat, config: &ServerConfig) -> ServerMsg {
    match seat {
        Seat::Side(side) => ServerMsg::Init(InitMsg {
            protocol_version: PROTOCOL_VERSION,
            side,
            id: id.clone(),
            authority: session.authority(),
            config: config.table,
        }),
        Seat::Spectator => ServerMsg::Spectator,
    }
}

fn catch_up(session: &Session, seat: Seat) -> Option<ServerMsg> {
    match seat {
        Seat::Side(_) if session.score() != ScoreState::default() => {
            Some(ServerMsg::ScoreSynced(session.score()))
        }
        _ => None,
    }
}

/// Run the relay. Owns the session; every roster and score mutation happens
/// on this task, in command order.
pub async fn run_relay(
    mut cmd_rx: mpsc::Receiver<RelayCommand>,
    delivery_tx: broadcast::Sender<Delivery>,
    config: ServerConfig,
) {
    let mut session = Session::new(config.authority);

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            RelayCommand::Join { response } => {
                let (id, seat) = session.join();
                match seat {
                    Seat::Side(side) => tracing::info!("Peer {} seated as {}", id, side),
                    Seat::Spectator => tracing::info!("Peer {} is a spectator", id),
                }
                let greeting = greeting(&session, &id, seat, &config);
                let catch_up = catch_up(&session, seat);
                let outcome = JoinOutcome {
                    id: id.clone(),
                    seat,
                    greeting,
                    catch_up,
                };
                if response.send(outcome).is_err() {
                    // Connection vanished before it heard back.
                    session.leave(&id);
                }
            }
            RelayCommand::Leave { id } => {
                if let Some(Seat::Side(side)) = session.leave(&id) {
                    tracing::info!("Peer {} left, {} is free", id, side);
                }
            }
            RelayCommand::Inbound { from, msg } => {
                if let Some(delivery) = route(&mut session, &from, msg) {
                    // No receivers is fine: nobody else is seated.
                    let _ = delivery_tx.send(delivery);
                }
            }
        }
    }

    tracing::info!("Relay loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use foosball_shared::formation::RodId;
    use foosball_shared::protocol::{BallWire, RodWire};
    use foosball_shared::side::Side;

    fn seated_pair() -> (Session, PeerId, PeerId) {
        let mut session = Session::new(Side::P1);
        let (a, _) = session.join();
        let (b, _) = session.join();
        (session, a, b)
    }

    fn rod_move() -> ClientMsg {
        ClientMsg::RodMove(RodWire {
            rod_id: RodId::new(0).unwrap(),
            x: 1.5,
            rotation: 0.3,
        })
    }

    #[test]
    fn rod_move_is_tagged_and_not_looped_back() {
        let (mut session, a, b) = seated_pair();
        let delivery = route(&mut session, &a, rod_move()).unwrap();
        assert!(!delivery.is_for(&a));
        assert!(delivery.is_for(&b));
        match delivery.msg {
            ServerMsg::RodMoved(m) => {
                assert_eq!(m.id, a);
                assert_eq!(m.x, 1.5);
                assert_eq!(m.rotation, 0.3);
            }
            other => panic!("Expected RodMoved, got {:?}", other),
        }
    }

    #[test]
    fn ball_sync_is_forwarded_verbatim() {
        let (mut session, a, b) = seated_pair();
        let ball = BallWire {
            x: 0.5,
            y: 0.8,
            z: -4.0,
            vx: 1.0,
            vy: 0.0,
            vz: -2.5,
        };
        let delivery = route(&mut session, &a, ClientMsg::BallSync(ball)).unwrap();
        assert!(delivery.is_for(&b));
        assert!(!delivery.is_for(&a));
        assert_eq!(delivery.msg, ServerMsg::BallSynced(ball));
    }

    #[test]
    fn ball_sync_from_non_authority_is_still_relayed() {
        let (mut session, a, b) = seated_pair();
        let ball = BallWire {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
        };
        let delivery = route(&mut session, &b, ClientMsg::BallSync(ball)).unwrap();
        assert!(delivery.is_for(&a));
    }

    #[test]
    fn score_is_stored_and_echoed_to_sender() {
        let (mut session, a, b) = seated_pair();
        let delivery =
            route(&mut session, &a, ClientMsg::ScoreUpdate(ScoreState::new(1, 0))).unwrap();
        assert!(delivery.is_for(&a));
        assert!(delivery.is_for(&b));
        assert_eq!(delivery.msg, ServerMsg::ScoreSynced(ScoreState::new(1, 0)));
        assert_eq!(session.score(), ScoreState::new(1, 0));
    }

    #[test]
    fn spectator_messages_are_dropped() {
        let (mut session, _a, _b) = seated_pair();
        let (c, seat) = session.join();
        assert_eq!(seat, Seat::Spectator);
        assert!(route(&mut session, &c, rod_move()).is_none());
        assert!(route(&mut session, &c, ClientMsg::ScoreUpdate(ScoreState::new(5, 0))).is_none());
        assert_eq!(session.score(), ScoreState::default());
    }

    #[test]
    fn catch_up_only_for_seats_joining_a_match_in_progress() {
        let (mut session, a, _b) = seated_pair();
        assert_eq!(catch_up(&session, Seat::Side(Side::P1)), None);

        session.record_score(ScoreState::new(3, 2));
        session.leave(&a);
        let (_d, seat) = session.join();
        assert_eq!(seat, Seat::Side(Side::P1));
        assert_eq!(
            catch_up(&session, seat),
            Some(ServerMsg::ScoreSynced(ScoreState::new(3, 2)))
        );
        assert_eq!(catch_up(&session, Seat::Spectator), None);
    }

    #[tokio::test]
    async fn relay_task_greets_and_fans_out() {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (delivery_tx, mut delivery_rx) = broadcast::channel(16);
        tokio::spawn(run_relay(cmd_rx, delivery_tx, ServerConfig::default()));

        let mut ids = Vec::new();
        for expected in [Some(Side::P1), Some(Side::P2), None] {
            let (tx, rx) = oneshot::channel();
            cmd_tx.send(RelayCommand::Join { response: tx }).await.unwrap();
            let outcome = rx.await.unwrap();
            match (&outcome.greeting, expected) {
                (ServerMsg::Init(init), Some(side)) => {
                    assert_eq!(init.side, side);
                    assert_eq!(init.authority, Side::P1);
                    assert_eq!(init.id, outcome.id);
                }
                (ServerMsg::Spectator, None) => {}
                (other, _) => panic!("Unexpected greeting {:?}", other),
            }
            ids.push(outcome.id);
        }

        cmd_tx
            .send(RelayCommand::Inbound {
                from: ids[0].clone(),
                msg: ClientMsg::ScoreUpdate(ScoreState::new(1, 0)),
            })
            .await
            .unwrap();
        let delivery = delivery_rx.recv().await.unwrap();
        assert_eq!(delivery.msg, ServerMsg::ScoreSynced(ScoreState::new(1, 0)));
    }
}
