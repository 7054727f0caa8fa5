use std::collections::HashSet;

use foosball_shared::protocol::PeerId;
use foosball_shared::score::ScoreState;
use foosball_shared::side::Side;

/// What a connection was given when it joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Side(Side),
    Spectator,
}

/// Roster and score for the one table this relay hosts.
///
/// Owned by the relay task; connection handlers only reach it through
/// `RelayCommand`s.
#[derive(Debug)]
pub struct Session {
    seats: [Option<PeerId>; 2],
    spectators: HashSet<PeerId>,
    score: ScoreState,
    authority: Side,
    next_seq: u64,
}

impl Session {
    pub fn new(authority: Side) -> Self {
        Self {
            seats: [None, None],
            spectators: HashSet::new(),
            score: ScoreState::default(),
            authority,
            next_seq: 1,
        }
    }

    /// Register a new connection. It takes the first free side in p1, p2
    /// order, or becomes a spectator when both are held.
    pub fn join(&mut self) -> (PeerId, Seat) {
        let id = PeerId::from_seq(self.next_seq);
        self.next_seq += 1;

        let free = Side::ALL
            .into_iter()
            .find(|side| self.seats[side.index()].is_none());
        match free {
            Some(side) => {
                self.seats[side.index()] = Some(id.clone());
                (id, Seat::Side(side))
            }
            None => {
                self.spectators.insert(id.clone());
                (id, Seat::Spectator)
            }
        }
    }

    /// Forget a connection. A freed side is immediately available to the
    /// next join; nothing is reserved for the leaving peer.
    pub fn leave(&mut self, id: &PeerId) -> Option<Seat> {
        if let Some(side) = self.side_of(id) {
            self.seats[side.index()] = None;
            if self.seats.iter().all(Option::is_none) {
                // Empty table: the next pair starts a fresh match.
                self.score = ScoreState::default();
            }
            return Some(Seat::Side(side));
        }
        self.spectators.remove(id).then_some(Seat::Spectator)
    }

    pub fn side_of(&self, id: &PeerId) -> Option<Side> {
        Side::ALL
            .into_iter()
            .find(|side| self.seats[side.index()].as_ref() == Some(id))
    }

    pub fn occupant(&self, side: Side) -> Option<&PeerId> {
        self.seats[side.index()].as_ref()
    }

    pub fn seated_count(&self) -> usize {
        self.seats.iter().filter(|s| s.is_some()).count()
    }

    pub fn spectator_count(&self) -> usize {
        self.spectators.len()
    }

    pub fn authority(&self) -> Side {
        self.authority
    }

    pub fn is_authority(&self, id: &PeerId) -> bool {
        self.side_of(id) == Some(self.authority)
    }

    pub fn score(&self) -> ScoreState {
        self.score
    }

    /// Store a proposed score as the current one. Last write wins.
    pub fn record_score(&mut self, score: ScoreState) {
        self.score = score;
    }
}
