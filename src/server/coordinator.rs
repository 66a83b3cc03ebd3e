//! # Poll Coordinator
//!
//! Owns the [`PollState`] and reacts to connection lifecycle events, votes and
//! admin commands. Every handler runs to completion against `&mut self`, and the
//! resulting events go out through a [`Transport`], so the coordinator never
//! knows about sockets.
//!
//! ## Event Flow
//!
//! ```text
//! connect      -> state-change (new connection only), stats
//! disconnect   -> stats
//! vote         -> stats                      (only while VOTING)
//! admin:start  -> state-change, stats
//! admin:lock   -> state-change, stats
//! admin:reveal -> reveal {result}, stats
//! admin:reset  -> state-change, reset, stats
//! ```

use log::{debug, info};
use std::collections::HashSet;

use crate::common::messages::{
    ClientMessage, Phase, RevealPayload, ServerMessage, Stats, Verdict, VoteChoice,
};
use crate::server::access::Role;
use crate::server::state::PollState;
use crate::server::ConnectionId;

/// Outbound side of the connection layer as seen by the coordinator.
pub trait Transport {
    /// Send an event to a single connection.
    fn send_to(&mut self, id: ConnectionId, message: ServerMessage);

    /// Send an event to every connection.
    fn broadcast(&mut self, message: ServerMessage);
}

#[derive(Debug, Default)]
pub struct PollCoordinator {
    state: PollState,
    dedup_votes: bool,
    /// Connections that already voted this round (dedup mode only)
    voted: HashSet<ConnectionId>,
}

impl PollCoordinator {
    pub fn new(dedup_votes: bool) -> Self {
        Self {
            state: PollState::new(),
            dedup_votes,
            voted: HashSet::new(),
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn stats(&self) -> Stats {
        self.state.stats()
    }

    // ========================================================================
    // CONNECTION LIFECYCLE
    // ========================================================================

    pub fn on_connect(&mut self, id: ConnectionId, role: Role, out: &mut impl Transport) {
        if role.is_voter() {
            self.state.voter_joined();
        }
        out.send_to(id, ServerMessage::StateChange(self.state.phase));
        self.broadcast_stats(out);
    }

    pub fn on_disconnect(&mut self, id: ConnectionId, role: Role, out: &mut impl Transport) {
        if role.is_voter() {
            self.state.voter_left();
        }
        self.voted.remove(&id);
        self.broadcast_stats(out);
    }

    // ========================================================================
    // VOTING
    // ========================================================================

    /// Count a ballot. Outside the voting phase nothing happens at all; inside it
    /// stats go out even when the value was not a recognised choice.
    pub fn on_vote(&mut self, id: ConnectionId, raw: &str, out: &mut impl Transport) {
        if self.state.phase != Phase::Voting {
            debug!("Ignoring vote from {} during {}", id, self.state.phase);
            return;
        }

        match VoteChoice::parse(raw) {
            Some(_) if self.dedup_votes && self.voted.contains(&id) => {
                debug!("Ignoring repeat vote from {}", id);
            }
            Some(choice) => {
                self.state.record(choice);
                if self.dedup_votes {
                    self.voted.insert(id);
                }
            }
            None => debug!("Ignoring unrecognised vote value {:?} from {}", raw, id),
        }

        self.broadcast_stats(out);
    }

    // ========================================================================
    // ADMIN COMMANDS
    // ========================================================================

    /// Open voting. Tallies from a previous round are kept until `reset`.
    pub fn start(&mut self, out: &mut impl Transport) {
        self.transition(Phase::Voting, out);
    }

    pub fn lock(&mut self, out: &mut impl Transport) {
        self.transition(Phase::Locked, out);
    }

    pub fn reveal(&mut self, out: &mut impl Transport) -> Verdict {
        self.state.phase = Phase::Revealed;
        let result = self.state.verdict();
        info!(
            "Revealing result: {:?} (yes {} / no {})",
            result, self.state.votes_yes, self.state.votes_no
        );
        out.broadcast(ServerMessage::Reveal(RevealPayload { result }));
        self.broadcast_stats(out);
        result
    }

    pub fn reset(&mut self, out: &mut impl Transport) {
        self.state.reset();
        self.voted.clear();
        info!("Poll reset");
        out.broadcast(ServerMessage::StateChange(Phase::Waiting));
        out.broadcast(ServerMessage::Reset);
        self.broadcast_stats(out);
    }

    /// Route a decoded client event to its handler.
    pub fn handle(&mut self, id: ConnectionId, message: ClientMessage, out: &mut impl Transport) {
        match message {
            ClientMessage::Vote(raw) => self.on_vote(id, &raw, out),
            ClientMessage::AdminStart => self.start(out),
            ClientMessage::AdminLock => self.lock(out),
            ClientMessage::AdminReveal => {
                self.reveal(out);
            }
            ClientMessage::AdminReset => self.reset(out),
        }
    }

    fn transition(&mut self, phase: Phase, out: &mut impl Transport) {
        info!("Phase {} -> {}", self.state.phase, phase);
        self.state.phase = phase;
        out.broadcast(ServerMessage::StateChange(phase));
        self.broadcast_stats(out);
    }

    fn broadcast_stats(&self, out: &mut impl Transport) {
        out.broadcast(ServerMessage::Stats(self.state.stats()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Records every outgoing event in order.
    #[derive(Default)]
    struct Recorder {
        sent: Vec<(Option<ConnectionId>, ServerMessage)>,
    }

    impl Transport for Recorder {
        fn send_to(&mut self, id: ConnectionId, message: ServerMessage) {
            self.sent.push((Some(id), message));
        }

        fn broadcast(&mut self, message: ServerMessage) {
            self.sent.push((None, message));
        }
    }

    impl Recorder {
        fn take(&mut self) -> Vec<(Option<ConnectionId>, ServerMessage)> {
            std::mem::take(&mut self.sent)
        }

        fn stats_count(&self) -> usize {
            self.sent
                .iter()
                .filter(|(_, m)| matches!(m, ServerMessage::Stats(_)))
                .count()
        }
    }

    fn stats(connected: u64, yes: u64, no: u64, step: Phase) -> ServerMessage {
        ServerMessage::Stats(Stats {
            connected,
            yes,
            no,
            step,
        })
    }

    #[test]
    fn test_connect_sends_phase_then_stats() {
        let mut poll = PollCoordinator::new(false);
        let mut out = Recorder::default();
        let id = Uuid::new_v4();

        poll.on_connect(id, Role::Voter, &mut out);

        assert_eq!(
            out.take(),
            vec![
                (Some(id), ServerMessage::StateChange(Phase::Waiting)),
                (None, stats(1, 0, 0, Phase::Waiting)),
            ]
        );
    }

    #[test]
    fn test_admin_and_display_not_counted() {
        let mut poll = PollCoordinator::new(false);
        let mut out = Recorder::default();

        poll.on_connect(Uuid::new_v4(), Role::Admin, &mut out);
        poll.on_connect(Uuid::new_v4(), Role::Display, &mut out);
        assert_eq!(poll.state().connected_voters, 0);

        poll.on_disconnect(Uuid::new_v4(), Role::Admin, &mut out);
        assert_eq!(poll.state().connected_voters, 0);
    }

    #[test]
    fn test_unmatched_disconnects_clamp_at_zero() {
        let mut poll = PollCoordinator::new(false);
        let mut out = Recorder::default();
        let id = Uuid::new_v4();

        poll.on_connect(id, Role::Voter, &mut out);
        poll.on_disconnect(id, Role::Voter, &mut out);
        poll.on_disconnect(id, Role::Voter, &mut out);
        poll.on_disconnect(Uuid::new_v4(), Role::Voter, &mut out);

        assert_eq!(poll.state().connected_voters, 0);
        assert_eq!(out.sent.last(), Some(&(None, stats(0, 0, 0, Phase::Waiting))));
    }

    #[test]
    fn test_votes_ignored_outside_voting() {
        let mut poll = PollCoordinator::new(false);
        let mut out = Recorder::default();
        let id = Uuid::new_v4();

        poll.on_vote(id, "yes", &mut out);
        poll.lock(&mut out);
        poll.on_vote(id, "yes", &mut out);
        poll.reveal(&mut out);
        poll.on_vote(id, "no", &mut out);
        out.take();

        assert_eq!((poll.state().votes_yes, poll.state().votes_no), (0, 0));

        // An ignored vote produces no traffic at all
        poll.on_vote(id, "yes", &mut out);
        assert!(out.sent.is_empty());
    }

    #[test]
    fn test_unknown_vote_value_is_a_no_op_with_stats() {
        let mut poll = PollCoordinator::new(false);
        let mut out = Recorder::default();

        poll.start(&mut out);
        out.take();
        poll.on_vote(Uuid::new_v4(), "maybe", &mut out);

        assert_eq!((poll.state().votes_yes, poll.state().votes_no), (0, 0));
        assert_eq!(out.take(), vec![(None, stats(0, 0, 0, Phase::Voting))]);
    }

    #[test]
    fn test_every_mutation_broadcasts_one_snapshot() {
        let mut poll = PollCoordinator::new(false);
        let mut out = Recorder::default();
        let id = Uuid::new_v4();

        poll.on_connect(id, Role::Voter, &mut out);
        assert_eq!(out.stats_count(), 1);
        poll.start(&mut out);
        assert_eq!(out.stats_count(), 2);
        poll.on_vote(id, "yes", &mut out);
        assert_eq!(out.stats_count(), 3);
        poll.lock(&mut out);
        assert_eq!(out.stats_count(), 4);
        poll.reveal(&mut out);
        assert_eq!(out.stats_count(), 5);
        poll.reset(&mut out);
        assert_eq!(out.stats_count(), 6);
        poll.on_disconnect(id, Role::Voter, &mut out);
        assert_eq!(out.stats_count(), 7);

        // The last event of every burst is the post-mutation snapshot
        assert_eq!(out.sent.last(), Some(&(None, stats(0, 0, 0, Phase::Waiting))));
    }

    #[test]
    fn test_full_round_passes() {
        let mut poll = PollCoordinator::new(false);
        let mut out = Recorder::default();
        let voters: Vec<_> = (0..3).map(|_| Uuid::new_v4()).collect();

        for id in &voters {
            poll.on_connect(*id, Role::Voter, &mut out);
        }
        poll.handle(voters[0], ClientMessage::AdminStart, &mut out);
        poll.handle(voters[0], ClientMessage::Vote("yes".into()), &mut out);
        poll.handle(voters[1], ClientMessage::Vote("yes".into()), &mut out);
        poll.handle(voters[2], ClientMessage::Vote("no".into()), &mut out);
        poll.handle(voters[0], ClientMessage::AdminLock, &mut out);
        poll.handle(voters[1], ClientMessage::Vote("yes".into()), &mut out);
        out.take();

        poll.handle(voters[0], ClientMessage::AdminReveal, &mut out);

        assert_eq!(
            out.take(),
            vec![
                (
                    None,
                    ServerMessage::Reveal(RevealPayload {
                        result: Verdict::Pass
                    })
                ),
                (None, stats(3, 2, 1, Phase::Revealed)),
            ]
        );
    }

    #[test]
    fn test_reveal_without_votes_fails() {
        let mut poll = PollCoordinator::new(false);
        let mut out = Recorder::default();

        assert_eq!(poll.reveal(&mut out), Verdict::Fail);
        assert_eq!(poll.state().phase, Phase::Revealed);
    }

    #[test]
    fn test_reveal_tie_fails() {
        let mut poll = PollCoordinator::new(false);
        let mut out = Recorder::default();

        poll.start(&mut out);
        poll.on_vote(Uuid::new_v4(), "yes", &mut out);
        poll.on_vote(Uuid::new_v4(), "no", &mut out);
        assert_eq!(poll.reveal(&mut out), Verdict::Fail);
    }

    #[test]
    fn test_start_keeps_previous_tallies() {
        let mut poll = PollCoordinator::new(false);
        let mut out = Recorder::default();

        poll.start(&mut out);
        poll.on_vote(Uuid::new_v4(), "yes", &mut out);
        poll.lock(&mut out);
        poll.start(&mut out);

        assert_eq!(poll.state().votes_yes, 1);
        assert_eq!(poll.state().phase, Phase::Voting);
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut poll = PollCoordinator::new(false);
        let mut out = Recorder::default();

        poll.on_connect(Uuid::new_v4(), Role::Voter, &mut out);
        poll.start(&mut out);
        poll.on_vote(Uuid::new_v4(), "yes", &mut out);
        poll.on_vote(Uuid::new_v4(), "no", &mut out);
        poll.reveal(&mut out);
        out.take();

        poll.reset(&mut out);

        assert_eq!(poll.state().phase, Phase::Waiting);
        assert_eq!((poll.state().votes_yes, poll.state().votes_no), (0, 0));
        assert_eq!(
            out.take(),
            vec![
                (None, ServerMessage::StateChange(Phase::Waiting)),
                (None, ServerMessage::Reset),
                (None, stats(1, 0, 0, Phase::Waiting)),
            ]
        );
    }

    #[test]
    fn test_repeat_votes_counted_by_default() {
        let mut poll = PollCoordinator::new(false);
        let mut out = Recorder::default();
        let id = Uuid::new_v4();

        poll.start(&mut out);
        poll.on_vote(id, "yes", &mut out);
        poll.on_vote(id, "yes", &mut out);
        poll.on_vote(id, "no", &mut out);

        assert_eq!((poll.state().votes_yes, poll.state().votes_no), (2, 1));
    }

    #[test]
    fn test_dedup_counts_one_vote_per_connection_per_round() {
        let mut poll = PollCoordinator::new(true);
        let mut out = Recorder::default();
        let id = Uuid::new_v4();

        poll.start(&mut out);
        poll.on_vote(id, "yes", &mut out);
        poll.on_vote(id, "no", &mut out);
        // Unrecognised values never consume the ballot
        let other = Uuid::new_v4();
        poll.on_vote(other, "maybe", &mut out);
        poll.on_vote(other, "no", &mut out);
        assert_eq!((poll.state().votes_yes, poll.state().votes_no), (1, 1));

        poll.reset(&mut out);
        poll.start(&mut out);
        poll.on_vote(id, "no", &mut out);
        assert_eq!((poll.state().votes_yes, poll.state().votes_no), (0, 1));
    }

    #[test]
    fn test_disconnect_forgets_dedup_entry() {
        let mut poll = PollCoordinator::new(true);
        let mut out = Recorder::default();
        let (voter, stayer) = (Uuid::new_v4(), Uuid::new_v4());

        poll.on_connect(voter, Role::Voter, &mut out);
        poll.on_connect(stayer, Role::Voter, &mut out);
        poll.start(&mut out);
        poll.on_vote(voter, "yes", &mut out);
        poll.on_vote(stayer, "no", &mut out);
        assert_eq!(poll.voted.len(), 2);

        poll.on_disconnect(voter, Role::Voter, &mut out);
        assert!(!poll.voted.contains(&voter));
        assert!(poll.voted.contains(&stayer));
        // The ballot itself stays counted
        assert_eq!((poll.state().votes_yes, poll.state().votes_no), (1, 1));
        assert_eq!(poll.stats().connected, 1);
    }
}
