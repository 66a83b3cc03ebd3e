use crate::common::messages::{Phase, Stats, Verdict, VoteChoice};

/// The single in-memory poll: current phase, connected voter count, tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollState {
    pub phase: Phase,
    pub connected_voters: u64,
    pub votes_yes: u64,
    pub votes_no: u64,
}

impl PollState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn voter_joined(&mut self) {
        self.connected_voters += 1;
    }

    /// Clamped at zero so an unmatched disconnect can never underflow.
    pub fn voter_left(&mut self) {
        self.connected_voters = self.connected_voters.saturating_sub(1);
    }

    /// Add a ballot to the tally. Returns false outside [`Phase::Voting`].
    pub fn record(&mut self, choice: VoteChoice) -> bool {
        if self.phase != Phase::Voting {
            return false;
        }
        match choice {
            VoteChoice::Yes => self.votes_yes += 1,
            VoteChoice::No => self.votes_no += 1,
        }
        true
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::from_tally(self.votes_yes, self.votes_no)
    }

    /// Back to waiting with both tallies cleared. The voter count is untouched.
    pub fn reset(&mut self) {
        self.phase = Phase::Waiting;
        self.votes_yes = 0;
        self.votes_no = 0;
    }

    pub fn stats(&self) -> Stats {
        Stats {
            connected: self.connected_voters,
            yes: self.votes_yes,
            no: self.votes_no,
            step: self.phase,
        }
    }
}
