use std::fmt;

use indexmap::IndexMap;

/// Keyword used on the wire for an abstention.
pub const SKIP: &str = "skip";

/// What a ballot points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VoteTarget {
    /// Eject the named player.
    Player(String),
    /// Abstain.
    Skip,
}

impl VoteTarget {
    /// Parse the wire representation (`"skip"` or a player identifier).
    pub fn parse(raw: &str) -> Self {
        if raw == SKIP {
            VoteTarget::Skip
        } else {
            VoteTarget::Player(raw.to_string())
        }
    }
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteTarget::Player(id) => f.write_str(id),
            VoteTarget::Skip => f.write_str(SKIP),
        }
    }
}

/// Aggregated count for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyLine {
    /// Target the votes point at.
    pub target: VoteTarget,
    /// Number of ballots for it.
    pub count: usize,
}

/// Ballots of the running voting phase, one per voter.
#[derive(Debug, Clone, Default)]
pub struct VoteTally {
    ballots: IndexMap<String, VoteTarget>,
}

impl VoteTally {
    /// Record `voter`'s ballot, replacing an earlier one. Returns the replaced ballot.
    pub fn cast(&mut self, voter: &str, target: VoteTarget) -> Option<VoteTarget> {
        self.ballots.insert(voter.to_string(), target)
    }

    /// Number of voters who cast a ballot.
    pub fn len(&self) -> usize {
        self.ballots.len()
    }

    /// Whether nobody voted yet.
    pub fn is_empty(&self) -> bool {
        self.ballots.is_empty()
    }

    /// Forget every ballot.
    pub fn clear(&mut self) {
        self.ballots.clear();
    }

    /// Ballots grouped by target, most voted first, ties broken by target.
    pub fn tally(&self) -> Vec<TallyLine> {
        let mut counts: IndexMap<&VoteTarget, usize> = IndexMap::new();
        for target in self.ballots.values() {
            *counts.entry(target).or_default() += 1;
        }

        let mut lines: Vec<TallyLine> = counts
            .into_iter()
            .map(|(target, count)| TallyLine {
                target: target.clone(),
                count,
            })
            .collect();
        lines.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.target.cmp(&b.target)));
        lines
    }
}
