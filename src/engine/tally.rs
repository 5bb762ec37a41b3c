//! Vote tallying and the consensus decision rule.
//!
//! Pure and deterministic: the decision depends only on the multiset of
//! successful votes and the number of configured providers, never on the
//! order in which providers answered.

use crate::types::{Outcome, Vote};

/// Slack for float comparison of agreement ratios (4/5 must meet 0.8).
const RATIO_EPSILON: f64 = 1e-9;

/// Per-outcome vote counts and summed confidences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    counts: [usize; 3],
    confidence_sums: [u32; 3],
}

fn slot(outcome: Outcome) -> usize {
    match outcome {
        Outcome::Yes => 0,
        Outcome::No => 1,
        Outcome::Invalid => 2,
    }
}

impl Tally {
    /// Bucket successful votes by outcome.
    pub fn from_votes<'a, I>(votes: I) -> Self
    where
        I: IntoIterator<Item = &'a Vote>,
    {
        let mut tally = Tally::default();
        for vote in votes {
            let i = slot(vote.outcome);
            tally.counts[i] += 1;
            tally.confidence_sums[i] += u32::from(vote.confidence);
        }
        tally
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.counts[slot(outcome)]
    }

    pub fn confidence_sum(&self, outcome: Outcome) -> u32 {
        self.confidence_sums[slot(outcome)]
    }

    /// Number of votes tallied.
    pub fn responded(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Mean confidence of one bucket, rounded half up; 0 for an empty bucket.
    pub fn mean_confidence(&self, outcome: Outcome) -> u8 {
        let n = self.count(outcome) as u32;
        if n == 0 {
            return 0;
        }
        let sum = self.confidence_sum(outcome);
        ((sum * 2 + n) / (2 * n)).min(100) as u8
    }
}

/// The outcome of applying the decision rule to a tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    pub confidence: u8,
    pub consensus_count: usize,
}

impl Decision {
    /// The conservative default when agreement is insufficient.
    pub fn no_consensus() -> Self {
        Self {
            outcome: Outcome::Invalid,
            confidence: 0,
            consensus_count: 0,
        }
    }
}

/// Apply the agreement threshold to a tally.
///
/// The ratio denominator is `total_models` (every configured provider),
/// so failed providers count as not agreeing. Ties between maximal buckets
/// go to the YES/NO bucket with the larger summed confidence; INVALID only
/// wins a tie when neither YES nor NO is among the leaders. A YES/NO tie
/// with equal summed confidence is a deadlock and yields no consensus.
pub fn decide(tally: &Tally, total_models: usize, agreement_threshold: f64) -> Decision {
    if total_models == 0 {
        return Decision::no_consensus();
    }

    let max = Outcome::ALL.iter().map(|o| tally.count(*o)).max().unwrap_or(0);
    if max == 0 {
        return Decision::no_consensus();
    }

    let ratio = max as f64 / total_models as f64;
    if ratio + RATIO_EPSILON < agreement_threshold {
        return Decision::no_consensus();
    }

    let leaders: Vec<Outcome> = Outcome::ALL
        .into_iter()
        .filter(|o| tally.count(*o) == max)
        .collect();

    let winner = match leaders.as_slice() {
        [only] => Some(*only),
        _ => break_tie(tally, &leaders),
    };

    match winner {
        Some(outcome) => Decision {
            outcome,
            confidence: tally.mean_confidence(outcome),
            consensus_count: max,
        },
        None => Decision::no_consensus(),
    }
}

fn break_tie(tally: &Tally, leaders: &[Outcome]) -> Option<Outcome> {
    let decisive: Vec<Outcome> = leaders.iter().copied().filter(|o| o.is_decisive()).collect();

    match decisive.as_slice() {
        [] => Some(Outcome::Invalid),
        [only] => Some(*only),
        _ => {
            let yes = tally.confidence_sum(Outcome::Yes);
            let no = tally.confidence_sum(Outcome::No);
            match yes.cmp(&no) {
                std::cmp::Ordering::Greater => Some(Outcome::Yes),
                std::cmp::Ordering::Less => Some(Outcome::No),
                std::cmp::Ordering::Equal => None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
