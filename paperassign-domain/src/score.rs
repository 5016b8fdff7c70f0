//! Sparse reviewer/paper affinity scores.
//!
//! A pair with no recorded entry scores zero. Scores at or above
//! [`BID_SCORE`] mark an explicit bid, so every non-bid contribution
//! (topic fit, conflict penalty) has to stay below that threshold.

use crate::model::{PaperId, ReviewerId};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};
use thiserror::Error;

/// Score at or above which a pair counts as "the reviewer bid on this paper".
pub const BID_SCORE: i64 = 1000;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScoreMatrix {
    entries: BTreeMap<(ReviewerId, PaperId), i64>,
}

impl ScoreMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the score of a pair, returning the previous entry if any.
    pub fn insert(&mut self, reviewer: ReviewerId, paper: PaperId, score: i64) -> Option<i64> {
        self.entries.insert((reviewer, paper), score)
    }

    /// Adds `delta` to the score of a pair, starting from the zero default.
    /// The pair is left unchanged when the sum leaves the `i64` range.
    pub fn add(
        &mut self,
        reviewer: ReviewerId,
        paper: PaperId,
        delta: i64,
    ) -> Result<(), ScoreError> {
        let score = self.entries.entry((reviewer, paper)).or_insert(0);
        *score = score
            .checked_add(delta)
            .ok_or(ScoreError::Overflow { reviewer, paper })?;
        Ok(())
    }

    /// Keeps only the pairs `keep` accepts, returning how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(ReviewerId, PaperId) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|&(reviewer, paper), _| keep(reviewer, paper));
        before - self.entries.len()
    }

    pub fn get(&self, reviewer: ReviewerId, paper: PaperId) -> i64 {
        self.entries.get(&(reviewer, paper)).copied().unwrap_or(0)
    }

    pub fn is_bid(&self, reviewer: ReviewerId, paper: PaperId) -> bool {
        self.get(reviewer, paper) >= BID_SCORE
    }

    /// Number of papers the reviewer bid on.
    pub fn bid_count(&self, reviewer: ReviewerId) -> u32 {
        let count = self
            .entries_for(reviewer)
            .filter(|&(_, score)| score >= BID_SCORE)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    pub fn entries_for(&self, reviewer: ReviewerId) -> impl Iterator<Item = (PaperId, i64)> + '_ {
        self.entries
            .range((reviewer, PaperId(0))..=(reviewer, PaperId(u32::MAX)))
            .map(|(&(_, paper), &score)| (paper, score))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReviewerId, PaperId, i64)> + '_ {
        self.entries
            .iter()
            .map(|(&(reviewer, paper), &score)| (reviewer, paper, score))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the score matrix from topic overlap, bids and declared conflicts.
    ///
    /// Contributions for the same pair are summed. The weights are checked
    /// first so that topic fit alone can never reach [`BID_SCORE`] and every
    /// recorded bid does.
    pub fn prepare(inputs: &ScoreInputs<'_>, weights: &ScoreWeights) -> Result<Self, ScoreError> {
        let max_topics = inputs
            .paper_topics
            .values()
            .map(BTreeSet::len)
            .max()
            .unwrap_or(0);
        weights.validate(max_topics)?;

        let mut scores = Self::new();
        for (&reviewer, reviewer_topics) in inputs.reviewer_topics {
            for (&paper, paper_topics) in inputs.paper_topics {
                let fit = reviewer_topics.intersection(paper_topics).count();
                if fit > 0 {
                    scores.add(reviewer, paper, fit as i64 * weights.topic)?;
                }
            }
        }
        for &(reviewer, paper, preference) in inputs.bids {
            scores.add(reviewer, paper, weights.bid(preference))?;
        }
        for &(reviewer, paper) in inputs.declared_conflicts {
            scores.add(reviewer, paper, weights.conflict)?;
        }
        Ok(scores)
    }
}

impl FromIterator<(ReviewerId, PaperId, i64)> for ScoreMatrix {
    fn from_iter<T: IntoIterator<Item = (ReviewerId, PaperId, i64)>>(iter: T) -> Self {
        let mut scores = Self::new();
        for (reviewer, paper, score) in iter {
            scores.insert(reviewer, paper, score);
        }
        scores
    }
}

/// Declared preference of a reviewer for a paper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BidPreference {
    Yes,
    Maybe,
    No,
}

impl BidPreference {
    pub const ALL: [BidPreference; 3] = [Self::Yes, Self::Maybe, Self::No];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::Maybe => "maybe",
            Self::No => "no",
        }
    }
}

impl fmt::Display for BidPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BidPreference {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Self::Yes),
            "maybe" => Ok(Self::Maybe),
            "no" => Ok(Self::No),
            _ => Err(ScoreError::UnknownPreference(s.to_owned())),
        }
    }
}

/// Per-signal weights used by [`ScoreMatrix::prepare`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreWeights {
    /// Added once per shared topic.
    pub topic: i64,
    pub yes: i64,
    pub maybe: i64,
    pub no: i64,
    /// Added for every declared conflict of interest.
    pub conflict: i64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            topic: 10,
            yes: 3 * BID_SCORE,
            maybe: 2 * BID_SCORE,
            no: BID_SCORE,
            conflict: -1_000_000,
        }
    }
}

impl ScoreWeights {
    pub fn bid(&self, preference: BidPreference) -> i64 {
        match preference {
            BidPreference::Yes => self.yes,
            BidPreference::Maybe => self.maybe,
            BidPreference::No => self.no,
        }
    }

    fn validate(&self, max_topics: usize) -> Result<(), ScoreError> {
        if self.topic < 0 {
            return Err(ScoreError::NegativeTopicWeight(self.topic));
        }
        let contribution = (max_topics as i64).saturating_mul(self.topic);
        if contribution >= BID_SCORE {
            return Err(ScoreError::TopicReachesBidThreshold {
                max_topics,
                contribution,
            });
        }
        for preference in BidPreference::ALL {
            let weight = self.bid(preference);
            if weight < BID_SCORE {
                return Err(ScoreError::BidBelowThreshold { preference, weight });
            }
        }
        Ok(())
    }
}

/// Raw tables the score matrix is prepared from.
#[derive(Clone, Copy, Debug)]
pub struct ScoreInputs<'a> {
    pub reviewer_topics: &'a BTreeMap<ReviewerId, BTreeSet<String>>,
    pub paper_topics: &'a BTreeMap<PaperId, BTreeSet<String>>,
    pub bids: &'a [(ReviewerId, PaperId, BidPreference)],
    pub declared_conflicts: &'a [(ReviewerId, PaperId)],
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("Unknown bid preference '{0}' (expected yes, maybe or no)")]
    UnknownPreference(String),
    #[error("Topic weight must not be negative (found {0})")]
    NegativeTopicWeight(i64),
    #[error(
        "Topic fit can reach {contribution} with {max_topics} shared topics, which collides with the bid threshold {threshold}",
        threshold = BID_SCORE
    )]
    TopicReachesBidThreshold { max_topics: usize, contribution: i64 },
    #[error(
        "Weight for '{preference}' bids is {weight}, below the bid threshold {threshold}",
        threshold = BID_SCORE
    )]
    BidBelowThreshold {
        preference: BidPreference,
        weight: i64,
    },
    #[error("Score of ({reviewer}, {paper}) overflows")]
    Overflow { reviewer: ReviewerId, paper: PaperId },
}
