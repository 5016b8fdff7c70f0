//! Validated, read-only snapshot of everything one assignment run consumes.

use crate::{
    conflict::ConflictSets,
    model::{PaperId, Reviewer, ReviewerId},
    policy::AssignmentPolicy,
    score::ScoreMatrix,
};
use fxhash::FxHashSet;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadBounds {
    pub min: u32,
    pub max: u32,
}

impl LoadBounds {
    pub fn contains(self, load: u32) -> bool {
        (self.min..=self.max).contains(&load)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InstanceError {
    #[error("Reviewers per paper must be positive")]
    ZeroReviewersPerPaper,
    #[error("Default min load {min} exceeds default max load {max}")]
    InvertedDefaultLoad { min: u32, max: u32 },
    #[error("Reviewer ids must be positive integers")]
    NonPositiveReviewerId,
    #[error("Paper ids must be positive integers")]
    NonPositivePaperId,
    #[error("Reviewer {0} appears more than once in the roster")]
    DuplicateReviewer(ReviewerId),
    #[error("Paper {0} appears more than once in the paper list")]
    DuplicatePaper(PaperId),
    #[error("The paper list is empty")]
    NoPapers,
    #[error("Reviewer {reviewer} has min load {min} above max load {max}")]
    InvertedLoadBounds {
        reviewer: ReviewerId,
        min: u32,
        max: u32,
    },
    #[error("{required} reviewers per paper requested but only {available} reviewers exist")]
    InsufficientReviewers { required: u32, available: usize },
    #[error("Reviewer {reviewer} referenced by the {table} is not in the roster")]
    UnknownReviewer {
        reviewer: ReviewerId,
        table: &'static str,
    },
    #[error("Paper {paper} referenced by the {table} is not in the paper list")]
    UnknownPaper { paper: PaperId, table: &'static str },
}

/// Inputs of one run after configuration and referential-integrity checks.
///
/// Reviewers and papers are kept sorted by id so every derived model is
/// built in the same order for the same inputs.
#[derive(Clone, Debug)]
pub struct AssignmentInstance {
    reviewers: Vec<Reviewer>,
    papers: Vec<PaperId>,
    scores: ScoreMatrix,
    conflicts: ConflictSets,
    policy: AssignmentPolicy,
    loads: BTreeMap<ReviewerId, LoadBounds>,
}

impl AssignmentInstance {
    pub fn try_new(
        mut reviewers: Vec<Reviewer>,
        mut papers: Vec<PaperId>,
        mut scores: ScoreMatrix,
        conflicts: ConflictSets,
        policy: AssignmentPolicy,
    ) -> Result<Self, InstanceError> {
        if policy.reviewers_per_paper == 0 {
            return Err(InstanceError::ZeroReviewersPerPaper);
        }
        if policy.default_min_load > policy.default_max_load {
            return Err(InstanceError::InvertedDefaultLoad {
                min: policy.default_min_load,
                max: policy.default_max_load,
            });
        }

        reviewers.sort_unstable_by_key(|reviewer| reviewer.id);
        papers.sort_unstable();

        let mut reviewer_ids = FxHashSet::default();
        for reviewer in &reviewers {
            if reviewer.id.0 == 0 {
                return Err(InstanceError::NonPositiveReviewerId);
            }
            if !reviewer_ids.insert(reviewer.id) {
                return Err(InstanceError::DuplicateReviewer(reviewer.id));
            }
        }
        let mut paper_ids = FxHashSet::default();
        for &paper in &papers {
            if paper.0 == 0 {
                return Err(InstanceError::NonPositivePaperId);
            }
            if !paper_ids.insert(paper) {
                return Err(InstanceError::DuplicatePaper(paper));
            }
        }
        if papers.is_empty() {
            return Err(InstanceError::NoPapers);
        }

        if policy.reviewers_per_paper as usize > reviewers.len() {
            return Err(InstanceError::InsufficientReviewers {
                required: policy.reviewers_per_paper,
                available: reviewers.len(),
            });
        }

        let known_reviewer = |reviewer: ReviewerId, table: &'static str| {
            if reviewer_ids.contains(&reviewer) {
                Ok(())
            } else {
                Err(InstanceError::UnknownReviewer { reviewer, table })
            }
        };
        let known_paper = |paper: PaperId, table: &'static str| {
            if paper_ids.contains(&paper) {
                Ok(())
            } else {
                Err(InstanceError::UnknownPaper { paper, table })
            }
        };

        // Scores outside the roster or paper list play no part in this run.
        let dropped = scores.retain(|reviewer, paper| {
            reviewer_ids.contains(&reviewer) && paper_ids.contains(&paper)
        });
        if dropped > 0 {
            warn!("Ignoring {dropped} scores for reviewers or papers outside this run");
        }

        for (paper, conflicted) in conflicts.country_coi_sets() {
            known_paper(paper, "country conflict sets")?;
            for &reviewer in conflicted {
                known_reviewer(reviewer, "country conflict sets")?;
            }
        }
        for (_, roster) in conflicts.country_rosters() {
            for &reviewer in roster {
                known_reviewer(reviewer, "country rosters")?;
            }
        }
        for (reviewer, paper) in conflicts.declared() {
            known_reviewer(reviewer, "declared conflicts")?;
            known_paper(paper, "declared conflicts")?;
        }

        let mut loads = BTreeMap::new();
        for reviewer in &reviewers {
            let bounds = resolve_load(reviewer, &policy);
            if bounds.min > bounds.max {
                return Err(InstanceError::InvertedLoadBounds {
                    reviewer: reviewer.id,
                    min: bounds.min,
                    max: bounds.max,
                });
            }
            loads.insert(reviewer.id, bounds);
        }

        Ok(Self {
            reviewers,
            papers,
            scores,
            conflicts,
            policy,
            loads,
        })
    }

    pub fn reviewers(&self) -> &[Reviewer] {
        &self.reviewers
    }

    pub fn papers(&self) -> &[PaperId] {
        &self.papers
    }

    pub fn scores(&self) -> &ScoreMatrix {
        &self.scores
    }

    pub fn conflicts(&self) -> &ConflictSets {
        &self.conflicts
    }

    pub fn policy(&self) -> &AssignmentPolicy {
        &self.policy
    }

    pub fn load_bounds(&self, reviewer: ReviewerId) -> Option<LoadBounds> {
        self.loads.get(&reviewer).copied()
    }

    pub fn reviewer(&self, id: ReviewerId) -> Option<&Reviewer> {
        self.reviewers
            .binary_search_by_key(&id, |reviewer| reviewer.id)
            .ok()
            .map(|idx| &self.reviewers[idx])
    }

    pub fn has_last_minute_reviewers(&self) -> bool {
        self.reviewers.iter().any(|reviewer| reviewer.is_last_minute)
    }

    /// Cap on non-bid papers for the reviewer, from the single tier its bid
    /// count qualifies for.
    pub fn no_bid_cap(&self, reviewer: ReviewerId) -> Option<u32> {
        self.policy.no_bid_cap(self.scores.bid_count(reviewer))
    }
}

/// Overrides win; otherwise the default min is clamped to the resolved max so
/// a reviewer with a small cap is never forced above it.
fn resolve_load(reviewer: &Reviewer, policy: &AssignmentPolicy) -> LoadBounds {
    let max = reviewer.max_load.unwrap_or(policy.default_max_load);
    let min = reviewer
        .min_load
        .unwrap_or_else(|| policy.default_min_load.min(max));
    LoadBounds { min, max }
}
