//! Post-hoc check of an assignment against the instance it was built for.
//!
//! Recomputes every hard property independently of the optimizer, plus the
//! bid statistics printed in assignment reports.

use crate::{
    assignment::Assignment,
    instance::AssignmentInstance,
    model::{PaperId, ReviewerId},
};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PropertyViolation {
    #[error("Paper {paper} has {assigned} reviewers, {required} required")]
    Coverage {
        paper: PaperId,
        assigned: usize,
        required: u32,
    },
    #[error("Reviewer {reviewer} has {assigned} papers, allowed range is {min}..={max}")]
    LoadBounds {
        reviewer: ReviewerId,
        assigned: usize,
        min: u32,
        max: u32,
    },
    #[error("Paper {paper} has {conflicted} country-conflicted reviewers, cap is {cap}")]
    CountryConflict {
        paper: PaperId,
        conflicted: usize,
        cap: u32,
    },
    #[error("Paper {paper} has {assigned} reviewers from {country}, cap is {cap}")]
    CountryDiversity {
        paper: PaperId,
        country: String,
        assigned: usize,
        cap: u32,
    },
    #[error("Paper {paper} has {assigned} last-minute reviewers, cap is {cap}")]
    LastMinute {
        paper: PaperId,
        assigned: usize,
        cap: u32,
    },
    #[error("Reviewer {reviewer} has {non_bid} papers without a bid, cap is {cap}")]
    NoBid {
        reviewer: ReviewerId,
        non_bid: usize,
        cap: u32,
    },
    #[error("Pair ({reviewer}, {paper}) references an unknown reviewer or paper")]
    UnknownPair { reviewer: ReviewerId, paper: PaperId },
    #[error("Reviewer {reviewer} declared a conflict with paper {paper}")]
    DeclaredConflict { reviewer: ReviewerId, paper: PaperId },
}

impl PropertyViolation {
    /// Whether the optimizer is bound by this property. Declared conflicts
    /// are only priced into the score, so a solver may still pick them when
    /// nothing else fits.
    pub fn is_hard(&self) -> bool {
        !matches!(self, Self::DeclaredConflict { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignmentAudit {
    pub violations: Vec<PropertyViolation>,
    pub objective: i64,
    /// Number of reviewers per assigned-paper count.
    pub reviewers_by_load: BTreeMap<usize, usize>,
    /// Number of papers per count of assigned reviewers who bid on them.
    pub papers_by_bidding_reviewers: BTreeMap<usize, usize>,
    /// Number of reviewers per count of assigned papers they bid on.
    pub reviewers_by_bid_papers: BTreeMap<usize, usize>,
}

impl AssignmentAudit {
    pub fn run(instance: &AssignmentInstance, assignment: &Assignment) -> Self {
        let policy = instance.policy();
        let scores = instance.scores();
        let conflicts = instance.conflicts();
        let by_paper = assignment.reviewers_by_paper();
        let empty = BTreeSet::new();

        let mut violations = Vec::new();

        let known_papers: BTreeSet<PaperId> = instance.papers().iter().copied().collect();
        for (reviewer, paper) in assignment.pairs() {
            if instance.reviewer(reviewer).is_none() || !known_papers.contains(&paper) {
                violations.push(PropertyViolation::UnknownPair { reviewer, paper });
            }
            if conflicts.is_declared_conflict(reviewer, paper) {
                violations.push(PropertyViolation::DeclaredConflict { reviewer, paper });
            }
        }

        let mut papers_by_bidding_reviewers = BTreeMap::new();
        for &paper in instance.papers() {
            let reviewers = by_paper.get(&paper).unwrap_or(&empty);
            if reviewers.len() != policy.reviewers_per_paper as usize {
                violations.push(PropertyViolation::Coverage {
                    paper,
                    assigned: reviewers.len(),
                    required: policy.reviewers_per_paper,
                });
            }

            let conflicted = reviewers
                .iter()
                .filter(|&&reviewer| conflicts.is_country_conflicted(reviewer, paper))
                .count();
            if conflicted > policy.country_coi_max as usize {
                violations.push(PropertyViolation::CountryConflict {
                    paper,
                    conflicted,
                    cap: policy.country_coi_max,
                });
            }

            if let Some(cap) = policy.most_freq_country {
                for (country, roster) in conflicts.country_rosters() {
                    let assigned = reviewers.intersection(roster).count();
                    if assigned > cap as usize {
                        violations.push(PropertyViolation::CountryDiversity {
                            paper,
                            country: country.to_owned(),
                            assigned,
                            cap,
                        });
                    }
                }
            }

            let last_minute = reviewers
                .iter()
                .filter_map(|&reviewer| instance.reviewer(reviewer))
                .filter(|reviewer| reviewer.is_last_minute)
                .count();
            if last_minute > policy.max_last_minute as usize {
                violations.push(PropertyViolation::LastMinute {
                    paper,
                    assigned: last_minute,
                    cap: policy.max_last_minute,
                });
            }

            let bidding = reviewers
                .iter()
                .filter(|&&reviewer| scores.is_bid(reviewer, paper))
                .count();
            *papers_by_bidding_reviewers.entry(bidding).or_insert(0) += 1;
        }

        let mut reviewers_by_load = BTreeMap::new();
        let mut reviewers_by_bid_papers = BTreeMap::new();
        for reviewer in instance.reviewers() {
            let load = assignment.load(reviewer.id);
            *reviewers_by_load.entry(load).or_insert(0) += 1;

            let within_bounds = instance.load_bounds(reviewer.id).map(|bounds| {
                (
                    bounds,
                    bounds.contains(u32::try_from(load).unwrap_or(u32::MAX)),
                )
            });
            if let Some((bounds, false)) = within_bounds {
                violations.push(PropertyViolation::LoadBounds {
                    reviewer: reviewer.id,
                    assigned: load,
                    min: bounds.min,
                    max: bounds.max,
                });
            }

            let bid_papers = assignment
                .papers_of(reviewer.id)
                .filter(|&paper| scores.is_bid(reviewer.id, paper))
                .count();
            *reviewers_by_bid_papers.entry(bid_papers).or_insert(0) += 1;

            if let Some(cap) = instance.no_bid_cap(reviewer.id) {
                let non_bid = load - bid_papers;
                if non_bid > cap as usize {
                    violations.push(PropertyViolation::NoBid {
                        reviewer: reviewer.id,
                        non_bid,
                        cap,
                    });
                }
            }
        }

        Self {
            violations,
            objective: assignment.objective(scores),
            reviewers_by_load,
            papers_by_bidding_reviewers,
            reviewers_by_bid_papers,
        }
    }

    pub fn is_compliant(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn hard_violations(&self) -> impl Iterator<Item = &PropertyViolation> {
        self.violations.iter().filter(|violation| violation.is_hard())
    }

    /// Report rows as `(name, value)` in a stable order.
    pub fn statistics(&self) -> Vec<(String, i64)> {
        let mut rows = vec![
            ("objective".to_owned(), self.objective),
            ("violations".to_owned(), self.violations.len() as i64),
        ];
        for (load, count) in &self.reviewers_by_load {
            rows.push((format!("reviewers with {load} papers"), *count as i64));
        }
        for (bidding, count) in &self.papers_by_bidding_reviewers {
            rows.push((
                format!("papers with {bidding} bidding reviewers"),
                *count as i64,
            ));
        }
        for (bids, count) in &self.reviewers_by_bid_papers {
            rows.push((format!("reviewers with {bids} bid papers"), *count as i64));
        }
        rows
    }
}
