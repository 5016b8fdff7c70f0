//! Turns a validated instance into an [`AssignmentModel`].
//!
//! Every constraint class is produced by its own [`ConstraintBuilder`]. A
//! builder that is inactive for the instance emits nothing, and no builder
//! emits a constraint over an empty variable set.

use crate::model::{
    AssignmentModel, ConstraintClass, ConstraintSense, LinearConstraint, VariableLayout,
};
use paperassign_domain::AssignmentInstance;
use tracing::debug;

pub trait ConstraintBuilder {
    fn class(&self) -> ConstraintClass;

    fn is_active(&self, _instance: &AssignmentInstance) -> bool {
        true
    }

    fn emit(
        &self,
        instance: &AssignmentInstance,
        layout: &VariableLayout,
        out: &mut Vec<LinearConstraint>,
    );
}

fn push(
    out: &mut Vec<LinearConstraint>,
    class: ConstraintClass,
    label: String,
    variables: Vec<usize>,
    sense: ConstraintSense,
    rhs: u32,
) {
    if variables.is_empty() {
        return;
    }
    out.push(LinearConstraint {
        class,
        label,
        variables,
        sense,
        rhs,
    });
}

/// Every paper gets exactly the required number of reviewers.
pub struct ExactCoverage;

impl ConstraintBuilder for ExactCoverage {
    fn class(&self) -> ConstraintClass {
        ConstraintClass::Coverage
    }

    fn emit(
        &self,
        instance: &AssignmentInstance,
        layout: &VariableLayout,
        out: &mut Vec<LinearConstraint>,
    ) {
        let required = instance.policy().reviewers_per_paper;
        for (paper_idx, paper) in layout.papers().iter().enumerate() {
            let variables = (0..layout.reviewers().len())
                .map(|reviewer_idx| layout.index(reviewer_idx, paper_idx))
                .collect();
            push(
                out,
                self.class(),
                format!("coverage({paper})"),
                variables,
                ConstraintSense::Equal,
                required,
            );
        }
    }
}

/// Caps reviewers sharing a country with the paper's authors.
pub struct CountryConflictCap;

impl ConstraintBuilder for CountryConflictCap {
    fn class(&self) -> ConstraintClass {
        ConstraintClass::CountryConflict
    }

    fn emit(
        &self,
        instance: &AssignmentInstance,
        layout: &VariableLayout,
        out: &mut Vec<LinearConstraint>,
    ) {
        let cap = instance.policy().country_coi_max;
        for (paper_idx, &paper) in layout.papers().iter().enumerate() {
            let Some(conflicted) = instance.conflicts().country_coi(paper) else {
                continue;
            };
            let variables = conflicted
                .iter()
                .filter_map(|&reviewer| layout.reviewer_idx(reviewer))
                .map(|reviewer_idx| layout.index(reviewer_idx, paper_idx))
                .collect();
            push(
                out,
                self.class(),
                format!("country-conflict({paper})"),
                variables,
                ConstraintSense::AtMost,
                cap,
            );
        }
    }
}

/// Caps reviewers from any single country on one paper.
pub struct CountryDiversityCap;

impl ConstraintBuilder for CountryDiversityCap {
    fn class(&self) -> ConstraintClass {
        ConstraintClass::CountryDiversity
    }

    fn is_active(&self, instance: &AssignmentInstance) -> bool {
        instance.policy().most_freq_country.is_some()
    }

    fn emit(
        &self,
        instance: &AssignmentInstance,
        layout: &VariableLayout,
        out: &mut Vec<LinearConstraint>,
    ) {
        let Some(cap) = instance.policy().most_freq_country else {
            return;
        };
        for (paper_idx, paper) in layout.papers().iter().enumerate() {
            for (country, roster) in instance.conflicts().country_rosters() {
                let variables = roster
                    .iter()
                    .filter_map(|&reviewer| layout.reviewer_idx(reviewer))
                    .map(|reviewer_idx| layout.index(reviewer_idx, paper_idx))
                    .collect();
                push(
                    out,
                    self.class(),
                    format!("country-diversity({country},{paper})"),
                    variables,
                    ConstraintSense::AtMost,
                    cap,
                );
            }
        }
    }
}

/// `min_load <= load <= max_load`, as two inequalities. A zero minimum is
/// implied by the binary domain and is not emitted.
pub struct ReviewerLoadBounds;

impl ConstraintBuilder for ReviewerLoadBounds {
    fn class(&self) -> ConstraintClass {
        ConstraintClass::ReviewerLoad
    }

    fn emit(
        &self,
        instance: &AssignmentInstance,
        layout: &VariableLayout,
        out: &mut Vec<LinearConstraint>,
    ) {
        for (reviewer_idx, &reviewer) in layout.reviewers().iter().enumerate() {
            let Some(bounds) = instance.load_bounds(reviewer) else {
                continue;
            };
            let variables: Vec<usize> = (0..layout.papers().len())
                .map(|paper_idx| layout.index(reviewer_idx, paper_idx))
                .collect();
            if bounds.min > 0 {
                push(
                    out,
                    self.class(),
                    format!("min-load({reviewer})"),
                    variables.clone(),
                    ConstraintSense::AtLeast,
                    bounds.min,
                );
            }
            push(
                out,
                self.class(),
                format!("max-load({reviewer})"),
                variables,
                ConstraintSense::AtMost,
                bounds.max,
            );
        }
    }
}

/// Caps last-minute reviewers per paper; only when the roster flags any.
pub struct LastMinuteCap;

impl ConstraintBuilder for LastMinuteCap {
    fn class(&self) -> ConstraintClass {
        ConstraintClass::LastMinute
    }

    fn is_active(&self, instance: &AssignmentInstance) -> bool {
        instance.has_last_minute_reviewers()
    }

    fn emit(
        &self,
        instance: &AssignmentInstance,
        layout: &VariableLayout,
        out: &mut Vec<LinearConstraint>,
    ) {
        let cap = instance.policy().max_last_minute;
        let last_minute: Vec<usize> = instance
            .reviewers()
            .iter()
            .filter(|reviewer| reviewer.is_last_minute)
            .filter_map(|reviewer| layout.reviewer_idx(reviewer.id))
            .collect();
        for (paper_idx, paper) in layout.papers().iter().enumerate() {
            let variables = last_minute
                .iter()
                .map(|&reviewer_idx| layout.index(reviewer_idx, paper_idx))
                .collect();
            push(
                out,
                self.class(),
                format!("last-minute({paper})"),
                variables,
                ConstraintSense::AtMost,
                cap,
            );
        }
    }
}

/// Caps the papers a reviewer did not bid on, by the single tier matching
/// its bid count.
pub struct NoBidTierCap;

impl ConstraintBuilder for NoBidTierCap {
    fn class(&self) -> ConstraintClass {
        ConstraintClass::NoBid
    }

    fn is_active(&self, instance: &AssignmentInstance) -> bool {
        instance.policy().no_bid.is_some()
    }

    fn emit(
        &self,
        instance: &AssignmentInstance,
        layout: &VariableLayout,
        out: &mut Vec<LinearConstraint>,
    ) {
        let scores = instance.scores();
        for (reviewer_idx, &reviewer) in layout.reviewers().iter().enumerate() {
            let Some(cap) = instance.no_bid_cap(reviewer) else {
                continue;
            };
            let variables = layout
                .papers()
                .iter()
                .enumerate()
                .filter(|&(_, &paper)| !scores.is_bid(reviewer, paper))
                .map(|(paper_idx, _)| layout.index(reviewer_idx, paper_idx))
                .collect();
            push(
                out,
                self.class(),
                format!("no-bid({reviewer})"),
                variables,
                ConstraintSense::AtMost,
                cap,
            );
        }
    }
}

pub fn default_builders() -> Vec<Box<dyn ConstraintBuilder>> {
    vec![
        Box::new(ExactCoverage),
        Box::new(CountryConflictCap),
        Box::new(CountryDiversityCap),
        Box::new(ReviewerLoadBounds),
        Box::new(LastMinuteCap),
        Box::new(NoBidTierCap),
    ]
}

pub struct ModelBuilder<'a> {
    instance: &'a AssignmentInstance,
    builders: Vec<Box<dyn ConstraintBuilder>>,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(instance: &'a AssignmentInstance) -> Self {
        Self::with_builders(instance, default_builders())
    }

    pub fn with_builders(
        instance: &'a AssignmentInstance,
        builders: Vec<Box<dyn ConstraintBuilder>>,
    ) -> Self {
        Self { instance, builders }
    }

    /// One binary variable per pair of the full reviewer x paper cross
    /// product, including pairs with no recorded score.
    pub fn build(&self) -> AssignmentModel {
        let layout = VariableLayout::new(
            self.instance
                .reviewers()
                .iter()
                .map(|reviewer| reviewer.id)
                .collect(),
            self.instance.papers().to_vec(),
        );

        let scores = self.instance.scores();
        let mut objective = Vec::with_capacity(layout.len());
        for &reviewer in layout.reviewers() {
            for &paper in layout.papers() {
                objective.push(scores.get(reviewer, paper));
            }
        }

        let mut constraints = Vec::new();
        let mut active_classes = Vec::new();
        for builder in &self.builders {
            if !builder.is_active(self.instance) {
                continue;
            }
            let before = constraints.len();
            builder.emit(self.instance, &layout, &mut constraints);
            debug!(
                "{} builder emitted {} constraints",
                builder.class(),
                constraints.len() - before
            );
            active_classes.push(builder.class());
        }

        AssignmentModel::new(layout, objective, constraints, active_classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperassign_domain::{
        AssignmentPolicy, BID_SCORE, ConflictSets, PaperId, Reviewer, ReviewerId, ScoreMatrix,
    };
    use std::collections::{BTreeMap, BTreeSet};

    fn instance(
        reviewers: Vec<Reviewer>,
        papers: u32,
        scores: ScoreMatrix,
        conflicts: ConflictSets,
        policy: AssignmentPolicy,
    ) -> AssignmentInstance {
        AssignmentInstance::try_new(
            reviewers,
            (1..=papers).map(PaperId).collect(),
            scores,
            conflicts,
            policy,
        )
        .expect("valid instance")
    }

    fn count(model: &AssignmentModel, class: ConstraintClass) -> usize {
        model
            .constraints()
            .iter()
            .filter(|constraint| constraint.class == class)
            .count()
    }

    #[test]
    fn builds_full_cross_product_with_score_objective() {
        let scores: ScoreMatrix = [
            (ReviewerId(1), PaperId(1), 5),
            (ReviewerId(2), PaperId(2), 4),
        ]
        .into_iter()
        .collect();
        let model = ModelBuilder::new(&instance(
            vec![
                Reviewer::new(ReviewerId(1), "JP"),
                Reviewer::new(ReviewerId(2), "FR"),
                Reviewer::new(ReviewerId(3), "FR"),
            ],
            2,
            scores,
            ConflictSets::default(),
            AssignmentPolicy::new(1, 0, 2, 0),
        ))
        .build();

        assert_eq!(model.variable_count(), 6);
        assert_eq!(model.objective(), &[5, 0, 0, 4, 0, 0]);
        assert_eq!(count(&model, ConstraintClass::Coverage), 2);
        assert_eq!(count(&model, ConstraintClass::ReviewerLoad), 3);
        assert_eq!(
            model.active_classes(),
            &[
                ConstraintClass::Coverage,
                ConstraintClass::CountryConflict,
                ConstraintClass::ReviewerLoad,
            ]
        );
    }

    #[test]
    fn empty_conflict_sets_emit_no_constraints() {
        let model = ModelBuilder::new(&instance(
            vec![
                Reviewer::new(ReviewerId(1), "JP"),
                Reviewer::new(ReviewerId(2), "FR"),
            ],
            2,
            ScoreMatrix::new(),
            ConflictSets::new(
                BTreeMap::from([(PaperId(1), BTreeSet::new())]),
                BTreeMap::from([("DE".to_owned(), BTreeSet::new())]),
            ),
            AssignmentPolicy::new(1, 0, 2, 0).with_most_freq_country(1),
        ))
        .build();

        assert_eq!(count(&model, ConstraintClass::CountryConflict), 0);
        assert_eq!(count(&model, ConstraintClass::CountryDiversity), 0);
        assert!(
            model
                .constraints()
                .iter()
                .all(|constraint| !constraint.variables.is_empty())
        );
    }

    #[test]
    fn country_conflict_covers_only_conflicted_reviewers() {
        let reviewers = vec![
            Reviewer::new(ReviewerId(1), "JP"),
            Reviewer::new(ReviewerId(2), "FR"),
            Reviewer::new(ReviewerId(3), "JP"),
        ];
        let author_countries = BTreeMap::from([(PaperId(2), BTreeSet::from(["JP".to_owned()]))]);
        let conflicts = ConflictSets::derive(&reviewers, &author_countries);
        let model = ModelBuilder::new(&instance(
            reviewers,
            2,
            ScoreMatrix::new(),
            conflicts,
            AssignmentPolicy::new(1, 0, 2, 1),
        ))
        .build();

        let conflict: Vec<&LinearConstraint> = model
            .constraints()
            .iter()
            .filter(|constraint| constraint.class == ConstraintClass::CountryConflict)
            .collect();
        assert_eq!(conflict.len(), 1);
        // reviewers 1 and 3 on paper 2 (paper index 1)
        assert_eq!(conflict[0].variables, vec![1, 5]);
        assert_eq!(conflict[0].sense, ConstraintSense::AtMost);
        assert_eq!(conflict[0].rhs, 1);
    }

    #[test]
    fn diversity_emits_per_paper_and_country() {
        let reviewers = vec![
            Reviewer::new(ReviewerId(1), "JP"),
            Reviewer::new(ReviewerId(2), "FR"),
            Reviewer::new(ReviewerId(3), "JP"),
        ];
        let conflicts = ConflictSets::new(BTreeMap::new(), ConflictSets::rosters_from(&reviewers));
        let with_cap = ModelBuilder::new(&instance(
            reviewers.clone(),
            3,
            ScoreMatrix::new(),
            conflicts.clone(),
            AssignmentPolicy::new(1, 0, 3, 0).with_most_freq_country(1),
        ))
        .build();
        let without_cap = ModelBuilder::new(&instance(
            reviewers,
            3,
            ScoreMatrix::new(),
            conflicts,
            AssignmentPolicy::new(1, 0, 3, 0),
        ))
        .build();

        assert_eq!(count(&with_cap, ConstraintClass::CountryDiversity), 6);
        assert_eq!(count(&without_cap, ConstraintClass::CountryDiversity), 0);
        assert!(
            !without_cap
                .active_classes()
                .contains(&ConstraintClass::CountryDiversity)
        );
    }

    #[test]
    fn load_bounds_skip_zero_minimum() {
        let model = ModelBuilder::new(&instance(
            vec![
                Reviewer::new(ReviewerId(1), "JP"),
                Reviewer::new(ReviewerId(2), "JP").with_min_load(0),
            ],
            2,
            ScoreMatrix::new(),
            ConflictSets::default(),
            AssignmentPolicy::new(1, 1, 2, 0),
        ))
        .build();

        let labels: Vec<&str> = model
            .constraints()
            .iter()
            .filter(|constraint| constraint.class == ConstraintClass::ReviewerLoad)
            .map(|constraint| constraint.label.as_str())
            .collect();
        assert_eq!(labels, vec!["min-load(r1)", "max-load(r1)", "max-load(r2)"]);
    }

    #[test]
    fn last_minute_only_when_flagged() {
        let plain = ModelBuilder::new(&instance(
            vec![
                Reviewer::new(ReviewerId(1), "JP"),
                Reviewer::new(ReviewerId(2), "JP"),
            ],
            2,
            ScoreMatrix::new(),
            ConflictSets::default(),
            AssignmentPolicy::new(1, 0, 2, 0),
        ))
        .build();
        let flagged = ModelBuilder::new(&instance(
            vec![
                Reviewer::new(ReviewerId(1), "JP").last_minute(),
                Reviewer::new(ReviewerId(2), "JP"),
            ],
            2,
            ScoreMatrix::new(),
            ConflictSets::default(),
            AssignmentPolicy::new(1, 0, 2, 0),
        ))
        .build();

        assert_eq!(count(&plain, ConstraintClass::LastMinute), 0);
        assert_eq!(count(&flagged, ConstraintClass::LastMinute), 2);
        assert!(
            flagged
                .constraints()
                .iter()
                .filter(|constraint| constraint.class == ConstraintClass::LastMinute)
                .all(|constraint| constraint.variables.len() == 1 && constraint.rhs == 1)
        );
    }

    #[test]
    fn no_bid_uses_single_matching_tier_over_non_bid_papers() {
        let scores: ScoreMatrix = [
            (ReviewerId(1), PaperId(1), BID_SCORE),
            (ReviewerId(1), PaperId(2), BID_SCORE),
            (ReviewerId(1), PaperId(3), BID_SCORE),
            (ReviewerId(1), PaperId(4), BID_SCORE - 1),
            (ReviewerId(2), PaperId(1), BID_SCORE),
        ]
        .into_iter()
        .collect();
        let model = ModelBuilder::new(&instance(
            vec![
                Reviewer::new(ReviewerId(1), "JP"),
                Reviewer::new(ReviewerId(2), "JP"),
                Reviewer::new(ReviewerId(3), "JP"),
            ],
            4,
            scores,
            ConflictSets::default(),
            AssignmentPolicy::new(1, 0, 4, 0).with_no_bid("1:3,3:1".parse().expect("valid")),
        ))
        .build();

        let no_bid: Vec<&LinearConstraint> = model
            .constraints()
            .iter()
            .filter(|constraint| constraint.class == ConstraintClass::NoBid)
            .collect();
        assert_eq!(no_bid.len(), 2);
        assert_eq!(no_bid[0].label, "no-bid(r1)");
        assert_eq!(no_bid[0].variables, vec![3]);
        assert_eq!(no_bid[0].rhs, 1);
        assert_eq!(no_bid[1].label, "no-bid(r2)");
        assert_eq!(no_bid[1].variables, vec![5, 6, 7]);
        assert_eq!(no_bid[1].rhs, 3);
    }

    #[test]
    fn building_twice_is_identical() {
        let reviewers = vec![
            Reviewer::new(ReviewerId(2), "FR").last_minute(),
            Reviewer::new(ReviewerId(1), "JP"),
        ];
        let conflicts = ConflictSets::new(BTreeMap::new(), ConflictSets::rosters_from(&reviewers));
        let instance = instance(
            reviewers,
            3,
            ScoreMatrix::new(),
            conflicts,
            AssignmentPolicy::new(1, 1, 3, 0).with_most_freq_country(1),
        );

        let first = ModelBuilder::new(&instance).build();
        let second = ModelBuilder::new(&instance).build();

        assert_eq!(first.constraints(), second.constraints());
        assert_eq!(first.objective(), second.objective());
    }
}
