//! Solver-agnostic description of the assignment problem.

use fxhash::FxHashMap;
use paperassign_domain::{PaperId, ReviewerId};
use std::{collections::BTreeMap, fmt};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstraintClass {
    Coverage,
    CountryConflict,
    CountryDiversity,
    ReviewerLoad,
    LastMinute,
    NoBid,
}

impl ConstraintClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coverage => "coverage",
            Self::CountryConflict => "country-conflict",
            Self::CountryDiversity => "country-diversity",
            Self::ReviewerLoad => "reviewer-load",
            Self::LastMinute => "last-minute",
            Self::NoBid => "no-bid",
        }
    }

    /// Classes that only exist when the policy or the roster asks for them.
    pub fn is_optional(self) -> bool {
        matches!(
            self,
            Self::CountryDiversity | Self::LastMinute | Self::NoBid
        )
    }
}

impl fmt::Display for ConstraintClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintSense {
    Equal,
    AtMost,
    AtLeast,
}

/// `sum(variables) <sense> rhs`, every coefficient being one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinearConstraint {
    pub class: ConstraintClass,
    pub label: String,
    pub variables: Vec<usize>,
    pub sense: ConstraintSense,
    pub rhs: u32,
}

/// Maps (reviewer, paper) pairs of the full cross product to variable indices.
#[derive(Clone, Debug)]
pub struct VariableLayout {
    reviewers: Vec<ReviewerId>,
    papers: Vec<PaperId>,
    reviewer_index: FxHashMap<ReviewerId, usize>,
}

impl VariableLayout {
    pub fn new(reviewers: Vec<ReviewerId>, papers: Vec<PaperId>) -> Self {
        let reviewer_index = reviewers
            .iter()
            .enumerate()
            .map(|(idx, &reviewer)| (reviewer, idx))
            .collect();
        Self {
            reviewers,
            papers,
            reviewer_index,
        }
    }

    pub fn reviewers(&self) -> &[ReviewerId] {
        &self.reviewers
    }

    pub fn papers(&self) -> &[PaperId] {
        &self.papers
    }

    pub fn len(&self) -> usize {
        self.reviewers.len() * self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self, reviewer_idx: usize, paper_idx: usize) -> usize {
        reviewer_idx * self.papers.len() + paper_idx
    }

    pub fn reviewer_idx(&self, reviewer: ReviewerId) -> Option<usize> {
        self.reviewer_index.get(&reviewer).copied()
    }

    pub fn pair(&self, var: usize) -> Option<(ReviewerId, PaperId)> {
        if self.papers.is_empty() {
            return None;
        }
        let reviewer = *self.reviewers.get(var / self.papers.len())?;
        let paper = self.papers[var % self.papers.len()];
        Some((reviewer, paper))
    }
}

/// Variables, objective and constraints of one run.
#[derive(Clone, Debug)]
pub struct AssignmentModel {
    layout: VariableLayout,
    objective: Vec<i64>,
    constraints: Vec<LinearConstraint>,
    active_classes: Vec<ConstraintClass>,
}

impl AssignmentModel {
    pub(crate) fn new(
        layout: VariableLayout,
        objective: Vec<i64>,
        constraints: Vec<LinearConstraint>,
        active_classes: Vec<ConstraintClass>,
    ) -> Self {
        Self {
            layout,
            objective,
            constraints,
            active_classes,
        }
    }

    pub fn layout(&self) -> &VariableLayout {
        &self.layout
    }

    pub fn variable_count(&self) -> usize {
        self.layout.len()
    }

    /// Objective coefficient per variable: the pair's score.
    pub fn objective(&self) -> &[i64] {
        &self.objective
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn active_classes(&self) -> &[ConstraintClass] {
        &self.active_classes
    }

    pub fn summary(&self) -> ModelSummary {
        let mut constraints = BTreeMap::new();
        for constraint in &self.constraints {
            *constraints.entry(constraint.class).or_insert(0) += 1;
        }
        ModelSummary {
            variables: self.variable_count(),
            constraints,
            active_classes: self.active_classes.clone(),
        }
    }
}

/// Sizes of a built model, reported with infeasibility so an operator can
/// see which optional classes to relax.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSummary {
    pub variables: usize,
    pub constraints: BTreeMap<ConstraintClass, usize>,
    pub active_classes: Vec<ConstraintClass>,
}

impl ModelSummary {
    pub fn constraint_count(&self) -> usize {
        self.constraints.values().sum()
    }

    pub fn active_optional_classes(&self) -> impl Iterator<Item = ConstraintClass> + '_ {
        self.active_classes
            .iter()
            .copied()
            .filter(|class| class.is_optional())
    }
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} variables, {} constraints",
            self.variables,
            self.constraint_count()
        )?;
        for (class, count) in &self.constraints {
            write!(f, ", {class}={count}")?;
        }
        let optional: Vec<&str> = self
            .active_optional_classes()
            .map(ConstraintClass::as_str)
            .collect();
        if optional.is_empty() {
            write!(f, "; no optional constraint classes active")
        } else {
            write!(f, "; optional classes active: {}", optional.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_round_trips_indices() {
        let layout = VariableLayout::new(
            vec![ReviewerId(4), ReviewerId(7)],
            vec![PaperId(1), PaperId(2), PaperId(3)],
        );

        assert_eq!(layout.len(), 6);
        assert_eq!(layout.index(1, 2), 5);
        assert_eq!(layout.pair(5), Some((ReviewerId(7), PaperId(3))));
        assert_eq!(layout.pair(6), None);
        assert_eq!(layout.reviewer_idx(ReviewerId(7)), Some(1));
        assert_eq!(layout.reviewer_idx(ReviewerId(5)), None);
    }
}
