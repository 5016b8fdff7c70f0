use crate::{
    model::{PaperId, ReviewerId},
    score::ScoreMatrix,
};
use std::collections::{BTreeMap, BTreeSet};

/// Selected reviewer/paper pairs, keyed by reviewer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Assignment {
    by_reviewer: BTreeMap<ReviewerId, BTreeSet<PaperId>>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the pair was already present.
    pub fn insert(&mut self, reviewer: ReviewerId, paper: PaperId) -> bool {
        self.by_reviewer.entry(reviewer).or_default().insert(paper)
    }

    pub fn contains(&self, reviewer: ReviewerId, paper: PaperId) -> bool {
        self.by_reviewer
            .get(&reviewer)
            .is_some_and(|papers| papers.contains(&paper))
    }

    pub fn papers_of(&self, reviewer: ReviewerId) -> impl Iterator<Item = PaperId> + '_ {
        self.by_reviewer
            .get(&reviewer)
            .into_iter()
            .flatten()
            .copied()
    }

    pub fn load(&self, reviewer: ReviewerId) -> usize {
        self.by_reviewer.get(&reviewer).map_or(0, BTreeSet::len)
    }

    pub fn reviewers_by_paper(&self) -> BTreeMap<PaperId, BTreeSet<ReviewerId>> {
        let mut by_paper: BTreeMap<PaperId, BTreeSet<ReviewerId>> = BTreeMap::new();
        for (reviewer, paper) in self.pairs() {
            by_paper.entry(paper).or_default().insert(reviewer);
        }
        by_paper
    }

    /// Pairs ordered by reviewer id, then paper id.
    pub fn pairs(&self) -> impl Iterator<Item = (ReviewerId, PaperId)> + '_ {
        self.by_reviewer
            .iter()
            .flat_map(|(&reviewer, papers)| papers.iter().map(move |&paper| (reviewer, paper)))
    }

    pub fn len(&self) -> usize {
        self.by_reviewer.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the scores of every selected pair, saturating at the `i64` range.
    pub fn objective(&self, scores: &ScoreMatrix) -> i64 {
        self.pairs()
            .map(|(reviewer, paper)| scores.get(reviewer, paper))
            .fold(0i64, i64::saturating_add)
    }
}

impl FromIterator<(ReviewerId, PaperId)> for Assignment {
    fn from_iter<T: IntoIterator<Item = (ReviewerId, PaperId)>>(iter: T) -> Self {
        let mut assignment = Self::new();
        for (reviewer, paper) in iter {
            assignment.insert(reviewer, paper);
        }
        assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_ordered_and_deduplicated() {
        let assignment: Assignment = [
            (ReviewerId(2), PaperId(1)),
            (ReviewerId(1), PaperId(3)),
            (ReviewerId(1), PaperId(2)),
            (ReviewerId(1), PaperId(3)),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            assignment.pairs().collect::<Vec<_>>(),
            vec![
                (ReviewerId(1), PaperId(2)),
                (ReviewerId(1), PaperId(3)),
                (ReviewerId(2), PaperId(1)),
            ]
        );
        assert_eq!(assignment.len(), 3);
        assert_eq!(assignment.load(ReviewerId(1)), 2);
        assert_eq!(assignment.load(ReviewerId(5)), 0);
        assert_eq!(
            assignment.reviewers_by_paper().get(&PaperId(3)),
            Some(&BTreeSet::from([ReviewerId(1)]))
        );
    }

    #[test]
    fn objective_sums_selected_scores_with_zero_default() {
        let scores: ScoreMatrix = [
            (ReviewerId(1), PaperId(1), 5),
            (ReviewerId(2), PaperId(2), 4),
            (ReviewerId(2), PaperId(1), 3),
        ]
        .into_iter()
        .collect();
        let assignment: Assignment = [
            (ReviewerId(1), PaperId(1)),
            (ReviewerId(2), PaperId(2)),
            (ReviewerId(3), PaperId(2)),
        ]
        .into_iter()
        .collect();

        assert_eq!(assignment.objective(&scores), 9);
    }

    #[test]
    fn objective_saturates_instead_of_overflowing() {
        let scores: ScoreMatrix = [
            (ReviewerId(1), PaperId(1), i64::MAX),
            (ReviewerId(2), PaperId(1), i64::MAX),
        ]
        .into_iter()
        .collect();
        let assignment: Assignment = [(ReviewerId(1), PaperId(1)), (ReviewerId(2), PaperId(1))]
            .into_iter()
            .collect();

        assert_eq!(assignment.objective(&scores), i64::MAX);
    }
}
