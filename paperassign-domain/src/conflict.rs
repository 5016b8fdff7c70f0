use crate::model::{PaperId, Reviewer, ReviewerId};
use std::collections::{BTreeMap, BTreeSet};

/// Country-based conflict data for one run.
///
/// `country_coi` lists, per paper, the reviewers sharing a country with one of
/// its authors. `country_rosters` groups the program committee by country and
/// feeds the per-paper diversity cap. `declared` holds the pairs reviewers
/// flagged themselves; they only weigh on the score, the audit reports them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConflictSets {
    country_coi: BTreeMap<PaperId, BTreeSet<ReviewerId>>,
    country_rosters: BTreeMap<String, BTreeSet<ReviewerId>>,
    declared: BTreeSet<(ReviewerId, PaperId)>,
}

impl ConflictSets {
    pub fn new(
        country_coi: BTreeMap<PaperId, BTreeSet<ReviewerId>>,
        country_rosters: BTreeMap<String, BTreeSet<ReviewerId>>,
    ) -> Self {
        Self {
            country_coi,
            country_rosters,
            declared: BTreeSet::new(),
        }
    }

    /// Derives both maps from the roster and the author countries of each paper.
    /// Reviewers with an empty country are left out of every set.
    pub fn derive(
        reviewers: &[Reviewer],
        author_countries: &BTreeMap<PaperId, BTreeSet<String>>,
    ) -> Self {
        let country_rosters = Self::rosters_from(reviewers);

        let mut country_coi: BTreeMap<PaperId, BTreeSet<ReviewerId>> = BTreeMap::new();
        for (&paper, countries) in author_countries {
            let conflicted: BTreeSet<ReviewerId> = countries
                .iter()
                .filter_map(|country| country_rosters.get(country))
                .flatten()
                .copied()
                .collect();
            if !conflicted.is_empty() {
                country_coi.insert(paper, conflicted);
            }
        }

        Self {
            country_coi,
            country_rosters,
            declared: BTreeSet::new(),
        }
    }

    pub fn rosters_from(reviewers: &[Reviewer]) -> BTreeMap<String, BTreeSet<ReviewerId>> {
        let mut rosters: BTreeMap<String, BTreeSet<ReviewerId>> = BTreeMap::new();
        for reviewer in reviewers {
            if reviewer.country.is_empty() {
                continue;
            }
            rosters
                .entry(reviewer.country.clone())
                .or_default()
                .insert(reviewer.id);
        }
        rosters
    }

    pub fn with_declared(
        mut self,
        pairs: impl IntoIterator<Item = (ReviewerId, PaperId)>,
    ) -> Self {
        self.declared.extend(pairs);
        self
    }

    pub fn is_declared_conflict(&self, reviewer: ReviewerId, paper: PaperId) -> bool {
        self.declared.contains(&(reviewer, paper))
    }

    pub fn declared(&self) -> impl Iterator<Item = (ReviewerId, PaperId)> + '_ {
        self.declared.iter().copied()
    }

    pub fn country_coi(&self, paper: PaperId) -> Option<&BTreeSet<ReviewerId>> {
        self.country_coi.get(&paper)
    }

    pub fn is_country_conflicted(&self, reviewer: ReviewerId, paper: PaperId) -> bool {
        self.country_coi(paper)
            .is_some_and(|reviewers| reviewers.contains(&reviewer))
    }

    pub fn country_coi_sets(&self) -> impl Iterator<Item = (PaperId, &BTreeSet<ReviewerId>)> {
        self.country_coi
            .iter()
            .map(|(&paper, reviewers)| (paper, reviewers))
    }

    pub fn country_rosters(&self) -> impl Iterator<Item = (&str, &BTreeSet<ReviewerId>)> {
        self.country_rosters
            .iter()
            .map(|(country, reviewers)| (country.as_str(), reviewers))
    }
}
