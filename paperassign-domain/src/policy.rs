//! Run-level policy parameters and the tiered no-bid rule.

use std::{collections::BTreeSet, fmt, str::FromStr};
use thiserror::Error;

/// Last-minute reviewers allowed on a single paper unless configured otherwise.
pub const DEFAULT_MAX_LAST_MINUTE: u32 = 1;

/// Reviewers who bid on at least `min_bid_count` papers may receive at most
/// `max_no_bid_count` papers they did not bid on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoBidTier {
    pub min_bid_count: u32,
    pub max_no_bid_count: u32,
}

/// Tiers ordered by `min_bid_count`, highest first.
///
/// Parsed from `minBid1:maxNoBid1,minBid2:maxNoBid2,...`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoBidPolicy {
    tiers: Vec<NoBidTier>,
}

impl NoBidPolicy {
    pub fn new(tiers: impl IntoIterator<Item = NoBidTier>) -> Result<Self, PolicyParseError> {
        let mut tiers: Vec<NoBidTier> = tiers.into_iter().collect();
        if tiers.is_empty() {
            return Err(PolicyParseError::Empty);
        }
        let mut seen = BTreeSet::new();
        for tier in &tiers {
            if !seen.insert(tier.min_bid_count) {
                return Err(PolicyParseError::DuplicateThreshold(tier.min_bid_count));
            }
        }
        tiers.sort_unstable_by(|a, b| b.min_bid_count.cmp(&a.min_bid_count));
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[NoBidTier] {
        &self.tiers
    }

    /// The highest-threshold tier the bid count meets, if any. Tiers do not
    /// accumulate: only this one applies.
    pub fn tier_for(&self, bid_count: u32) -> Option<NoBidTier> {
        self.tiers
            .iter()
            .copied()
            .find(|tier| bid_count >= tier.min_bid_count)
    }
}

impl FromStr for NoBidPolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PolicyParseError::Empty);
        }
        let tiers = trimmed
            .split(',')
            .map(parse_tier)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(tiers)
    }
}

fn parse_tier(entry: &str) -> Result<NoBidTier, PolicyParseError> {
    let entry = entry.trim();
    let Some((min_bid, max_no_bid)) = entry.split_once(':') else {
        return Err(PolicyParseError::MissingSeparator(entry.to_owned()));
    };
    let parse = |raw: &str| {
        raw.trim()
            .parse::<u32>()
            .map_err(|_| PolicyParseError::InvalidNumber {
                entry: entry.to_owned(),
                value: raw.trim().to_owned(),
            })
    };
    Ok(NoBidTier {
        min_bid_count: parse(min_bid)?,
        max_no_bid_count: parse(max_no_bid)?,
    })
}

impl fmt::Display for NoBidPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, tier) in self.tiers.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", tier.min_bid_count, tier.max_no_bid_count)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyParseError {
    #[error("No-bid policy must contain at least one `minBid:maxNoBid` tier")]
    Empty,
    #[error("No-bid tier '{0}' is missing the ':' separator")]
    MissingSeparator(String),
    #[error("No-bid tier '{entry}' has a non-numeric value '{value}'")]
    InvalidNumber { entry: String, value: String },
    #[error("No-bid threshold {0} appears more than once")]
    DuplicateThreshold(u32),
}

/// Per-run policy.
///
/// # Example
/// ```
/// use paperassign_domain::AssignmentPolicy;
///
/// let policy = AssignmentPolicy::new(3, 2, 5, 1)
///     .with_most_freq_country(2)
///     .with_no_bid("10:1,5:2".parse().unwrap());
/// assert_eq!(policy.reviewers_per_paper, 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignmentPolicy {
    /// Exact number of reviewers every paper receives.
    pub reviewers_per_paper: u32,
    /// Minimum load for reviewers without an override, clamped to their max.
    pub default_min_load: u32,
    /// Maximum load for reviewers without an override.
    pub default_max_load: u32,
    /// Cap on reviewers sharing a country with the paper's authors.
    pub country_coi_max: u32,
    /// Cap on reviewers from any single country per paper. `None` disables it.
    pub most_freq_country: Option<u32>,
    pub max_last_minute: u32,
    pub no_bid: Option<NoBidPolicy>,
}

impl AssignmentPolicy {
    pub fn new(
        reviewers_per_paper: u32,
        default_min_load: u32,
        default_max_load: u32,
        country_coi_max: u32,
    ) -> Self {
        Self {
            reviewers_per_paper,
            default_min_load,
            default_max_load,
            country_coi_max,
            most_freq_country: None,
            max_last_minute: DEFAULT_MAX_LAST_MINUTE,
            no_bid: None,
        }
    }

    pub fn with_most_freq_country(mut self, cap: u32) -> Self {
        self.most_freq_country = Some(cap);
        self
    }

    pub fn with_max_last_minute(mut self, cap: u32) -> Self {
        self.max_last_minute = cap;
        self
    }

    pub fn with_no_bid(mut self, policy: NoBidPolicy) -> Self {
        self.no_bid = Some(policy);
        self
    }

    /// Cap on non-bid papers for a reviewer with `bid_count` bids.
    pub fn no_bid_cap(&self, bid_count: u32) -> Option<u32> {
        self.no_bid
            .as_ref()
            .and_then(|policy| policy.tier_for(bid_count))
            .map(|tier| tier.max_no_bid_count)
    }
}
