use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReviewerId(pub u32);

impl fmt::Display for ReviewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PaperId(pub u32);

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// A program committee member as read from the roster.
///
/// Load overrides are optional; unset values fall back to the policy
/// defaults when the instance is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reviewer {
    pub id: ReviewerId,
    pub country: String,
    pub min_load: Option<u32>,
    pub max_load: Option<u32>,
    pub is_last_minute: bool,
}

impl Reviewer {
    pub fn new(id: ReviewerId, country: impl Into<String>) -> Self {
        Self {
            id,
            country: country.into(),
            min_load: None,
            max_load: None,
            is_last_minute: false,
        }
    }

    pub fn with_min_load(mut self, min_load: u32) -> Self {
        self.min_load = Some(min_load);
        self
    }

    pub fn with_max_load(mut self, max_load: u32) -> Self {
        self.max_load = Some(max_load);
        self
    }

    pub fn last_minute(mut self) -> Self {
        self.is_last_minute = true;
        self
    }
}
