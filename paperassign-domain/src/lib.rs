#![warn(clippy::uninlined_format_args)]

pub mod assignment;
pub mod audit;
pub mod conflict;
pub mod instance;
pub mod model;
pub mod policy;
pub mod score;

pub use assignment::Assignment;
pub use audit::{AssignmentAudit, PropertyViolation};
pub use conflict::ConflictSets;
pub use instance::{AssignmentInstance, InstanceError, LoadBounds};
pub use model::{PaperId, Reviewer, ReviewerId};
pub use policy::{
    AssignmentPolicy, DEFAULT_MAX_LAST_MINUTE, NoBidPolicy, NoBidTier, PolicyParseError,
};
pub use score::{BID_SCORE, BidPreference, ScoreError, ScoreInputs, ScoreMatrix, ScoreWeights};
