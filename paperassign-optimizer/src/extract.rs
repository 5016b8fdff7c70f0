use crate::model::AssignmentModel;
use paperassign_domain::Assignment;

/// Midpoint between the two values of a binary variable.
pub const DEFAULT_SELECTION_THRESHOLD: f64 = 0.5;

/// Reads resolved variable values back into reviewer/paper pairs.
///
/// A value counts as selected when it is above `threshold`, so solver
/// round-off such as `0.9999999` still selects the pair.
pub fn extract_assignment(model: &AssignmentModel, values: &[f64], threshold: f64) -> Assignment {
    values
        .iter()
        .enumerate()
        .filter(|&(_, &value)| value > threshold)
        .filter_map(|(var, _)| model.layout().pair(var))
        .collect()
}
