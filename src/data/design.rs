//! Two-group comparison design validated against a count matrix

use serde::{Deserialize, Serialize};

use super::{CountMatrix, SampleMetadata};
use crate::error::{DegseaError, Result};

/// Which side of the comparison a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Group {
    /// Reference group (denominator of the fold change)
    A,
    /// Comparison group (numerator of the fold change)
    B,
}

/// Assignment of every count-matrix column to group A or group B.
///
/// Log2 fold changes are reported as `log2(mean_B) - log2(mean_A)`, so a
/// positive value means higher expression in group B.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonDesign {
    variable: String,
    group_a: String,
    group_b: String,
    /// One entry per count-matrix column, in column order
    assignments: Vec<Group>,
}

impl ComparisonDesign {
    /// Build a design from `variable` in `metadata`, matching samples by id.
    ///
    /// Every count-matrix sample must carry exactly one of the two labels and
    /// each group needs at least `min_replicates` samples.
    pub fn new(
        counts: &CountMatrix,
        metadata: &SampleMetadata,
        variable: &str,
        group_a: &str,
        group_b: &str,
        min_replicates: usize,
    ) -> Result<Self> {
        if group_a == group_b {
            return Err(DegseaError::DegenerateInput {
                reason: format!("both comparison groups are '{}'", group_a),
            });
        }
        if !metadata.has_condition(variable) {
            return Err(DegseaError::InvalidMetadata {
                reason: format!("condition '{}' not found", variable),
            });
        }

        let mut assignments = Vec::with_capacity(counts.n_samples());
        for sample in counts.sample_ids() {
            let label = metadata.get_value(variable, sample).map_err(|e| match e {
                DegseaError::DegenerateInput { .. } => e,
                _ => DegseaError::DegenerateInput {
                    reason: format!("sample '{}' has no '{}' label", sample, variable),
                },
            })?;
            let group = if label == group_a {
                Group::A
            } else if label == group_b {
                Group::B
            } else {
                return Err(DegseaError::DegenerateInput {
                    reason: format!(
                        "sample '{}' is labelled '{}', expected '{}' or '{}'",
                        sample, label, group_a, group_b
                    ),
                });
            };
            assignments.push(group);
        }

        let design = Self {
            variable: variable.to_string(),
            group_a: group_a.to_string(),
            group_b: group_b.to_string(),
            assignments,
        };

        for (group, label) in [(Group::A, group_a), (Group::B, group_b)] {
            let n = design.group_size(group);
            if n < min_replicates {
                return Err(DegseaError::DegenerateInput {
                    reason: format!(
                        "group '{}' has {} sample(s), at least {} replicates are required",
                        label, n, min_replicates
                    ),
                });
            }
        }

        Ok(design)
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn label(&self, group: Group) -> &str {
        match group {
            Group::A => &self.group_a,
            Group::B => &self.group_b,
        }
    }

    /// Group of every count-matrix column
    pub fn assignments(&self) -> &[Group] {
        &self.assignments
    }

    pub fn n_samples(&self) -> usize {
        self.assignments.len()
    }

    /// Column indices belonging to `group`
    pub fn indices(&self, group: Group) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, &g)| g == group)
            .map(|(j, _)| j)
            .collect()
    }

    pub fn group_size(&self, group: Group) -> usize {
        self.assignments.iter().filter(|&&g| g == group).count()
    }

    /// Residual degrees of freedom of the two-group mean model
    pub fn residual_df(&self) -> usize {
        self.n_samples().saturating_sub(2)
    }
}
