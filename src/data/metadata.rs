//! Sample metadata holding categorical group labels

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DegseaError, Result};

/// Sample annotations: sample ids plus named categorical columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleMetadata {
    sample_ids: Vec<String>,
    /// Column name -> value per sample
    conditions: HashMap<String, Vec<String>>,
}

impl SampleMetadata {
    pub fn new(sample_ids: Vec<String>) -> Self {
        let mut seen = std::collections::HashSet::new();
        for id in &sample_ids {
            if !seen.insert(id) {
                log::warn!("Duplicate sample ID in metadata: '{}'", id);
            }
        }
        Self {
            sample_ids,
            conditions: HashMap::new(),
        }
    }

    /// Convenience constructor for a single grouping column
    pub fn from_pairs<S: Into<String>, L: Into<String>>(
        variable: &str,
        pairs: impl IntoIterator<Item = (S, L)>,
    ) -> Result<Self> {
        let (ids, labels): (Vec<String>, Vec<String>) =
            pairs.into_iter().map(|(s, l)| (s.into(), l.into())).unzip();
        let mut meta = Self::new(ids);
        meta.add_condition(variable, labels)?;
        Ok(meta)
    }

    /// Add a categorical column
    pub fn add_condition(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.sample_ids.len() {
            return Err(DegseaError::DimensionMismatch {
                expected: format!("{} values", self.sample_ids.len()),
                got: format!("{} values", values.len()),
            });
        }
        self.conditions.insert(name.to_string(), values);
        Ok(())
    }

    pub fn has_condition(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    /// Label of `sample_id` in column `condition`.
    ///
    /// A sample listed more than once must carry the same label every time.
    pub fn get_value(&self, condition: &str, sample_id: &str) -> Result<&str> {
        let values = self.conditions.get(condition).ok_or_else(|| DegseaError::InvalidMetadata {
            reason: format!("condition '{}' not found", condition),
        })?;
        let mut labels = self
            .sample_ids
            .iter()
            .zip(values)
            .filter(|(id, _)| id.as_str() == sample_id)
            .map(|(_, v)| v.as_str());

        let first = labels.next().ok_or_else(|| DegseaError::InvalidMetadata {
            reason: format!("sample '{}' has no entry in the metadata", sample_id),
        })?;
        if let Some(other) = labels.find(|&l| l != first) {
            return Err(DegseaError::DegenerateInput {
                reason: format!(
                    "sample '{}' has conflicting '{}' labels: '{}' and '{}'",
                    sample_id, condition, first, other
                ),
            });
        }
        Ok(first)
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn condition(&self, name: &str) -> Option<&Vec<String>> {
        self.conditions.get(name)
    }

    /// Sorted unique levels of a column
    pub fn levels(&self, condition_name: &str) -> Option<Vec<String>> {
        self.conditions.get(condition_name).map(|values| {
            let mut unique = values.clone();
            unique.sort();
            unique.dedup();
            unique
        })
    }

    /// Metadata row indices carrying `level` in column `condition_name`
    pub fn samples_with_level(&self, condition_name: &str, level: &str) -> Vec<usize> {
        self.conditions
            .get(condition_name)
            .map(|values| {
                values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.as_str() == level)
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_metadata() {
        let meta = SampleMetadata::from_pairs(
            "treatment",
            [("s1", "control"), ("s2", "control"), ("s3", "treated"), ("s4", "treated")],
        )
        .unwrap();

        assert_eq!(meta.levels("treatment").unwrap(), vec!["control", "treated"]);
        assert_eq!(meta.samples_with_level("treatment", "control"), vec![0, 1]);
        assert_eq!(meta.get_value("treatment", "s3").unwrap(), "treated");
        assert!(meta.get_value("treatment", "s9").is_err());
        assert!(meta.get_value("batch", "s1").is_err());
    }

    #[test]
    fn test_add_condition_length_checked() {
        let mut meta = SampleMetadata::new(vec!["s1".to_string(), "s2".to_string()]);
        let result = meta.add_condition("treatment", vec!["a".to_string()]);
        assert!(matches!(result, Err(DegseaError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_repeated_sample_needs_consistent_label() {
        let meta = SampleMetadata::from_pairs(
            "condition",
            [("s1", "a"), ("s2", "b"), ("s1", "a"), ("s2", "a")],
        )
        .unwrap();
        assert_eq!(meta.get_value("condition", "s1").unwrap(), "a");
        match meta.get_value("condition", "s2") {
            Err(DegseaError::DegenerateInput { reason }) => assert!(reason.contains("'s2'")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
