//! Input data structures: counts, sample labels, comparison design

mod count_matrix;
mod design;
mod metadata;

pub use count_matrix::CountMatrix;
pub use design::{ComparisonDesign, Group};
pub use metadata::SampleMetadata;
