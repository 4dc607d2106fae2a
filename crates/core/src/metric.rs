//! Distance metrics and metric-aware ranking.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Similarity function used to score and order vectors.
///
/// `InnerProduct` scores are similarities (higher is better);
/// `L2Distance` scores are Euclidean distances (lower is better).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    #[default]
    #[serde(rename = "inner_product", alias = "InnerProduct")]
    InnerProduct,
    #[serde(rename = "l2", alias = "L2Distance")]
    L2Distance,
}

impl DistanceMetric {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InnerProduct => "inner_product",
            Self::L2Distance => "l2",
        }
    }

    /// Whether higher scores rank first.
    pub fn higher_is_better(&self) -> bool {
        matches!(self, Self::InnerProduct)
    }

    /// Ordering that puts the better of two scores first.
    pub fn compare(&self, a: f32, b: f32) -> Ordering {
        let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        if self.higher_is_better() {
            ord.reverse()
        } else {
            ord
        }
    }

    /// Whether `a` ranks strictly ahead of `b`.
    pub fn is_better(&self, a: f32, b: f32) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// Threshold check in the metric's direction.
    ///
    /// Similarities must reach the threshold; distances must not exceed it.
    pub fn passes_threshold(&self, score: f32, threshold: f32) -> bool {
        match self {
            Self::InnerProduct => score >= threshold,
            Self::L2Distance => score <= threshold,
        }
    }

    /// Stable in-place sort, best first.
    pub fn sort_by_score<T>(&self, items: &mut [T], score: impl Fn(&T) -> f32) {
        items.sort_by(|a, b| self.compare(score(a), score(b)));
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inner_product" | "inner-product" | "innerproduct" | "ip" | "dot" => Ok(Self::InnerProduct),
            "l2" | "l2_distance" | "l2distance" | "euclidean" => Ok(Self::L2Distance),
            other => Err(AppError::Config(format!(
                "Unknown distance metric: '{}'. Supported: inner_product, l2",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("dot".parse::<DistanceMetric>().unwrap(), DistanceMetric::InnerProduct);
        assert_eq!("L2".parse::<DistanceMetric>().unwrap(), DistanceMetric::L2Distance);
        assert_eq!(
            "euclidean".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::L2Distance
        );
        assert!("cosine".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn test_inner_product_sorts_descending() {
        let mut scores = vec![0.1, 0.9, 0.5];
        DistanceMetric::InnerProduct.sort_by_score(&mut scores, |s| *s);
        assert_eq!(scores, vec![0.9, 0.5, 0.1]);
    }

    #[test]
    fn test_l2_sorts_ascending() {
        let mut scores = vec![2.0, 0.5, 1.0];
        DistanceMetric::L2Distance.sort_by_score(&mut scores, |s| *s);
        assert_eq!(scores, vec![0.5, 1.0, 2.0]);
    }

    #[test]
    fn test_threshold_direction() {
        assert!(DistanceMetric::InnerProduct.passes_threshold(0.2, 0.2));
        assert!(!DistanceMetric::InnerProduct.passes_threshold(0.19, 0.2));
        assert!(DistanceMetric::L2Distance.passes_threshold(0.5, 1.0));
        assert!(!DistanceMetric::L2Distance.passes_threshold(1.5, 1.0));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&DistanceMetric::L2Distance).unwrap();
        assert_eq!(json, "\"l2\"");
        let parsed: DistanceMetric = serde_json::from_str("\"inner_product\"").unwrap();
        assert_eq!(parsed, DistanceMetric::InnerProduct);
    }
}
