use std::fmt;

/// Weight at or above which an attribute counts as emphasized.
pub const RAISED_WEIGHT: f64 = 2.0;
/// Weight at or below which an attribute counts as suppressed.
pub const LOWERED_WEIGHT: f64 = 0.5;

/// Direction the operator may want to move a weight in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    /// Heavily weighted but without influence on the split.
    Lower,
    /// Suppressed but still driving the split.
    Raise,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightRecommendation {
    pub attribute_index: usize,
    pub attribute: String,
    pub weight: f64,
    pub emphasis: Emphasis,
}

impl WeightRecommendation {
    /// Operator-facing explanation.
    #[must_use]
    pub fn message(&self) -> String {
        match self.emphasis {
            Emphasis::Lower => format!(
                "'{}' is weighted {}x but has no significant influence on how the data is split",
                self.attribute, self.weight
            ),
            Emphasis::Raise => format!(
                "'{}' is weighted only {}x but has a significant influence on how the data is split",
                self.attribute, self.weight
            ),
        }
    }
}

impl fmt::Display for WeightRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Suggests weight adjustments for the selected node.
///
/// Emphasized attributes that are not clustering-relevant come first, then
/// suppressed attributes that are. At most `limit` suggestions are returned.
#[must_use]
pub fn recommend_weights(
    attributes: &[String],
    weights: &[f64],
    relevant: &[usize],
    limit: usize,
) -> Vec<WeightRecommendation> {
    let mut out = Vec::new();
    let candidate = |index: usize, emphasis: Emphasis| {
        attributes.get(index).map(|attribute| WeightRecommendation {
            attribute_index: index,
            attribute: attribute.clone(),
            weight: weights[index],
            emphasis,
        })
    };
    let raised = weights
        .iter()
        .enumerate()
        .filter(|(index, weight)| **weight >= RAISED_WEIGHT && !relevant.contains(index))
        .map(|(index, _)| (index, Emphasis::Lower));
    let lowered = weights
        .iter()
        .enumerate()
        .filter(|(index, weight)| **weight <= LOWERED_WEIGHT && relevant.contains(index))
        .map(|(index, _)| (index, Emphasis::Raise));
    for (index, emphasis) in raised.chain(lowered) {
        if out.len() >= limit {
            break;
        }
        if let Some(recommendation) = candidate(index, emphasis) {
            out.push(recommendation);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        ["a", "b", "c", "d"].iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn emphasized_irrelevant_attribute_comes_first() {
        let found = recommend_weights(&columns(), &[3.0, 1.0, 0.2, 1.0], &[1], 1);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].attribute_index, 0);
        assert_eq!(found[0].emphasis, Emphasis::Lower);
    }

    #[test]
    fn suppressed_relevant_attribute_uses_its_own_index() {
        let found = recommend_weights(&columns(), &[3.0, 1.0, 0.2, 1.0], &[0, 2], 5);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].attribute, "c");
        assert_eq!(found[0].emphasis, Emphasis::Raise);
        assert!(found[0].message().contains("only 0.2x"));
    }

    #[test]
    fn limit_caps_the_list() {
        let found = recommend_weights(&columns(), &[2.0, 2.5, 0.5, 0.1], &[2, 3], 3);
        let order: Vec<usize> = found.iter().map(|r| r.attribute_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(recommend_weights(&columns(), &[2.0; 4], &[], 0).is_empty());
    }
}
