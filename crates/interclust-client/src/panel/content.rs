//! Per-cluster summaries of feature-method results.

use std::fmt;

use interclust_protocol::{FeatureMethod, MethodResult};
use serde_json::Value;

/// Label the engine gives the noise cluster of density-based algorithms.
pub const NOISE_LABEL: i64 = -1;
const ADDITIONAL_SEPARATOR: &str = "-----";

/// What a panel is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelTopic {
    /// Analysis requested, no result yet.
    #[default]
    Starting,
    Method(FeatureMethod),
}

impl PanelTopic {
    #[must_use]
    pub fn header(self) -> &'static str {
        match self {
            Self::Starting => "Loading",
            Self::Method(method) => method.header(),
        }
    }
}

impl fmt::Display for PanelTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary {
    pub header: String,
    pub label: Value,
    pub instances: Option<u64>,
    pub lines: Vec<String>,
}

fn is_noise(label: &Value) -> bool {
    label.as_i64() == Some(NOISE_LABEL)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn bounded(name: &str, (low, high): (f64, f64)) -> String {
    format!("{} <= {name} <= {}", round3(low), round3(high))
}

/// Builds one summary per cluster. A leading noise cluster is headed
/// "Noisy Data" and the remaining clusters are numbered from zero.
#[must_use]
pub fn summarize(result: &MethodResult) -> Vec<ClusterSummary> {
    let correction = usize::from(result.labels.first().is_some_and(is_noise));
    result
        .labels
        .iter()
        .enumerate()
        .map(|(index, label)| {
            let header = if index < correction {
                "Noisy Data".to_string()
            } else {
                format!("Cluster {}", index - correction)
            };
            ClusterSummary {
                header,
                label: label.clone(),
                instances: result.instances.get(index).copied(),
                lines: cluster_lines(result, index),
            }
        })
        .collect()
}

fn cluster_lines(result: &MethodResult, cluster: usize) -> Vec<String> {
    if result.method == FeatureMethod::Method1 {
        return result
            .features
            .get(cluster)
            .map(|names| vec![names.join(", ")])
            .unwrap_or_default();
    }
    let mut lines = Vec::new();
    if result.method == FeatureMethod::ModifiedMethod3 {
        let ranges = result.additional_thresholds.get(cluster);
        for (index, name) in result.additional_features.iter().enumerate() {
            if let Some(range) = ranges.and_then(|ranges| ranges.get(index)) {
                lines.push(bounded(name, *range));
            }
        }
        lines.push(ADDITIONAL_SEPARATOR.to_string());
    }
    // Methods 2 and 3 share one feature list across clusters.
    let names = result.features.first().map(Vec::as_slice).unwrap_or_default();
    let ranges = result.thresholds.get(cluster);
    for (index, name) in names.iter().enumerate() {
        if let Some(range) = ranges.and_then(|ranges| ranges.get(index)) {
            lines.push(bounded(name, *range));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(method: FeatureMethod) -> MethodResult {
        MethodResult {
            method,
            panel: 0,
            algorithm: "dbscan".into(),
            labels: vec![json!(-1), json!("setosa"), json!("virginica")],
            instances: vec![4, 60, 86],
            features: vec![vec!["a".into(), "b".into()], vec!["c".into()], vec![]],
            thresholds: vec![
                vec![(0.12345, 0.2), (1.0, 2.0)],
                vec![(0.3, 0.4), (2.0, 3.0)],
                vec![(0.5, 0.6), (3.0, 4.0)],
            ],
            additional_features: vec!["z".into()],
            additional_thresholds: vec![vec![(0.0, 1.0)], vec![(1.0, 2.0)], vec![(2.0, 3.0)]],
        }
    }

    #[test]
    fn noise_cluster_shifts_numbering() {
        let headers: Vec<String> = summarize(&result(FeatureMethod::Method1))
            .into_iter()
            .map(|summary| summary.header)
            .collect();
        assert_eq!(headers, vec!["Noisy Data", "Cluster 0", "Cluster 1"]);
    }

    #[test]
    fn method1_lists_names_per_cluster() {
        let summaries = summarize(&result(FeatureMethod::Method1));
        assert_eq!(summaries[0].lines, vec!["a, b"]);
        assert_eq!(summaries[1].lines, vec!["c"]);
        assert_eq!(summaries[2].lines, vec![""]);
    }

    #[test]
    fn thresholds_are_rounded_to_three_decimals() {
        let summaries = summarize(&result(FeatureMethod::Method2));
        assert_eq!(summaries[0].lines, vec!["0.123 <= a <= 0.2", "1 <= b <= 2"]);
        assert_eq!(summaries[2].instances, Some(86));
    }

    #[test]
    fn modified_method3_prepends_additional_attributes() {
        let summaries = summarize(&result(FeatureMethod::ModifiedMethod3));
        assert_eq!(
            summaries[1].lines,
            vec!["1 <= z <= 2", "-----", "0.3 <= a <= 0.4", "2 <= b <= 3"]
        );
    }

    #[test]
    fn starting_topic_shows_loading() {
        assert_eq!(PanelTopic::default().header(), "Loading");
        assert_eq!(
            PanelTopic::Method(FeatureMethod::Method3).to_string(),
            "Overall relevant Features"
        );
    }
}
