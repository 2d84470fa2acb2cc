//! Plot data derived from engine graph payloads.
//!
//! Only the arrays a renderer needs are computed here; drawing is left to
//! the front end.

use interclust_protocol::PlotPayload;
use serde_json::Value;

/// Upper bound on histogram bins; wider ranges use wider bins.
pub const MAX_HISTOGRAM_BINS: usize = 100;

/// Lowest shade; keeps the first cluster off the color shared with the last.
const LABEL_FLOOR: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub enum Plot {
    ParallelCoordinates(ParallelCoordinates),
    DualHistogram(DualHistogram),
}

impl Plot {
    #[must_use]
    pub fn from_payload(payload: PlotPayload) -> Self {
        match payload {
            PlotPayload::Coordinates { rows, attributes } => {
                Self::ParallelCoordinates(ParallelCoordinates::new(rows, attributes))
            }
            PlotPayload::Histogram {
                attribute,
                cluster_values,
                reference_values,
                range,
            } => Self::DualHistogram(DualHistogram::new(
                attribute,
                &cluster_values,
                &reference_values,
                range,
            )),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ParallelCoordinates(_) => "coordinates",
            Self::DualHistogram(_) => "histogram",
        }
    }
}

/// One polyline of a parallel-coordinates plot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotLine {
    pub values: Vec<Value>,
    pub cluster: f64,
    /// Cluster label mapped into `[0.05, 1]` for color lookup.
    pub shade: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParallelCoordinates {
    /// Plotted axes; the trailing cluster and class columns are dropped.
    pub dimensions: Vec<String>,
    pub lines: Vec<PlotLine>,
    /// Distinct cluster labels, ascending.
    pub clusters: Vec<f64>,
}

impl ParallelCoordinates {
    fn new(rows: Vec<Vec<Value>>, mut attributes: Vec<String>) -> Self {
        let labels: Vec<f64> = rows
            .iter()
            .map(|row| row.last().and_then(Value::as_f64).unwrap_or(0.0))
            .collect();
        let shades = normalize_labels(&labels);
        attributes.truncate(attributes.len().saturating_sub(2));
        let width = attributes.len();
        let lines = rows
            .into_iter()
            .zip(labels.iter().zip(shades))
            .map(|(mut values, (cluster, shade))| {
                values.truncate(width);
                PlotLine {
                    values,
                    cluster: *cluster,
                    shade,
                }
            })
            .collect();
        let mut clusters = labels;
        clusters.sort_by(f64::total_cmp);
        clusters.dedup();
        Self {
            dimensions: attributes,
            lines,
            clusters,
        }
    }
}

/// Maps cluster labels into `[0.05, 1]`. A noise label of `-1` is shifted
/// so it gets the lowest shade.
#[must_use]
pub fn normalize_labels(labels: &[f64]) -> Vec<f64> {
    let min = labels.iter().copied().fold(f64::INFINITY, f64::min);
    let max = labels.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let shift = if min == -1.0 { 1.0 } else { 0.0 };
    let top = max + shift;
    labels
        .iter()
        .map(|label| {
            if top > 0.0 {
                LABEL_FLOOR + (1.0 - LABEL_FLOOR) * ((label + shift) / top).clamp(0.0, 1.0)
            } else {
                LABEL_FLOOR
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub cluster: usize,
    pub reference: usize,
}

/// Cluster values against a reference distribution over a shared range.
#[derive(Debug, Clone, PartialEq)]
pub struct DualHistogram {
    pub attribute: String,
    pub bins: Vec<HistogramBin>,
}

impl DualHistogram {
    fn new(attribute: String, cluster: &[f64], reference: &[f64], range: (f64, f64)) -> Self {
        let (low, high) = if range.0 <= range.1 {
            range
        } else {
            (range.1, range.0)
        };
        let start = low.floor();
        let end = high.ceil() + 1.0;
        let span = end - start;
        if !span.is_finite() {
            return Self {
                attribute,
                bins: Vec::new(),
            };
        }
        let step = if span > MAX_HISTOGRAM_BINS as f64 {
            (span / MAX_HISTOGRAM_BINS as f64).ceil()
        } else {
            1.0
        };
        // Edges are derived from the bin index: near 1e18 `edge + step` can
        // round back to `edge`.
        let count = ((span / step).ceil() as usize).clamp(1, MAX_HISTOGRAM_BINS);
        let mut bins: Vec<HistogramBin> = (0..count)
            .map(|index| {
                let edge = start + index as f64 * step;
                HistogramBin {
                    start: edge,
                    end: (edge + step).min(end),
                    cluster: 0,
                    reference: 0,
                }
            })
            .collect();
        let locate = |value: f64| -> Option<usize> {
            if !value.is_finite() || value < start || (value >= end && end > start) {
                return None;
            }
            let index = ((value - start) / step) as usize;
            Some(index.min(bins.len() - 1))
        };
        let mut counts = vec![(0usize, 0usize); bins.len()];
        for index in cluster.iter().filter_map(|value| locate(*value)) {
            counts[index].0 += 1;
        }
        for index in reference.iter().filter_map(|value| locate(*value)) {
            counts[index].1 += 1;
        }
        for (bin, (cluster, reference)) in bins.iter_mut().zip(counts) {
            bin.cluster = cluster;
            bin.reference = reference;
        }
        Self { attribute, bins }
    }

    /// Tallest bar over both series.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.bins
            .iter()
            .map(|bin| bin.cluster.max(bin.reference))
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn labels_are_shaded_into_unit_range() {
        let shades = normalize_labels(&[0.0, 1.0, 2.0]);
        assert_eq!(shades[0], 0.05);
        assert!((shades[1] - 0.525).abs() < 1e-9);
        assert!((shades[2] - 1.0).abs() < 1e-9);
        let noisy = normalize_labels(&[-1.0, 0.0, 1.0]);
        assert_eq!(noisy[0], 0.05);
        assert!(noisy.iter().all(|shade| (0.05..=1.0).contains(shade)));
        assert_eq!(normalize_labels(&[0.0, 0.0]), vec![0.05, 0.05]);
    }

    #[test]
    fn coordinates_drop_label_columns() {
        let plot = Plot::from_payload(PlotPayload::Coordinates {
            rows: vec![
                vec![json!(1.0), json!(2.0), json!("setosa"), json!(1)],
                vec![json!(3.0), json!(4.0), json!("virginica"), json!(0)],
            ],
            attributes: vec!["x".into(), "y".into(), "class".into(), "cluster".into()],
        });
        let Plot::ParallelCoordinates(plot) = plot else {
            panic!("expected coordinates");
        };
        assert_eq!(plot.dimensions, vec!["x", "y"]);
        assert_eq!(plot.lines[0].values, vec![json!(1.0), json!(2.0)]);
        assert_eq!(plot.lines[0].cluster, 1.0);
        assert_eq!(plot.clusters, vec![0.0, 1.0]);
    }

    #[test]
    fn histogram_bins_are_integer_wide() {
        let plot = Plot::from_payload(PlotPayload::Histogram {
            attribute: "x".into(),
            cluster_values: vec![1.0, 1.5, 2.2, 3.0],
            reference_values: vec![1.0, 4.0],
            range: (1.0, 3.0),
        });
        let Plot::DualHistogram(plot) = plot else {
            panic!("expected histogram");
        };
        let counts: Vec<(f64, usize, usize)> = plot
            .bins
            .iter()
            .map(|bin| (bin.start, bin.cluster, bin.reference))
            .collect();
        assert_eq!(
            counts,
            vec![(1.0, 2, 1), (2.0, 1, 0), (3.0, 1, 0)]
        );
        assert_eq!(plot.peak(), 2);
    }

    #[test]
    fn wide_histogram_ranges_are_capped() {
        let plot = Plot::from_payload(PlotPayload::Histogram {
            attribute: "x".into(),
            cluster_values: vec![0.0, 999.0],
            reference_values: Vec::new(),
            range: (0.0, 1000.0),
        });
        let Plot::DualHistogram(plot) = plot else {
            panic!("expected histogram");
        };
        assert!(plot.bins.len() <= MAX_HISTOGRAM_BINS);
        assert_eq!(plot.bins.iter().map(|bin| bin.cluster).sum::<usize>(), 2);
    }

    #[test]
    fn histogram_over_huge_magnitudes_stays_bounded() {
        let base = 1.7e18;
        let plot = Plot::from_payload(PlotPayload::Histogram {
            attribute: "timestamp".into(),
            cluster_values: vec![base, base + 512.0],
            reference_values: vec![base],
            range: (base, base + 1000.0),
        });
        let Plot::DualHistogram(plot) = plot else {
            panic!("expected histogram");
        };
        assert!(!plot.bins.is_empty());
        assert!(plot.bins.len() <= MAX_HISTOGRAM_BINS);
        assert_eq!(plot.bins.iter().map(|bin| bin.cluster).sum::<usize>(), 2);
        assert_eq!(plot.bins.iter().map(|bin| bin.reference).sum::<usize>(), 1);
    }
}
