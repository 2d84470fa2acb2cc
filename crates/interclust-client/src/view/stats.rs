use interclust_protocol::StatRow;

/// Row labels of the engine's summary records, in order.
pub const STAT_LABELS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsRow {
    pub label: &'static str,
    /// One value per attribute, in attribute order.
    pub values: Vec<Option<f64>>,
}

/// Summary statistics of the selected node, one column per attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsTable {
    pub attributes: Vec<String>,
    pub rows: Vec<StatisticsRow>,
}

impl StatisticsTable {
    /// `None` when the engine has not sent a summary.
    #[must_use]
    pub fn build(attributes: &[String], summary: &[StatRow]) -> Option<Self> {
        if summary.is_empty() {
            return None;
        }
        let rows = summary
            .iter()
            .zip(STAT_LABELS)
            .map(|(record, label)| StatisticsRow {
                label,
                values: attributes
                    .iter()
                    .map(|attribute| record.get(attribute).copied().flatten())
                    .collect(),
            })
            .collect();
        Some(Self {
            attributes: attributes.to_vec(),
            rows,
        })
    }

    #[must_use]
    pub fn value(&self, label: &str, attribute: &str) -> Option<f64> {
        let column = self.attributes.iter().position(|name| name == attribute)?;
        self.rows
            .iter()
            .find(|row| row.label == label)
            .and_then(|row| row.values.get(column).copied().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Option<f64>)]) -> StatRow {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), *value))
            .collect()
    }

    #[test]
    fn rows_are_labeled_in_order() {
        let attributes = vec!["a".to_string(), "b".to_string()];
        let summary = vec![
            record(&[("a", Some(10.0)), ("b", Some(10.0))]),
            record(&[("a", Some(1.5)), ("b", None)]),
        ];
        let table = StatisticsTable::build(&attributes, &summary).unwrap();
        let labels: Vec<&str> = table.rows.iter().map(|row| row.label).collect();
        assert_eq!(labels, ["count", "mean"]);
        assert_eq!(table.value("mean", "a"), Some(1.5));
        assert_eq!(table.value("mean", "b"), None);
        assert_eq!(table.value("max", "a"), None);
    }

    #[test]
    fn empty_summary_has_no_table() {
        assert!(StatisticsTable::build(&["a".to_string()], &[]).is_none());
    }
}
