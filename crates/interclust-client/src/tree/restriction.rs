use interclust_protocol::{Comparator, Restriction};

use crate::error::ClientError;

/// Parses dialog rows such as `age > 30, city = Bonn`.
///
/// Rows with an empty value are skipped, matching the restriction dialog
/// which ignores incomplete rules. Attributes must be dataset columns when
/// `attributes` is non-empty.
pub fn parse_restrictions(text: &str, attributes: &[String]) -> Result<Vec<Restriction>, ClientError> {
    let mut restrictions = Vec::new();
    for row in text.split([',', ';']).map(str::trim).filter(|row| !row.is_empty()) {
        let Some(split) = row.find(['<', '>', '=']) else {
            return Err(ClientError::InvalidCommand(
                format!("restriction '{row}' needs one of <, > or =").into(),
            ));
        };
        let attribute = row[..split].trim();
        let rest = &row[split..];
        let operator_len = if rest.starts_with("==") { 2 } else { 1 };
        let Some(comparator) = Comparator::parse(&rest[..operator_len]) else {
            return Err(ClientError::InvalidCommand(
                format!("unknown comparator in '{row}'").into(),
            ));
        };
        let value = rest[operator_len..].trim();
        if attribute.is_empty() {
            return Err(ClientError::InvalidCommand(
                format!("restriction '{row}' has no attribute").into(),
            ));
        }
        if !attributes.is_empty() && !attributes.iter().any(|known| known == attribute) {
            return Err(ClientError::InvalidCommand(
                format!("unknown attribute '{attribute}'").into(),
            ));
        }
        if value.is_empty() {
            continue;
        }
        restrictions.push(Restriction {
            attribute: attribute.to_string(),
            comparator,
            value: value.to_string(),
        });
    }
    Ok(restrictions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["age".into(), "city".into()]
    }

    #[test]
    fn parses_rows_in_order() {
        let rows = parse_restrictions("age > 30; city == Bonn", &columns()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].to_string(), "age > 30");
        assert_eq!(rows[1].comparator, Comparator::Equal);
        assert_eq!(rows[1].value, "Bonn");
    }

    #[test]
    fn incomplete_rows_are_skipped() {
        let rows = parse_restrictions("age <, city = x", &columns()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attribute, "city");
    }

    #[test]
    fn empty_text_clears_restrictions() {
        assert!(parse_restrictions("  ", &columns()).unwrap().is_empty());
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        assert!(parse_restrictions("height > 2", &columns()).is_err());
        assert!(parse_restrictions("age 2", &columns()).is_err());
    }
}
