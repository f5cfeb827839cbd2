//! Order reference generation.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::config::{ORDER_REFERENCE_DATE_FORMAT, ORDER_REFERENCE_PREFIX, ORDER_REFERENCE_SUFFIX_LEN};

/// `TXN` + issuance date + 8 uppercase hex characters of a random UUID.
pub fn order_reference(issued_at: NaiveDateTime) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{ORDER_REFERENCE_PREFIX}{}{}",
        issued_at.format(ORDER_REFERENCE_DATE_FORMAT),
        suffix[..ORDER_REFERENCE_SUFFIX_LEN].to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn shape_of_order_reference() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let r = order_reference(at);
        assert_eq!(r.len(), 3 + 8 + ORDER_REFERENCE_SUFFIX_LEN);
        assert!(r.starts_with("TXN20240309"));
        assert!(r[11..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn references_differ() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_ne!(order_reference(at), order_reference(at));
    }
}
