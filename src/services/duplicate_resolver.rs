use std::collections::HashMap;

use crate::models::{GenericPaymentFileRecord, PaymentMethod};

/// Canonical line selection for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSelection {
    /// Zero-based indices of surviving records, in file order.
    pub indices: Vec<usize>,
    pub dropped: usize,
}

impl CanonicalSelection {
    pub fn is_canonical(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }
}

/// Picks one line per payment number.
///
/// Within a group the line with the greatest created date wins; ties on the
/// greatest created date go to the last such line in file order. Direct Debit
/// files are taken as duplicate-free and keep every line.
pub fn resolve_duplicates(
    method: PaymentMethod,
    records: &[GenericPaymentFileRecord],
) -> CanonicalSelection {
    if method == PaymentMethod::DirectDebit {
        return CanonicalSelection {
            indices: (0..records.len()).collect(),
            dropped: 0,
        };
    }

    let mut winners: HashMap<&str, (usize, i64)> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        winners
            .entry(record.payment_number.as_str())
            .and_modify(|(best_index, best_created)| {
                if record.created_date >= *best_created {
                    *best_index = index;
                    *best_created = record.created_date;
                }
            })
            .or_insert((index, record.created_date));
    }

    let mut indices: Vec<usize> = winners.values().map(|(index, _)| *index).collect();
    indices.sort_unstable();

    CanonicalSelection {
        dropped: records.len() - indices.len(),
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(payment_number: &str, created_date: i64) -> GenericPaymentFileRecord {
        GenericPaymentFileRecord::new(payment_number, dec!(100), "02").with_created_date(created_date)
    }

    #[test]
    fn test_greatest_created_date_wins() {
        let records = vec![record("1", 20230102), record("1", 20230105), record("1", 20230103)];
        let selection = resolve_duplicates(PaymentMethod::ConvenienceStore, &records);
        assert_eq!(selection.indices, vec![1]);
        assert_eq!(selection.dropped, 2);
    }

    #[test]
    fn test_tie_on_greatest_goes_to_last_line() {
        let records = vec![
            record("1", 20230105),
            record("2", 20230101),
            record("1", 20230101),
            record("1", 20230105),
        ];
        let selection = resolve_duplicates(PaymentMethod::ConvenienceStore, &records);
        assert_eq!(selection.indices, vec![1, 3]);
    }

    #[test]
    fn test_earlier_greater_line_beats_later_smaller_lines() {
        let records = vec![record("7", 20230109), record("7", 20230101), record("7", 20230102)];
        let selection = resolve_duplicates(PaymentMethod::ConvenienceStore, &records);
        assert_eq!(selection.indices, vec![0]);
    }

    #[test]
    fn test_unique_numbers_all_survive_in_order() {
        let records = vec![record("3", 1), record("1", 1), record("2", 1)];
        let selection = resolve_duplicates(PaymentMethod::ConvenienceStore, &records);
        assert_eq!(selection.indices, vec![0, 1, 2]);
        assert_eq!(selection.dropped, 0);
        assert!(selection.is_canonical(2));
    }

    #[test]
    fn test_direct_debit_bypasses_resolution() {
        let records = vec![record("1", 1), record("1", 2)];
        let selection = resolve_duplicates(PaymentMethod::DirectDebit, &records);
        assert_eq!(selection.indices, vec![0, 1]);
        assert_eq!(selection.dropped, 0);
    }

    #[test]
    fn test_empty_file() {
        let selection = resolve_duplicates(PaymentMethod::ConvenienceStore, &[]);
        assert!(selection.indices.is_empty());
    }
}
