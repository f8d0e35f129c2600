use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::diff::duplicate_policy::DuplicateKeyPolicy;
use crate::types::change::Change;
use crate::types::record::{Record, Snapshot};

/// Index of the winning occurrence per key, as positions into the snapshot.
fn winners(snapshot: &Snapshot, policy: DuplicateKeyPolicy) -> HashMap<&str, usize> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(snapshot.len());

    for (position, record) in snapshot.iter().enumerate() {
        match (index.entry(record.key.as_str()), policy) {
            (Entry::Occupied(_), DuplicateKeyPolicy::FirstWins) => {}
            (Entry::Occupied(mut occupied), _) => {
                occupied.insert(position);
            }
            (Entry::Vacant(vacant), _) => {
                vacant.insert(position);
            }
        }
    }

    index
}

/// Field-level changes of `decision` from `previous` to `current`, in
/// current-snapshot order. Records that disappeared produce nothing.
pub fn diff_snapshots(
    previous: &Snapshot,
    current: &Snapshot,
    collection_label: &str,
    policy: DuplicateKeyPolicy,
) -> Vec<Change> {
    let previous_records = previous.records();
    let previous_index: HashMap<&str, &Record> = winners(previous, policy)
        .into_iter()
        .map(|(key, position)| (key, &previous_records[position]))
        .collect();

    let current_winners = winners(current, policy);
    let mut changes = Vec::new();

    for (position, record) in current.iter().enumerate() {
        /* duplicates that lost resolution are not compared */
        if current_winners.get(record.key.as_str()) != Some(&position) {
            continue;
        }

        match previous_index.get(record.key.as_str()) {
            Some(before) if before.decision != record.decision => {
                changes.push(change_for(record, collection_label, &before.decision, false));
            }
            Some(_) => {}
            None if !record.decision.is_empty() => {
                changes.push(change_for(record, collection_label, "", true));
            }
            None => {}
        }
    }

    changes
}

/// Keys that occur more than once, in order of their second appearance.
pub fn find_duplicate_keys(snapshot: &Snapshot) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(snapshot.len());
    let mut duplicates = Vec::new();

    for record in snapshot {
        let count = seen.entry(record.key.as_str()).or_insert(0);
        *count += 1;
        if *count == 2 {
            duplicates.push(record.key.clone());
        }
    }

    duplicates
}

fn change_for(record: &Record, collection_label: &str, previous: &str, is_new: bool) -> Change {
    Change {
        key: record.key.clone(),
        code: record.code.clone(),
        label: record.label.clone(),
        collection_label: collection_label.to_string(),
        previous_value: previous.to_string(),
        current_value: record.decision.clone(),
        is_new,
        position: record.position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, decision: &str) -> Record {
        Record::new("S", code, format!("{code} Inc"), decision, 0)
    }

    fn snapshot(records: &[(&str, &str)]) -> Snapshot {
        records
            .iter()
            .map(|(code, decision)| record(code, decision))
            .collect::<Vec<_>>()
            .into()
    }

    fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<Change> {
        diff_snapshots(previous, current, "Stocks", DuplicateKeyPolicy::LastWins)
    }

    #[test]
    fn changed_decision_produces_one_change() {
        let changes = diff(&snapshot(&[("AAPL", "BUY")]), &snapshot(&[("AAPL", "SELL")]));

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].previous_value, "BUY");
        assert_eq!(changes[0].current_value, "SELL");
        assert!(!changes[0].is_new);
        assert_eq!(changes[0].collection_label, "Stocks");
    }

    #[test]
    fn new_record_with_decision_is_reported_as_new() {
        let changes = diff(&Snapshot::default(), &snapshot(&[("MSFT", "HOLD")]));

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].previous_value, "");
        assert_eq!(changes[0].current_value, "HOLD");
        assert!(changes[0].is_new);
    }

    #[test]
    fn new_record_without_decision_is_ignored() {
        assert!(diff(&Snapshot::default(), &snapshot(&[("MSFT", "")])).is_empty());
    }

    #[test]
    fn removed_record_is_ignored() {
        assert!(diff(&snapshot(&[("AAPL", "BUY")]), &Snapshot::default()).is_empty());
    }

    #[test]
    fn empty_to_empty_is_not_a_change() {
        assert!(diff(&snapshot(&[("AAPL", "")]), &snapshot(&[("AAPL", "")])).is_empty());
    }

    #[test]
    fn cleared_decision_is_a_change() {
        let changes = diff(&snapshot(&[("AAPL", "BUY")]), &snapshot(&[("AAPL", "")]));

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].current_value, "");
        assert!(!changes[0].is_new);
    }

    #[test]
    fn diff_is_asymmetric() {
        let p = snapshot(&[("AAPL", "BUY")]);
        let c = snapshot(&[("AAPL", "BUY"), ("TSLA", "SELL")]);

        let forward = diff(&p, &c);
        assert_eq!(forward.len(), 1);
        assert!(forward[0].is_new);
        assert_eq!(forward[0].code, "TSLA");

        assert!(diff(&c, &p).is_empty());
    }

    #[test]
    fn self_diff_is_empty_even_with_duplicates() {
        let with_duplicates = snapshot(&[("AAPL", "BUY"), ("MSFT", "SELL"), ("AAPL", "HOLD")]);

        for policy in [
            DuplicateKeyPolicy::LastWins,
            DuplicateKeyPolicy::FirstWins,
            DuplicateKeyPolicy::Reject,
        ] {
            assert!(diff_snapshots(&with_duplicates, &with_duplicates, "Stocks", policy).is_empty());
        }
    }

    #[test]
    fn duplicate_resolution_follows_policy() {
        let previous = snapshot(&[("AAPL", "BUY")]);
        let current = snapshot(&[("AAPL", "BUY"), ("AAPL", "SELL")]);

        let last = diff_snapshots(&previous, &current, "Stocks", DuplicateKeyPolicy::LastWins);
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].current_value, "SELL");

        let first = diff_snapshots(&previous, &current, "Stocks", DuplicateKeyPolicy::FirstWins);
        assert!(first.is_empty());
    }

    #[test]
    fn output_follows_current_order() {
        let previous = snapshot(&[("A", "1"), ("B", "1"), ("C", "1")]);
        let current = snapshot(&[("C", "2"), ("A", "2"), ("B", "2")]);

        let codes: Vec<_> = diff(&previous, &current)
            .into_iter()
            .map(|change| change.code)
            .collect();

        assert_eq!(codes, vec!["C", "A", "B"]);
    }

    #[test]
    fn same_code_in_two_sources_does_not_collide() {
        let previous: Snapshot = vec![Record::new("S", "ABC", "", "BUY", 9)].into();
        let current: Snapshot = vec![Record::new("C", "ABC", "", "BUY", 9)].into();

        let changes = diff(&previous, &current);

        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_new);
        assert_eq!(changes[0].key, "C_ABC");
    }

    #[test]
    fn end_to_end_new_listing() {
        let previous = snapshot(&[("AAPL", "BUY")]);
        let current = snapshot(&[("AAPL", "BUY"), ("MSFT", "SELL")]);

        let changes = diff(&previous, &current);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key, "S_MSFT");
        assert!(changes[0].is_new);
        assert_eq!(changes[0].previous_value, "");
        assert_eq!(changes[0].current_value, "SELL");
    }

    #[test]
    fn finds_duplicate_keys_once() {
        let snapshot = snapshot(&[("A", ""), ("B", ""), ("A", ""), ("A", "")]);

        assert_eq!(find_duplicate_keys(&snapshot), vec!["S_A".to_string()]);
    }
}
