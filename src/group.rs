//! Grouping Layer: extracted pairs to per-key ordered value collections.
//!
//! Duplicate keys from extraction represent multiple variations of the same
//! field; grouping collects them under one [`GroupedField`] per distinct
//! key with variation indices assigned in encounter order. Repaired values
//! merge back into the existing structure by (key, index) so position
//! identity survives across repair cycles.

use crate::extract::KeyValue;

/// All produced values for one field key, indexed by variation.
///
/// Index 0 is the first occurrence in the extraction output, index 1 the
/// second, and so on. Values are replaced in place during repair; the key
/// and indices never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedField {
    /// Field key as extracted.
    pub key: String,
    /// Values in insertion order; position == variation index.
    pub values: Vec<String>,
}

/// Group an ordered pair sequence by key. Pure and deterministic.
///
/// Keys keep the order of their first appearance; values within a key keep
/// encounter order.
pub fn group_pairs(pairs: &[KeyValue]) -> Vec<GroupedField> {
    let mut groups: Vec<GroupedField> = Vec::new();

    for pair in pairs {
        match groups.iter_mut().find(|g| g.key == pair.key) {
            Some(group) => group.values.push(pair.value.clone()),
            None => groups.push(GroupedField {
                key: pair.key.clone(),
                values: vec![pair.value.clone()],
            }),
        }
    }

    groups
}

/// Replace the value at (key, index) with repaired text.
///
/// Returns `false` when no group has that key or the index is out of range;
/// the caller reports this as a non-fatal merge anomaly and the field keeps
/// its last-known value.
pub fn merge_repair(
    groups: &mut [GroupedField],
    key: &str,
    index: usize,
    new_value: String,
) -> bool {
    for group in groups.iter_mut() {
        if group.key == key {
            if let Some(slot) = group.values.get_mut(index) {
                *slot = new_value;
                return true;
            }
            return false;
        }
    }
    false
}
