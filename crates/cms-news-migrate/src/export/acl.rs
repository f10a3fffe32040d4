//! Category ACL grants.

use std::cmp::Ordering;

use crate::source::LegacyRow;

/// Union of group and user grants in `(optionID, objectID, groupID, userID)`
/// order, duplicates removed.
///
/// Group grants carry `userID = 0` and user grants `groupID = 0`, matching the
/// shape of the legacy `UNION` query. The MySQL source lets that query do the
/// merge; this is the same merge for sources that hold grants in memory.
pub fn merge_acl_grants(groups: &[LegacyRow], users: &[LegacyRow]) -> Vec<LegacyRow> {
    let normalise = |row: &LegacyRow, group: bool| {
        let mut out = LegacyRow::new()
            .with("optionID", row.int_or("optionID", 0))
            .with("optionName", row.text("optionName"))
            .with("objectID", row.int_or("objectID", 0))
            .with("optionValue", row.int_or("optionValue", 0));
        if group {
            out.set("groupID", row.int_or("groupID", 0));
            out.set("userID", 0);
        } else {
            out.set("groupID", 0);
            out.set("userID", row.int_or("userID", 0));
        }
        out
    };

    let mut merged: Vec<LegacyRow> = groups
        .iter()
        .map(|r| normalise(r, true))
        .chain(users.iter().map(|r| normalise(r, false)))
        .collect();

    merged.sort_by(grant_order);
    merged.dedup();
    merged
}

fn grant_order(a: &LegacyRow, b: &LegacyRow) -> Ordering {
    let key = |r: &LegacyRow| {
        (
            r.int_or("optionID", 0),
            r.int_or("objectID", 0),
            r.int_or("groupID", 0),
            r.int_or("userID", 0),
        )
    };
    key(a)
        .cmp(&key(b))
        .then_with(|| a.int_or("optionValue", 0).cmp(&b.int_or("optionValue", 0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(option: i64, object: i64, holder: (&str, i64)) -> LegacyRow {
        LegacyRow::new()
            .with("optionID", option)
            .with("optionName", format!("option{option}"))
            .with("objectID", object)
            .with("optionValue", 1)
            .with(holder.0, holder.1)
    }

    #[test]
    fn test_union_is_sorted_with_empty_counterpart() {
        let groups = vec![grant(2, 1, ("groupID", 4)), grant(1, 1, ("groupID", 5))];
        let users = vec![grant(1, 1, ("userID", 9))];

        let merged = merge_acl_grants(&groups, &users);
        let keys: Vec<(i64, i64, i64, i64)> = merged
            .iter()
            .map(|r| {
                (
                    r.int_or("optionID", -1),
                    r.int_or("objectID", -1),
                    r.int_or("groupID", -1),
                    r.int_or("userID", -1),
                )
            })
            .collect();
        assert_eq!(keys, vec![(1, 1, 0, 9), (1, 1, 5, 0), (2, 1, 4, 0)]);
        for row in &merged {
            assert!(row.opt_id("groupID").is_some() ^ row.opt_id("userID").is_some());
        }
    }

    #[test]
    fn test_duplicates_collapse() {
        let groups = vec![grant(1, 1, ("groupID", 5)), grant(1, 1, ("groupID", 5))];
        assert_eq!(merge_acl_grants(&groups, &[]).len(), 1);
    }
}
