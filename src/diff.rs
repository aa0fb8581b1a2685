use std::collections::{BTreeSet, HashMap};

use crate::types::{VariableChange, ZoneId};

/// Variables added, removed or changed between two polls, sorted by name.
pub(crate) fn diff_vars(
    previous: &HashMap<String, String>,
    current: &HashMap<String, String>,
) -> Vec<VariableChange> {
    let mut changes: Vec<VariableChange> = current
        .iter()
        .filter(|(name, value)| previous.get(*name) != Some(*value))
        .map(|(name, value)| VariableChange {
            name: name.clone(),
            old: previous.get(name).cloned(),
            new: Some(value.clone()),
        })
        .collect();

    changes.extend(
        previous
            .iter()
            .filter(|(name, _)| !current.contains_key(*name))
            .map(|(name, value)| VariableChange {
                name: name.clone(),
                old: Some(value.clone()),
                new: None,
            }),
    );

    changes.sort_by(|a, b| a.name.cmp(&b.name));
    changes
}

impl VariableChange {
    /// The zone a variable belongs to: `C1_T3_*` or the room name
    /// `cust_C1_T3_name`. System and controller variables have none.
    pub fn zone(&self) -> Option<ZoneId> {
        let name = self.name.strip_prefix("cust_").unwrap_or(&self.name);
        let mut parts = name.splitn(3, '_');
        let controller = parts.next()?;
        let thermostat = parts.next()?;
        parts.next()?;
        format!("{controller}_{thermostat}").parse().ok()
    }
}

/// Distinct zones touched by a set of changes.
pub fn changed_zones(changes: &[VariableChange]) -> BTreeSet<ZoneId> {
    changes.iter().filter_map(VariableChange::zone).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn diff_detects_value_change() {
        let prev = vars(&[("C1_T1_room_temperature", "700")]);
        let curr = vars(&[("C1_T1_room_temperature", "702")]);
        let changes = diff_vars(&prev, &curr);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].name, "C1_T1_room_temperature");
        assert_eq!(changes[0].old.as_deref(), Some("700"));
        assert_eq!(changes[0].new.as_deref(), Some("702"));
    }

    #[test]
    fn diff_ignores_unchanged() {
        let val = vars(&[("sys_heat_cool_mode", "0"), ("C1_T1_rh", "40")]);
        assert!(diff_vars(&val, &val).is_empty());
    }

    #[test]
    fn diff_detects_added_and_removed() {
        let prev = vars(&[("a", "1"), ("b", "2")]);
        let curr = vars(&[("b", "2"), ("c", "3")]);
        let changes = diff_vars(&prev, &curr);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].name, "a");
        assert_eq!(changes[0].new, None);
        assert_eq!(changes[1].name, "c");
        assert_eq!(changes[1].old, None);
    }

    #[test]
    fn change_scoped_to_zone() {
        let change = |name: &str| VariableChange {
            name: name.to_string(),
            old: None,
            new: Some("1".to_string()),
        };
        assert_eq!(
            change("C2_T11_setpoint").zone(),
            Some(ZoneId::new(2, 11).unwrap())
        );
        assert_eq!(
            change("cust_C1_T3_name").zone(),
            Some(ZoneId::new(1, 3).unwrap())
        );
        assert_eq!(change("sys_heat_cool_mode").zone(), None);
        assert_eq!(change("C1_sw_version").zone(), None);
        assert_eq!(change("C1_thermostat_1_presence").zone(), None);

        let zones = changed_zones(&[
            change("C1_T1_setpoint"),
            change("C1_T1_rh"),
            change("sys_forced_eco_mode"),
        ]);
        assert_eq!(zones.len(), 1);
    }
}
