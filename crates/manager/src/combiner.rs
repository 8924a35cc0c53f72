//! Pure merge of the three variable sources into one observable list.

use std::collections::HashSet;

use varspace_core::{SystemVariables, Variable};

/// Merge persisted app variables, in-memory overrides, and system-variable
/// entries into one ordered list.
///
/// App variables come first in storage order (skipped entirely when
/// `app_disabled`). An override whose name collides with an app variable
/// replaces it in place, keeping the original position; other overrides are
/// appended. System entries always go last and are never deduplicated
/// against the earlier sources.
#[must_use]
pub fn combine(
    app: Option<&[Variable]>,
    overrides: &[Variable],
    system: &[Variable],
    app_disabled: bool,
) -> Vec<Variable> {
    let mut result: Vec<Variable> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    if !app_disabled {
        if let Some(app) = app {
            for item in app {
                seen.insert(item.name.as_str());
                result.push(item.clone());
            }
        }
    }

    for item in overrides {
        if seen.contains(item.name.as_str()) {
            if let Some(slot) = result.iter_mut().find(|entry| entry.name == item.name) {
                *slot = item.clone();
            }
        } else {
            result.push(item.clone());
        }
    }

    result.extend(system.iter().cloned());
    result
}

/// Generate Variable-shaped entries from the system-variable map: one entry
/// per key, universal scope, enabled, flagged as system.
///
/// Returns the empty list when the map is absent or system variables are
/// disabled.
#[must_use]
pub fn system_entries(map: Option<&SystemVariables>, disabled: bool) -> Vec<Variable> {
    if disabled {
        return Vec::new();
    }
    let Some(map) = map else {
        return Vec::new();
    };
    map.iter()
        .map(|(name, value)| {
            let mut entry = Variable::universal(name.clone(), value.clone());
            entry.system = true;
            entry
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn app(name: &str, value: &str) -> Variable {
        Variable::new(name, value, "default")
    }

    #[test]
    fn override_replaces_app_entry_in_place() {
        let app_vars = vec![app("a", "1"), app("b", "2")];
        let overrides = vec![Variable::universal("a", "2")];

        let combined = combine(Some(&app_vars), &overrides, &[], false);

        assert_eq!(combined.len(), 2);
        // Position of the replaced entry is preserved.
        assert_eq!(combined[0].name, "a");
        assert_eq!(combined[0].value, "2");
        assert!(combined[0].is_universal());
        assert_eq!(combined[1].name, "b");
    }

    #[test]
    fn unmatched_override_is_appended() {
        let app_vars = vec![app("a", "1")];
        let overrides = vec![Variable::universal("z", "9")];

        let combined = combine(Some(&app_vars), &overrides, &[], false);
        assert_eq!(combined.len(), 2);
        assert_eq!(combined[1].name, "z");
    }

    #[test]
    fn system_entries_never_dedupe_against_earlier_sources() {
        let app_vars = vec![app("x", "app")];
        let map: SystemVariables = [("x".to_string(), "y".to_string())].into_iter().collect();
        let system = system_entries(Some(&map), false);

        let combined = combine(Some(&app_vars), &[], &system, false);

        let entries: Vec<_> = combined.iter().filter(|v| v.name == "x").collect();
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].system);
        assert!(entries[1].system);
    }

    #[test]
    fn disabled_app_variables_are_skipped() {
        let app_vars = vec![app("a", "1")];
        let overrides = vec![Variable::universal("a", "2")];

        let combined = combine(Some(&app_vars), &overrides, &[], true);

        // With app vars out of the picture the override name is unseen, so
        // it is appended instead of replacing.
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].value, "2");
    }

    #[test]
    fn system_entries_shape() {
        let map: SystemVariables = [
            ("a".to_string(), "b".to_string()),
            ("c".to_string(), "d".to_string()),
        ]
        .into_iter()
        .collect();

        let entries = system_entries(Some(&map), false);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.system && e.enabled));
        assert!(entries.iter().all(|e| e.is_universal()));
        assert_eq!(entries[0].name, "a");
        assert_eq!(entries[1].name, "c");

        assert!(system_entries(Some(&map), true).is_empty());
        assert!(system_entries(None, false).is_empty());
    }

    fn arb_variable() -> impl Strategy<Value = Variable> {
        ("[a-e]{1,3}", "[a-z0-9]{0,4}").prop_map(|(name, value)| Variable::new(name, value, "default"))
    }

    proptest! {
        #[test]
        fn combine_is_pure_and_deterministic(
            app_vars in proptest::collection::vec(arb_variable(), 0..6),
            overrides in proptest::collection::vec(arb_variable(), 0..4),
            system in proptest::collection::vec(arb_variable(), 0..4),
            disabled in any::<bool>(),
        ) {
            let app_before = app_vars.clone();
            let first = combine(Some(&app_vars), &overrides, &system, disabled);
            let second = combine(Some(&app_vars), &overrides, &system, disabled);

            prop_assert_eq!(&first, &second);
            // Inputs are never mutated.
            prop_assert_eq!(&app_vars, &app_before);
            // System entries always close the list.
            prop_assert!(first.len() >= system.len());
            prop_assert_eq!(&first[first.len() - system.len()..], system.as_slice());
        }
    }
}
