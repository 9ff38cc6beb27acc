//! Last-known device state and per-field edit tracking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use homesim_core::StateMap;

/// One attribute of one cluster, e.g. `OnOff.OnOff`.
///
/// A top-level field that is not a cluster has an empty `attribute`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldPath {
    pub cluster: String,
    pub attribute: String,
}

impl FieldPath {
    pub fn new(cluster: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            attribute: attribute.into(),
        }
    }

    /// Every attribute path present in a (partial) state mapping.
    pub fn all_in(state: &StateMap) -> Vec<FieldPath> {
        let mut paths = Vec::new();
        for (cluster, value) in state {
            match value {
                Value::Object(attributes) => paths.extend(
                    attributes
                        .keys()
                        .map(|attribute| FieldPath::new(cluster.as_str(), attribute.as_str())),
                ),
                _ => paths.push(FieldPath::new(cluster.as_str(), "")),
            }
        }
        paths
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attribute.is_empty() {
            f.write_str(&self.cluster)
        } else {
            write!(f, "{}.{}", self.cluster, self.attribute)
        }
    }
}

/// A field whose remote value differs from the last-known one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub path: FieldPath,
    /// `None` the first time the field is seen.
    pub old: Option<Value>,
    pub new: Value,
}

/// Fields with a local edit in flight.
///
/// Cloning shares the tracker. Edits on the same field nest; the field is
/// released when the last guard drops.
#[derive(Debug, Clone, Default)]
pub struct EditTracker {
    in_flight: Arc<Mutex<HashMap<FieldPath, usize>>>,
}

impl EditTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks every field of `partial` as being edited until the guard drops.
    pub fn begin(&self, partial: &StateMap) -> EditGuard {
        self.begin_paths(FieldPath::all_in(partial))
    }

    pub fn begin_paths(&self, paths: Vec<FieldPath>) -> EditGuard {
        let mut in_flight = self.in_flight.lock();
        for path in &paths {
            *in_flight.entry(path.clone()).or_default() += 1;
        }
        EditGuard {
            tracker: self.clone(),
            paths,
        }
    }

    pub fn is_editing(&self, path: &FieldPath) -> bool {
        self.in_flight.lock().contains_key(path)
    }

    /// Number of distinct fields currently being edited.
    pub fn len(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, paths: &[FieldPath]) {
        let mut in_flight = self.in_flight.lock();
        for path in paths {
            if let Some(count) = in_flight.get_mut(path) {
                *count -= 1;
                if *count == 0 {
                    in_flight.remove(path);
                }
            }
        }
    }
}

/// Releases its fields on drop.
#[must_use = "the edit ends as soon as the guard is dropped"]
pub struct EditGuard {
    tracker: EditTracker,
    paths: Vec<FieldPath>,
}

impl EditGuard {
    pub fn paths(&self) -> &[FieldPath] {
        &self.paths
    }
}

impl Drop for EditGuard {
    fn drop(&mut self) {
        self.tracker.release(&self.paths);
    }
}

/// Last-known state of one device, merged from every polled message.
#[derive(Debug, Clone, Default)]
pub struct Mirror {
    state: StateMap,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &StateMap {
        &self.state
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        let value = self.state.get(&path.cluster)?;
        if path.attribute.is_empty() {
            Some(value)
        } else {
            value.get(&path.attribute)
        }
    }

    /// Merges a decoded remote state and returns the fields that changed.
    ///
    /// Fields in `edits` keep their local value and are not reported.
    pub fn reconcile(&mut self, remote: &StateMap, edits: &EditTracker) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        for (cluster, value) in remote {
            match value {
                Value::Object(attributes) => {
                    for (attribute, new) in attributes {
                        let path = FieldPath::new(cluster.as_str(), attribute.as_str());
                        if !edits.is_editing(&path) {
                            self.update(path, new, &mut changes);
                        }
                    }
                }
                _ => {
                    let path = FieldPath::new(cluster.as_str(), "");
                    if !edits.is_editing(&path) {
                        self.update(path, value, &mut changes);
                    }
                }
            }
        }
        changes
    }

    /// Records a value written locally, without reporting a change.
    pub fn apply_local(&mut self, partial: &StateMap) {
        for (cluster, value) in partial {
            match (value, self.state.get_mut(cluster)) {
                (Value::Object(attributes), Some(Value::Object(existing))) => {
                    for (attribute, v) in attributes {
                        existing.insert(attribute.clone(), v.clone());
                    }
                }
                _ => {
                    self.state.insert(cluster.clone(), value.clone());
                }
            }
        }
    }

    fn update(&mut self, path: FieldPath, new: &Value, changes: &mut Vec<FieldChange>) {
        let old = self.get(&path).cloned();
        if old.as_ref().is_some_and(|old| same_value(old, new)) {
            return;
        }

        if path.attribute.is_empty() {
            self.state.insert(path.cluster.clone(), new.clone());
        } else {
            let slot = self
                .state
                .entry(path.cluster.clone())
                .or_insert_with(|| Value::Object(StateMap::new()));
            if !slot.is_object() {
                *slot = Value::Object(StateMap::new());
            }
            if let Value::Object(attributes) = slot {
                attributes.insert(path.attribute.clone(), new.clone());
            }
        }
        changes.push(FieldChange {
            path,
            old,
            new: new.clone(),
        });
    }
}

/// Equality that treats `12` and `12.0` as the same number.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> StateMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn first_reconcile_reports_every_field() {
        let mut mirror = Mirror::new();
        let changes = mirror.reconcile(
            &map(json!({"OnOff": {"OnOff": false}, "Fancontrol": {"FanMode": 0}})),
            &EditTracker::new(),
        );
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.old.is_none()));
    }

    #[test]
    fn only_differences_are_reported() {
        let edits = EditTracker::new();
        let mut mirror = Mirror::new();
        mirror.reconcile(
            &map(json!({"OnOff": {"OnOff": false}, "Fancontrol": {"FanMode": 0}})),
            &edits,
        );

        let changes = mirror.reconcile(
            &map(json!({"OnOff": {"OnOff": true}, "Fancontrol": {"FanMode": 0}})),
            &edits,
        );
        assert_eq!(
            changes,
            vec![FieldChange {
                path: FieldPath::new("OnOff", "OnOff"),
                old: Some(json!(false)),
                new: json!(true),
            }]
        );
        let snapshot = mirror.snapshot().clone();
        assert!(mirror.reconcile(&snapshot, &edits).is_empty());
    }

    #[test]
    fn edited_fields_are_not_overwritten() {
        let edits = EditTracker::new();
        let mut mirror = Mirror::new();
        let initial = map(json!({
            "Thermostat": {"OccupiedHeatingSetpoint": 2000, "OccupiedCoolingSetpoint": 2600}
        }));
        mirror.reconcile(&initial, &edits);

        let local = map(json!({"Thermostat": {"OccupiedHeatingSetpoint": 2125}}));
        let guard = edits.begin(&local);
        mirror.apply_local(&local);

        let stale = map(json!({
            "Thermostat": {"OccupiedHeatingSetpoint": 2000, "OccupiedCoolingSetpoint": 2700}
        }));
        let changes = mirror.reconcile(&stale, &edits);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, FieldPath::new("Thermostat", "OccupiedCoolingSetpoint"));
        assert_eq!(
            mirror.get(&FieldPath::new("Thermostat", "OccupiedHeatingSetpoint")),
            Some(&json!(2125))
        );

        drop(guard);
        let changes = mirror.reconcile(&stale, &edits);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].new, json!(2000));
    }

    #[test]
    fn integer_and_float_forms_of_a_number_are_not_a_change() {
        let edits = EditTracker::new();
        let mut mirror = Mirror::new();
        mirror.apply_local(&map(json!({"Pm25ConcentrationMeasurement": {"MeasuredValue": 12}})));

        let remote = map(json!({"Pm25ConcentrationMeasurement": {"MeasuredValue": 12.0}}));
        assert!(mirror.reconcile(&remote, &edits).is_empty());

        let remote = map(json!({"Pm25ConcentrationMeasurement": {"MeasuredValue": 12.5}}));
        assert_eq!(mirror.reconcile(&remote, &edits).len(), 1);
    }

    #[test]
    fn nested_edits_release_with_the_last_guard() {
        let edits = EditTracker::new();
        let path = FieldPath::new("OnOff", "OnOff");
        let first = edits.begin_paths(vec![path.clone()]);
        let second = edits.begin(&map(json!({"OnOff": {"OnOff": true}})));
        assert_eq!(edits.len(), 1);

        drop(first);
        assert!(edits.is_editing(&path));
        drop(second);
        assert!(!edits.is_editing(&path));
        assert!(edits.is_empty());
    }

    #[test]
    fn scalar_fields_use_the_cluster_path() {
        let mut mirror = Mirror::new();
        let changes = mirror.reconcile(&map(json!({"Label": "kitchen"})), &EditTracker::new());
        assert_eq!(changes[0].path.to_string(), "Label");
        assert_eq!(FieldPath::new("OnOff", "OnOff").to_string(), "OnOff.OnOff");
    }
}
