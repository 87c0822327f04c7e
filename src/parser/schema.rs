//! Raw input collections and the selection that scopes a build.
//!
//! The engine never interprets the nested JSON beyond the field names
//! documented in `utils::config`; each source is simply a map from capture
//! location to whatever the dump file contained.

use super::identifier::parse_input_index;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Raw records for one capture, keyed by capture location
#[derive(Debug, Clone, Default)]
pub struct RawDump {
    /// Per-core silicon counters (`perf_postprocess*.json`)
    pub silicon: Option<BTreeMap<String, Value>>,

    /// Model-predicted reference counters (`runtime_table*.json`)
    pub model: Option<BTreeMap<String, Value>>,

    /// Host process events (`host/*proc_<pid>.json`, merged per location)
    pub host: Option<BTreeMap<String, Value>>,

    /// Graphviz graph dumps (`perf_graph_*.dot`), passed through untouched
    pub graph: Option<BTreeMap<String, String>>,
}

/// Nested view of the capture folders, one level per path segment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FolderTree(pub BTreeMap<String, FolderTree>);

impl FolderTree {
    /// Insert a `/`-joined location, creating intermediate folders
    pub fn insert(&mut self, location: &str) {
        let mut node = self;
        for segment in location.split('/').filter(|s| !s.is_empty()) {
            node = node.0.entry(segment.to_string()).or_default();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl RawDump {
    /// Every capture location present in any source
    pub fn locations(&self) -> BTreeSet<String> {
        [&self.silicon, &self.model, &self.host]
            .into_iter()
            .flatten()
            .flat_map(|source| source.keys().cloned())
            .collect()
    }

    /// Every input index referenced by any silicon record
    pub fn input_indices(&self) -> BTreeSet<u32> {
        let mut inputs = BTreeSet::new();
        let Some(silicon) = &self.silicon else {
            return inputs;
        };

        for location_data in silicon.values() {
            let Some(records) = location_data.as_object() else {
                continue;
            };
            for record in records.values().filter_map(Value::as_object) {
                inputs.extend(record.keys().filter_map(|k| parse_input_index(k)));
            }
        }
        inputs
    }

    /// Capture folders arranged as a tree
    pub fn folder_tree(&self) -> FolderTree {
        let mut tree = FolderTree::default();
        for location in self.locations() {
            tree.insert(&location);
        }
        tree
    }

    /// Graph dump of a location, if one was captured
    pub fn graph_of(&self, location: &str) -> Option<&str> {
        self.graph.as_ref()?.get(location).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.locations().is_empty()
    }
}

/// Which capture locations and input indices are of interest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub locations: BTreeSet<String>,
    pub inputs: BTreeSet<u32>,
}

impl Selection {
    pub fn new(
        locations: impl IntoIterator<Item = String>,
        inputs: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            locations: locations.into_iter().collect(),
            inputs: inputs.into_iter().collect(),
        }
    }

    /// Select everything the dump contains
    pub fn all(dump: &RawDump) -> Self {
        Self {
            locations: dump.locations(),
            inputs: dump.input_indices(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selection_all() {
        let mut silicon = BTreeMap::new();
        silicon.insert(
            "t/0000".to_string(),
            json!({
                "per-epoch-events": {"device-id": 0},
                "0-0-op": {"input-0": {}, "input-2": {}, "T0": {}}
            }),
        );
        let mut host = BTreeMap::new();
        host.insert("t/host".to_string(), json!({}));

        let dump = RawDump {
            silicon: Some(silicon),
            model: None,
            host: Some(host),
            ..Default::default()
        };

        let selection = Selection::all(&dump);
        assert_eq!(selection.inputs, BTreeSet::from([0, 2]));
        assert!(selection.locations.contains("t/0000"));
        assert!(selection.locations.contains("t/host"));
    }

    #[test]
    fn test_folder_tree() {
        let mut host = BTreeMap::new();
        host.insert("run/host".to_string(), json!({}));
        let mut silicon = BTreeMap::new();
        silicon.insert("run/0000".to_string(), json!({}));
        silicon.insert("run/sub/epoch_1".to_string(), json!({}));

        let dump = RawDump {
            silicon: Some(silicon),
            host: Some(host),
            ..Default::default()
        };

        let tree = dump.folder_tree();
        assert_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!({"run": {"0000": {}, "host": {}, "sub": {"epoch_1": {}}}})
        );
    }
}
