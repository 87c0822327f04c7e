//! Read a perf dump output directory into a [`RawDump`].
//!
//! A dump directory is either a single capture folder holding
//! `perf_postprocess*.json` (and optionally `runtime_table*.json`) directly,
//! or a tree of such folders plus `host` folders holding `*proc_<pid>.json`
//! files. Capture locations are folder paths relative to the chosen
//! directory, joined by `/`.

use crate::parser::{classify_location, LocationKind, RawDump};
use crate::utils::config::{
    GRAPH_FILE_PATTERN, HOST_FILE_PATTERN, HOST_SEGMENT, MODEL_FILE_PATTERN, PROCESS_ID_FIELD,
    SILICON_FILE_PATTERN,
};
use crate::utils::error::LoadError;
use log::{debug, info, warn};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Kind of a recognized dump file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpFile {
    Silicon,
    Model,
    /// Host events of one process
    Host { process_id: String },
    /// Graphviz dump of the compiled graph
    Graph,
}

/// Classify a file name
///
/// **Public** - `None` for files the loader ignores
pub fn classify_file(name: &str) -> Option<DumpFile> {
    static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
    let [silicon, model, host, graph] = PATTERNS.get_or_init(|| {
        [
            SILICON_FILE_PATTERN,
            MODEL_FILE_PATTERN,
            HOST_FILE_PATTERN,
            GRAPH_FILE_PATTERN,
        ]
        .map(|p| Regex::new(p).expect("Failed to compile dump file pattern"))
    });

    if silicon.is_match(name) {
        return Some(DumpFile::Silicon);
    }
    if model.is_match(name) {
        return Some(DumpFile::Model);
    }
    if graph.is_match(name) {
        return Some(DumpFile::Graph);
    }
    let caps = host.captures(name)?;
    Some(DumpFile::Host {
        process_id: caps.get(2)?.as_str().to_string(),
    })
}

/// Load every capture location under `dir`
///
/// **Public** - main entry point for dump loading
///
/// # Arguments
/// * `dir` - Dump output directory
///
/// # Returns
/// The raw sources keyed by capture location. A directory with no
/// recognizable data yields an empty dump.
///
/// # Errors
/// * `LoadError::InvalidDump` - `dir` is not a directory
/// * `LoadError::IoError` - a directory or file could not be read
/// * `LoadError::JsonError` - a data file is not valid JSON
pub fn load_dump(dir: impl AsRef<Path>) -> Result<RawDump, LoadError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(LoadError::InvalidDump(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    info!("Loading perf dump from: {}", dir.display());

    let dump = if subfolders(dir)?.is_empty() {
        load_single_folder(dir)?
    } else {
        load_tree(dir)?
    };

    info!(
        "Loaded {} silicon, {} model, {} host and {} graph locations",
        dump.silicon.as_ref().map_or(0, BTreeMap::len),
        dump.model.as_ref().map_or(0, BTreeMap::len),
        dump.host.as_ref().map_or(0, BTreeMap::len),
        dump.graph.as_ref().map_or(0, BTreeMap::len)
    );
    Ok(dump)
}

/// Every location in the dump with its classification
///
/// **Public** - used by the `locations` command
pub fn list_locations(dump: &RawDump) -> Vec<(String, LocationKind)> {
    dump.locations()
        .into_iter()
        .map(|location| {
            let kind = classify_location(&location);
            (location, kind)
        })
        .collect()
}

/// A directory that directly holds the data files, loaded under its basename
///
/// **Private** - internal helper for load_dump
fn load_single_folder(dir: &Path) -> Result<RawDump, LoadError> {
    let location = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| LoadError::InvalidDump(format!("No folder name: {}", dir.display())))?;

    let mut device = DeviceSources::default();
    load_device_files(dir, &location, &mut device)?;

    if device.silicon.is_empty() {
        warn!("No perf_postprocess data in {}", dir.display());
    }

    Ok(device.into_dump(BTreeMap::new()))
}

/// Walk a tree of capture folders
///
/// **Private** - internal helper for load_dump
fn load_tree(root: &Path) -> Result<RawDump, LoadError> {
    let mut folders = Vec::new();
    collect_folders(root, &mut Vec::new(), &mut folders)?;
    debug!("Found {} data folders", folders.len());

    let mut device = DeviceSources::default();
    let mut host = BTreeMap::new();

    for components in folders {
        let location = components.join("/");
        let path: PathBuf = components.iter().fold(root.to_path_buf(), |p, c| p.join(c));

        if components.last().map(String::as_str) == Some(HOST_SEGMENT) {
            let events = load_host_folder(&path)?;
            if !events.is_empty() {
                host.insert(location, Value::Object(events));
            }
        } else {
            load_device_files(&path, &location, &mut device)?;
        }
    }

    Ok(device.into_dump(host))
}

/// Sources read from device capture folders
#[derive(Default)]
struct DeviceSources {
    silicon: BTreeMap<String, Value>,
    model: BTreeMap<String, Value>,
    graph: BTreeMap<String, String>,
}

impl DeviceSources {
    fn into_dump(self, host: BTreeMap<String, Value>) -> RawDump {
        RawDump {
            silicon: non_empty(self.silicon),
            model: non_empty(self.model),
            host: non_empty(host),
            graph: (!self.graph.is_empty()).then_some(self.graph),
        }
    }
}

/// Record folders holding host data or exactly one non-null silicon file
///
/// **Private** - recursive helper for load_tree
fn collect_folders(
    dir: &Path,
    prefix: &mut Vec<String>,
    out: &mut Vec<Vec<String>>,
) -> Result<(), LoadError> {
    let is_host = dir.file_name().is_some_and(|n| n == HOST_SEGMENT);
    if is_host && !prefix.is_empty() {
        if files_of(dir)?
            .iter()
            .any(|(name, _)| matches!(classify_file(name), Some(DumpFile::Host { .. })))
        {
            out.push(prefix.clone());
        }
        return Ok(());
    }

    let children = subfolders(dir)?;
    if children.is_empty() {
        let silicon_files: Vec<PathBuf> = files_of(dir)?
            .into_iter()
            .filter(|(name, _)| classify_file(name) == Some(DumpFile::Silicon))
            .map(|(_, path)| path)
            .collect();

        match silicon_files.as_slice() {
            [single] => {
                if read_json(single)?.is_null() {
                    debug!("Skipping null silicon data in {}", dir.display());
                } else {
                    out.push(prefix.clone());
                }
            }
            [] => {}
            many => warn!(
                "Skipping {}: {} perf_postprocess files, expected one",
                dir.display(),
                many.len()
            ),
        }
        return Ok(());
    }

    for child in children {
        let name = child
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        prefix.push(name);
        collect_folders(&child, prefix, out)?;
        prefix.pop();
    }
    Ok(())
}

/// Read silicon, model and graph files of one capture folder
///
/// **Private** - null documents are ignored
fn load_device_files(
    dir: &Path,
    location: &str,
    sources: &mut DeviceSources,
) -> Result<(), LoadError> {
    for (name, path) in files_of(dir)? {
        let target = match classify_file(&name) {
            Some(DumpFile::Silicon) => &mut sources.silicon,
            Some(DumpFile::Model) => &mut sources.model,
            Some(DumpFile::Graph) => {
                let text = fs::read_to_string(&path)?;
                if sources.graph.insert(location.to_string(), text).is_some() {
                    warn!("Multiple graph dumps in '{}'; last one wins", location);
                }
                continue;
            }
            _ => continue,
        };
        let data = read_json(&path)?;
        if data.is_null() {
            debug!("Ignoring null document {}", path.display());
            continue;
        }
        if target.insert(location.to_string(), data).is_some() {
            warn!("Multiple {:?} files in '{}'; last one wins", classify_file(&name), location);
        }
    }
    Ok(())
}

/// Merge every `*proc_<pid>.json` of a host folder, tagging events with the pid
///
/// **Private** - internal helper for load_tree
fn load_host_folder(dir: &Path) -> Result<Map<String, Value>, LoadError> {
    let mut merged = Map::new();

    for (name, path) in files_of(dir)? {
        let Some(DumpFile::Host { process_id }) = classify_file(&name) else {
            continue;
        };
        let Value::Object(events) = read_json(&path)? else {
            debug!("Ignoring non-object host file {}", path.display());
            continue;
        };

        for (event, mut data) in events {
            if let Some(obj) = data.as_object_mut().filter(|o| !o.is_empty()) {
                obj.insert(
                    PROCESS_ID_FIELD.to_string(),
                    Value::String(process_id.clone()),
                );
            }
            merged.insert(event, data);
        }
    }
    Ok(merged)
}

/// Parse a JSON file
///
/// **Private** - attaches the path to parse errors
fn read_json(path: &Path) -> Result<Value, LoadError> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| LoadError::JsonError {
        path: path.display().to_string(),
        source,
    })
}

/// Subdirectories, sorted by name
fn subfolders(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Regular files as (name, path), sorted by name
fn files_of(dir: &Path) -> Result<Vec<(String, PathBuf)>, LoadError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            files.push((entry.file_name().to_string_lossy().into_owned(), path));
        }
    }
    files.sort();
    Ok(files)
}

fn non_empty(map: BTreeMap<String, Value>) -> Option<BTreeMap<String, Value>> {
    (!map.is_empty()).then_some(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_file() {
        assert_eq!(classify_file("perf_postprocess.json"), Some(DumpFile::Silicon));
        assert_eq!(
            classify_file("perf_postprocess_epoch_3.json"),
            Some(DumpFile::Silicon)
        );
        assert_eq!(classify_file("runtime_table.json"), Some(DumpFile::Model));
        assert_eq!(
            classify_file("host_proc_4211.json"),
            Some(DumpFile::Host {
                process_id: "4211".to_string()
            })
        );
        assert_eq!(classify_file("perf_graph_fwd_0.dot"), Some(DumpFile::Graph));
        assert_eq!(classify_file("perf_postprocess.json.bak"), None);
        assert_eq!(classify_file("notes.txt"), None);
    }

    #[test]
    fn test_not_a_directory() {
        let result = load_dump("/definitely/not/here");
        assert!(matches!(result, Err(LoadError::InvalidDump(_))));
    }
}
