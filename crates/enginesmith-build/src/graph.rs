//! Build-graph artifact extraction
//!
//! The native build runner writes its dependency graph as JSON
//! (`artifacts/tundra.dag.json`). The re-link steps need a few of its
//! outputs: the object files compiled by the iOS library node and the
//! response file handed to the Android link node. Both are located by
//! matching node annotations against a label prefix and a mode tag.
//!
//! The lookups are asymmetric: [`find_object_files`] collects from every
//! matching node, [`find_response_file`] stops at the first hit.

use crate::error::{BuildError, BuildResult};
use crate::fs::FileSystem;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Extension of compiled object files embedded in library actions
pub const OBJECT_EXTENSION: &str = ".o";

/// Extension of linker response files listed in link inputs
pub const RESPONSE_EXTENSION: &str = ".rsp";

/// Parsed build-graph document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildGraphDocument {
    #[serde(rename = "Nodes")]
    pub nodes: Vec<BuildGraphNode>,
}

/// A single build action in the graph
///
/// Fields are read leniently: a null or wrongly typed value becomes empty,
/// so odd shapes on unrelated nodes never reject the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildGraphNode {
    /// Label such as `Lib_iOS_arm64_release_...` or `Link_Android_arm32 ...`
    #[serde(rename = "Annotation", default, deserialize_with = "lenient_string")]
    pub annotation: String,
    /// Shell-like command line; library nodes embed quoted object paths
    #[serde(rename = "Action", default, deserialize_with = "lenient_string")]
    pub action: String,
    /// Non-string entries are dropped
    #[serde(rename = "Inputs", default, deserialize_with = "lenient_strings")]
    pub inputs: Vec<String>,
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        _ => String::new(),
    })
}

fn lenient_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

impl BuildGraphNode {
    /// Selection predicate shared by both lookups
    pub fn matches(&self, prefix: &str, mode: &str) -> bool {
        self.annotation.starts_with(prefix) && self.annotation.contains(mode)
    }

    /// Quoted fragments of the action that end in [`OBJECT_EXTENSION`]
    pub fn object_files(&self) -> impl Iterator<Item = &str> {
        self.action
            .split('"')
            .filter(|fragment| fragment.ends_with(OBJECT_EXTENSION))
    }

    /// First input ending in [`RESPONSE_EXTENSION`]
    pub fn response_file(&self) -> Option<&str> {
        self.inputs
            .iter()
            .map(String::as_str)
            .find(|input| input.ends_with(RESPONSE_EXTENSION))
    }
}

impl BuildGraphDocument {
    /// Parse a document from JSON text
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Nodes selected by `prefix` and `mode`, in document order
    pub fn matching_nodes<'a>(
        &'a self,
        prefix: &'a str,
        mode: &'a str,
    ) -> impl Iterator<Item = &'a BuildGraphNode> + 'a {
        self.nodes.iter().filter(move |node| node.matches(prefix, mode))
    }
}

/// Collect the object files of every node whose annotation starts with
/// `prefix` and mentions `mode`
///
/// Fragments are kept in the order they appear, node after node; nothing is
/// deduplicated.
pub fn find_object_files(document: &BuildGraphDocument, prefix: &str, mode: &str) -> Vec<String> {
    document
        .matching_nodes(prefix, mode)
        .flat_map(BuildGraphNode::object_files)
        .map(str::to_string)
        .collect()
}

/// Find the response file of the first matching link node that has one
pub fn find_response_file(
    document: &BuildGraphDocument,
    prefix: &str,
    mode: &str,
) -> Option<String> {
    document
        .matching_nodes(prefix, mode)
        .find_map(BuildGraphNode::response_file)
        .map(str::to_string)
}

/// Number of nodes selected by `prefix` and `mode`
pub fn count_matching_nodes(document: &BuildGraphDocument, prefix: &str, mode: &str) -> usize {
    document.matching_nodes(prefix, mode).count()
}

/// Read and parse a build-graph document
pub fn load_document(fs: &dyn FileSystem, path: &Path) -> BuildResult<BuildGraphDocument> {
    if !fs.exists(path) {
        return Err(BuildError::GraphNotFound(path.to_path_buf()));
    }
    let text = fs.read_to_string(path)?;
    BuildGraphDocument::from_json(&text).map_err(|e| BuildError::graph_parse(path, e))
}

/// Load the graph at `path` and collect object files
///
/// A missing or unparsable document is reported and yields `None`; the
/// caller decides whether to continue.
pub fn extract_object_files(
    fs: &dyn FileSystem,
    path: &Path,
    prefix: &str,
    mode: &str,
) -> Option<Vec<String>> {
    let document = load_or_report(fs, path)?;
    let objects = find_object_files(&document, prefix, mode);
    debug!(
        graph = %path.display(),
        prefix,
        mode,
        count = objects.len(),
        "collected object files"
    );
    Some(objects)
}

/// Load the graph at `path` and find the response file
///
/// Same reporting policy as [`extract_object_files`].
pub fn extract_response_file(
    fs: &dyn FileSystem,
    path: &Path,
    prefix: &str,
    mode: &str,
) -> Option<String> {
    let document = load_or_report(fs, path)?;
    let matching = count_matching_nodes(&document, prefix, mode);
    if matching > 1 {
        warn!(
            graph = %path.display(),
            prefix,
            mode,
            matching,
            "several link nodes match; using the first response file"
        );
    }
    find_response_file(&document, prefix, mode)
}

fn load_or_report(fs: &dyn FileSystem, path: &Path) -> Option<BuildGraphDocument> {
    match load_document(fs, path) {
        Ok(document) => Some(document),
        Err(error) => {
            warn!(graph = %path.display(), %error, "build graph unavailable");
            None
        }
    }
}
