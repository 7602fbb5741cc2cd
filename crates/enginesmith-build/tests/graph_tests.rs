//! Build-graph extraction tests

use enginesmith_build::{
    count_matching_nodes, extract_object_files, extract_response_file, find_object_files,
    find_response_file, load_document, BuildError, BuildGraphDocument, MemoryFileSystem,
    RealFileSystem,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::path::Path;

const GRAPH: &str = "/native/artifacts/tundra.dag.json";

fn doc(json: &str) -> BuildGraphDocument {
    BuildGraphDocument::from_json(json).unwrap()
}

#[test]
fn test_end_to_end_object_extraction() {
    let document = doc(
        r#"{"Nodes":[{"Annotation":"Lib_iOS_arm64_release_foo","Action":"clang ... \"out/a.o\" ... \"out/b.o\""}]}"#,
    );

    assert_eq!(
        find_object_files(&document, "Lib_iOS_arm64", "release"),
        vec!["out/a.o", "out/b.o"]
    );
}

#[test]
fn test_single_library_node() {
    let document = doc(
        r#"{"Nodes":[{"Annotation":"Lib_iOS_arm64 release","Action":"ar \"/a/b/foo.o\" -x \"/a/b/bar.o\" \"/a/b/notes.txt\""}]}"#,
    );

    assert_eq!(
        find_object_files(&document, "Lib_iOS_arm64", "release"),
        vec!["/a/b/foo.o", "/a/b/bar.o"]
    );
}

#[test]
fn test_objects_from_all_matching_nodes_in_order() {
    let document = doc(
        r#"{"Nodes":[
            {"Annotation":"Lib_iOS_arm64_release_1","Action":"\"n1a.o\" \"n1b.o\""},
            {"Annotation":"Lib_iOS_arm64_debug_x","Action":"\"skip.o\""},
            {"Annotation":"Lib_iOS_arm64_release_2","Action":"\"n2a.o\" \"n1a.o\""}
        ]}"#,
    );

    assert_eq!(
        find_object_files(&document, "Lib_iOS_arm64", "release"),
        vec!["n1a.o", "n1b.o", "n2a.o", "n1a.o"]
    );
}

#[rstest]
#[case::wrong_prefix("Link_iOS_arm64_release")]
#[case::prefix_not_at_start("X_Lib_iOS_arm64_release")]
#[case::wrong_mode("Lib_iOS_arm64_debug")]
fn test_unselected_nodes_yield_nothing(#[case] annotation: &str) {
    let json = format!(
        r#"{{"Nodes":[{{"Annotation":"{annotation}","Action":"\"a.o\"","Inputs":["x.rsp"]}}]}}"#
    );
    let document = doc(&json);

    assert!(find_object_files(&document, "Lib_iOS_arm64", "release").is_empty());
    assert_eq!(find_response_file(&document, "Lib_iOS_arm64", "release"), None);
}

#[test]
fn test_single_link_node_response_file() {
    let document = doc(
        r#"{"Nodes":[{"Annotation":"Link_Android_arm32_release","Inputs":["x.rsp","y.o"]}]}"#,
    );

    assert_eq!(
        find_response_file(&document, "Link_Android_arm32", "release").as_deref(),
        Some("x.rsp")
    );
}

#[test]
fn test_response_file_first_match_wins() {
    let document = doc(
        r#"{"Nodes":[
            {"Annotation":"Link_Android_arm32_release_a","Inputs":["a.o","first.rsp"]},
            {"Annotation":"Link_Android_arm32_release_b","Inputs":["second.rsp"]}
        ]}"#,
    );

    assert_eq!(
        find_response_file(&document, "Link_Android_arm32", "release").as_deref(),
        Some("first.rsp")
    );
    assert_eq!(count_matching_nodes(&document, "Link_Android_arm32", "release"), 2);
}

#[test]
fn test_response_file_skips_nodes_without_one() {
    let document = doc(
        r#"{"Nodes":[
            {"Annotation":"Link_Android_arm64_release_a","Inputs":["a.o"]},
            {"Annotation":"Link_Android_arm64_release_b","Inputs":["b.rsp"]}
        ]}"#,
    );

    assert_eq!(
        find_response_file(&document, "Link_Android_arm64", "release").as_deref(),
        Some("b.rsp")
    );
}

#[test]
fn test_response_file_ignores_action() {
    let document = doc(
        r#"{"Nodes":[{"Annotation":"Link_Android_arm32_release","Action":"clang++ @\"in-action.rsp\"","Inputs":[]}]}"#,
    );

    assert_eq!(find_response_file(&document, "Link_Android_arm32", "release"), None);
}

#[test]
fn test_extract_missing_document() {
    let fs = MemoryFileSystem::new();

    assert_eq!(extract_object_files(&fs, Path::new(GRAPH), "Lib_iOS_arm64", "release"), None);
    assert_eq!(extract_response_file(&fs, Path::new(GRAPH), "Link_Android_arm32", "release"), None);
    assert!(matches!(
        load_document(&fs, Path::new(GRAPH)),
        Err(BuildError::GraphNotFound(_))
    ));
}

#[rstest]
#[case::not_json("this is not json")]
#[case::missing_nodes(r#"{"Other":[]}"#)]
#[case::nodes_not_array(r#"{"Nodes":{}}"#)]
fn test_extract_unparsable_document(#[case] contents: &str) {
    let fs = MemoryFileSystem::new().with_file(GRAPH, contents);

    assert_eq!(extract_object_files(&fs, Path::new(GRAPH), "Lib_iOS_arm64", "release"), None);
    assert_eq!(extract_response_file(&fs, Path::new(GRAPH), "Link_Android_arm32", "release"), None);
    assert!(matches!(
        load_document(&fs, Path::new(GRAPH)),
        Err(BuildError::GraphParseError { .. })
    ));
}

#[rstest]
#[case::null_action(r#"{"Annotation":"CopyFiles","Action":null}"#)]
#[case::numeric_inputs(r#"{"Annotation":"CopyFiles","Inputs":[3,4]}"#)]
#[case::null_annotation(r#"{"Annotation":null,"Action":7,"Inputs":null}"#)]
fn test_odd_unselected_node_does_not_reject_document(#[case] odd_node: &str) {
    let contents = format!(
        r#"{{"Nodes":[{odd_node},{{"Annotation":"Lib_iOS_arm64_release","Action":"ar \"out/a.o\""}},{{"Annotation":"Link_Android_arm32_release","Inputs":[1,"out/link.rsp"]}}]}}"#
    );
    let fs = MemoryFileSystem::new().with_file(GRAPH, &contents);

    assert_eq!(
        extract_object_files(&fs, Path::new(GRAPH), "Lib_iOS_arm64", "release"),
        Some(vec!["out/a.o".to_string()])
    );
    assert_eq!(
        extract_response_file(&fs, Path::new(GRAPH), "Link_Android_arm32", "release"),
        Some("out/link.rsp".to_string())
    );
}

#[test]
fn test_extract_empty_result_is_some() {
    let fs = MemoryFileSystem::new().with_file(GRAPH, r#"{"Nodes":[]}"#);

    assert_eq!(
        extract_object_files(&fs, Path::new(GRAPH), "Lib_iOS_arm64", "release"),
        Some(Vec::new())
    );
}

#[test]
fn test_extract_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let graph = dir.path().join("tundra.dag.json");
    std::fs::write(
        &graph,
        r#"{"Nodes":[
            {"Annotation":"Lib_iOS_arm64_debug","Action":"libtool \"obj/a.o\""},
            {"Annotation":"Link_Android_arm64_debug","Inputs":["artifacts/rsp/1.rsp"]}
        ]}"#,
    )
    .unwrap();

    assert_eq!(
        extract_object_files(&RealFileSystem, &graph, "Lib_iOS_arm64", "debug"),
        Some(vec!["obj/a.o".to_string()])
    );
    assert_eq!(
        extract_response_file(&RealFileSystem, &graph, "Link_Android_arm64", "debug").as_deref(),
        Some("artifacts/rsp/1.rsp")
    );
}

#[test]
fn test_document_is_not_mutated() {
    let document = doc(
        r#"{"Nodes":[{"Annotation":"Lib_iOS_arm64_release","Action":"\"a.o\"","Inputs":["x.rsp"]}]}"#,
    );
    let before = document.clone();

    let _ = find_object_files(&document, "Lib_iOS_arm64", "release");
    let _ = find_response_file(&document, "Lib_iOS_arm64", "release");

    assert_eq!(document, before);
}
