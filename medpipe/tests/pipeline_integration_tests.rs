//! Integration tests for building the combined pipeline from packages on disk
//!
//! Tests cover:
//! - Loading two source packages and merging them first-source-wins
//! - Ruler placement relative to the recognizer
//! - End-to-end annotation of the sample clinical sentence
//! - Writing the combined package and loading it back

use medpipe::components::INCLUDE_STATIC_VECTORS;
use medpipe::config::{ConfigBuilder, MedpipeConfig, RulerConfig, SAMPLE_TEXT, SourceConfig};
use medpipe::pipeline::{FactoryRegistry, load_package};
use medpipe::workflow::build_from_config;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_package(root: &Path, name: &str, components: serde_json::Value) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    let manifest = json!({"lang": "en", "name": name, "components": components});
    fs::write(dir.join("pipeline.json"), manifest.to_string()).unwrap();
}

fn write_dictionary(dir: &Path, file: &str, entries: &[serde_json::Value]) -> PathBuf {
    let path = dir.join(file);
    let lines: Vec<String> = entries.iter().map(|e| e.to_string()).collect();
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

/// Two source packages and two dictionaries under one temp dir
fn fixture() -> (TempDir, MedpipeConfig) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("pipelines");

    write_package(
        &root,
        "en_core_web_lg",
        json!([
            {"name": "tok2vec", "factory": "tok2vec", "config": {"width": 8}},
            {"name": "senter", "factory": "sentencizer"},
            {"name": "ner", "factory": "ner", "config": {"patterns": [
                {"label": "PERSON", "regex": r"\b(Alex|Ritesh|Mariam)\b"},
                {"label": "CHEMICAL", "regex": r"\b(lidocaine|bupivacaine)\b"}
            ]}}
        ]),
    );
    write_package(
        &root,
        "stanza_en",
        json!([
            {"name": "tokenize", "factory": "sentencizer"},
            {"name": "ner", "factory": "ner", "config": {"patterns": [
                {"label": "DISEASE", "regex": r"\bmethemoglobinemia\b"}
            ]}}
        ]),
    );

    let icd = write_dictionary(
        temp.path(),
        "icd10cm.jsonl",
        &[
            json!({"label": "ICD", "pattern": "methemoglobinemia", "id": "D74.9"}),
            json!({"label": "ICD", "pattern": "metabolic acidosis", "id": "E87.2"}),
        ],
    );
    let meddra = write_dictionary(
        temp.path(),
        "medraLLT.jsonl",
        &[
            json!({"label": "MEDDRA", "pattern": "local anesthetics"}),
            json!({"label": "MEDDRA", "pattern": "methemoglobinemia"}),
        ],
    );

    let config = ConfigBuilder::new()
        .with_sources(vec![
            SourceConfig::package("en_core_web_lg", &root),
            SourceConfig::package("stanza_en", &root),
        ])
        .with_rulers(vec![
            RulerConfig::new("icd_ruler", icd),
            RulerConfig::new("medra_ruler", meddra),
        ])
        .build()
        .unwrap();

    (temp, config)
}

#[tokio::test]
async fn test_build_merges_sources_and_places_rulers() {
    let (_temp, config) = fixture();
    let registry = FactoryRegistry::with_builtins();

    let report = build_from_config(&config, None, &registry).await.unwrap();
    let names = report.pipeline.pipe_names();

    assert_eq!(
        names,
        vec!["tok2vec", "senter", "icd_ruler", "medra_ruler", "ner", "tokenize"]
    );

    // Each distinct name exactly once
    let mut unique = names.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), names.len());

    let icd = names.iter().position(|n| *n == "icd_ruler").unwrap();
    let meddra = names.iter().position(|n| *n == "medra_ruler").unwrap();
    assert_eq!(meddra, icd + 1);

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "ner");
    assert_eq!(report.skipped[0].source, "stanza_en");
    assert_eq!(report.skipped[0].kept_from, "en_core_web_lg");

    let tok2vec = report.pipeline.get_pipe("tok2vec").unwrap();
    assert_eq!(tok2vec.config().get_bool(INCLUDE_STATIC_VECTORS), Some(false));
}

#[tokio::test]
async fn test_sample_text_end_to_end() {
    let (_temp, config) = fixture();
    let registry = FactoryRegistry::with_builtins();
    let report = build_from_config(&config, None, &registry).await.unwrap();

    let doc = report.pipeline.process(SAMPLE_TEXT).unwrap();
    let ents = doc.ents();

    let labelled: Vec<(&str, &str)> = ents
        .iter()
        .map(|e| (e.text.as_str(), e.label.as_str()))
        .collect();

    for person in ["Alex", "Ritesh", "Mariam"] {
        assert!(labelled.contains(&(person, "PERSON")), "missing {}", person);
    }
    assert!(labelled.contains(&("local anesthetics", "MEDDRA")));
    assert!(labelled.contains(&("metabolic acidosis", "ICD")));
    assert!(labelled.contains(&("lidocaine", "CHEMICAL")));
    assert!(labelled.contains(&("bupivacaine", "CHEMICAL")));

    // The ICD ruler runs first, so it owns both mentions
    let methemoglobinemia: Vec<_> = ents
        .iter()
        .filter(|e| e.text == "methemoglobinemia")
        .collect();
    assert_eq!(methemoglobinemia.len(), 2);
    assert!(methemoglobinemia.iter().all(|e| e.label == "ICD"));
    assert!(methemoglobinemia.iter().all(|e| e.source == "icd_ruler"));
    assert!(
        methemoglobinemia
            .iter()
            .all(|e| e.pattern_id.as_deref() == Some("D74.9"))
    );

    // No two spans over the same text range, and no overlaps at all
    for (i, a) in ents.iter().enumerate() {
        for b in &ents[i + 1..] {
            assert!(
                !a.overlaps(b),
                "{} overlaps {}",
                a.format(),
                b.format()
            );
        }
    }
}

#[tokio::test]
async fn test_combined_package_round_trip() {
    let (temp, config) = fixture();
    let registry = FactoryRegistry::with_builtins();
    let report = build_from_config(&config, None, &registry).await.unwrap();

    let out = temp.path().join("combined");
    report.pipeline.to_disk(&out).unwrap();
    assert!(out.join("icd_ruler").join("patterns.jsonl").is_file());

    // Dictionaries may move; the package carries its own copy
    fs::remove_file(temp.path().join("icd10cm.jsonl")).unwrap();

    let reloaded = load_package(&out, &registry).unwrap();
    assert_eq!(reloaded.pipe_names(), report.pipeline.pipe_names());
    assert_eq!(reloaded.name(), "combined");

    let original = report.pipeline.process(SAMPLE_TEXT).unwrap();
    let again = reloaded.process(SAMPLE_TEXT).unwrap();
    assert_eq!(original.ents(), again.ents());
}

#[tokio::test]
async fn test_missing_source_package_fails() {
    let (temp, config) = fixture();
    let config = ConfigBuilder::from_config(config)
        .with_package_source("not_installed", temp.path().join("pipelines"))
        .build()
        .unwrap();

    let registry = FactoryRegistry::with_builtins();
    assert!(build_from_config(&config, None, &registry).await.is_err());
}

#[tokio::test]
async fn test_malformed_dictionary_is_fatal() {
    let (temp, config) = fixture();
    let bad = write_dictionary(
        temp.path(),
        "bad.jsonl",
        &[
            json!({"label": "ICD", "pattern": "flu"}),
            json!({"label": "ICD"}),
        ],
    );
    let config = ConfigBuilder::from_config(config)
        .with_rulers(vec![RulerConfig::new("icd_ruler", bad)])
        .build()
        .unwrap();

    let registry = FactoryRegistry::with_builtins();
    let err = build_from_config(&config, None, &registry)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("line 2"), "{}", err);
}
