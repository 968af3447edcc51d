//! Runs JSON case suites against the library as an outside consumer would.
//!
//! Usage: `dev-test-runner [suite.json ...]`; the bundled suite runs when no
//! path is given.
use std::process::ExitCode;

use cirjson_schema::config::ComplianceOptions;
use cirjson_schema::document::Document;
use cirjson_schema::engine;
use cirjson_schema::reader::read_value;
use cirjson_schema::resolve::{EngineContext, InMemorySchemaService};
use cirjson_schema::schema::FileId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static BUNDLED: &str = include_str!("../suites/basic.json");

static SUITE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    name: String,
    schema: serde_json::Value,
    instance: serde_json::Value,
    #[serde(default)]
    strict: bool,
    expect: Vec<Expectation>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Expectation {
    pointer: String,
    /// Regex the message must match.
    message: String,
}

fn load_suite(label: &str, src: &str) -> Vec<Case> {
    let de = &mut serde_json::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, Vec<Case>>(de) {
        Ok(cases) => cases,
        Err(error) => panic!("invalid suite {label} at {}: {}", error.path(), error.inner()),
    }
}

/// Returns a description of the first mismatch.
fn run_case(idx: usize, case: &Case) -> Result<(), String> {
    let ctx = EngineContext::new(InMemorySchemaService::new());
    let file = FileId::new(format!("mem://case/{idx}-{}", SUITE_NAME.replace_all(&case.name, "-")));
    let root = read_value(file, case.schema.clone());
    let options =
        if case.strict { ComplianceOptions::default().with_force_strict() } else { ComplianceOptions::default() };
    let document = Document::from_json(case.instance.clone());
    let diagnostics = engine::validate(&ctx, &document, &root, options).map_err(|e| e.to_string())?;

    if diagnostics.len() != case.expect.len() {
        let found: Vec<String> =
            diagnostics.iter().map(|d| format!("{}: {}", d.anchor.pointer, d.message())).collect();
        return Err(format!("expected {} diagnostics, got {found:?}", case.expect.len()));
    }
    for (diagnostic, expected) in diagnostics.iter().zip(&case.expect) {
        let pattern = Regex::new(&expected.message).map_err(|e| format!("bad expectation regex: {e}"))?;
        if diagnostic.anchor.pointer != expected.pointer || !pattern.is_match(diagnostic.message()) {
            return Err(format!(
                "expected `{}` at {}, got `{}` at {}",
                expected.message,
                expected.pointer,
                diagnostic.message(),
                diagnostic.anchor.pointer
            ));
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let suites: Vec<(String, String)> = if args.is_empty() {
        vec![("bundled".to_string(), BUNDLED.to_string())]
    } else {
        args.into_iter()
            .map(|path| {
                let src = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {path}: {e}"));
                (path, src)
            })
            .collect()
    };

    let mut failed = 0;
    let mut total = 0;
    for (label, src) in &suites {
        for (idx, case) in load_suite(label, src).iter().enumerate() {
            total += 1;
            match run_case(idx, case) {
                Ok(()) => eprintln!("✅ {label}: {}", case.name),
                Err(reason) => {
                    failed += 1;
                    eprintln!("❌ {label}: {}: {reason}", case.name);
                }
            }
        }
    }
    eprintln!("{} of {total} cases passed", total - failed);
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
