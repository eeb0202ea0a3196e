use docpatch_engine::{AnchorPair, Document, EditRequest, PatchEngine, PatchResult, SkipReason};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
struct GoldenCase {
    name: String,
    before: Value,
    request: GoldenRequest,
    expected: Expected,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum GoldenRequest {
    Edits(Vec<EditRequest>),
    Rewrite {
        #[serde(default)]
        anchors: AnchorPair,
        target: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Expected {
    applied_count: usize,
    #[serde(default)]
    skipped: Vec<ExpectedSkip>,
    tree: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct ExpectedSkip {
    index: usize,
    reason: SkipReason,
}

#[test]
fn patch_golden_cases() {
    let cases_dir = golden_cases_dir();
    let cases = load_cases(&cases_dir);

    assert!(!cases.is_empty(), "no golden cases found in {}", cases_dir.display());

    let mut failures = Vec::new();
    for case in cases {
        if let Err(message) = run_case(&case) {
            failures.push(message);
        }
    }

    if !failures.is_empty() {
        panic!("{} golden case(s) failed:\n\n{}", failures.len(), failures.join("\n\n"));
    }
}

fn golden_cases_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../tests/golden/cases")
}

fn load_cases(cases_dir: &Path) -> Vec<GoldenCase> {
    let mut case_dirs: Vec<PathBuf> = fs::read_dir(cases_dir)
        .unwrap_or_else(|error| panic!("failed to read {}: {error}", cases_dir.display()))
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            if path.is_dir() { Some(path) } else { None }
        })
        .collect();
    case_dirs.sort();
    case_dirs.into_iter().map(load_case).collect()
}

fn load_case(case_dir: PathBuf) -> GoldenCase {
    let name = case_dir
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("<unnamed-case>")
        .to_owned();

    GoldenCase {
        name,
        before: read_json(&case_dir.join("before.json")),
        request: read_json(&case_dir.join("request.json")),
        expected: read_json(&case_dir.join("expected.json")),
    }
}

fn run_case(case: &GoldenCase) -> Result<(), String> {
    let before = Document::from_value(case.before.clone())
        .map_err(|error| format!("case `{}` has an invalid before tree: {error}", case.name))?;
    let expected_tree = Document::from_value(case.expected.tree.clone())
        .map_err(|error| format!("case `{}` has an invalid expected tree: {error}", case.name))?;

    let engine = PatchEngine::default();
    let result: PatchResult = match &case.request {
        GoldenRequest::Edits(edits) => engine.apply_edits(&before, edits),
        GoldenRequest::Rewrite { anchors, target } => engine.rewrite_section(&before, anchors, target),
    }
    .map_err(|error| format!("case `{}` was rejected: {error}", case.name))?;

    if result.tree != expected_tree {
        return Err(format!(
            "case `{}` tree mismatch.\nexpected: {}\nactual:   {}",
            case.name,
            render(&expected_tree),
            render(&result.tree)
        ));
    }

    if result.applied_count != case.expected.applied_count {
        return Err(format!(
            "case `{}` appliedCount mismatch: expected {}, actual {}",
            case.name, case.expected.applied_count, result.applied_count
        ));
    }

    let actual_skips: Vec<ExpectedSkip> = result
        .skipped
        .iter()
        .map(|skip| ExpectedSkip { index: skip.index, reason: skip.reason })
        .collect();
    if actual_skips != case.expected.skipped {
        return Err(format!(
            "case `{}` skipped mismatch.\nexpected: {:?}\nactual:   {:?}",
            case.name, case.expected.skipped, actual_skips
        ));
    }

    Ok(())
}

fn render(doc: &Document) -> String {
    serde_json::to_string(doc).unwrap_or_else(|error| format!("<unserializable: {error}>"))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> T {
    let contents = fs::read_to_string(path)
        .unwrap_or_else(|error| panic!("failed to read {}: {error}", path.display()));
    serde_json::from_str(&contents)
        .unwrap_or_else(|error| panic!("failed to parse {}: {error}", path.display()))
}
