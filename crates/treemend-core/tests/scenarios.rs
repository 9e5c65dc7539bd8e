//! End-to-end repair scenarios over small generated projects.

use std::sync::Arc;

use serde_json::Value;
use treemend_core::{
    CheckerKind, ErrorCategory, FixRouter, GeneratedFile, Orchestrator, PipelineConfig,
    RepairRegistry, RepairRequest, Severity, TargetLanguage, Validator,
};

fn registry() -> Arc<RepairRegistry> {
    Arc::new(RepairRegistry::builtin())
}

fn orchestrator() -> Orchestrator {
    Orchestrator::new(&PipelineConfig::default(), registry())
}

fn package_json() -> GeneratedFile {
    GeneratedFile::new(
        "package.json",
        "{\n  \"name\": \"demo\",\n  \"type\": \"module\",\n  \"dependencies\": {}\n}\n",
    )
}

fn tsconfig() -> GeneratedFile {
    GeneratedFile::new("tsconfig.json", "{\n  \"compilerOptions\": {\n    \"strict\": true\n  }\n}\n")
}

fn find<'a>(files: &'a [GeneratedFile], path: &str) -> &'a GeneratedFile {
    files
        .iter()
        .find(|f| f.path == path)
        .unwrap_or_else(|| panic!("{path} missing"))
}

#[tokio::test]
async fn missing_manifest_is_created() {
    let files = vec![GeneratedFile::new(
        "src/index.ts",
        "export const greet = (name: string): string => \"Hello \" + name;\n",
    )];

    let before = Validator::new(registry(), CheckerKind::TreeSitter)
        .validate(&files, TargetLanguage::TypeScript)
        .await;
    assert!(!before.passed);
    assert_eq!(before.count_category(ErrorCategory::MissingManifest), 1);
    let missing = before
        .errors
        .iter()
        .find(|e| e.category == ErrorCategory::MissingManifest)
        .expect("missing manifest error");
    assert_eq!(missing.severity, Severity::Critical);

    let report = orchestrator()
        .run(RepairRequest::new(files, TargetLanguage::TypeScript))
        .await;
    assert!(report.is_valid, "errors: {:?}", report.errors);
    assert_eq!(
        report
            .errors
            .iter()
            .filter(|e| e.category == ErrorCategory::MissingManifest)
            .count(),
        0
    );

    let manifest: Value =
        serde_json::from_str(&find(&report.files, "package.json").content).expect("json");
    assert_eq!(manifest["dependencies"], Value::Object(Default::default()));
    assert_eq!(manifest["devDependencies"], Value::Object(Default::default()));
}

#[tokio::test]
async fn duplicate_paths_keep_first_occurrence() {
    let files = vec![
        package_json(),
        tsconfig(),
        GeneratedFile::new("index.ts", "export const version = 1;\n"),
        GeneratedFile::new("index.ts", "export const version = 2;\n"),
    ];

    let before = Validator::new(registry(), CheckerKind::TreeSitter)
        .validate(&files, TargetLanguage::TypeScript)
        .await;
    assert_eq!(before.count_category(ErrorCategory::DuplicateFile), 1);
    assert!(!before.passed);

    let report = orchestrator()
        .run(RepairRequest::new(files.clone(), TargetLanguage::TypeScript))
        .await;
    assert!(report.is_valid);
    assert_eq!(report.files.len(), files.len() - 1);
    assert_eq!(find(&report.files, "index.ts").content, "export const version = 1;\n");
    assert!(report
        .errors
        .iter()
        .all(|e| e.category != ErrorCategory::DuplicateFile));
}

#[tokio::test]
async fn undeclared_import_is_added_at_registry_version() {
    let files = vec![
        package_json(),
        tsconfig(),
        GeneratedFile::new(
            "src/api.ts",
            "import axios from 'axios';\n\nexport const fetchUsers = () => axios.get(\"/api/users\");\n",
        ),
    ];
    let validator = Validator::new(registry(), CheckerKind::TreeSitter);
    let before = validator.validate(&files, TargetLanguage::TypeScript).await;
    let missing: Vec<_> = before
        .errors
        .iter()
        .filter(|e| e.category == ErrorCategory::MissingDependency)
        .collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].severity, Severity::High);
    assert_eq!(missing[0].target.as_deref(), Some("axios"));

    let findings: Vec<_> = before.findings().cloned().collect();
    let fixed = FixRouter::new(registry(), None)
        .fix(&files, &findings, TargetLanguage::TypeScript)
        .expect("fix");
    assert!(fixed.fixed);

    let manifest: Value =
        serde_json::from_str(&find(&fixed.files, "package.json").content).expect("json");
    let expected = registry().version_for(treemend_core::Ecosystem::Npm, "axios").to_string();
    assert_eq!(manifest["dependencies"]["axios"], Value::String(expected));

    let after = validator.validate(&fixed.files, TargetLanguage::TypeScript).await;
    assert_eq!(after.count_category(ErrorCategory::MissingDependency), 0);
}

#[tokio::test]
async fn placeholder_marker_is_stripped() {
    let files = vec![
        package_json(),
        tsconfig(),
        GeneratedFile::new(
            "src/util.ts",
            "export const a = 1;\n// ...existing code...\nexport const b = 2;\n",
        ),
    ];

    let before = Validator::new(registry(), CheckerKind::TreeSitter)
        .validate(&files, TargetLanguage::TypeScript)
        .await;
    assert_eq!(before.count_category(ErrorCategory::PlaceholderCode), 1);
    assert!(before.confidence <= 0.7 + f32::EPSILON);

    let report = orchestrator()
        .run(RepairRequest::new(files, TargetLanguage::TypeScript))
        .await;
    assert!(report.is_valid);
    assert!(report.errors.is_empty() && report.warnings.is_empty());
    assert_eq!(report.confidence, 1.0);
    assert_eq!(
        find(&report.files, "src/util.ts").content,
        "export const a = 1;\nexport const b = 2;\n"
    );
}

#[tokio::test]
async fn single_attempt_surfaces_remaining_errors() {
    let files = vec![
        package_json(),
        GeneratedFile::new("tsconfig.json", "{ \"compilerOptions\": "),
        GeneratedFile::new(
            "src/a.ts",
            "export const a = 1;\n// ...rest of the code...\n",
        ),
    ];

    let before = Validator::new(registry(), CheckerKind::TreeSitter)
        .validate(&files, TargetLanguage::TypeScript)
        .await;
    assert_eq!(before.critical_count(), 2);

    let report = orchestrator()
        .run(RepairRequest::new(files, TargetLanguage::TypeScript).with_max_attempts(1))
        .await;
    assert_eq!(report.attempts, 1);
    assert!(!report.is_valid);
    assert_eq!(report.critical_count(), 1);
    assert_eq!(report.errors[0].category, ErrorCategory::InvalidConfig);
    assert_eq!(report.attempt_log.len(), 1);
    assert_eq!(report.attempt_log[0].errors_after, 1);
}

#[tokio::test]
async fn python_project_is_repaired() {
    let files = vec![
        GeneratedFile::new("requirements.txt", "flask==3.0.3\n"),
        GeneratedFile::new(
            "app.py",
            "import requests\nfrom flask import Flask\n\napp = Flask(__name__)\n\n\ndef fetch():\n    print('fetching')\n\n\napp.run(port=5000)\n",
        ),
    ];
    let config = PipelineConfig {
        checker: CheckerKind::Heuristic,
        ..PipelineConfig::default()
    };
    let report = Orchestrator::new(&config, registry())
        .run(RepairRequest::new(files, TargetLanguage::Python))
        .await;

    // Only High and lower findings: nothing gates the loop.
    assert!(report.is_valid);
    assert_eq!(report.attempts, 0);
    assert!(report
        .errors
        .iter()
        .any(|e| e.category == ErrorCategory::MissingDependency
            && e.target.as_deref() == Some("requests")));
}
