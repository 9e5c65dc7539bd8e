//! Shared error model: severities, categories, fix strategies and the
//! merged validation result every component speaks.

use serde::{Deserialize, Serialize};

/// Finding severity. Ordered `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Critical and High findings are errors; Medium and Low are warnings.
    pub fn is_error(self) -> bool {
        self >= Severity::High
    }

    fn confidence_penalty(self) -> f32 {
        match self {
            Severity::Critical => 0.30,
            Severity::High => 0.10,
            Severity::Medium | Severity::Low => 0.02,
        }
    }
}

/// Named repair strategies the router knows how to execute.
///
/// Strategy names arriving from outside (e.g. a serialized error list) that
/// do not match a known strategy deserialize to [`FixStrategy::Unrecognized`]
/// and are treated as non-fixable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStrategy {
    Dependency,
    ModuleSystem,
    Configuration,
    Syntax,
    Cleanup,
    #[serde(other)]
    Unrecognized,
}

impl FixStrategy {
    /// Execution order: structural prerequisites before content rewrites.
    pub const PRIORITY: [FixStrategy; 5] = [
        FixStrategy::Dependency,
        FixStrategy::ModuleSystem,
        FixStrategy::Configuration,
        FixStrategy::Syntax,
        FixStrategy::Cleanup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FixStrategy::Dependency => "dependency",
            FixStrategy::ModuleSystem => "module_system",
            FixStrategy::Configuration => "configuration",
            FixStrategy::Syntax => "syntax",
            FixStrategy::Cleanup => "cleanup",
            FixStrategy::Unrecognized => "unrecognized",
        }
    }
}

/// Closed taxonomy of detectable defects.
///
/// Every category carries a default severity and, when one exists, the
/// strategy that repairs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Syntax,
    MissingToken,
    UnterminatedString,
    MalformedAttribute,
    ParseFailure,
    UnbalancedBrackets,
    Indentation,
    MissingManifest,
    InvalidManifest,
    MissingDependency,
    InvalidVersion,
    PlaceholderCode,
    TodoMarker,
    ModuleSystem,
    LooseTyping,
    PortConfig,
    PrintStatement,
    DuplicateFile,
    EmptyFile,
    PlaceholderFile,
    MissingConfig,
    InvalidConfig,
    ConfigModuleMismatch,
    MissingJsxFlag,
    ModuleResolution,
    DeprecatedConfig,
    LayerFailure,
}

impl ErrorCategory {
    pub fn default_severity(self) -> Severity {
        use ErrorCategory as C;
        match self {
            C::Syntax
            | C::MissingToken
            | C::UnterminatedString
            | C::MissingManifest
            | C::InvalidManifest
            | C::PlaceholderCode
            | C::DuplicateFile
            | C::MissingConfig
            | C::InvalidConfig
            | C::LayerFailure => Severity::Critical,
            C::MalformedAttribute
            | C::ParseFailure
            | C::UnbalancedBrackets
            | C::MissingDependency
            | C::TodoMarker
            | C::ModuleSystem
            | C::EmptyFile
            | C::ConfigModuleMismatch
            | C::MissingJsxFlag => Severity::High,
            C::Indentation
            | C::InvalidVersion
            | C::LooseTyping
            | C::PortConfig
            | C::PlaceholderFile
            | C::ModuleResolution => Severity::Medium,
            C::PrintStatement | C::DeprecatedConfig => Severity::Low,
        }
    }

    pub fn strategy(self) -> Option<FixStrategy> {
        use ErrorCategory as C;
        match self {
            C::MissingToken | C::UnterminatedString | C::MalformedAttribute => {
                Some(FixStrategy::Syntax)
            }
            C::MissingManifest | C::MissingDependency | C::InvalidVersion => {
                Some(FixStrategy::Dependency)
            }
            C::ModuleSystem | C::ConfigModuleMismatch => Some(FixStrategy::ModuleSystem),
            C::PortConfig
            | C::MissingConfig
            | C::MissingJsxFlag
            | C::ModuleResolution
            | C::DeprecatedConfig => Some(FixStrategy::Configuration),
            C::PlaceholderCode
            | C::TodoMarker
            | C::PrintStatement
            | C::DuplicateFile
            | C::EmptyFile
            | C::PlaceholderFile => Some(FixStrategy::Cleanup),
            C::Syntax
            | C::ParseFailure
            | C::UnbalancedBrackets
            | C::Indentation
            | C::InvalidManifest
            | C::LooseTyping
            | C::InvalidConfig
            | C::LayerFailure => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        use ErrorCategory as C;
        match self {
            C::Syntax => "syntax",
            C::MissingToken => "missing_token",
            C::UnterminatedString => "unterminated_string",
            C::MalformedAttribute => "malformed_attribute",
            C::ParseFailure => "parse_failure",
            C::UnbalancedBrackets => "unbalanced_brackets",
            C::Indentation => "indentation",
            C::MissingManifest => "missing_manifest",
            C::InvalidManifest => "invalid_manifest",
            C::MissingDependency => "missing_dependency",
            C::InvalidVersion => "invalid_version",
            C::PlaceholderCode => "placeholder_code",
            C::TodoMarker => "todo_marker",
            C::ModuleSystem => "module_system",
            C::LooseTyping => "loose_typing",
            C::PortConfig => "port_config",
            C::PrintStatement => "print_statement",
            C::DuplicateFile => "duplicate_file",
            C::EmptyFile => "empty_file",
            C::PlaceholderFile => "placeholder_file",
            C::MissingConfig => "missing_config",
            C::InvalidConfig => "invalid_config",
            C::ConfigModuleMismatch => "config_module_mismatch",
            C::MissingJsxFlag => "missing_jsx_flag",
            C::ModuleResolution => "module_resolution",
            C::DeprecatedConfig => "deprecated_config",
            C::LayerFailure => "layer_failure",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One defect reported by a validation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub severity: Severity,
    pub category: ErrorCategory,

    /// Path of the offending file (or of the file that should exist).
    pub file: String,

    /// 1-indexed line, when the defect has a location.
    pub line: Option<u32>,

    pub message: String,
    pub fixable: bool,
    pub fix_strategy: Option<FixStrategy>,
    pub suggested_fix: Option<String>,

    /// What the error is about: a dependency name, a missing token, a
    /// config key or the companion file to create.
    pub target: Option<String>,
}

impl ValidationError {
    /// New error with the category's default severity and strategy.
    pub fn new(category: ErrorCategory, file: impl Into<String>, message: impl Into<String>) -> Self {
        let strategy = category.strategy();
        Self {
            severity: category.default_severity(),
            category,
            file: file.into(),
            line: None,
            message: message.into(),
            fixable: strategy.is_some(),
            fix_strategy: strategy,
            suggested_fix: None,
            target: None,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_fix = Some(suggestion.into());
        self
    }

    /// Mark the error as report-only.
    pub fn not_fixable(mut self) -> Self {
        self.fixable = false;
        self.fix_strategy = None;
        self
    }

    /// Fixable and routed to a strategy the router recognizes.
    pub fn is_fixable(&self) -> bool {
        self.fixable
            && matches!(self.fix_strategy, Some(s) if s != FixStrategy::Unrecognized)
    }
}

/// The four inspection layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerName {
    Syntax,
    Dependency,
    Pattern,
    Structure,
}

impl LayerName {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerName::Syntax => "syntax",
            LayerName::Dependency => "dependency",
            LayerName::Pattern => "pattern",
            LayerName::Structure => "structure",
        }
    }
}

/// Per-layer counts; diagnostics only, never used for control flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerResult {
    pub layer: LayerName,
    pub errors: usize,
    pub warnings: usize,
}

/// Merged outcome of one validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True iff no Critical errors were reported.
    pub passed: bool,

    /// Critical and High findings.
    pub errors: Vec<ValidationError>,

    /// Medium and Low findings.
    pub warnings: Vec<ValidationError>,

    pub layer_results: Vec<LayerResult>,

    /// Advisory score in `[0, 1]`.
    pub confidence: f32,
}

impl ValidationResult {
    /// Merge per-layer findings (in the given order) and partition them.
    pub fn from_layers(layers: Vec<(LayerName, Vec<ValidationError>)>) -> Self {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut layer_results = Vec::with_capacity(layers.len());

        for (layer, findings) in layers {
            let mut layer_errors = 0usize;
            let mut layer_warnings = 0usize;
            for finding in findings {
                if finding.severity.is_error() {
                    layer_errors += 1;
                    errors.push(finding);
                } else {
                    layer_warnings += 1;
                    warnings.push(finding);
                }
            }
            layer_results.push(LayerResult {
                layer,
                errors: layer_errors,
                warnings: layer_warnings,
            });
        }

        let confidence = compute_confidence(errors.iter().chain(warnings.iter()));
        let passed = !errors.iter().any(|e| e.severity == Severity::Critical);

        Self {
            passed,
            errors,
            warnings,
            layer_results,
            confidence,
        }
    }

    pub fn critical_count(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| e.severity == Severity::Critical)
            .count()
    }

    /// Errors followed by warnings.
    pub fn findings(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().chain(self.warnings.iter())
    }

    pub fn count_category(&self, category: ErrorCategory) -> usize {
        self.findings().filter(|e| e.category == category).count()
    }
}

/// Start at 1.0, subtract 0.30 per Critical, 0.10 per High and 0.02 per
/// Medium/Low finding, clamped to `[0, 1]`.
pub fn compute_confidence<'a>(findings: impl IntoIterator<Item = &'a ValidationError>) -> f32 {
    let penalty: f32 = findings
        .into_iter()
        .map(|e| e.severity.confidence_penalty())
        .sum();
    (1.0 - penalty).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::High.is_error());
        assert!(!Severity::Medium.is_error());
    }

    #[test]
    fn test_new_error_uses_category_defaults() {
        let err = ValidationError::new(ErrorCategory::MissingDependency, "src/a.ts", "axios");
        assert_eq!(err.severity, Severity::High);
        assert_eq!(err.fix_strategy, Some(FixStrategy::Dependency));
        assert!(err.is_fixable());

        let err = ValidationError::new(ErrorCategory::Syntax, "src/a.ts", "bad");
        assert_eq!(err.severity, Severity::Critical);
        assert!(!err.fixable);
        assert!(!err.is_fixable());
    }

    #[test]
    fn test_every_fixable_category_names_a_known_strategy() {
        use ErrorCategory as C;
        let all = [
            C::Syntax,
            C::MissingToken,
            C::UnterminatedString,
            C::MalformedAttribute,
            C::ParseFailure,
            C::UnbalancedBrackets,
            C::Indentation,
            C::MissingManifest,
            C::InvalidManifest,
            C::MissingDependency,
            C::InvalidVersion,
            C::PlaceholderCode,
            C::TodoMarker,
            C::ModuleSystem,
            C::LooseTyping,
            C::PortConfig,
            C::PrintStatement,
            C::DuplicateFile,
            C::EmptyFile,
            C::PlaceholderFile,
            C::MissingConfig,
            C::InvalidConfig,
            C::ConfigModuleMismatch,
            C::MissingJsxFlag,
            C::ModuleResolution,
            C::DeprecatedConfig,
            C::LayerFailure,
        ];
        for category in all {
            let err = ValidationError::new(category, "f", "m");
            if err.fixable {
                assert!(FixStrategy::PRIORITY.contains(&err.fix_strategy.unwrap()));
            }
            let json = serde_json::to_string(&category).expect("serialize");
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn test_unknown_strategy_is_not_fixable() {
        let json = r#"{
            "severity": "high",
            "category": "missing_dependency",
            "file": "a.ts",
            "line": null,
            "message": "m",
            "fixable": true,
            "fix_strategy": "ask_an_oracle",
            "suggested_fix": null,
            "target": null
        }"#;
        let err: ValidationError = serde_json::from_str(json).expect("deserialize");
        assert_eq!(err.fix_strategy, Some(FixStrategy::Unrecognized));
        assert!(!err.is_fixable());
    }

    #[test]
    fn test_confidence_scoring_and_bounds() {
        assert_eq!(compute_confidence(std::iter::empty()), 1.0);

        let findings = vec![
            ValidationError::new(ErrorCategory::Syntax, "a", "m"),
            ValidationError::new(ErrorCategory::EmptyFile, "b", "m"),
            ValidationError::new(ErrorCategory::PrintStatement, "c", "m"),
        ];
        let score = compute_confidence(&findings);
        assert!((score - 0.58).abs() < 1e-5);

        let many: Vec<_> = (0..10)
            .map(|i| ValidationError::new(ErrorCategory::Syntax, format!("{i}"), "m"))
            .collect();
        assert_eq!(compute_confidence(&many), 0.0);
    }

    #[test]
    fn test_from_layers_partitions_and_gates_on_critical() {
        let result = ValidationResult::from_layers(vec![
            (
                LayerName::Dependency,
                vec![ValidationError::new(ErrorCategory::MissingDependency, "a.ts", "m")],
            ),
            (
                LayerName::Pattern,
                vec![ValidationError::new(ErrorCategory::PrintStatement, "a.ts", "m")],
            ),
        ]);
        assert!(result.passed, "High errors alone must not gate");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.layer_results[0].errors, 1);
        assert_eq!(result.layer_results[1].warnings, 1);

        let failing = ValidationResult::from_layers(vec![(
            LayerName::Structure,
            vec![ValidationError::new(ErrorCategory::DuplicateFile, "a.ts", "m")],
        )]);
        assert!(!failing.passed);
        assert_eq!(failing.critical_count(), 1);
    }
}
