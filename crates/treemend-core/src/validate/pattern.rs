//! Pattern layer: regex scan for placeholders, debug output, loose typing,
//! mixed module systems and hard-coded ports.

use crate::domain::{ErrorCategory, GeneratedFile, LayerName, ValidationError};
use crate::language::{SourceKind, TargetLanguage};
use crate::patterns::{is_server_entry, port_rules, rules_for, LineView, ModuleMarkers};
use crate::syntax::scan;

use super::ValidationLayer;

pub struct PatternLayer;

fn inspect_file(file: &GeneratedFile, kind: SourceKind) -> Vec<ValidationError> {
    let scanned = scan(&file.content, kind);
    let mut findings = Vec::new();
    let lines: Vec<(u32, &str, &str)> = file
        .content
        .split('\n')
        .zip(scanned.masked.iter())
        .enumerate()
        .map(|(idx, (raw, masked))| {
            (idx as u32 + 1, raw.strip_suffix('\r').unwrap_or(raw), masked.as_str())
        })
        .collect();

    for rule in rules_for(kind) {
        for (line, raw, masked) in &lines {
            let view = match rule.view {
                LineView::Raw => *raw,
                LineView::Code => *masked,
            };
            for _ in rule.regex.find_iter(view) {
                let mut finding = ValidationError::new(rule.category, &file.path, rule.message)
                    .with_line(*line)
                    .with_suggestion(rule.hint);
                if !rule.fixable {
                    finding = finding.not_fixable();
                }
                findings.push(finding);
            }
        }
    }

    if kind.is_web() {
        let markers = ModuleMarkers::of(&file.content);
        if markers.is_mixed() {
            findings.push(
                ValidationError::new(
                    ErrorCategory::ModuleSystem,
                    &file.path,
                    "file mixes CommonJS (`require`/`module.exports`) with ES module syntax",
                )
                .with_suggestion("use one module convention per file"),
            );
        }
    }

    if is_server_entry(file) {
        for rule in port_rules(kind) {
            for (line, raw, masked) in &lines {
                let view = match rule.view {
                    LineView::Raw => *raw,
                    LineView::Code => *masked,
                };
                for caps in rule.regex.captures_iter(view) {
                    let port = caps.get(caps.len() - 1).map_or("", |m| m.as_str());
                    findings.push(
                        ValidationError::new(
                            ErrorCategory::PortConfig,
                            &file.path,
                            format!("port {port} is hard-coded"),
                        )
                        .with_line(*line)
                        .with_target(port)
                        .with_suggestion("read the port from the PORT environment variable"),
                    );
                }
            }
        }
    }

    findings
}

impl ValidationLayer for PatternLayer {
    fn name(&self) -> LayerName {
        LayerName::Pattern
    }

    fn inspect(&self, files: &[GeneratedFile], _language: TargetLanguage) -> Vec<ValidationError> {
        files
            .iter()
            .filter_map(|file| SourceKind::from_path(&file.path).map(|kind| (file, kind)))
            .flat_map(|(file, kind)| inspect_file(file, kind))
            .collect()
    }
}
