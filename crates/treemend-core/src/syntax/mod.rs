//! Syntax analysis: the external-checker seam plus the line scanners used
//! where no checker is available.

pub mod checker;
pub mod markup;
pub mod scan;

pub use checker::{DiagnosticKind, SyntaxChecker, SyntaxDiagnostic, TreeSitterChecker};
pub use markup::{attribute_defects, AttributeDefect, AttributeIssue};
pub use scan::{bracket_defects, indentation_defects, scan, BracketDefect, Scan, StringDefect};
