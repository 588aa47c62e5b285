//! Diagnostics for the Sprig compiler.
//!
//! Every failure in the pipeline is reported as a [`CompilerError`] carrying a
//! stable string code, the offending file/position, and optional source
//! context. Errors are propagated unchanged once constructed; nothing in the
//! pipeline retries or repairs.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

/// Malformed template input; requires template correction.
pub const SYNTAX_ERROR: &str = "SYNTAX_ERROR";
/// Assembled source failed to parse; a code-generation defect, not user error.
pub const INTERNAL_CODEGEN_ERROR: &str = "INTERNAL_CODEGEN_ERROR";
/// Static analysis failed unexpectedly.
pub const SCOPE_ANALYSIS_ERROR: &str = "SCOPE_ANALYSIS_ERROR";
/// The sprig-runtime package location could not be resolved.
pub const RUNTIME_RESOLUTION_ERROR: &str = "RUNTIME_RESOLUTION_ERROR";
/// A build-hook call site could not be statically evaluated.
pub const TRANSFORM_ERROR: &str = "TRANSFORM_ERROR";
/// A template file could not be read as UTF-8.
pub const TEMPLATE_READ_ERROR: &str = "TEMPLATE_READ_ERROR";

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
pub struct CompilerError {
    pub code: String,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub context: Option<String>,
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: &str, file: &str, line: u32, column: u32) -> Self {
        Self::with_details(code, message, file, line, column, None, vec![])
    }

    pub fn with_details(
        code: &str,
        message: &str,
        file: &str,
        line: u32,
        column: u32,
        context: Option<String>,
        hints: Vec<String>,
    ) -> Self {
        CompilerError {
            code: code.to_string(),
            message: message.to_string(),
            file: file.to_string(),
            line,
            column,
            context,
            hints,
        }
    }

    /// Template syntax error enriched with `filename:line` and a marked
    /// source snippet around the offending line.
    pub fn template_syntax(message: &str, file: &str, line: u32, source: &str) -> Self {
        let snippet = context_snippet(source, line);
        let message = format!("{}:{} {}", display_file(file), line, message);
        Self::with_details(SYNTAX_ERROR, &message, file, line, 1, Some(snippet), vec![])
    }
}

fn display_file(file: &str) -> &str {
    if file.is_empty() {
        "<anonymous>"
    } else {
        file
    }
}

/// Renders the two lines either side of `line`, marking the line itself.
fn context_snippet(source: &str, line: u32) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let line = line.max(1) as usize;
    let start = line.saturating_sub(3);
    let end = (line + 2).min(lines.len());
    let mut out = String::new();
    for (idx, text) in lines.iter().enumerate().take(end).skip(start) {
        let lineno = idx + 1;
        let marker = if lineno == line { ">" } else { " " };
        out.push_str(&format!("{} {:>4}| {}\n", marker, lineno, text));
    }
    out
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(context) = &self.context {
            write!(f, "\n{}", context)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompilerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_syntax_carries_file_and_line() {
        let err = CompilerError::template_syntax(
            "unexpected character",
            "views/card.sprig",
            2,
            "div\n  p(\n  span hi",
        );
        assert_eq!(err.code, SYNTAX_ERROR);
        assert!(err.message.contains("views/card.sprig"));
        assert!(err.message.contains(":2"));
        let context = err.context.unwrap();
        assert!(context.contains(">    2| "));
        assert!(context.contains("p("));
    }

    #[test]
    fn test_anonymous_file_placeholder() {
        let err = CompilerError::template_syntax("bad indent", "", 1, "div");
        assert!(err.message.starts_with("<anonymous>:1"));
    }

    #[test]
    fn test_display_includes_context() {
        let err = CompilerError::with_details(
            INTERNAL_CODEGEN_ERROR,
            "generated source failed to parse",
            "a.sprig",
            1,
            1,
            Some("exports = function (".to_string()),
            vec![],
        );
        let rendered = err.to_string();
        assert!(rendered.contains("INTERNAL_CODEGEN_ERROR"));
        assert!(rendered.contains("exports = function ("));
    }
}
