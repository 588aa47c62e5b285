//! Build-pipeline hook: inlines compile call sites in host JavaScript.
//!
//! A bundling pass hands each scanned source file to [`transform_source`].
//! Call sites written against the public compile entry points
//! (`sprig.compile(...)` and `sprig.compileFile(...)`) are replaced in place
//! with portable-mode output, so the delivered bundle carries the compiled
//! render function instead of the compiler. The file being processed becomes
//! the output file for relative-path math, and `compileFile` template paths
//! resolve against that file's directory. Template arguments must be static
//! string literals; anything else cannot be compiled ahead of time and is
//! reported as an error.

use crate::error::{self, CompilerError};
use crate::lexer::find_balanced;
use crate::CompileOptions;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

lazy_static! {
    static ref CALL_SITE_RE: Regex =
        Regex::new(r"\bsprig\s*\.\s*(compile|compileFile)\s*\(").unwrap();
}

pub fn transform_source(
    source: &str,
    file_path: &str,
    options: &CompileOptions,
) -> Result<String, CompilerError> {
    let mut out = String::with_capacity(source.len());
    let mut last_end = 0;

    for caps in CALL_SITE_RE.captures_iter(source) {
        let site = caps.get(0).unwrap();
        if site.start() < last_end {
            // Inside the argument span of an already-rewritten site.
            continue;
        }
        let line = line_of(source, site.start());
        let open = site.end() - 1;
        let close = find_balanced(source, open, '(', ')').ok_or_else(|| {
            site_error("unterminated compile call", file_path, line)
        })?;
        let args = &source[open + 1..close];
        let literal = leading_string_literal(args).ok_or_else(|| {
            site_error(
                "compile call argument must be a static string literal",
                file_path,
                line,
            )
        })?;

        // Transform-level options win over call-site option arguments; the
        // processed file anchors all relative requires.
        let mut site_options = options.clone();
        site_options.output_file = Some(file_path.to_string());

        let replacement = match &caps[1] {
            "compile" => {
                if site_options.filename.is_none() {
                    site_options.filename = Some(file_path.to_string());
                }
                crate::compile_module(&literal, &site_options)?
            }
            _ => {
                let template_path = Path::new(file_path)
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(&literal);
                crate::compile_file_module(&template_path.to_string_lossy(), &site_options)?
            }
        };

        out.push_str(&source[last_end..site.start()]);
        out.push_str(&replacement);
        last_end = close + 1;
    }

    out.push_str(&source[last_end..]);
    Ok(out)
}

fn site_error(message: &str, file_path: &str, line: u32) -> CompilerError {
    CompilerError::new(error::TRANSFORM_ERROR, message, file_path, line, 1)
}

fn line_of(source: &str, offset: usize) -> u32 {
    (source[..offset].matches('\n').count() + 1) as u32
}

/// Extracts the value of a leading string literal from an argument list.
/// Template literals qualify only when they carry no `${` interpolation.
fn leading_string_literal(args: &str) -> Option<String> {
    let trimmed = args.trim_start();
    let mut chars = trimmed.char_indices();
    let (_, quote) = chars.next()?;
    if !matches!(quote, '\'' | '"' | '`') {
        return None;
    }

    let mut value = String::new();
    let mut escaped = false;
    let mut end = None;
    for (idx, c) in chars {
        if escaped {
            value.push(unescape(c));
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            c if c == quote => {
                end = Some(idx);
                break;
            }
            _ => value.push(c),
        }
    }
    let end = end?;

    if quote == '`' && value.contains("${") {
        return None;
    }
    // Anything after the literal must be further arguments, not expression
    // glue like `+`.
    let rest = trimmed[end + 1..].trim_start();
    if !(rest.is_empty() || rest.starts_with(',')) {
        return None;
    }
    Some(value)
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
