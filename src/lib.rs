//! # Sprig Compiler
//!
//! Compiles Sprig templates into JavaScript render functions with the
//! contract `render(locals, components) -> element tree`.
//!
//! ## Rewrite Invariants
//!
//! 1. **Assembly**: generated statements are always wrapped into a single
//!    `exports = function (locals, components) { ... }` source containing the
//!    two helper definitions and exactly one `sprig_locals(locals);`
//!    placeholder.
//!
//! 2. **Validation before analysis**: the assembled source must parse before
//!    any rewrite happens. A parse failure is a code-generation defect; the
//!    full source is dumped to stderr and the error is re-raised, never
//!    repaired.
//!
//! 3. **Free variables**: identifiers the generated code reads without
//!    binding are discovered by real scope resolution (hoisting and shadowing
//!    respected) in first-occurrence order, minus the intrinsic names
//!    `{sprig_locals, sprig_element, sprig_join_classes, exports, Array, Sprig}`.
//!
//! 4. **Binding precedence**: each free variable `G` binds as
//!    `"G" in locals ? locals.G : sprig_outer_G` — key membership, not
//!    truthiness, so an explicit falsy local always wins over the captured
//!    outer-scope fallback.
//!
//! 5. **Determinism**: capture preamble, binding statements, and the
//!    free-variable set share one ordering; identical template and options
//!    produce byte-identical output.
//!
//! Direct-mode output is evaluated by a host that already binds the `Sprig`
//! runtime global; portable-mode output is self-contained module source that
//! requires the runtime relative to the build's output file.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

mod assemble;
mod bind;
mod codegen;
mod emit;
mod error;
mod lexer;
mod parser;
mod runtime;
mod scope;
mod transform;

#[cfg(test)]
mod pipeline_tests;

pub use error::CompilerError;
pub use runtime::{runtime_entry, RUNTIME_GLOBAL, RUNTIME_PACKAGE};
pub use scope::{analyze, free_variables, Analysis};
pub use transform::transform_source;

/// Options threaded through one compile invocation. `filename` feeds
/// diagnostics; `output_file` anchors portable-mode relative-path math.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    pub filename: Option<String>,
    pub output_file: Option<String>,
}

/// Compiles a template to direct-mode render-function source. Evaluating the
/// result in a context that binds [`RUNTIME_GLOBAL`] yields the render
/// function.
pub fn compile(source: &str, options: &CompileOptions) -> Result<String, CompilerError> {
    Ok(emit::direct(&build_render_source(source, options)?))
}

/// Reads a template file (UTF-8) and compiles it in direct mode.
pub fn compile_file(path: &str, options: &CompileOptions) -> Result<String, CompilerError> {
    let (source, options) = read_template(path, options)?;
    compile(&source, &options)
}

/// Compiles a template to portable module source suitable for verbatim
/// embedding by a bundling step.
pub fn compile_module(source: &str, options: &CompileOptions) -> Result<String, CompilerError> {
    emit::module_source(
        &build_render_source(source, options)?,
        options.output_file.as_deref(),
    )
}

/// Reads a template file (UTF-8) and compiles it in portable mode.
pub fn compile_file_module(path: &str, options: &CompileOptions) -> Result<String, CompilerError> {
    let (source, options) = read_template(path, options)?;
    compile_module(&source, &options)
}

/// The core pipeline: front end, body compiler, assembler, validator,
/// analyzer, binder. Emission picks the artifact shape afterwards.
fn build_render_source(
    source: &str,
    options: &CompileOptions,
) -> Result<bind::BoundSource, CompilerError> {
    let filename = options.filename.clone().unwrap_or_default();
    let tokens = lexer::lex(source, &filename)?;
    let nodes = parser::parse(tokens, source, &filename)?;
    let body = codegen::compile_body(&nodes);
    let assembled = assemble::assemble(&body);
    scope::check_syntax(&assembled, &filename)?;
    let analysis = scope::analyze(&assembled, &filename)?;
    Ok(bind::bind(&analysis.source, &analysis.free_variables))
}

fn read_template(
    path: &str,
    options: &CompileOptions,
) -> Result<(String, CompileOptions), CompilerError> {
    let source = fs::read_to_string(path).map_err(|e| {
        CompilerError::new(
            error::TEMPLATE_READ_ERROR,
            &format!("unable to read template {}: {}", path, e),
            path,
            0,
            0,
        )
    })?;
    let mut options = options.clone();
    options.filename = Some(resolve_filename(path));
    Ok((source, options))
}

fn resolve_filename(path: &str) -> String {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_string_lossy().into_owned()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path).to_string_lossy().into_owned())
            .unwrap_or_else(|_| path.to_string_lossy().into_owned())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI BRIDGE
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
fn napi_options(options: Option<serde_json::Value>) -> napi::Result<CompileOptions> {
    match options {
        Some(value) => {
            serde_json::from_value(value).map_err(|e| napi::Error::from_reason(e.to_string()))
        }
        None => Ok(CompileOptions::default()),
    }
}

#[cfg(feature = "napi")]
fn napi_err(e: CompilerError) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

#[cfg(feature = "napi")]
#[napi]
pub fn compile_native(source: String, options: Option<serde_json::Value>) -> napi::Result<String> {
    compile(&source, &napi_options(options)?).map_err(napi_err)
}

#[cfg(feature = "napi")]
#[napi]
pub fn compile_file_native(
    path: String,
    options: Option<serde_json::Value>,
) -> napi::Result<String> {
    compile_file(&path, &napi_options(options)?).map_err(napi_err)
}

#[cfg(feature = "napi")]
#[napi]
pub fn compile_module_native(
    source: String,
    options: Option<serde_json::Value>,
) -> napi::Result<String> {
    compile_module(&source, &napi_options(options)?).map_err(napi_err)
}

#[cfg(feature = "napi")]
#[napi]
pub fn compile_file_module_native(
    path: String,
    options: Option<serde_json::Value>,
) -> napi::Result<String> {
    compile_file_module(&path, &napi_options(options)?).map_err(napi_err)
}

#[cfg(feature = "napi")]
#[napi]
pub fn transform_source_native(
    source: String,
    file_path: String,
    options: Option<serde_json::Value>,
) -> napi::Result<String> {
    transform_source(&source, &file_path, &napi_options(options)?).map_err(napi_err)
}
