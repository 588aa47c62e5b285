//! Dual-mode wrapper: finalizes a bound render source into an artifact.
//!
//! Direct mode swaps the leading exports-assignment for a `return`, producing
//! source meant to be evaluated inside a host context that already binds the
//! runtime global; evaluating it yields the render function. Portable mode
//! wraps the direct form in an immediately-invoked function taking the
//! runtime as a parameter, defaulted to a `require` of the runtime's on-disk
//! entry so a later bundling step can inline it anywhere.

use crate::bind::BoundSource;
use crate::error::CompilerError;
use crate::runtime::{self, RUNTIME_GLOBAL};
use lazy_static::lazy_static;
use regex::{NoExpand, Regex};

lazy_static! {
    static ref EXPORTS_RE: Regex = Regex::new(r"^exports\s*=\s*").unwrap();
}

pub fn direct(bound: &BoundSource) -> String {
    format!(
        "{}{}",
        bound.preamble,
        EXPORTS_RE.replace(&bound.source, NoExpand("return "))
    )
}

pub fn module_source(
    bound: &BoundSource,
    output_file: Option<&str>,
) -> Result<String, CompilerError> {
    let reference = runtime::runtime_reference(output_file)?;
    Ok(wrap_module(&direct(bound), &reference))
}

fn wrap_module(body: &str, reference: &str) -> String {
    format!(
        "(function ({g}) {{\n  {body}\n}}(typeof {g} !== \"undefined\" ? {g} : require(\"{reference}\")))",
        g = RUNTIME_GLOBAL,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(preamble: &str, source: &str) -> BoundSource {
        BoundSource {
            preamble: preamble.to_string(),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_direct_mode_returns_instead_of_exporting() {
        let out = direct(&bound("", "exports = function(locals, components) {};\n"));
        assert!(out.starts_with("return function(locals, components)"));
    }

    #[test]
    fn test_direct_mode_preamble_comes_first() {
        let out = direct(&bound(
            "var sprig_outer_count = typeof count === \"undefined\" ? undefined : count;\n",
            "exports = function(locals, components) {};\n",
        ));
        assert!(out.starts_with("var sprig_outer_count"));
        assert!(out.contains("return function(locals, components)"));
    }

    #[test]
    fn test_module_wrapper_shape() {
        let out = wrap_module("return 1;", "../node_modules/sprig-runtime/lib/index.js");
        assert!(out.starts_with("(function (Sprig) {"));
        assert!(out.contains(
            "typeof Sprig !== \"undefined\" ? Sprig : require(\"../node_modules/sprig-runtime/lib/index.js\")"
        ));
        assert!(out.ends_with("))"));
    }

    #[test]
    fn test_module_source_uses_resolved_runtime() {
        let entry = crate::runtime::install_test_runtime();
        // entry = <fixture>/node_modules/sprig-runtime/lib/index.js
        let fixture_root = entry
            .ancestors()
            .nth(4)
            .expect("fixture root");
        let output_file = fixture_root.join("dist").join("app.js");
        let out = module_source(
            &bound("", "exports = function(locals, components) {};\n"),
            Some(output_file.to_str().unwrap()),
        )
        .unwrap();
        assert!(out.contains("require(\"../node_modules/sprig-runtime/lib/index.js\")"));
    }
}
