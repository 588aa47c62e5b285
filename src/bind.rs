//! Locals binder: rewrites the render source against the caller's locals map.
//!
//! Two-part rewrite, in this order: first the outer-scope capture preamble
//! (one statement per free variable, guarded with `typeof` so an undefined
//! outer name resolves to `undefined` instead of throwing), then the
//! replacement of the single `sprig_locals(locals);` placeholder with one
//! binding statement per free variable. Bindings test key membership, not
//! truthiness, so an explicit falsy value in locals always wins over the
//! captured fallback. A source without the placeholder is returned unchanged;
//! it simply never references external state.

use lazy_static::lazy_static;
use regex::{NoExpand, Regex};

lazy_static! {
    /// Whitespace-flexible match for the placeholder statement as the code
    /// generator prints it.
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\n?[ \t]*sprig_locals\(locals\);?").unwrap();
}

/// Rewritten render source, still in exports-assignment form. The preamble is
/// kept separate because it must precede whatever outer wrapper the dual-mode
/// emitter chooses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundSource {
    pub preamble: String,
    pub source: String,
}

pub fn bind(source: &str, free_variables: &[String]) -> BoundSource {
    let preamble: String = free_variables
        .iter()
        .map(|g| {
            format!(
                "var sprig_outer_{g} = typeof {g} === \"undefined\" ? undefined : {g};\n"
            )
        })
        .collect();

    let bindings = free_variables
        .iter()
        .map(|g| format!("\tvar {g} = \"{g}\" in locals ? locals.{g} : sprig_outer_{g};"))
        .collect::<Vec<_>>()
        .join("\n");
    let replacement = format!("\n{}", bindings);

    BoundSource {
        preamble,
        source: PLACEHOLDER_RE
            .replace(source, NoExpand(&replacement))
            .into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble_captures_in_order() {
        let bound = bind("x;", &["count".to_string(), "title".to_string()]);
        let expected = "var sprig_outer_count = typeof count === \"undefined\" ? undefined : count;\n\
                        var sprig_outer_title = typeof title === \"undefined\" ? undefined : title;\n";
        assert_eq!(bound.preamble, expected);
    }

    #[test]
    fn test_placeholder_becomes_membership_bindings() {
        let source = "exports = function(locals, components) {\n\tsprig_locals(locals);\n\treturn count;\n};\n";
        let bound = bind(source, &["count".to_string()]);
        assert!(bound
            .source
            .contains("var count = \"count\" in locals ? locals.count : sprig_outer_count;"));
        assert!(!bound.source.contains("sprig_locals"));
    }

    #[test]
    fn test_binding_order_matches_free_variable_order() {
        let source = "sprig_locals(locals);";
        let bound = bind(source, &["b".to_string(), "a".to_string()]);
        let b_at = bound.source.find("var b = ").unwrap();
        let a_at = bound.source.find("var a = ").unwrap();
        assert!(b_at < a_at);
    }

    #[test]
    fn test_missing_placeholder_leaves_source_unchanged() {
        let source = "exports = function(locals, components) {\n\treturn [];\n};\n";
        let bound = bind(source, &["count".to_string()]);
        assert_eq!(bound.source, source);
    }

    #[test]
    fn test_no_free_variables_still_removes_placeholder() {
        let source = "exports = function(locals, components) {\n\tsprig_locals(locals);\n\treturn [];\n};\n";
        let bound = bind(source, &[]);
        assert!(bound.preamble.is_empty());
        assert!(!bound.source.contains("sprig_locals"));
        assert!(bound.source.contains("return [];"));
    }

    #[test]
    fn test_only_first_occurrence_is_replaced() {
        let source = "sprig_locals(locals);\nsprig_locals(locals);";
        let bound = bind(source, &[]);
        assert_eq!(bound.source.matches("sprig_locals").count(), 1);
    }
}
