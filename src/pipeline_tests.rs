//! End-to-end properties of the compile pipeline.
//!
//! These tests exercise the public entry points and assert on the generated
//! source: the compiler never evaluates JavaScript, so binding semantics are
//! verified by the exact statements the rewrite emits.

#[cfg(test)]
mod tests {
    use crate::{compile, compile_module, CompileOptions};

    fn opts(filename: &str) -> CompileOptions {
        CompileOptions {
            filename: Some(filename.to_string()),
            output_file: None,
        }
    }

    #[test]
    fn test_compile_is_deterministic() {
        let template = "div.card(title=heading)\n  p= count\n  each item in items\n    li= item";
        let first = compile(template, &opts("card.sprig")).unwrap();
        let second = compile(template, &opts("card.sprig")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_free_variable_is_captured_and_bound() {
        let out = compile("p= count", &opts("count.sprig")).unwrap();
        assert!(out.starts_with(
            "var sprig_outer_count = typeof count === \"undefined\" ? undefined : count;\n"
        ));
        assert!(out.contains("var count = \"count\" in locals ? locals.count : sprig_outer_count;"));
    }

    #[test]
    fn test_binding_uses_membership_not_truthiness() {
        let out = compile("p= count", &opts("count.sprig")).unwrap();
        assert!(out.contains("\"count\" in locals ?"));
        assert!(!out.contains("locals.count ||"));
    }

    #[test]
    fn test_each_free_variable_is_bound_once() {
        let out = compile("p= count\nspan= count", &opts("twice.sprig")).unwrap();
        assert_eq!(
            out.matches("var count = \"count\" in locals").count(),
            1
        );
        assert_eq!(out.matches("var sprig_outer_count").count(), 1);
    }

    #[test]
    fn test_no_external_identifiers_means_no_rewrite() {
        let out = compile("div.box\n  p hello", &opts("static.sprig")).unwrap();
        assert!(out.starts_with("return function"));
        assert!(!out.contains("sprig_outer_"));
        assert!(!out.contains("in locals"));
        assert!(!out.contains("sprig_locals"));
    }

    #[test]
    fn test_loop_variables_are_not_free() {
        let out = compile("each item, i in items\n  li= item", &opts("loop.sprig")).unwrap();
        assert!(out.contains("var sprig_outer_items"));
        assert!(!out.contains("var sprig_outer_item "));
        assert!(!out.contains("var sprig_outer_i "));
    }

    #[test]
    fn test_ambient_names_are_never_bound() {
        let out = compile("p= Array.isArray(list)", &opts("ambient.sprig")).unwrap();
        assert!(out.contains("var sprig_outer_list"));
        assert!(!out.contains("sprig_outer_Array"));
        assert!(!out.contains("sprig_outer_Sprig"));
        assert!(!out.contains("sprig_outer_exports"));
    }

    #[test]
    fn test_template_locals_shadow_binder() {
        // `- var` declarations are bound inside the render function, so the
        // binder must not capture them from the outer scope.
        let out = compile("- var greeting = \"hi\"\np= greeting", &opts("shadow.sprig")).unwrap();
        assert!(!out.contains("sprig_outer_greeting"));
    }

    #[test]
    fn test_module_embeds_direct_source() {
        let entry = crate::runtime::install_test_runtime();
        let root = entry.ancestors().nth(4).unwrap().to_path_buf();
        let output_file = root.join("dist").join("page.js");

        let mut options = opts("page.sprig");
        options.output_file = Some(output_file.to_string_lossy().into_owned());

        let direct = compile("p= count", &opts("page.sprig")).unwrap();
        let module = compile_module("p= count", &options).unwrap();
        assert!(module.contains(&direct));
        assert!(module.starts_with("(function (Sprig) {"));
    }

    #[test]
    fn test_module_reference_is_relative_and_forward_slashed() {
        let entry = crate::runtime::install_test_runtime();
        let root = entry.ancestors().nth(4).unwrap().to_path_buf();
        let output_file = root.join("dist").join("page.js");

        let mut options = opts("page.sprig");
        options.output_file = Some(output_file.to_string_lossy().into_owned());

        let module = compile_module("p hi", &options).unwrap();
        assert!(module.contains("require(\"../node_modules/sprig-runtime/lib/index.js\")"));
    }

    #[test]
    fn test_module_without_output_file_uses_absolute_reference() {
        let entry = crate::runtime::install_test_runtime();
        let module = compile_module("p hi", &opts("page.sprig")).unwrap();
        let expected = format!(
            "require(\"{}\")",
            entry.to_string_lossy().replace('\\', "/")
        );
        assert!(module.contains(&expected));
    }

    #[test]
    fn test_module_output_is_deterministic() {
        let _ = crate::runtime::install_test_runtime();
        let first = compile_module("p= count", &opts("page.sprig")).unwrap();
        let second = compile_module("p= count", &opts("page.sprig")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_syntax_error_carries_filename_and_line() {
        let err = compile("div\n    p deep\n  p shallow", &opts("cards.sprig")).unwrap_err();
        assert_eq!(err.code, crate::error::SYNTAX_ERROR);
        assert!(err.message.contains("cards.sprig"));
        assert!(err.message.contains(":3"));
    }

    #[test]
    fn test_conditional_and_interpolation_compile() {
        let template = "if admin\n  span.badge Admin #{name}\nelse\n  span guest";
        let out = compile(template, &opts("badge.sprig")).unwrap();
        assert!(out.contains("var sprig_outer_admin"));
        assert!(out.contains("var sprig_outer_name"));
        assert!(out.contains("sprig_join_classes"));
    }

    #[test]
    fn test_render_contract_signature() {
        let out = compile("p hi", &opts("sig.sprig")).unwrap();
        assert!(out.contains("function(locals, components)") || out.contains("function (locals, components)"));
    }
}
