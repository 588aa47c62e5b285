//! Code assembler: wraps generated statements into one complete render
//! function source.
//!
//! The output is always an `exports = function (locals, components) { ... }`
//! assignment containing the two helper definitions, exactly one
//! `sprig_locals(locals);` placeholder, and the body compiler's statements.
//! A failure to parse downstream is a body-compiler defect, never user error.

/// Name of the locals-initializer placeholder statement.
pub const LOCALS_PLACEHOLDER: &str = "sprig_locals";
/// Name of the element-resolver helper defined in every render function.
pub const ELEMENT_HELPER: &str = "sprig_element";
/// Name of the class-list joiner helper defined in every render function.
pub const CLASS_JOINER: &str = "sprig_join_classes";

pub fn assemble(body: &str) -> String {
    format!(
        "exports = function (locals, components) {{\n\
         \x20 function sprig_element(name, args) {{\n\
         \x20   return components && Sprig.isComponent(components[name]) ? components[name].apply(components[name], args) : (Sprig.elements[name] ? Sprig.elements[name] : Sprig.elements.div).apply(Sprig.elements, args);\n\
         \x20 }}\n\
         \x20 function sprig_join_classes(val) {{\n\
         \x20   return Array.isArray(val) ? val.map(sprig_join_classes).filter(function (item) {{ return item != null && item !== \"\"; }}).join(\" \") : val;\n\
         \x20 }}\n\
         \x20 sprig_locals(locals);\n\
         {body}}}"
    )
}
