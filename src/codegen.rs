//! Body compiler: template nodes to JavaScript statement code.
//!
//! The generated statements implement the render logic against two fixed
//! helpers, `sprig_element(name, args)` and `sprig_join_classes(value)`, both
//! defined later by the assembler. Child blocks accumulate into a `sprig_buf`
//! array; nested blocks open their own function scope so each level gets a
//! fresh buffer. Identifiers that templates reference (attribute expressions,
//! loop sources, buffered code) are emitted verbatim and resolved after
//! assembly by the scope analyzer and locals binder.

use crate::parser::{ElementNode, Inline, Node};

pub fn compile_body(nodes: &[Node]) -> String {
    let mut compiler = BodyCompiler {
        out: String::new(),
        depth: 1,
    };
    compiler.line("var sprig_buf = [];");
    compiler.compile_nodes(nodes);
    compiler.line("return sprig_buf.length === 1 ? sprig_buf[0] : sprig_buf;");
    compiler.out
}

struct BodyCompiler {
    out: String,
    depth: usize,
}

impl BodyCompiler {
    fn pad(&self) -> String {
        "  ".repeat(self.depth)
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(&self.pad());
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn compile_nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.compile_node(node);
        }
    }

    fn compile_node(&mut self, node: &Node) {
        match node {
            Node::Element(el) => {
                let expr = self.element_expression(el);
                self.line(&format!("sprig_buf.push({});", expr));
            }
            Node::Text(text) => {
                let expr = text_expression(&text.value);
                self.line(&format!("sprig_buf.push({});", expr));
            }
            Node::Buffered(buffered) => {
                self.line(&format!("sprig_buf.push(({}));", buffered.code));
            }
            Node::Code(code) => {
                self.line(&terminated(&code.code));
            }
            Node::Conditional(cond) => {
                for (i, branch) in cond.branches.iter().enumerate() {
                    let head = match (&branch.condition, i) {
                        (Some(c), 0) => format!("if ({}) {{", c),
                        (Some(c), _) => format!("}} else if ({}) {{", c),
                        (None, _) => "} else {".to_string(),
                    };
                    self.line(&head);
                    self.depth += 1;
                    self.compile_nodes(&branch.body);
                    self.depth -= 1;
                }
                self.line("}");
            }
            Node::Each(each) => {
                let params = match &each.index {
                    Some(index) => format!("{}, {}", each.item, index),
                    None => each.item.clone(),
                };
                self.line(&format!(
                    "({}).forEach(function ({}) {{",
                    each.source, params
                ));
                self.depth += 1;
                self.compile_nodes(&each.body);
                self.depth -= 1;
                self.line("});");
            }
        }
    }

    fn element_expression(&mut self, el: &ElementNode) -> String {
        let mut entries = Vec::new();

        let mut class_parts: Vec<String> = el
            .classes
            .iter()
            .map(|c| format!("\"{}\"", escape_js_string(c)))
            .collect();
        for attr in el.attributes.iter().filter(|a| a.name == "class") {
            class_parts.push(attr_value(&attr.value));
        }
        if !class_parts.is_empty() {
            entries.push(format!(
                "className: sprig_join_classes([{}])",
                class_parts.join(", ")
            ));
        }
        if let Some(id) = &el.id {
            entries.push(format!("id: \"{}\"", escape_js_string(id)));
        }
        for attr in el.attributes.iter().filter(|a| a.name != "class") {
            entries.push(format!("\"{}\": {}", attr.name, attr_value(&attr.value)));
        }

        let props = if entries.is_empty() {
            "null".to_string()
        } else {
            format!("{{ {} }}", entries.join(", "))
        };

        let args = if el.children.is_empty() {
            match &el.inline {
                None => format!("[{}]", props),
                Some(Inline::Text(text)) => {
                    format!("[{}].concat([{}])", props, text_expression(text))
                }
                Some(Inline::Buffered(code)) => format!("[{}].concat([({})])", props, code),
            }
        } else {
            format!(
                "[{}].concat({})",
                props,
                self.block_iife(el.inline.as_ref(), &el.children)
            )
        };

        format!("sprig_element(\"{}\", {})", escape_js_string(&el.tag), args)
    }

    /// Child blocks get their own buffer inside a fresh function scope.
    fn block_iife(&self, inline: Option<&Inline>, nodes: &[Node]) -> String {
        let mut inner = BodyCompiler {
            out: String::new(),
            depth: self.depth + 1,
        };
        inner.line("var sprig_buf = [];");
        match inline {
            Some(Inline::Text(text)) => {
                let expr = text_expression(text);
                inner.line(&format!("sprig_buf.push({});", expr));
            }
            Some(Inline::Buffered(code)) => {
                inner.line(&format!("sprig_buf.push(({}));", code));
            }
            None => {}
        }
        inner.compile_nodes(nodes);
        inner.line("return sprig_buf;");
        format!("(function () {{\n{}{}}})()", inner.out, self.pad())
    }
}

fn attr_value(value: &Option<String>) -> String {
    match value {
        Some(expr) => format!("({})", expr),
        None => "true".to_string(),
    }
}

fn terminated(code: &str) -> String {
    let code = code.trim();
    if code.ends_with(';') || code.ends_with('{') || code.ends_with('}') {
        code.to_string()
    } else {
        format!("{};", code)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEXT INTERPOLATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Compiles a text value with `#{expr}` interpolations into a string-
/// concatenation expression.
fn text_expression(value: &str) -> String {
    let mut parts = Vec::new();
    let mut rest = value;
    loop {
        match find_interpolation(rest) {
            Some((start, end)) => {
                if start > 0 {
                    parts.push(format!("\"{}\"", escape_js_string(&rest[..start])));
                }
                let expr = rest[start + 2..end].trim();
                parts.push(format!("({})", expr));
                rest = &rest[end + 1..];
            }
            None => {
                if !rest.is_empty() || parts.is_empty() {
                    parts.push(format!("\"{}\"", escape_js_string(rest)));
                }
                break;
            }
        }
    }
    parts.join(" + ")
}

/// Byte offsets of the next `#{` and its balancing `}`, if any.
fn find_interpolation(text: &str) -> Option<(usize, usize)> {
    let start = text.find("#{")?;
    let mut depth = 0i32;
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    for (idx, c) in text[start + 1..].char_indices() {
        let idx = start + 1 + idx;
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            q if in_string == Some(q) => in_string = None,
            _ if in_string.is_some() => {}
            '\'' | '"' | '`' => in_string = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, idx));
                }
            }
            _ => {}
        }
    }
    None
}

fn escape_js_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
