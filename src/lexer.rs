//! Lexer for the Sprig template language.
//!
//! Templates are line-oriented and indentation-structured. The lexer turns the
//! raw text into a flat token stream in which nesting is explicit:
//! `Indent`/`Outdent` tokens bracket each deeper block and every source line
//! ends with a `Newline` token. Attribute lists and `each` headers are split
//! here so the parser never has to re-scan raw text.

use crate::error::CompilerError;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `each item in expr` / `each item, index in expr`
    static ref EACH_RE: Regex = Regex::new(
        r"^each\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*(?:,\s*([A-Za-z_$][A-Za-z0-9_$]*)\s*)?\s+in\s+(.+)$"
    )
    .unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKENS
// ═══════════════════════════════════════════════════════════════════════════════

/// One entry of an attribute list. `value` is raw JavaScript expression text;
/// `None` marks a bare boolean attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Indent,
    Outdent,
    Newline,
    Tag(String),
    Class(String),
    Id(String),
    Attrs(Vec<Attribute>),
    Text(String),
    Buffered(String),
    Code(String),
    If(String),
    ElseIf(String),
    Else,
    Each {
        item: String,
        index: Option<String>,
        source: String,
    },
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedToken {
    pub token: Token,
    pub line: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEXER
// ═══════════════════════════════════════════════════════════════════════════════

pub fn lex(source: &str, filename: &str) -> Result<Vec<PositionedToken>, CompilerError> {
    Lexer {
        source,
        filename,
        tokens: Vec::new(),
    }
    .run()
}

struct Lexer<'a> {
    source: &'a str,
    filename: &'a str,
    tokens: Vec<PositionedToken>,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Vec<PositionedToken>, CompilerError> {
        let lines: Vec<&str> = self.source.lines().map(|l| l.trim_end_matches('\r')).collect();
        let mut indent_stack: Vec<usize> = vec![0];
        let mut i = 0;

        while i < lines.len() {
            let raw = lines[i];
            let lineno = (i + 1) as u32;
            if raw.trim().is_empty() {
                i += 1;
                continue;
            }

            let indent = indent_width(raw);
            let content = raw.trim_start().trim_end();

            // Comments swallow their own indented block.
            if content.starts_with("//") {
                i += 1;
                while i < lines.len() {
                    let next = lines[i];
                    if next.trim().is_empty() || indent_width(next) > indent {
                        i += 1;
                    } else {
                        break;
                    }
                }
                continue;
            }

            let current = *indent_stack.last().unwrap();
            if indent > current {
                indent_stack.push(indent);
                self.push(Token::Indent, lineno);
            } else if indent < current {
                while *indent_stack.last().unwrap() > indent {
                    indent_stack.pop();
                    self.push(Token::Outdent, lineno);
                }
                if *indent_stack.last().unwrap() != indent {
                    return Err(self.syntax("inconsistent indentation", lineno));
                }
            }

            self.lex_line(content, lineno)?;
            self.push(Token::Newline, lineno);
            i += 1;
        }

        let last_line = lines.len().max(1) as u32;
        while indent_stack.len() > 1 {
            indent_stack.pop();
            self.push(Token::Outdent, last_line);
        }
        self.push(Token::Eof, last_line);
        Ok(self.tokens)
    }

    fn lex_line(&mut self, content: &str, lineno: u32) -> Result<(), CompilerError> {
        if let Some(rest) = content.strip_prefix('|') {
            let text = rest.strip_prefix(' ').unwrap_or(rest);
            self.push(Token::Text(text.to_string()), lineno);
            return Ok(());
        }
        if let Some(rest) = content.strip_prefix('=') {
            let code = rest.trim();
            if code.is_empty() {
                return Err(self.syntax("expected an expression after `=`", lineno));
            }
            self.push(Token::Buffered(code.to_string()), lineno);
            return Ok(());
        }
        if let Some(rest) = content.strip_prefix('-') {
            let code = rest.trim();
            if code.is_empty() {
                return Err(self.syntax("expected a statement after `-`", lineno));
            }
            self.push(Token::Code(code.to_string()), lineno);
            return Ok(());
        }
        if let Some(rest) = keyword_rest(content, "else if") {
            self.push(Token::ElseIf(rest.to_string()), lineno);
            return Ok(());
        }
        if content == "else" {
            self.push(Token::Else, lineno);
            return Ok(());
        }
        if let Some(rest) = keyword_rest(content, "if") {
            self.push(Token::If(rest.to_string()), lineno);
            return Ok(());
        }
        if content == "each" || content.starts_with("each ") {
            let caps = EACH_RE
                .captures(content)
                .ok_or_else(|| self.syntax("malformed each, expected `each item[, index] in expression`", lineno))?;
            self.push(
                Token::Each {
                    item: caps[1].to_string(),
                    index: caps.get(2).map(|m| m.as_str().to_string()),
                    source: caps[3].trim().to_string(),
                },
                lineno,
            );
            return Ok(());
        }

        self.lex_tag_line(content, lineno)
    }

    fn lex_tag_line(&mut self, content: &str, lineno: u32) -> Result<(), CompilerError> {
        let bytes = content.as_bytes();
        let mut pos = 0;

        if bytes
            .first()
            .map(|b| b.is_ascii_alphabetic())
            .unwrap_or(false)
        {
            let end = scan_name(content, 0);
            self.push(Token::Tag(content[..end].to_string()), lineno);
            pos = end;
        }

        loop {
            match content[pos..].chars().next() {
                Some('.') => {
                    let end = scan_name(content, pos + 1);
                    if end == pos + 1 {
                        return Err(self.syntax("expected a class name after `.`", lineno));
                    }
                    self.push(Token::Class(content[pos + 1..end].to_string()), lineno);
                    pos = end;
                }
                Some('#') => {
                    let end = scan_name(content, pos + 1);
                    if end == pos + 1 {
                        return Err(self.syntax("expected an id after `#`", lineno));
                    }
                    self.push(Token::Id(content[pos + 1..end].to_string()), lineno);
                    pos = end;
                }
                Some('(') => {
                    let close = find_balanced(content, pos, '(', ')')
                        .ok_or_else(|| self.syntax("unclosed attribute list", lineno))?;
                    let attrs = self.split_attributes(&content[pos + 1..close], lineno)?;
                    self.push(Token::Attrs(attrs), lineno);
                    pos = close + 1;
                }
                _ => break,
            }
        }

        if pos == 0 {
            let c = content.chars().next().unwrap_or(' ');
            return Err(self.syntax(&format!("unexpected character `{}`", c), lineno));
        }

        match content[pos..].chars().next() {
            None => Ok(()),
            Some('=') => {
                let code = content[pos + 1..].trim();
                if code.is_empty() {
                    return Err(self.syntax("expected an expression after `=`", lineno));
                }
                self.push(Token::Buffered(code.to_string()), lineno);
                Ok(())
            }
            Some(' ') => {
                self.push(Token::Text(content[pos + 1..].to_string()), lineno);
                Ok(())
            }
            Some(c) => Err(self.syntax(&format!("unexpected character `{}`", c), lineno)),
        }
    }

    fn split_attributes(
        &self,
        inner: &str,
        lineno: u32,
    ) -> Result<Vec<Attribute>, CompilerError> {
        let mut attrs = Vec::new();
        for item in split_top_level(inner, ',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (name, value) = match find_top_level(item, '=') {
                Some(eq) => {
                    let value = item[eq + 1..].trim();
                    if value.is_empty() {
                        return Err(self.syntax("expected an attribute value after `=`", lineno));
                    }
                    (item[..eq].trim(), Some(value.to_string()))
                }
                None => (item, None),
            };
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '@' | '.'))
            {
                return Err(self.syntax(&format!("invalid attribute name `{}`", name), lineno));
            }
            attrs.push(Attribute {
                name: name.to_string(),
                value,
            });
        }
        Ok(attrs)
    }

    fn push(&mut self, token: Token, line: u32) {
        self.tokens.push(PositionedToken { token, line });
    }

    fn syntax(&self, message: &str, line: u32) -> CompilerError {
        CompilerError::template_syntax(message, self.filename, line, self.source)
    }
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn keyword_rest<'a>(content: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = content.strip_prefix(keyword)?;
    let rest = rest.strip_prefix(' ')?;
    let rest = rest.trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}

fn scan_name(content: &str, start: usize) -> usize {
    let tail = &content[start..];
    let len = tail
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_')
        .count();
    start + len
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSION-AWARE SCANNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Tracks string literals and template literals so that delimiters inside
/// JavaScript expression text never terminate a scan early.
#[derive(Default)]
struct ScanState {
    in_string: Option<char>,
    escaped: bool,
    depth_round: i32,
    depth_square: i32,
    depth_curly: i32,
}

impl ScanState {
    fn step(&mut self, c: char) {
        if self.escaped {
            self.escaped = false;
            return;
        }
        if c == '\\' {
            self.escaped = true;
            return;
        }
        if let Some(quote) = self.in_string {
            if c == quote {
                self.in_string = None;
            }
            return;
        }
        match c {
            '\'' | '"' | '`' => self.in_string = Some(c),
            '(' => self.depth_round += 1,
            ')' => self.depth_round -= 1,
            '[' => self.depth_square += 1,
            ']' => self.depth_square -= 1,
            '{' => self.depth_curly += 1,
            '}' => self.depth_curly -= 1,
            _ => {}
        }
    }

    fn at_top_level(&self) -> bool {
        self.in_string.is_none()
            && self.depth_round == 0
            && self.depth_square == 0
            && self.depth_curly == 0
    }
}

/// Byte index of the `close` matching the `open` at `start`, or `None`.
pub(crate) fn find_balanced(text: &str, start: usize, open: char, close: char) -> Option<usize> {
    debug_assert_eq!(text[start..].chars().next(), Some(open));
    let mut state = ScanState::default();
    let mut depth = 0i32;
    for (idx, c) in text[start..].char_indices() {
        let was_clean = state.in_string.is_none() && !state.escaped;
        state.step(c);
        if was_clean && state.in_string.is_none() {
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return Some(start + idx);
                }
            }
        }
    }
    None
}

/// Splits `text` at top-level occurrences of `sep`.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut state = ScanState::default();
    let mut last = 0;
    for (idx, c) in text.char_indices() {
        if c == sep && state.at_top_level() && !state.escaped {
            parts.push(&text[last..idx]);
            last = idx + c.len_utf8();
            continue;
        }
        state.step(c);
    }
    parts.push(&text[last..]);
    parts
}

/// Byte index of the first top-level occurrence of `sep`, if any.
fn find_top_level(text: &str, sep: char) -> Option<usize> {
    let mut state = ScanState::default();
    for (idx, c) in text.char_indices() {
        if c == sep && state.at_top_level() && !state.escaped {
            return Some(idx);
        }
        state.step(c);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source, "test.sprig")
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_tag_line() {
        let tokens = kinds("div.card#main(title=heading, data-open) Hello");
        assert_eq!(
            tokens,
            vec![
                Token::Tag("div".into()),
                Token::Class("card".into()),
                Token::Id("main".into()),
                Token::Attrs(vec![
                    Attribute {
                        name: "title".into(),
                        value: Some("heading".into()),
                    },
                    Attribute {
                        name: "data-open".into(),
                        value: None,
                    },
                ]),
                Token::Text("Hello".into()),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_indentation_brackets() {
        let tokens = kinds("ul\n  li one\n  li two\np done");
        let indents = tokens.iter().filter(|t| **t == Token::Indent).count();
        let outdents = tokens.iter().filter(|t| **t == Token::Outdent).count();
        assert_eq!(indents, 1);
        assert_eq!(outdents, 1);
        assert!(tokens.contains(&Token::Tag("p".into())));
    }

    #[test]
    fn test_attribute_values_keep_nested_commas() {
        let tokens = kinds("a(href=url(base, page), class=active ? \"on\" : \"off\")");
        let attrs = tokens
            .iter()
            .find_map(|t| match t {
                Token::Attrs(a) => Some(a.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].value.as_deref(), Some("url(base, page)"));
        assert_eq!(attrs[1].value.as_deref(), Some("active ? \"on\" : \"off\""));
    }

    #[test]
    fn test_each_header() {
        let tokens = kinds("each item, i in items.filter(visible)");
        assert_eq!(
            tokens[0],
            Token::Each {
                item: "item".into(),
                index: Some("i".into()),
                source: "items.filter(visible)".into(),
            }
        );
    }

    #[test]
    fn test_control_flow_keywords() {
        let tokens = kinds("if count > 0\n  p some\nelse\n  p none");
        assert_eq!(tokens[0], Token::If("count > 0".into()));
        assert!(tokens.contains(&Token::Else));
    }

    #[test]
    fn test_comment_swallows_block() {
        let tokens = kinds("// heading\n  p skipped\ndiv kept");
        assert!(!tokens.iter().any(|t| matches!(t, Token::Tag(tag) if tag == "p")));
        assert!(tokens.contains(&Token::Tag("div".into())));
    }

    #[test]
    fn test_inconsistent_dedent_is_error() {
        let err = lex("div\n    p deep\n  p shallow", "bad.sprig").unwrap_err();
        assert!(err.message.contains("bad.sprig"));
        assert!(err.message.contains(":3"));
        assert!(err.message.contains("indentation"));
    }

    #[test]
    fn test_unclosed_attrs_is_error() {
        let err = lex("a(href=\"x\"", "t.sprig").unwrap_err();
        assert!(err.message.contains("unclosed attribute list"));
    }

    #[test]
    fn test_implicit_div_shorthand() {
        let tokens = kinds(".note");
        assert_eq!(tokens[0], Token::Class("note".into()));
    }
}
