//! Parser for the Sprig template language.
//!
//! Consumes the lexer's token stream and produces the template node tree the
//! body compiler walks. Nesting arrives as explicit `Indent`/`Outdent` pairs,
//! so the grammar here is a small recursive descent over flat tokens.

use crate::error::CompilerError;
use crate::lexer::{Attribute, PositionedToken, Token};

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE NODES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Buffered(BufferedNode),
    Code(CodeNode),
    Conditional(ConditionalNode),
    Each(EachNode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementNode {
    pub tag: String,
    pub classes: Vec<String>,
    pub id: Option<String>,
    pub attributes: Vec<Attribute>,
    pub inline: Option<Inline>,
    pub children: Vec<Node>,
    pub line: u32,
}

/// Content that shares the element's own line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Buffered(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub value: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedNode {
    pub code: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeNode {
    pub code: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalNode {
    pub branches: Vec<Branch>,
    pub line: u32,
}

/// `condition: None` is the final `else` branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub condition: Option<String>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EachNode {
    pub item: String,
    pub index: Option<String>,
    pub source: String,
    pub body: Vec<Node>,
    pub line: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSER
// ═══════════════════════════════════════════════════════════════════════════════

pub fn parse(
    tokens: Vec<PositionedToken>,
    source: &str,
    filename: &str,
) -> Result<Vec<Node>, CompilerError> {
    Parser {
        tokens,
        pos: 0,
        source,
        filename,
    }
    .run()
}

struct Parser<'a> {
    tokens: Vec<PositionedToken>,
    pos: usize,
    source: &'a str,
    filename: &'a str,
}

impl<'a> Parser<'a> {
    fn run(mut self) -> Result<Vec<Node>, CompilerError> {
        if matches!(self.peek(), Token::Indent) {
            return Err(self.syntax("unexpected indentation", self.line()));
        }
        let nodes = self.parse_block()?;
        match self.peek() {
            Token::Eof => Ok(nodes),
            _ => Err(self.syntax("unexpected trailing content", self.line())),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Node>, CompilerError> {
        let mut nodes = Vec::new();
        loop {
            match self.peek() {
                Token::Outdent | Token::Eof => break,
                Token::Newline => {
                    self.advance();
                }
                _ => nodes.push(self.parse_statement()?),
            }
        }
        Ok(nodes)
    }

    fn parse_statement(&mut self) -> Result<Node, CompilerError> {
        let line = self.line();
        match self.peek().clone() {
            Token::Tag(_) | Token::Class(_) | Token::Id(_) | Token::Attrs(_) => {
                self.parse_element(line)
            }
            Token::Text(value) => {
                self.advance();
                self.end_line()?;
                self.forbid_children("text lines cannot have nested children")?;
                Ok(Node::Text(TextNode { value, line }))
            }
            Token::Buffered(code) => {
                self.advance();
                self.end_line()?;
                self.forbid_children("buffered expressions cannot have nested children")?;
                Ok(Node::Buffered(BufferedNode { code, line }))
            }
            Token::Code(code) => {
                self.advance();
                self.end_line()?;
                self.forbid_children("statement lines cannot have nested children")?;
                Ok(Node::Code(CodeNode { code, line }))
            }
            Token::If(condition) => {
                self.advance();
                self.parse_conditional(condition, line)
            }
            Token::Each {
                item,
                index,
                source,
            } => {
                self.advance();
                self.end_line()?;
                let body = self.parse_children()?;
                Ok(Node::Each(EachNode {
                    item,
                    index,
                    source,
                    body,
                    line,
                }))
            }
            Token::ElseIf(_) | Token::Else => {
                Err(self.syntax("`else` without a preceding `if`", line))
            }
            Token::Indent => Err(self.syntax("unexpected indentation", line)),
            other => Err(self.syntax(&format!("unexpected token {:?}", other), line)),
        }
    }

    fn parse_element(&mut self, line: u32) -> Result<Node, CompilerError> {
        let mut tag: Option<String> = None;
        let mut classes = Vec::new();
        let mut id = None;
        let mut attributes = Vec::new();

        loop {
            match self.peek().clone() {
                Token::Tag(name) if tag.is_none() && classes.is_empty() && id.is_none() => {
                    tag = Some(name);
                    self.advance();
                }
                Token::Class(name) => {
                    classes.push(name);
                    self.advance();
                }
                Token::Id(name) => {
                    if id.is_some() {
                        return Err(self.syntax("duplicate id on element", line));
                    }
                    id = Some(name);
                    self.advance();
                }
                Token::Attrs(list) => {
                    attributes.extend(list);
                    self.advance();
                }
                _ => break,
            }
        }

        let inline = match self.peek().clone() {
            Token::Text(value) => {
                self.advance();
                Some(Inline::Text(value))
            }
            Token::Buffered(code) => {
                self.advance();
                Some(Inline::Buffered(code))
            }
            _ => None,
        };

        self.end_line()?;
        let children = self.parse_children()?;

        Ok(Node::Element(ElementNode {
            tag: tag.unwrap_or_else(|| "div".to_string()),
            classes,
            id,
            attributes,
            inline,
            children,
            line,
        }))
    }

    fn parse_conditional(&mut self, condition: String, line: u32) -> Result<Node, CompilerError> {
        self.end_line()?;
        let body = self.parse_children()?;
        let mut branches = vec![Branch {
            condition: Some(condition),
            body,
        }];

        loop {
            match self.peek().clone() {
                Token::ElseIf(condition) => {
                    self.advance();
                    self.end_line()?;
                    let body = self.parse_children()?;
                    branches.push(Branch {
                        condition: Some(condition),
                        body,
                    });
                }
                Token::Else => {
                    self.advance();
                    self.end_line()?;
                    let body = self.parse_children()?;
                    branches.push(Branch {
                        condition: None,
                        body,
                    });
                    break;
                }
                _ => break,
            }
        }

        Ok(Node::Conditional(ConditionalNode { branches, line }))
    }

    /// Consumes an indented block if one follows, returning its nodes.
    fn parse_children(&mut self) -> Result<Vec<Node>, CompilerError> {
        if !matches!(self.peek(), Token::Indent) {
            return Ok(Vec::new());
        }
        self.advance();
        let nodes = self.parse_block()?;
        match self.peek() {
            Token::Outdent => {
                self.advance();
                Ok(nodes)
            }
            Token::Eof => Ok(nodes),
            _ => Err(self.syntax("unterminated block", self.line())),
        }
    }

    fn forbid_children(&mut self, message: &str) -> Result<(), CompilerError> {
        if matches!(self.peek(), Token::Indent) {
            return Err(self.syntax(message, self.line()));
        }
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), CompilerError> {
        match self.peek() {
            Token::Newline => {
                self.advance();
                Ok(())
            }
            Token::Eof => Ok(()),
            _ => Err(self.syntax("expected end of line", self.line())),
        }
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn line(&self) -> u32 {
        self.tokens.get(self.pos).map(|t| t.line).unwrap_or(1)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn syntax(&self, message: &str, line: u32) -> CompilerError {
        CompilerError::template_syntax(message, self.filename, line, self.source)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
