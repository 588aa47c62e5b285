//! Syntax validation and free-variable analysis of assembled render sources.
//!
//! The validator confirms the assembler produced parseable JavaScript before
//! any deeper work; a failure here is a code-generation defect and the full
//! source is dumped to stderr so the defect is diagnosable. The analyzer then
//! computes the ordered set of identifiers the generated code reads without
//! binding, honoring `var`/function hoisting and shadowing, and re-prints the
//! AST to the normalized source the locals binder rewrites.

use crate::assemble::{CLASS_JOINER, ELEMENT_HELPER, LOCALS_PLACEHOLDER};
use crate::error::{self, CompilerError};
use crate::runtime::RUNTIME_GLOBAL;
use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::scope::ScopeFlags;
use std::collections::HashSet;

lazy_static! {
    /// Identifiers the binder must never capture: the placeholder, the two
    /// assembler helpers, the module binding, and names the evaluation
    /// environment always provides.
    pub static ref AMBIENT_NAMES: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert(LOCALS_PLACEHOLDER);
        s.insert(ELEMENT_HELPER);
        s.insert(CLASS_JOINER);
        s.insert("exports");
        s.insert("Array");
        s.insert(RUNTIME_GLOBAL);
        s
    };
}

/// Result of one analysis pass: the free variables in first-occurrence order
/// and the pretty-printed source the binder's textual rewrite operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub free_variables: Vec<String>,
    pub source: String,
}

/// Confirms the assembled source parses. Never repairs; the offending source
/// is written to stderr and attached to the returned diagnostic.
pub fn check_syntax(source: &str, filename: &str) -> Result<(), CompilerError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::default()).parse();
    if let Some(first) = ret.errors.first() {
        eprintln!("[Sprig] generated render source failed to parse:\n{}", source);
        return Err(CompilerError::with_details(
            error::INTERNAL_CODEGEN_ERROR,
            &format!("generated render source failed to parse: {:?}", first),
            filename,
            1,
            1,
            Some(source.to_string()),
            vec![],
        ));
    }
    Ok(())
}

/// Computes the free-variable set of `source` and re-prints it.
///
/// The analysis is a pure function of its input: no state survives a call, so
/// analyzing the same source twice yields identical results.
pub fn analyze(source: &str, filename: &str) -> Result<Analysis, CompilerError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::default()).parse();
    if let Some(first) = ret.errors.first() {
        return Err(CompilerError::new(
            error::SCOPE_ANALYSIS_ERROR,
            &format!("scope analysis could not parse source: {:?}", first),
            filename,
            1,
            1,
        ));
    }

    let mut collector = FreeVariableCollector::default();
    collector.visit_program(&ret.program);
    let printed = Codegen::new().build(&ret.program).code;

    Ok(Analysis {
        free_variables: collector.free,
        source: printed,
    })
}

/// Free variables of `source`, first-occurrence ordered and de-duplicated.
pub fn free_variables(source: &str, filename: &str) -> Result<Vec<String>, CompilerError> {
    analyze(source, filename).map(|a| a.free_variables)
}

// ═══════════════════════════════════════════════════════════════════════════════
// FREE VARIABLE COLLECTOR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct FreeVariableCollector {
    scopes: Vec<HashSet<String>>,
    seen: HashSet<String>,
    free: Vec<String>,
}

impl FreeVariableCollector {
    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|s| s.contains(name))
    }

    fn reference(&mut self, name: &str) {
        if self.is_bound(name) || AMBIENT_NAMES.contains(name) || self.seen.contains(name) {
            return;
        }
        self.seen.insert(name.to_string());
        self.free.push(name.to_string());
    }

    fn collect_pattern(&mut self, pattern: &BindingPattern) {
        match pattern {
            BindingPattern::BindingIdentifier(id) => self.declare(id.name.as_str()),
            BindingPattern::ObjectPattern(obj) => {
                for prop in &obj.properties {
                    self.collect_pattern(&prop.value);
                }
                if let Some(rest) = &obj.rest {
                    self.collect_pattern(&rest.argument);
                }
            }
            BindingPattern::ArrayPattern(arr) => {
                for elem in arr.elements.iter().flatten() {
                    self.collect_pattern(elem);
                }
                if let Some(rest) = &arr.rest {
                    self.collect_pattern(&rest.argument);
                }
            }
            _ => {}
        }
    }

    fn hoist_var_declaration(&mut self, decl: &VariableDeclaration) {
        if matches!(decl.kind, VariableDeclarationKind::Var) {
            for declarator in &decl.declarations {
                self.collect_pattern(&declarator.id);
            }
        }
    }

    fn hoist_for_left(&mut self, left: &ForStatementLeft) {
        if let ForStatementLeft::VariableDeclaration(decl) = left {
            self.hoist_var_declaration(decl);
        }
    }

    fn hoist_block(&mut self, stmts: &[Statement]) {
        for stmt in stmts {
            self.hoist_statement(stmt);
        }
    }

    /// Registers `var` and function declarations reachable without crossing a
    /// function boundary, so references ahead of their declaration line still
    /// resolve to the enclosing function scope.
    fn hoist_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::VariableDeclaration(decl) => self.hoist_var_declaration(decl),
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    self.declare(id.name.as_str());
                }
            }
            Statement::BlockStatement(block) => self.hoist_block(&block.body),
            Statement::IfStatement(stmt) => {
                self.hoist_statement(&stmt.consequent);
                if let Some(alternate) = &stmt.alternate {
                    self.hoist_statement(alternate);
                }
            }
            Statement::ForStatement(stmt) => {
                if let Some(ForStatementInit::VariableDeclaration(decl)) = &stmt.init {
                    self.hoist_var_declaration(decl);
                }
                self.hoist_statement(&stmt.body);
            }
            Statement::ForInStatement(stmt) => {
                self.hoist_for_left(&stmt.left);
                self.hoist_statement(&stmt.body);
            }
            Statement::ForOfStatement(stmt) => {
                self.hoist_for_left(&stmt.left);
                self.hoist_statement(&stmt.body);
            }
            Statement::WhileStatement(stmt) => self.hoist_statement(&stmt.body),
            Statement::DoWhileStatement(stmt) => self.hoist_statement(&stmt.body),
            Statement::LabeledStatement(stmt) => self.hoist_statement(&stmt.body),
            Statement::TryStatement(stmt) => {
                self.hoist_block(&stmt.block.body);
                if let Some(handler) = &stmt.handler {
                    self.hoist_block(&handler.body.body);
                }
                if let Some(finalizer) = &stmt.finalizer {
                    self.hoist_block(&finalizer.body);
                }
            }
            Statement::SwitchStatement(stmt) => {
                for case in &stmt.cases {
                    self.hoist_block(&case.consequent);
                }
            }
            _ => {}
        }
    }
}

impl<'a> Visit<'a> for FreeVariableCollector {
    fn visit_program(&mut self, program: &Program<'a>) {
        self.scopes.push(HashSet::new());
        self.hoist_block(&program.body);
        walk::walk_program(self, program);
        self.scopes.pop();
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        self.scopes.push(HashSet::new());
        if let Some(id) = &func.id {
            self.declare(id.name.as_str());
        }
        if let Some(body) = &func.body {
            self.hoist_block(&body.statements);
        }
        walk::walk_function(self, func, flags);
        self.scopes.pop();
    }

    fn visit_arrow_function_expression(&mut self, func: &ArrowFunctionExpression<'a>) {
        self.scopes.push(HashSet::new());
        self.hoist_block(&func.body.statements);
        walk::walk_arrow_function_expression(self, func);
        self.scopes.pop();
    }

    fn visit_block_statement(&mut self, block: &BlockStatement<'a>) {
        self.scopes.push(HashSet::new());
        walk::walk_block_statement(self, block);
        self.scopes.pop();
    }

    fn visit_for_statement(&mut self, stmt: &ForStatement<'a>) {
        self.scopes.push(HashSet::new());
        walk::walk_for_statement(self, stmt);
        self.scopes.pop();
    }

    fn visit_for_in_statement(&mut self, stmt: &ForInStatement<'a>) {
        self.scopes.push(HashSet::new());
        walk::walk_for_in_statement(self, stmt);
        self.scopes.pop();
    }

    fn visit_for_of_statement(&mut self, stmt: &ForOfStatement<'a>) {
        self.scopes.push(HashSet::new());
        walk::walk_for_of_statement(self, stmt);
        self.scopes.pop();
    }

    fn visit_catch_clause(&mut self, clause: &CatchClause<'a>) {
        self.scopes.push(HashSet::new());
        walk::walk_catch_clause(self, clause);
        self.scopes.pop();
    }

    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        self.declare(ident.name.as_str());
    }

    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.reference(ident.name.as_str());
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
