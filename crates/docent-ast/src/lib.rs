//! A Python parser producing an analysis-oriented syntax tree.
//!
//! This crate turns Python source into owned [`nodes::Module`] trees that
//! keep what a documentation model needs: names, assignments, definitions
//! with their decorators and line numbers, and literal values. Formatting,
//! comments and whitespace are discarded.
//!
//! # Overview
//!
//! - **Parsing**: [`parse_module`] for whole files, [`parse_expr`] for a
//!   single expression such as a string annotation.
//! - **Nodes**: closed [`Stmt`] and [`Expr`] enums in [`nodes`], matched
//!   exhaustively by consumers.
//! - **Rendering**: [`Expr::to_source`] reproduces an expression as text,
//!   used wherever a type or default value is shown to a reader.
//!
//! # Quick Start
//!
//! ```
//! use docent_ast::{parse_module, nodes::Stmt};
//!
//! let module = parse_module("def greet(name):\n    return name\n").expect("parse error");
//! match &module.body[0] {
//!     Stmt::FunctionDef { name, .. } => assert_eq!(name, "greet"),
//!     other => panic!("unexpected statement: {other:?}"),
//! }
//! ```

use thiserror::Error;

pub mod nodes;
pub mod parser;
pub mod tokenizer;

pub use nodes::{Expr, Module, Stmt};
pub use parser::{parse_expr, parse_module};

/// Error raised for source text the parser does not accept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    Syntax { line: u32, message: String },
}

impl ParseError {
    /// Line the error was detected on.
    pub fn line(&self) -> u32 {
        match self {
            ParseError::Syntax { line, .. } => *line,
        }
    }
}
