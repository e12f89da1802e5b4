//! Rustica SQL - the host analyzer seen from the query compiler
//!
//! The compiler needs the true output column types of every query. Inside
//! a database those come from the host's own parser and planner, reached
//! through [`SqlAnalyzer`]. [`CatalogAnalyzer`] answers the same questions
//! from a JSON table catalog so modules can be compiled offline.

mod analyzer;
mod catalog;
mod error;
mod parser;
mod token;

pub use analyzer::*;
pub use catalog::{Catalog, CatalogAnalyzer, ColumnDef};
pub use error::AnalyzerError;
pub use token::{tokenize, Token, TokenKind};
