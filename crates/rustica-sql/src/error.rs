//! Analyzer error types

use thiserror::Error;

use crate::Span;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("syntax error: expected {expected}, found {found}")]
    Syntax {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("expect exactly 1 SQL statement, found {0}")]
    StatementCount(usize),

    #[error("utilities SQL is not allowed")]
    Utility,

    #[error("relation \"{name}\" does not exist")]
    UnknownTable { name: String, span: Span },

    #[error("column \"{name}\" does not exist")]
    UnknownColumn { name: String, span: Span },

    #[error("type \"{name}\" does not exist")]
    UnknownType { name: String, span: Span },

    #[error("function {name}() does not exist")]
    UnknownFunction { name: String, span: Span },

    #[error("could not determine data type of parameter ${index}")]
    Parameter { index: usize, span: Span },

    #[error("unknown type \"{name}\" for column {table}.{column}")]
    CatalogType {
        table: String,
        column: String,
        name: String,
    },

    #[error("invalid catalog: {0}")]
    Catalog(#[from] serde_json::Error),

    /// Diagnostic text from an analyzer embedded in a database host
    #[error("{0}")]
    Host(String),
}

impl AnalyzerError {
    /// Location in the SQL text, when the error points at one
    pub fn span(&self) -> Option<Span> {
        match self {
            AnalyzerError::Syntax { span, .. }
            | AnalyzerError::UnknownTable { span, .. }
            | AnalyzerError::UnknownColumn { span, .. }
            | AnalyzerError::UnknownType { span, .. }
            | AnalyzerError::UnknownFunction { span, .. }
            | AnalyzerError::Parameter { span, .. } => Some(*span),
            AnalyzerError::StatementCount(_)
            | AnalyzerError::Utility
            | AnalyzerError::CatalogType { .. }
            | AnalyzerError::Catalog(_)
            | AnalyzerError::Host(_) => None,
        }
    }

    pub(crate) fn unexpected(expected: impl Into<String>, found: &crate::Token) -> Self {
        AnalyzerError::Syntax {
            expected: expected.into(),
            found: found.kind.describe().to_string(),
            span: found.span,
        }
    }
}
