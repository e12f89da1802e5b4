//! Host analyzer contract

use rustica_types::Oid;
use serde::{Deserialize, Serialize};

use crate::AnalyzerError;

/// A byte range in SQL text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the start
    pub start: usize,
    /// Byte offset of the end (exclusive)
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Merge two spans into one that covers both
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// One statement of a raw parse, located in the submitted text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStmt {
    pub span: Span,
}

impl RawStmt {
    pub fn text<'a>(&self, sql: &'a str) -> &'a str {
        &sql[self.span.start..self.span.end]
    }
}

/// Statement class of an analyzed query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Utility,
}

impl CommandKind {
    /// Whether this command writes rows
    pub fn is_modification(self) -> bool {
        matches!(
            self,
            CommandKind::Insert | CommandKind::Update | CommandKind::Delete | CommandKind::Merge
        )
    }
}

/// One output column of an analyzed query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub name: String,
    pub type_oid: Oid,
    /// Helper column the planner needs but the client never sees
    #[serde(default)]
    pub resjunk: bool,
}

impl TargetEntry {
    pub fn new(name: impl Into<String>, type_oid: Oid) -> Self {
        Self {
            name: name.into(),
            type_oid,
            resjunk: false,
        }
    }

    pub fn junk(name: impl Into<String>, type_oid: Oid) -> Self {
        Self {
            resjunk: true,
            ..Self::new(name, type_oid)
        }
    }
}

/// A statement after parse analysis and rewriting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedQuery {
    pub command: CommandKind,
    /// Whether this query determines the statement's completion tag
    pub can_set_tag: bool,
    /// A data-modifying statement appears in a WITH clause
    pub has_modifying_cte: bool,
    pub target_list: Vec<TargetEntry>,
    pub returning_list: Vec<TargetEntry>,
}

/// The host's SQL parser and analyzer
///
/// Parsing and analysis are separate steps, as in the database: a raw parse
/// only splits and classifies the text, analysis resolves names and types
/// against the catalog with the argument types fixed by the caller.
pub trait SqlAnalyzer {
    fn raw_parse(&self, sql: &str) -> Result<Vec<RawStmt>, AnalyzerError>;

    /// Analyze and rewrite one statement. Rewriting may turn one statement
    /// into several queries.
    fn analyze(
        &self,
        stmt: &RawStmt,
        sql: &str,
        argtypes: &[Oid],
    ) -> Result<Vec<AnalyzedQuery>, AnalyzerError>;
}
