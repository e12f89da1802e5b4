//! Catalog-driven analyzer
//!
//! Resolves statements against a table catalog loaded from JSON, for use
//! outside a database host (the CLI, tests).

use std::collections::{BTreeMap, HashMap};

use rustica_types::Oid;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::parser::StatementParser;
use crate::{tokenize, AnalyzedQuery, AnalyzerError, RawStmt, Span, SqlAnalyzer, TargetEntry, TokenKind};

/// Table definitions, as written in a catalog file
///
/// ```json
/// { "tables": { "users": [{ "name": "id", "type": "int8" }] } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<ColumnDef>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Type name, with the usual SQL aliases accepted
    #[serde(rename = "type")]
    pub ty: String,
}

impl Catalog {
    pub fn from_json(text: &str) -> Result<Self, AnalyzerError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn table(mut self, name: &str, columns: &[(&str, &str)]) -> Self {
        self.tables.insert(
            name.to_string(),
            columns
                .iter()
                .map(|(name, ty)| ColumnDef {
                    name: name.to_string(),
                    ty: ty.to_string(),
                })
                .collect(),
        );
        self
    }
}

/// [`SqlAnalyzer`] over a fixed [`Catalog`]
#[derive(Debug, Clone, Default)]
pub struct CatalogAnalyzer {
    tables: HashMap<String, Vec<TargetEntry>>,
}

impl CatalogAnalyzer {
    /// Resolve every column type of the catalog up front
    pub fn new(catalog: &Catalog) -> Result<Self, AnalyzerError> {
        let mut tables = HashMap::new();
        for (table, columns) in &catalog.tables {
            let resolved = columns
                .iter()
                .map(|c| {
                    let type_oid =
                        Oid::from_name(&c.ty).ok_or_else(|| AnalyzerError::CatalogType {
                            table: table.clone(),
                            column: c.name.clone(),
                            name: c.ty.clone(),
                        })?;
                    Ok(TargetEntry::new(c.name.clone(), type_oid))
                })
                .collect::<Result<Vec<_>, AnalyzerError>>()?;
            tables.insert(table.clone(), resolved);
        }
        debug!(tables = tables.len(), "loaded SQL catalog");
        Ok(Self { tables })
    }

    pub fn from_json(text: &str) -> Result<Self, AnalyzerError> {
        Self::new(&Catalog::from_json(text)?)
    }
}

impl SqlAnalyzer for CatalogAnalyzer {
    /// Split on top-level semicolons; empty statements are dropped
    fn raw_parse(&self, sql: &str) -> Result<Vec<RawStmt>, AnalyzerError> {
        let mut stmts = Vec::new();
        let mut first: Option<Span> = None;
        let mut last = Span::new(0, 0);
        let mut depth = 0usize;

        for token in tokenize(sql, 0) {
            match token.kind {
                TokenKind::Error => {
                    return Err(AnalyzerError::unexpected("SQL", &token));
                }
                TokenKind::Semicolon | TokenKind::Eof if depth == 0 => {
                    if let Some(start) = first.take() {
                        stmts.push(RawStmt {
                            span: start.merge(last),
                        });
                    }
                    continue;
                }
                TokenKind::Eof => {
                    return Err(AnalyzerError::unexpected("')'", &token));
                }
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth = depth.saturating_sub(1),
                _ => {}
            }
            first.get_or_insert(token.span);
            last = token.span;
        }

        Ok(stmts)
    }

    fn analyze(
        &self,
        stmt: &RawStmt,
        sql: &str,
        argtypes: &[Oid],
    ) -> Result<Vec<AnalyzedQuery>, AnalyzerError> {
        let tokens = tokenize(stmt.text(sql), stmt.span.start);
        let mut parser = StatementParser::new(sql, tokens, &self.tables, argtypes);
        let query = parser.parse_statement()?;
        debug!(
            command = ?query.command,
            targets = query.target_list.len(),
            returning = query.returning_list.len(),
            "analyzed statement"
        );
        Ok(vec![query])
    }
}
