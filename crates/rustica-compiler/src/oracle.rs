//! Result column types from the host analyzer

use rustica_sql::{AnalyzedQuery, AnalyzerError, CommandKind, SqlAnalyzer, TargetEntry};
use rustica_types::Oid;
use tracing::debug;

/// How the host would execute an analyzed statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalStrategy {
    /// A single SELECT
    OneSelect,
    /// A single INSERT/UPDATE/DELETE/MERGE with RETURNING
    OneReturning,
    /// A single SELECT with a data-modifying WITH clause
    OneModWith,
    /// A utility statement
    Utility,
    /// Anything else, including modifications without RETURNING
    MultiQuery,
}

pub fn choose_portal_strategy(queries: &[AnalyzedQuery]) -> PortalStrategy {
    if let [query] = queries {
        if query.command == CommandKind::Utility {
            return PortalStrategy::Utility;
        }
        if query.can_set_tag {
            if query.command == CommandKind::Select {
                return if query.has_modifying_cte {
                    PortalStrategy::OneModWith
                } else {
                    PortalStrategy::OneSelect
                };
            }
            if query.command.is_modification() && !query.returning_list.is_empty() {
                return PortalStrategy::OneReturning;
            }
        }
    }

    // Rewrite rules may add queries around the original; it still decides
    // the result when it is the only one that sets the tag
    let mut tagged = queries.iter().filter(|q| q.can_set_tag);
    if let (Some(query), None) = (tagged.next(), tagged.next()) {
        if query.command.is_modification() && !query.returning_list.is_empty() {
            return PortalStrategy::OneReturning;
        }
    }
    PortalStrategy::MultiQuery
}

/// Host types of the visible output columns of `sql`, left to right
///
/// The text must hold exactly one statement, and it must not be a utility
/// statement. Junk columns are dropped.
pub fn describe_query_results(
    analyzer: &dyn SqlAnalyzer,
    sql: &str,
    argtypes: &[Oid],
) -> Result<Vec<Oid>, AnalyzerError> {
    let stmts = analyzer.raw_parse(sql)?;
    let stmt = match stmts.as_slice() {
        [stmt] => stmt,
        _ => return Err(AnalyzerError::StatementCount(stmts.len())),
    };

    let queries = analyzer.analyze(stmt, sql, argtypes)?;
    let strategy = choose_portal_strategy(&queries);
    debug!(?strategy, queries = queries.len(), "described query");

    let targets: &[TargetEntry] = match strategy {
        PortalStrategy::OneSelect | PortalStrategy::OneModWith => &queries[0].target_list,
        PortalStrategy::OneReturning => queries
            .iter()
            .find(|q| q.can_set_tag)
            .map(|q| q.returning_list.as_slice())
            .unwrap_or_default(),
        PortalStrategy::Utility => return Err(AnalyzerError::Utility),
        PortalStrategy::MultiQuery => &[],
    };

    Ok(targets
        .iter()
        .filter(|t| !t.resjunk)
        .map(|t| t.type_oid)
        .collect())
}
