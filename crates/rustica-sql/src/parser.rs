//! Recursive descent analysis of one SQL statement
//!
//! This is not a full SQL grammar. It understands the parts that decide
//! the shape of a statement's output: the select list, RETURNING lists,
//! the relations they refer to, casts, parameters and common functions.
//! Everything else (WHERE, GROUP BY, VALUES, SET, ...) is skipped with
//! parentheses balanced.

use std::collections::HashMap;

use rustica_types::Oid;

use crate::{AnalyzedQuery, AnalyzerError, CommandKind, Span, TargetEntry, Token, TokenKind};

/// Statements the planner hands to the utility processor
const UTILITY_WORDS: &[&str] = &[
    "alter", "analyze", "begin", "call", "checkpoint", "close", "cluster", "comment", "commit",
    "copy", "create", "deallocate", "declare", "discard", "do", "drop", "end", "execute",
    "explain", "fetch", "grant", "listen", "load", "lock", "move", "notify", "prepare",
    "reassign", "refresh", "reindex", "release", "reset", "revoke", "rollback", "savepoint",
    "security", "show", "start", "truncate", "unlisten", "vacuum",
];

/// Identifiers that can follow a relation and never name an alias
const RESERVED_WORDS: &[&str] = &[
    "and", "between", "cross", "except", "for", "full", "group", "having", "in", "inner",
    "intersect", "is", "join", "left", "like", "limit", "natural", "not", "offset", "on", "or",
    "outer", "right", "union", "using", "window",
];

const JOIN_WORDS: &[&str] = &["cross", "full", "inner", "join", "left", "natural", "outer", "right"];

const TYPE_WORDS: &[&str] = &["precision", "varying", "without", "time", "zone"];

/// A relation visible to column references
struct Binding {
    name: String,
    columns: Vec<TargetEntry>,
}

/// Type and default output name of an expression
struct Expr {
    type_oid: Oid,
    name: Option<String>,
}

impl Expr {
    fn anonymous(type_oid: Oid) -> Self {
        Self {
            type_oid,
            name: None,
        }
    }
}

pub(crate) struct StatementParser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    tables: &'a HashMap<String, Vec<TargetEntry>>,
    argtypes: &'a [Oid],
    ctes: Vec<Binding>,
}

impl<'a> StatementParser<'a> {
    pub(crate) fn new(
        source: &'a str,
        tokens: Vec<Token>,
        tables: &'a HashMap<String, Vec<TargetEntry>>,
        argtypes: &'a [Oid],
    ) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            tables,
            argtypes,
            ctes: Vec::new(),
        }
    }

    // === Utilities ===

    fn current(&self) -> Token {
        match self.tokens.get(self.pos) {
            Some(token) => *token,
            None => Token {
                kind: TokenKind::Eof,
                span: self.tokens.last().map(|t| t.span).unwrap_or(Span::new(0, 0)),
            },
        }
    }

    fn peek(&self) -> TokenKind {
        self.current().kind
    }

    fn peek_ahead(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.current();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind) -> Result<Token, AnalyzerError> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(AnalyzerError::unexpected(kind.describe(), &self.current()))
        }
    }

    fn text(&self, token: &Token) -> &'a str {
        token.text(self.source)
    }

    /// Current token is an unquoted identifier spelling one of `words`
    fn at_word(&self, words: &[&str]) -> bool {
        let token = self.current();
        token.kind == TokenKind::Ident
            && words
                .iter()
                .any(|w| self.text(&token).eq_ignore_ascii_case(w))
    }

    /// Identifier with SQL case folding: unquoted names are lowercased,
    /// quoted names are taken literally
    fn ident(&mut self) -> Result<String, AnalyzerError> {
        let token = self.current();
        match token.kind {
            TokenKind::Ident => {
                self.advance();
                Ok(self.text(&token).to_ascii_lowercase())
            }
            TokenKind::QuotedIdent => {
                self.advance();
                let text = self.text(&token);
                Ok(text[1..text.len() - 1].replace("\"\"", "\""))
            }
            _ => Err(AnalyzerError::unexpected("identifier", &token)),
        }
    }

    /// Skip tokens up to one of `stops` at nesting depth zero. Also stops
    /// at the end of the statement and at an unbalanced closing paren.
    fn skip_clause(&mut self, stops: &[TokenKind]) {
        let mut depth = 0usize;
        loop {
            let kind = self.peek();
            match kind {
                TokenKind::Eof | TokenKind::Semicolon if depth == 0 => break,
                TokenKind::Eof => break,
                TokenKind::RParen if depth == 0 => break,
                _ if depth == 0 && stops.contains(&kind) => break,
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth -= 1,
                _ => {}
            }
            self.advance();
        }
    }

    // === Statements ===

    /// Analyze the whole token stream as one statement
    pub(crate) fn parse_statement(&mut self) -> Result<AnalyzedQuery, AnalyzerError> {
        let mut has_modifying_cte = false;

        if self.eat(TokenKind::With) {
            loop {
                let name = self.ident()?;
                self.consume(TokenKind::As)?;
                self.consume(TokenKind::LParen)?;
                let inner = self.parse_body()?;
                self.consume(TokenKind::RParen)?;

                let columns = if inner.command.is_modification() {
                    has_modifying_cte = true;
                    inner.returning_list
                } else {
                    inner.target_list
                };
                self.ctes.push(Binding { name, columns });

                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }

        let mut query = self.parse_body()?;
        query.can_set_tag = true;
        query.has_modifying_cte |= has_modifying_cte;

        if !self.at(TokenKind::Eof) {
            return Err(AnalyzerError::unexpected("end of statement", &self.current()));
        }
        Ok(query)
    }

    fn parse_body(&mut self) -> Result<AnalyzedQuery, AnalyzerError> {
        match self.peek() {
            TokenKind::Select => self.parse_select(),
            TokenKind::Insert => self.parse_insert(),
            TokenKind::Update => self.parse_update(),
            TokenKind::Delete => self.parse_delete(),
            TokenKind::LParen => {
                self.advance();
                let query = self.parse_body()?;
                self.consume(TokenKind::RParen)?;
                Ok(query)
            }
            TokenKind::Set => Ok(self.parse_utility()),
            TokenKind::Ident if self.at_word(UTILITY_WORDS) => Ok(self.parse_utility()),
            _ => Err(AnalyzerError::unexpected("statement", &self.current())),
        }
    }

    fn parse_utility(&mut self) -> AnalyzedQuery {
        self.skip_clause(&[]);
        query(CommandKind::Utility, Vec::new(), Vec::new())
    }

    fn parse_select(&mut self) -> Result<AnalyzedQuery, AnalyzerError> {
        self.consume(TokenKind::Select)?;
        self.eat(TokenKind::Distinct);

        // The select list refers to the FROM clause that follows it
        let list_start = self.pos;
        self.skip_clause(&[TokenKind::From, TokenKind::Where, TokenKind::Order]);
        let scope = if self.eat(TokenKind::From) {
            self.parse_from()?
        } else {
            Vec::new()
        };
        self.skip_clause(&[TokenKind::Order]);
        let list_end = self.pos;

        self.pos = list_start;
        let mut target_list = if self.list_is_empty() {
            Vec::new()
        } else {
            self.parse_target_list(&scope)?
        };
        if !self.list_is_empty() && !self.at(TokenKind::Order) && !self.at_word(RESERVED_WORDS) {
            return Err(AnalyzerError::unexpected("FROM", &self.current()));
        }
        self.pos = list_end;

        if self.eat(TokenKind::Order) {
            self.consume(TokenKind::By)?;
            self.parse_order_by(&scope, &mut target_list)?;
        }
        self.skip_clause(&[]);

        Ok(query(CommandKind::Select, target_list, Vec::new()))
    }

    /// `SELECT` followed directly by FROM or nothing yields no columns
    fn list_is_empty(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::From | TokenKind::Where | TokenKind::Eof | TokenKind::RParen
        )
    }

    fn parse_from(&mut self) -> Result<Vec<Binding>, AnalyzerError> {
        let mut scope = vec![self.parse_relation()?];
        loop {
            if self.eat(TokenKind::Comma) {
                scope.push(self.parse_relation()?);
            } else if self.at_word(JOIN_WORDS) {
                while self.at_word(JOIN_WORDS) {
                    self.advance();
                }
                scope.push(self.parse_relation()?);
                if self.at_word(&["on"]) {
                    self.advance();
                    self.skip_join_condition();
                } else if self.at_word(&["using"]) {
                    self.advance();
                    self.consume(TokenKind::LParen)?;
                    self.skip_clause(&[]);
                    self.consume(TokenKind::RParen)?;
                }
            } else {
                break;
            }
        }
        Ok(scope)
    }

    fn skip_join_condition(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                TokenKind::Eof => break,
                TokenKind::LParen => depth += 1,
                TokenKind::RParen if depth == 0 => break,
                TokenKind::RParen => depth -= 1,
                TokenKind::Comma | TokenKind::Where | TokenKind::Order if depth == 0 => break,
                TokenKind::Ident if depth == 0 && self.at_word(JOIN_WORDS) => break,
                _ => {}
            }
            self.advance();
        }
    }

    /// `name [[AS] alias]`, resolved against WITH queries, then the catalog
    fn parse_relation(&mut self) -> Result<Binding, AnalyzerError> {
        let start = self.current().span;
        let mut name = self.ident()?;
        if self.eat(TokenKind::Dot) {
            // Schema qualified; the catalog is flat
            name = self.ident()?;
        }
        let span = start.merge(self.tokens[self.pos.saturating_sub(1)].span);

        let columns = match self.ctes.iter().rev().find(|cte| cte.name == name) {
            Some(cte) => cte.columns.clone(),
            None => self
                .tables
                .get(&name)
                .cloned()
                .ok_or_else(|| AnalyzerError::UnknownTable {
                    name: name.clone(),
                    span,
                })?,
        };

        let alias = if self.eat(TokenKind::As) {
            Some(self.ident()?)
        } else if self.at(TokenKind::QuotedIdent)
            || (self.at(TokenKind::Ident) && !self.at_word(RESERVED_WORDS))
        {
            Some(self.ident()?)
        } else {
            None
        };

        Ok(Binding {
            name: alias.unwrap_or(name),
            columns,
        })
    }

    fn parse_insert(&mut self) -> Result<AnalyzedQuery, AnalyzerError> {
        self.consume(TokenKind::Insert)?;
        self.consume(TokenKind::Into)?;
        let scope = vec![self.parse_relation()?];
        let returning_list = self.parse_returning(&scope)?;
        Ok(query(CommandKind::Insert, Vec::new(), returning_list))
    }

    fn parse_update(&mut self) -> Result<AnalyzedQuery, AnalyzerError> {
        self.consume(TokenKind::Update)?;
        let scope = vec![self.parse_relation()?];
        let returning_list = self.parse_returning(&scope)?;
        Ok(query(CommandKind::Update, Vec::new(), returning_list))
    }

    fn parse_delete(&mut self) -> Result<AnalyzedQuery, AnalyzerError> {
        self.consume(TokenKind::Delete)?;
        self.consume(TokenKind::From)?;
        let scope = vec![self.parse_relation()?];
        let returning_list = self.parse_returning(&scope)?;
        Ok(query(CommandKind::Delete, Vec::new(), returning_list))
    }

    fn parse_returning(&mut self, scope: &[Binding]) -> Result<Vec<TargetEntry>, AnalyzerError> {
        self.skip_clause(&[TokenKind::Returning]);
        if self.eat(TokenKind::Returning) {
            self.parse_target_list(scope)
        } else {
            Ok(Vec::new())
        }
    }

    // === Target lists ===

    fn parse_target_list(&mut self, scope: &[Binding]) -> Result<Vec<TargetEntry>, AnalyzerError> {
        let mut entries = Vec::new();
        loop {
            self.parse_target(scope, &mut entries)?;
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(entries)
    }

    fn parse_target(
        &mut self,
        scope: &[Binding],
        entries: &mut Vec<TargetEntry>,
    ) -> Result<(), AnalyzerError> {
        if self.at(TokenKind::Star) {
            let star = self.advance();
            if scope.is_empty() {
                return Err(AnalyzerError::unexpected("column list", &star));
            }
            for binding in scope {
                entries.extend(binding.columns.iter().cloned());
            }
            return Ok(());
        }

        let is_ident = matches!(self.peek(), TokenKind::Ident | TokenKind::QuotedIdent);
        if is_ident && self.peek_ahead(1) == TokenKind::Dot && self.peek_ahead(2) == TokenKind::Star {
            let start = self.current().span;
            let name = self.ident()?;
            self.advance();
            self.advance();
            let binding = scope
                .iter()
                .find(|b| b.name == name)
                .ok_or_else(|| AnalyzerError::UnknownTable {
                    name: name.clone(),
                    span: start,
                })?;
            entries.extend(binding.columns.iter().cloned());
            return Ok(());
        }

        let expr = self.parse_expr(scope)?;
        let name = if self.eat(TokenKind::As) {
            self.ident()?
        } else if self.at(TokenKind::QuotedIdent)
            || (self.at(TokenKind::Ident) && !self.at_word(RESERVED_WORDS))
        {
            self.ident()?
        } else {
            expr.name.unwrap_or_else(|| "?column?".to_string())
        };
        entries.push(TargetEntry::new(name, expr.type_oid));
        Ok(())
    }

    /// Sort keys missing from the select list become junk columns
    fn parse_order_by(
        &mut self,
        scope: &[Binding],
        target_list: &mut Vec<TargetEntry>,
    ) -> Result<(), AnalyzerError> {
        loop {
            if self.at(TokenKind::Int) {
                self.advance();
            } else if self.at(TokenKind::Ident)
                && !matches!(self.peek_ahead(1), TokenKind::Dot | TokenKind::LParen)
                && target_list
                    .iter()
                    .any(|t| !t.resjunk && t.name == self.text(&self.current()).to_ascii_lowercase())
            {
                // Output column alias
                self.advance();
            } else {
                let expr = self.parse_expr(scope)?;
                let listed = expr
                    .name
                    .as_ref()
                    .is_some_and(|n| target_list.iter().any(|t| !t.resjunk && &t.name == n));
                if !listed {
                    let name = expr.name.unwrap_or_else(|| "?column?".to_string());
                    target_list.push(TargetEntry::junk(name, expr.type_oid));
                }
            }
            if !self.eat(TokenKind::Asc) {
                self.eat(TokenKind::Desc);
            }
            if self.at_word(&["nulls"]) {
                self.advance();
                self.advance();
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(())
    }

    // === Expressions ===

    fn parse_expr(&mut self, scope: &[Binding]) -> Result<Expr, AnalyzerError> {
        let mut left = self.parse_unary(scope)?;
        loop {
            let token = self.current();
            let op = match token.kind {
                TokenKind::Operator | TokenKind::Star => self.text(&token).to_string(),
                TokenKind::Ident if self.at_word(&["and", "or", "like", "ilike"]) => {
                    self.text(&token).to_ascii_lowercase()
                }
                TokenKind::Ident if self.at_word(&["is"]) => {
                    self.advance();
                    if self.at_word(&["not"]) {
                        self.advance();
                    }
                    match self.peek() {
                        TokenKind::Null | TokenKind::True | TokenKind::False => {
                            self.advance();
                        }
                        _ => return Err(AnalyzerError::unexpected("NULL", &self.current())),
                    }
                    left = Expr::anonymous(Oid::BOOL);
                    continue;
                }
                _ => break,
            };
            self.advance();
            let right = self.parse_unary(scope)?;
            left = Expr::anonymous(binary_result(&op, left.type_oid, right.type_oid));
        }
        Ok(left)
    }

    fn parse_unary(&mut self, scope: &[Binding]) -> Result<Expr, AnalyzerError> {
        let token = self.current();
        let mut expr = if token.kind == TokenKind::Operator
            && matches!(self.text(&token), "-" | "+")
        {
            self.advance();
            let inner = self.parse_unary(scope)?;
            Expr::anonymous(inner.type_oid)
        } else if self.at_word(&["not"]) {
            self.advance();
            self.parse_unary(scope)?;
            Expr::anonymous(Oid::BOOL)
        } else {
            self.parse_primary(scope)?
        };

        while self.eat(TokenKind::ColonColon) {
            let type_oid = self.parse_type_name()?;
            expr = Expr {
                type_oid,
                name: expr.name.or_else(|| type_oid.name().map(str::to_string)),
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self, scope: &[Binding]) -> Result<Expr, AnalyzerError> {
        let token = self.current();
        match token.kind {
            TokenKind::Int => {
                self.advance();
                let type_oid = match self.text(&token).parse::<i64>() {
                    Ok(v) if i32::try_from(v).is_ok() => Oid::INT4,
                    Ok(_) => Oid::INT8,
                    Err(_) => Oid::NUMERIC,
                };
                Ok(Expr::anonymous(type_oid))
            }
            TokenKind::Float => {
                self.advance();
                Ok(Expr::anonymous(Oid::NUMERIC))
            }
            // Untyped literals resolve to text in an output column
            TokenKind::String | TokenKind::Null => {
                self.advance();
                Ok(Expr::anonymous(Oid::TEXT))
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Ok(Expr {
                    type_oid: Oid::BOOL,
                    name: Some("bool".to_string()),
                })
            }
            TokenKind::Param => {
                self.advance();
                let index = self.text(&token)[1..].parse::<usize>().unwrap_or(0);
                match index.checked_sub(1).and_then(|i| self.argtypes.get(i)) {
                    Some(oid) => Ok(Expr::anonymous(*oid)),
                    None => Err(AnalyzerError::Parameter {
                        index,
                        span: token.span,
                    }),
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = if self.at(TokenKind::Select) {
                    let sub = self.parse_select()?;
                    let first = sub.target_list.into_iter().find(|t| !t.resjunk);
                    match first {
                        Some(entry) => Expr {
                            type_oid: entry.type_oid,
                            name: Some(entry.name),
                        },
                        None => return Err(AnalyzerError::unexpected("select list", &token)),
                    }
                } else {
                    self.parse_expr(scope)?
                };
                self.consume(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Cast => {
                self.advance();
                self.consume(TokenKind::LParen)?;
                let inner = self.parse_expr(scope)?;
                self.consume(TokenKind::As)?;
                let type_oid = self.parse_type_name()?;
                self.consume(TokenKind::RParen)?;
                Ok(Expr {
                    type_oid,
                    name: inner.name.or_else(|| type_oid.name().map(str::to_string)),
                })
            }
            TokenKind::Ident if self.peek_ahead(1) == TokenKind::LParen => {
                self.parse_function(scope)
            }
            TokenKind::Ident | TokenKind::QuotedIdent => self.parse_column_ref(scope),
            _ => Err(AnalyzerError::unexpected("expression", &token)),
        }
    }

    fn parse_column_ref(&mut self, scope: &[Binding]) -> Result<Expr, AnalyzerError> {
        let start = self.current();
        let first = self.ident()?;

        let (qualifier, column) = if self.at(TokenKind::Dot) {
            self.advance();
            (Some(first), self.ident()?)
        } else {
            (None, first)
        };
        let span = start.span.merge(self.tokens[self.pos.saturating_sub(1)].span);

        let found = scope
            .iter()
            .filter(|b| qualifier.as_ref().map_or(true, |q| &b.name == q))
            .flat_map(|b| b.columns.iter())
            .find(|c| c.name == column);
        if let Some(entry) = found {
            return Ok(Expr {
                type_oid: entry.type_oid,
                name: Some(entry.name.clone()),
            });
        }

        let special = match (qualifier.is_none(), column.as_str()) {
            (true, "current_timestamp") => Some(Oid::TIMESTAMPTZ),
            (true, "current_date") => Some(Oid::DATE),
            (true, "current_time") => Some(Oid::TIME),
            (true, "current_user") | (true, "session_user") => Some(Oid::NAME),
            _ => None,
        };
        match special {
            Some(type_oid) => Ok(Expr {
                type_oid,
                name: Some(column),
            }),
            None => Err(AnalyzerError::UnknownColumn {
                name: match qualifier {
                    Some(q) => format!("{}.{}", q, column),
                    None => column,
                },
                span,
            }),
        }
    }

    fn parse_function(&mut self, scope: &[Binding]) -> Result<Expr, AnalyzerError> {
        let token = self.advance();
        let name = self.text(&token).to_ascii_lowercase();
        self.consume(TokenKind::LParen)?;

        let mut args = Vec::new();
        if self.at(TokenKind::Star) {
            self.advance();
        } else if !self.at(TokenKind::RParen) {
            self.eat(TokenKind::Distinct);
            loop {
                args.push(self.parse_expr(scope)?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen)?;

        let first = args.first().map(|a| a.type_oid);
        let type_oid = match name.as_str() {
            "count" => Oid::INT8,
            "sum" => match first {
                Some(Oid::INT2) | Some(Oid::INT4) => Oid::INT8,
                Some(Oid::FLOAT4) => Oid::FLOAT4,
                Some(Oid::FLOAT8) => Oid::FLOAT8,
                _ => Oid::NUMERIC,
            },
            "avg" => match first {
                Some(Oid::FLOAT4) | Some(Oid::FLOAT8) => Oid::FLOAT8,
                _ => Oid::NUMERIC,
            },
            "min" | "max" | "abs" | "coalesce" | "greatest" | "least" | "nullif" => {
                first.ok_or_else(|| AnalyzerError::UnknownFunction {
                    name: name.clone(),
                    span: token.span,
                })?
            }
            "now" | "clock_timestamp" | "statement_timestamp" => Oid::TIMESTAMPTZ,
            "lower" | "upper" | "concat" | "trim" | "btrim" | "substring" | "substr"
            | "replace" | "to_char" | "md5" | "format" => Oid::TEXT,
            "length" | "char_length" | "octet_length" | "array_length" => Oid::INT4,
            "gen_random_uuid" => Oid::UUID,
            "random" => Oid::FLOAT8,
            "to_json" | "json_build_object" | "json_agg" => Oid::JSON,
            "to_jsonb" | "jsonb_build_object" | "jsonb_agg" => Oid::JSONB,
            _ => {
                return Err(AnalyzerError::UnknownFunction {
                    name,
                    span: token.span,
                })
            }
        };
        Ok(Expr {
            type_oid,
            name: Some(name),
        })
    }

    /// `name [words...] [(modifiers)] [[]]`
    fn parse_type_name(&mut self) -> Result<Oid, AnalyzerError> {
        let start = self.current().span;
        let mut name = self.ident()?;
        while self.at(TokenKind::With) || self.at_word(TYPE_WORDS) {
            let token = self.advance();
            name.push(' ');
            name.push_str(&self.text(&token).to_ascii_lowercase());
        }
        if self.eat(TokenKind::LParen) {
            self.skip_clause(&[]);
            self.consume(TokenKind::RParen)?;
        }
        if self.eat(TokenKind::LBracket) {
            self.consume(TokenKind::RBracket)?;
            name.push_str("[]");
        }
        let span = start.merge(self.tokens[self.pos.saturating_sub(1)].span);

        Oid::from_name(&name).ok_or(AnalyzerError::UnknownType { name, span })
    }
}

fn query(
    command: CommandKind,
    target_list: Vec<TargetEntry>,
    returning_list: Vec<TargetEntry>,
) -> AnalyzedQuery {
    AnalyzedQuery {
        command,
        can_set_tag: false,
        has_modifying_cte: false,
        target_list,
        returning_list,
    }
}

/// Result type of a binary operator
fn binary_result(op: &str, left: Oid, right: Oid) -> Oid {
    match op {
        "=" | "<>" | "!=" | "<" | ">" | "<=" | ">=" | "and" | "or" | "like" | "ilike" => Oid::BOOL,
        "||" => Oid::TEXT,
        _ => {
            let rank = |oid: Oid| match oid {
                Oid::INT2 => 1,
                Oid::INT4 => 2,
                Oid::INT8 => 3,
                Oid::NUMERIC => 4,
                Oid::FLOAT4 => 5,
                Oid::FLOAT8 => 6,
                _ => 0,
            };
            if rank(right) > rank(left) {
                right
            } else {
                left
            }
        }
    }
}
