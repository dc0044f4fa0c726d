use std::mem;

use super::ast::{
    ColumnExpression, ColumnRef, Filter, LogicalFilterGroup, OrderByItem, QueryModel, TableRef,
    ValueToken,
};
use super::lexer::{tokenize, Token, TokenKind};
use super::operators::Operator;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Start,
    Select,
    From,
    Where,
    GroupBy,
    OrderBy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conjunction {
    And,
    Or,
}

impl Conjunction {
    fn keyword(self) -> &'static str {
        match self {
            Conjunction::And => "and",
            Conjunction::Or => "or",
        }
    }
}

/// The filter currently under construction in a WHERE clause.
///
/// Transitions run Empty -> ColumnSet -> OperatorSet -> Complete; every
/// other transition is a `StateError`.
#[derive(Debug, Default)]
enum FilterState {
    #[default]
    Empty,
    ColumnSet {
        column: ColumnRef,
        negated: bool,
    },
    OperatorSet {
        column: ColumnRef,
        operator: Operator,
        via_is: bool,
    },
    Complete(Filter),
}

impl FilterState {
    fn set_column(self, column: ColumnRef) -> DbResult<Self> {
        match self {
            FilterState::Empty => Ok(FilterState::ColumnSet {
                column,
                negated: false,
            }),
            FilterState::ColumnSet { column: open, .. } => Err(DbError::StateError(format!(
                "filter on column '{}' is still open when column '{}' starts",
                open, column
            ))),
            FilterState::OperatorSet { column: open, .. } => Err(DbError::StateError(format!(
                "filter on column '{}' is still open: no value has been provided",
                open
            ))),
            FilterState::Complete(filter) => Err(DbError::StateError(format!(
                "filter on column '{}' was not combined with 'and' or 'or' before column '{}'",
                filter.column, column
            ))),
        }
    }

    fn set_operator(self, operator: Operator, symbol: &str, via_is: bool) -> DbResult<Self> {
        match self {
            FilterState::Empty => Err(DbError::StateError(format!(
                "no column name has been given before operator '{}'",
                symbol
            ))),
            FilterState::ColumnSet { column, negated } => {
                let operator = if negated {
                    if operator != Operator::In {
                        return Err(DbError::SyntaxError(format!(
                            "'not' must be followed by 'in', found '{}'",
                            symbol
                        )));
                    }
                    operator.negate()
                } else {
                    operator
                };
                Ok(FilterState::OperatorSet {
                    column,
                    operator,
                    via_is,
                })
            }
            FilterState::OperatorSet { column, .. } => Err(DbError::StateError(format!(
                "an operator has already been recorded for column '{}' (found '{}')",
                column, symbol
            ))),
            FilterState::Complete(filter) => Err(DbError::StateError(format!(
                "an operator has already been recorded for column '{}' (found '{}')",
                filter.column, symbol
            ))),
        }
    }

    fn negate(self) -> DbResult<Self> {
        match self {
            FilterState::Empty => Err(DbError::StateError(
                "'not' appears but no filter is currently open".to_string(),
            )),
            FilterState::ColumnSet {
                column,
                negated: false,
            } => Ok(FilterState::ColumnSet {
                column,
                negated: true,
            }),
            FilterState::OperatorSet {
                column,
                operator: Operator::EqualTo,
                via_is: true,
            } => Ok(FilterState::OperatorSet {
                column,
                operator: Operator::EqualTo.negate(),
                via_is: true,
            }),
            _ => Err(DbError::SyntaxError(
                "'not' must follow 'is' or precede 'in'".to_string(),
            )),
        }
    }

    fn set_value(self, value: ValueToken) -> DbResult<Self> {
        match self {
            FilterState::OperatorSet {
                column,
                operator,
                via_is,
            } => {
                if via_is && !is_null_word(&value) {
                    return Err(DbError::SyntaxError(format!(
                        "'is' on column '{}' must be followed by null, found {}",
                        column,
                        describe_value(&value)
                    )));
                }
                if *operator.base() == Operator::In && !matches!(value, ValueToken::Array(_)) {
                    return Err(DbError::SyntaxError(format!(
                        "'in' on column '{}' must be followed by a parenthesized list, found {}",
                        column,
                        describe_value(&value)
                    )));
                }
                Ok(FilterState::Complete(Filter {
                    column,
                    operator,
                    value,
                }))
            }
            FilterState::Empty => Err(DbError::StateError(format!(
                "no operator has been recorded before value {}",
                describe_value(&value)
            ))),
            FilterState::ColumnSet { column, .. } => Err(DbError::StateError(format!(
                "no operator has been recorded for column '{}' before value {}",
                column,
                describe_value(&value)
            ))),
            FilterState::Complete(filter) => Err(DbError::StateError(format!(
                "a value has already been recorded for column '{}'",
                filter.column
            ))),
        }
    }

    fn finish(self) -> DbResult<Filter> {
        match self {
            FilterState::Complete(filter) => Ok(filter),
            FilterState::Empty => Err(DbError::StateError(
                "no filter is currently open".to_string(),
            )),
            FilterState::ColumnSet { column, .. } => Err(DbError::StateError(format!(
                "no operator has been recorded for column '{}'",
                column
            ))),
            FilterState::OperatorSet { column, .. } => Err(DbError::StateError(format!(
                "no value has been provided for column '{}'",
                column
            ))),
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, FilterState::Empty)
    }

    fn expects_value(&self) -> bool {
        matches!(self, FilterState::OperatorSet { .. })
    }

    fn expects_array(&self) -> bool {
        matches!(self, FilterState::OperatorSet { operator, .. } if *operator.base() == Operator::In)
    }
}

fn is_null_word(value: &ValueToken) -> bool {
    matches!(value, ValueToken::Single(token)
        if token.kind == TokenKind::Query && token.content.eq_ignore_ascii_case("null"))
}

fn describe_value(value: &ValueToken) -> String {
    match value {
        ValueToken::Single(token) => format!("'{}'", token.content),
        ValueToken::Array(tokens) => format!("array of {} values", tokens.len()),
    }
}

/// Parser from query text to [`QueryModel`].
pub struct SqlParser {
    tokens: Vec<Token>,
    position: usize,
    clause: Clause,
    select_columns: Vec<ColumnExpression>,
    expects_item: bool,
    table: Option<String>,
    alias: Option<String>,
    filter: FilterState,
    groups: Vec<LogicalFilterGroup>,
    previous_conjunction: Option<Conjunction>,
    group_by: Vec<ColumnRef>,
    order_by: Vec<OrderByItem>,
}

impl SqlParser {
    pub fn new(input: &str) -> DbResult<Self> {
        Ok(Self::from_tokens(tokenize(input)?))
    }

    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            clause: Clause::Start,
            select_columns: Vec::new(),
            expects_item: true,
            table: None,
            alias: None,
            filter: FilterState::Empty,
            groups: Vec::new(),
            previous_conjunction: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Consumes the next non-comment token if it is `keyword`.
    fn accept_keyword(&mut self, keyword: &str) -> bool {
        let mut offset = self.position;
        while let Some(token) = self.tokens.get(offset) {
            if token.kind == TokenKind::Comment {
                offset += 1;
                continue;
            }
            if token.is_keyword(keyword) {
                self.position = offset + 1;
                return true;
            }
            return false;
        }
        false
    }

    pub fn parse(mut self) -> DbResult<QueryModel> {
        while let Some(token) = self.next_token() {
            match token.kind {
                TokenKind::Comment => continue,
                TokenKind::BlockEnd => {
                    return Err(DbError::SyntaxError(
                        "')' has no matching '('".to_string(),
                    ))
                }
                TokenKind::Query if self.handle_keyword(&token)? => continue,
                _ => {}
            }

            match self.clause {
                Clause::Start => {
                    return Err(DbError::SyntaxError(format!(
                        "query must start with 'select', found '{}'",
                        token.content
                    )))
                }
                Clause::Select => self.select_token(token)?,
                Clause::From => self.from_token(token)?,
                Clause::Where => self.where_token(token)?,
                Clause::GroupBy | Clause::OrderBy => self.list_token(token)?,
            }
        }

        self.finish()
    }

    /// Handles clause keywords and the keywords valid in the current clause.
    /// Returns false when the token is an ordinary word.
    fn handle_keyword(&mut self, token: &Token) -> DbResult<bool> {
        let word = token.content.to_ascii_lowercase();
        match word.as_str() {
            "select" => {
                if self.clause != Clause::Start {
                    return Err(DbError::SyntaxError(
                        "'select' may only appear once, at the start of the query".to_string(),
                    ));
                }
                self.clause = Clause::Select;
                self.expects_item = true;
            }
            "from" => {
                match self.clause {
                    Clause::Start => {
                        return Err(DbError::SyntaxError(
                            "'from' appears before 'select'".to_string(),
                        ))
                    }
                    Clause::Select => self.close_list("select")?,
                    _ => {
                        return Err(DbError::SyntaxError(
                            "'from' may only follow the select list".to_string(),
                        ))
                    }
                }
                self.clause = Clause::From;
            }
            "where" => {
                self.require_table("where")?;
                if self.clause != Clause::From {
                    return Err(DbError::SyntaxError(
                        "'where' may only follow the from clause".to_string(),
                    ));
                }
                self.clause = Clause::Where;
            }
            "group" if self.accept_keyword("by") => {
                self.require_table("group by")?;
                match self.clause {
                    Clause::From => {}
                    Clause::Where => self.close_where()?,
                    _ => {
                        return Err(DbError::SyntaxError(
                            "'group by' is not valid here".to_string(),
                        ))
                    }
                }
                self.clause = Clause::GroupBy;
                self.expects_item = true;
            }
            "order" if self.accept_keyword("by") => {
                self.require_table("order by")?;
                match self.clause {
                    Clause::From => {}
                    Clause::Where => self.close_where()?,
                    Clause::GroupBy => self.close_list("group by")?,
                    _ => {
                        return Err(DbError::SyntaxError(
                            "'order by' is not valid here".to_string(),
                        ))
                    }
                }
                self.clause = Clause::OrderBy;
                self.expects_item = true;
            }
            "as" if self.clause == Clause::From => {
                if self.table.is_none() || self.alias.is_some() {
                    return Err(DbError::SyntaxError(
                        "'as' must follow the table name".to_string(),
                    ));
                }
            }
            "in" if self.clause == Clause::From => {
                return Err(DbError::NotSupported(
                    "iteration with 'in' is not supported in FROM".to_string(),
                ));
            }
            "and" if self.clause == Clause::Where => self.combine(Conjunction::And)?,
            "or" if self.clause == Clause::Where => self.combine(Conjunction::Or)?,
            "is" if self.clause == Clause::Where => {
                self.filter = mem::take(&mut self.filter).set_operator(
                    Operator::EqualTo,
                    &token.content,
                    true,
                )?;
            }
            "in" if self.clause == Clause::Where => {
                self.filter =
                    mem::take(&mut self.filter).set_operator(Operator::In, &token.content, false)?;
            }
            "not" if self.clause == Clause::Where => {
                self.filter = mem::take(&mut self.filter).negate()?;
            }
            "asc" | "desc" if self.clause == Clause::OrderBy && !self.expects_item => {
                if let Some(item) = self.order_by.last_mut() {
                    item.descending = word == "desc";
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn require_table(&self, keyword: &str) -> DbResult<()> {
        if self.clause == Clause::Start || self.clause == Clause::Select {
            return Err(DbError::SyntaxError(format!(
                "'{}' appears before 'from'",
                keyword
            )));
        }
        if self.table.is_none() {
            return Err(DbError::SyntaxError(format!(
                "no table present before '{}'",
                keyword
            )));
        }
        Ok(())
    }

    fn close_list(&self, name: &str) -> DbResult<()> {
        let empty = match self.clause {
            Clause::Select => self.select_columns.is_empty(),
            Clause::GroupBy => self.group_by.is_empty(),
            _ => self.order_by.is_empty(),
        };
        if empty {
            return Err(DbError::SyntaxError(format!("the {} list is empty", name)));
        }
        if self.expects_item {
            return Err(DbError::SyntaxError(format!(
                "the {} list ends with ','",
                name
            )));
        }
        Ok(())
    }

    fn select_token(&mut self, token: Token) -> DbResult<()> {
        match token.kind {
            TokenKind::Query => {
                if !self.expects_item {
                    return Err(DbError::SyntaxError(format!(
                        "missing ',' between select columns before '{}'",
                        token.content
                    )));
                }
                let expression = if token.content == "*" {
                    ColumnExpression::Star
                } else {
                    match ColumnRef::parse(&token.content) {
                        Some(column) => ColumnExpression::Column(column),
                        None => ColumnExpression::Unsupported(token.content),
                    }
                };
                self.select_columns.push(expression);
                self.expects_item = false;
                Ok(())
            }
            TokenKind::Text => Err(DbError::NotSupported(format!(
                "text literal '{}' cannot be used as a select column",
                token.content
            ))),
            TokenKind::BlockStart => Err(DbError::NotSupported(
                "array and bracketed expressions are not supported in SELECT".to_string(),
            )),
            TokenKind::ArrayDelimiter => self.list_delimiter("select"),
            _ => Err(DbError::SyntaxError(format!(
                "'{}' is not valid in the select list",
                token.content
            ))),
        }
    }

    fn list_delimiter(&mut self, name: &str) -> DbResult<()> {
        if self.expects_item {
            return Err(DbError::SyntaxError(format!(
                "',' in the {} list has no column before it",
                name
            )));
        }
        self.expects_item = true;
        Ok(())
    }

    fn from_token(&mut self, token: Token) -> DbResult<()> {
        match token.kind {
            TokenKind::Query => {
                if self.table.is_none() {
                    self.table = Some(token.content);
                } else if self.alias.is_none() {
                    self.alias = Some(token.content);
                } else {
                    return Err(DbError::StateError(format!(
                        "identifier '{}' appears after table name '{}' and alias '{}' are already set",
                        token.content,
                        self.table.as_deref().unwrap_or_default(),
                        self.alias.as_deref().unwrap_or_default()
                    )));
                }
                Ok(())
            }
            TokenKind::Text => Err(DbError::NotSupported(format!(
                "text literal '{}' cannot be used as the table name",
                token.content
            ))),
            TokenKind::BlockStart => Err(DbError::NotSupported(
                "parenthesized blocks are not supported in FROM".to_string(),
            )),
            TokenKind::ArrayDelimiter => Err(DbError::NotSupported(
                "ArrayDelimiter token ',' is not supported in FROM".to_string(),
            )),
            _ => Err(DbError::SyntaxError(format!(
                "'{}' is not valid in the from clause",
                token.content
            ))),
        }
    }

    fn where_token(&mut self, token: Token) -> DbResult<()> {
        match token.kind {
            TokenKind::Query if self.filter.expects_value() => {
                self.filter = mem::take(&mut self.filter).set_value(ValueToken::Single(token))?;
            }
            TokenKind::Query => {
                let column = ColumnRef::parse(&token.content).ok_or_else(|| {
                    DbError::NotSupported(format!(
                        "column expression '{}' is not supported",
                        token.content
                    ))
                })?;
                self.filter = mem::take(&mut self.filter).set_column(column)?;
            }
            TokenKind::Operator => {
                let operator = Operator::from_symbol(&token.content)?;
                self.filter =
                    mem::take(&mut self.filter).set_operator(operator, &token.content, false)?;
            }
            TokenKind::Text => {
                self.filter = mem::take(&mut self.filter).set_value(ValueToken::Single(token))?;
            }
            TokenKind::BlockStart if self.filter.expects_array() => {
                let values = self.parse_array()?;
                self.filter = mem::take(&mut self.filter).set_value(ValueToken::Array(values))?;
            }
            TokenKind::BlockStart => {
                return Err(DbError::NotSupported(
                    "parenthesized blocks are not supported in WHERE".to_string(),
                ))
            }
            TokenKind::ArrayDelimiter => {
                return Err(DbError::NotSupported(
                    "ArrayDelimiter token ',' is not supported outside an array literal"
                        .to_string(),
                ))
            }
            TokenKind::Comment | TokenKind::BlockEnd => {}
        }
        Ok(())
    }

    /// Reads an array literal after its opening `(` up to the matching `)`.
    fn parse_array(&mut self) -> DbResult<Vec<Token>> {
        let mut values = Vec::new();
        let mut after_delimiter = false;

        loop {
            let token = self.next_token().ok_or_else(|| {
                DbError::SyntaxError("'(' of the array literal is never closed".to_string())
            })?;

            match token.kind {
                TokenKind::Comment => {}
                TokenKind::Query | TokenKind::Text => {
                    if !values.is_empty() && !after_delimiter {
                        return Err(DbError::SyntaxError(format!(
                            "missing ',' between array values before '{}'",
                            token.content
                        )));
                    }
                    values.push(token);
                    after_delimiter = false;
                }
                TokenKind::ArrayDelimiter => {
                    if after_delimiter {
                        return Err(DbError::SyntaxError(
                            "array delimiter immediately follows another delimiter".to_string(),
                        ));
                    }
                    if values.is_empty() {
                        return Err(DbError::NotSupported(
                            "ArrayDelimiter token ',' is not supported at the start of an array literal"
                                .to_string(),
                        ));
                    }
                    after_delimiter = true;
                }
                TokenKind::BlockEnd => {
                    if after_delimiter {
                        return Err(DbError::NotSupported(
                            "ArrayDelimiter token ',' is not supported before ')'".to_string(),
                        ));
                    }
                    if values.is_empty() {
                        return Err(DbError::SyntaxError("array literal is empty".to_string()));
                    }
                    return Ok(values);
                }
                TokenKind::BlockStart => {
                    return Err(DbError::NotSupported(
                        "nested blocks are not supported in array literals".to_string(),
                    ))
                }
                TokenKind::Operator => {
                    return Err(DbError::SyntaxError(format!(
                        "operator '{}' is not valid inside an array literal",
                        token.content
                    )))
                }
            }
        }
    }

    fn combine(&mut self, conjunction: Conjunction) -> DbResult<()> {
        if self.filter.is_empty() {
            return Err(DbError::SyntaxError(format!(
                "'{}' has no prior filter to combine with",
                conjunction.keyword()
            )));
        }
        let filter = mem::take(&mut self.filter).finish()?;
        self.place(filter, Some(conjunction));
        self.previous_conjunction = Some(conjunction);
        Ok(())
    }

    /// Puts a completed filter into the active group. `or` binds tighter
    /// than `and`: filters adjacent to an `or` share the Or-list, and an
    /// `and` after a non-empty Or-list opens a new group.
    fn place(&mut self, filter: Filter, next: Option<Conjunction>) {
        if self.groups.is_empty() {
            self.groups.push(LogicalFilterGroup::default());
        }
        let to_or =
            next == Some(Conjunction::Or) || self.previous_conjunction == Some(Conjunction::Or);

        let mut open_new_group = false;
        if let Some(group) = self.groups.last_mut() {
            if to_or {
                group.or.push(filter);
            } else {
                group.and.push(filter);
            }
            open_new_group = next == Some(Conjunction::And) && !group.or.is_empty();
        }
        if open_new_group {
            self.groups.push(LogicalFilterGroup::default());
        }
    }

    fn close_where(&mut self) -> DbResult<()> {
        if self.filter.is_empty() {
            if let Some(conjunction) = self.previous_conjunction {
                return Err(DbError::SyntaxError(format!(
                    "'{}' is not followed by a filter",
                    conjunction.keyword()
                )));
            }
            return Err(DbError::SyntaxError(
                "the where clause has no filters".to_string(),
            ));
        }
        let filter = mem::take(&mut self.filter).finish()?;
        self.place(filter, None);
        self.groups.retain(|g| !g.is_empty());
        Ok(())
    }

    fn list_token(&mut self, token: Token) -> DbResult<()> {
        let name = if self.clause == Clause::GroupBy {
            "group by"
        } else {
            "order by"
        };
        match token.kind {
            TokenKind::Query => {
                if !self.expects_item {
                    return Err(DbError::SyntaxError(format!(
                        "missing ',' in the {} list before '{}'",
                        name, token.content
                    )));
                }
                let column = ColumnRef::parse(&token.content).ok_or_else(|| {
                    DbError::NotSupported(format!(
                        "column expression '{}' is not supported in {}",
                        token.content, name
                    ))
                })?;
                if self.clause == Clause::GroupBy {
                    self.group_by.push(column);
                } else {
                    self.order_by.push(OrderByItem {
                        column,
                        descending: false,
                    });
                }
                self.expects_item = false;
                Ok(())
            }
            TokenKind::ArrayDelimiter => self.list_delimiter(name),
            TokenKind::Text => Err(DbError::NotSupported(format!(
                "text literal '{}' is not supported in {}",
                token.content, name
            ))),
            TokenKind::BlockStart => Err(DbError::NotSupported(format!(
                "parenthesized blocks are not supported in {}",
                name
            ))),
            _ => Err(DbError::SyntaxError(format!(
                "'{}' is not valid in {}",
                token.content, name
            ))),
        }
    }

    fn finish(mut self) -> DbResult<QueryModel> {
        match self.clause {
            Clause::Start => {
                return Err(DbError::SyntaxError(
                    "query must start with 'select'".to_string(),
                ))
            }
            Clause::Select => {
                return Err(DbError::SyntaxError(
                    "no table present: 'from' is missing".to_string(),
                ))
            }
            Clause::From => {}
            Clause::Where => self.close_where()?,
            Clause::GroupBy => self.close_list("group by")?,
            Clause::OrderBy => self.close_list("order by")?,
        }

        let table = self
            .table
            .ok_or_else(|| DbError::SyntaxError("no table present".to_string()))?;

        Ok(QueryModel {
            select_columns: self.select_columns,
            from: TableRef {
                name: table,
                alias: self.alias,
            },
            where_groups: self.groups,
            group_by: self.group_by,
            order_by: self.order_by,
        })
    }
}

/// Tokenizes and parses `input` into a [`QueryModel`].
pub fn parse(input: &str) -> DbResult<QueryModel> {
    SqlParser::new(input)?.parse()
}
