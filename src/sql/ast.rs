use super::lexer::Token;
use super::operators::Operator;

/// An entry in the SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnExpression {
    Star,
    Column(ColumnRef),
    /// Kept verbatim; never evaluated.
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub column_name: String,
    pub table_alias: Option<String>,
}

impl ColumnRef {
    /// Splits `alias.column` into its parts. Deeper paths are not column
    /// references and yield `None`.
    pub fn parse(expression: &str) -> Option<Self> {
        let mut parts = expression.split('.');
        let first = parts.next()?;
        let second = parts.next();
        if parts.next().is_some() || first.is_empty() {
            return None;
        }
        match second {
            Some("") => None,
            Some(column) => Some(Self {
                column_name: column.to_string(),
                table_alias: Some(first.to_string()),
            }),
            None => Some(Self {
                column_name: first.to_string(),
                table_alias: None,
            }),
        }
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.table_alias {
            Some(alias) => write!(f, "{}.{}", alias, self.column_name),
            None => write!(f, "{}", self.column_name),
        }
    }
}

/// Right-hand side of a filter, still in token form until bound to a row type.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueToken {
    Single(Token),
    Array(Vec<Token>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: ColumnRef,
    pub operator: Operator,
    pub value: ValueToken,
}

/// One AND-bucket and one OR-bucket of filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogicalFilterGroup {
    pub and: Vec<Filter>,
    pub or: Vec<Filter>,
}

impl LogicalFilterGroup {
    pub fn is_empty(&self) -> bool {
        self.and.is_empty() && self.or.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub column: ColumnRef,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryModel {
    pub select_columns: Vec<ColumnExpression>,
    pub from: TableRef,
    /// Every group must match for a row to match. Empty when there is no WHERE.
    pub where_groups: Vec<LogicalFilterGroup>,
    pub group_by: Vec<ColumnRef>,
    pub order_by: Vec<OrderByItem>,
}

impl QueryModel {
    pub fn selects_all(&self) -> bool {
        self.select_columns
            .iter()
            .any(|c| matches!(c, ColumnExpression::Star))
    }
}
