use std::cmp::Ordering;

use super::ast::{ColumnExpression, ColumnRef, Filter, LogicalFilterGroup, QueryModel, TableRef};
use super::literal::LiteralParsers;
use super::operators::Operator;
use super::value::FieldValue;
use crate::error::{DbError, DbResult};
use crate::storage::row::{Accessor, Column, Row};

/// A filter resolved against a row type: accessor, operator and the
/// literal already coerced to the column's declared type.
pub struct BoundFilter<T> {
    column: &'static str,
    accessor: Accessor<T>,
    operator: Operator,
    literal: FieldValue,
}

impl<T> BoundFilter<T> {
    pub fn matches(&self, row: &T) -> bool {
        self.operator.matches(&(self.accessor)(row), &self.literal)
    }

    pub fn column(&self) -> &'static str {
        self.column
    }

    pub fn literal(&self) -> &FieldValue {
        &self.literal
    }
}

pub struct BoundGroup<T> {
    and: Vec<BoundFilter<T>>,
    or: Vec<BoundFilter<T>>,
}

impl<T> BoundGroup<T> {
    pub fn matches(&self, row: &T) -> bool {
        (self.and.is_empty() || self.and.iter().all(|f| f.matches(row)))
            && (self.or.is_empty() || self.or.iter().any(|f| f.matches(row)))
    }
}

struct BoundOrder<T> {
    accessor: Accessor<T>,
    descending: bool,
}

/// A [`QueryModel`] bound to row type `T`.
pub struct BoundQuery<T> {
    groups: Vec<BoundGroup<T>>,
    order_by: Vec<BoundOrder<T>>,
    projection: Option<Vec<&'static str>>,
}

impl<T: Row> BoundQuery<T> {
    pub fn bind(model: &QueryModel) -> DbResult<Self> {
        Self::bind_with(model, LiteralParsers::global())
    }

    pub fn bind_with(model: &QueryModel, parsers: &LiteralParsers) -> DbResult<Self> {
        let groups = model
            .where_groups
            .iter()
            .map(|group| bind_group(group, &model.from, parsers))
            .collect::<DbResult<Vec<_>>>()?;

        let order_by = model
            .order_by
            .iter()
            .map(|item| {
                resolve_column::<T>(&item.column, &model.from).map(|column| BoundOrder {
                    accessor: column.accessor,
                    descending: item.descending,
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        let projection = if model.selects_all() {
            None
        } else {
            let mut names = Vec::new();
            for expression in &model.select_columns {
                if let ColumnExpression::Column(column) = expression {
                    names.push(resolve_column::<T>(column, &model.from)?.name);
                }
            }
            Some(names)
        };

        Ok(Self {
            groups,
            order_by,
            projection,
        })
    }
}

impl<T> BoundQuery<T> {
    /// True when every filter group matches `row`.
    pub fn matches(&self, row: &T) -> bool {
        self.groups.iter().all(|g| g.matches(row))
    }

    pub fn has_filters(&self) -> bool {
        !self.groups.is_empty()
    }

    pub fn is_ordered(&self) -> bool {
        !self.order_by.is_empty()
    }

    /// Ordering by the ORDER BY columns; nulls and unordered values sort first.
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        for order in &self.order_by {
            let left = (order.accessor)(a);
            let right = (order.accessor)(b);
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => left.compare(&right).unwrap_or(Ordering::Equal),
            };
            let ordering = if order.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Schema names of the selected columns, or `None` for `select *`.
    pub fn projection(&self) -> Option<&[&'static str]> {
        self.projection.as_deref()
    }
}

fn bind_group<T: Row>(
    group: &LogicalFilterGroup,
    from: &TableRef,
    parsers: &LiteralParsers,
) -> DbResult<BoundGroup<T>> {
    let bind_all = |filters: &[Filter]| {
        filters
            .iter()
            .map(|f| bind_filter::<T>(f, from, parsers))
            .collect::<DbResult<Vec<_>>>()
    };
    Ok(BoundGroup {
        and: bind_all(&group.and)?,
        or: bind_all(&group.or)?,
    })
}

fn bind_filter<T: Row>(
    filter: &Filter,
    from: &TableRef,
    parsers: &LiteralParsers,
) -> DbResult<BoundFilter<T>> {
    let column = resolve_column::<T>(&filter.column, from)?;
    let literal = parsers.coerce_value(&filter.value, &column.field_type)?;
    Ok(BoundFilter {
        column: column.name,
        accessor: column.accessor,
        operator: filter.operator.clone(),
        literal,
    })
}

/// Resolves a column reference case-insensitively. A table alias must name
/// the FROM table or its alias.
fn resolve_column<T: Row>(column: &ColumnRef, from: &TableRef) -> DbResult<&'static Column<T>> {
    if let Some(alias) = &column.table_alias {
        let known = alias.eq_ignore_ascii_case(&from.name)
            || from
                .alias
                .as_deref()
                .is_some_and(|a| alias.eq_ignore_ascii_case(a));
        if !known {
            return Err(DbError::UnknownColumn(format!(
                "'{}' refers to unknown table alias '{}'",
                column, alias
            )));
        }
    }
    T::schema().column(&column.column_name).ok_or_else(|| {
        DbError::UnknownColumn(format!(
            "column '{}' does not exist on this row type",
            column.column_name
        ))
    })
}
