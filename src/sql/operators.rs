use std::cmp::Ordering;

use super::value::FieldValue;
use crate::error::{DbError, DbResult};

/// Comparison applied between a row's column value and a query literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    EqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    In,
    Not(Box<Operator>),
}

impl Operator {
    /// Maps an `Operator` token's symbol to an operator.
    pub fn from_symbol(symbol: &str) -> DbResult<Self> {
        match symbol {
            "=" => Ok(Operator::EqualTo),
            "!=" | "<>" => Ok(Operator::EqualTo.negate()),
            ">" => Ok(Operator::GreaterThan),
            ">=" => Ok(Operator::GreaterThanOrEqualTo),
            "<" => Ok(Operator::LessThan),
            "<=" => Ok(Operator::LessThanOrEqualTo),
            other => Err(DbError::SyntaxError(format!(
                "unrecognized operator '{}'",
                other
            ))),
        }
    }

    pub fn negate(self) -> Self {
        Operator::Not(Box::new(self))
    }

    /// The operator with every `Not` wrapper removed.
    pub fn base(&self) -> &Operator {
        match self {
            Operator::Not(inner) => inner.base(),
            other => other,
        }
    }

    pub fn matches(&self, left: &FieldValue, right: &FieldValue) -> bool {
        match self {
            Operator::EqualTo => left.loosely_equals(right),
            Operator::GreaterThan => left.compare(right) == Some(Ordering::Greater),
            Operator::GreaterThanOrEqualTo => matches!(
                left.compare(right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::LessThan => left.compare(right) == Some(Ordering::Less),
            Operator::LessThanOrEqualTo => {
                matches!(left.compare(right), Some(Ordering::Less | Ordering::Equal))
            }
            Operator::In => {
                let candidates: &[FieldValue] = match right {
                    FieldValue::List(items) => items,
                    single => std::slice::from_ref(single),
                };
                match left {
                    FieldValue::List(values) => values
                        .iter()
                        .any(|v| candidates.iter().any(|c| v.loosely_equals(c))),
                    value => candidates.iter().any(|c| value.loosely_equals(c)),
                }
            }
            Operator::Not(inner) => !inner.matches(left, right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> FieldValue {
        FieldValue::String(v.to_string())
    }

    #[test]
    fn test_symbols() {
        assert_eq!(Operator::from_symbol("=").unwrap(), Operator::EqualTo);
        assert_eq!(
            Operator::from_symbol("<>").unwrap(),
            Operator::from_symbol("!=").unwrap()
        );
        let err = Operator::from_symbol("=>").unwrap_err();
        assert!(matches!(err, DbError::SyntaxError(_)));
        assert!(err.to_string().contains("=>"));
    }

    #[test]
    fn test_equal_to_null() {
        assert!(Operator::EqualTo.matches(&FieldValue::Null, &FieldValue::Null));
        assert!(!Operator::EqualTo.matches(&s("a"), &FieldValue::Null));
        assert!(Operator::EqualTo
            .negate()
            .matches(&s("a"), &FieldValue::Null));
    }

    #[test]
    fn test_numeric_comparisons() {
        let five = FieldValue::Int(5);
        let seven = FieldValue::Float(7.5);
        assert!(Operator::LessThan.matches(&five, &seven));
        assert!(Operator::LessThanOrEqualTo.matches(&five, &FieldValue::UInt(5)));
        assert!(Operator::GreaterThan.matches(&seven, &five));
        assert!(Operator::GreaterThanOrEqualTo.matches(&five, &five));
        assert!(!Operator::GreaterThan.matches(&FieldValue::Null, &five));
    }

    #[test]
    fn test_in() {
        let list = FieldValue::List(vec![s("A"), s("B")]);
        assert!(Operator::In.matches(&s("A"), &list));
        assert!(!Operator::In.matches(&s("C"), &list));
        assert!(Operator::In.negate().matches(&s("C"), &list));

        let tags = FieldValue::List(vec![s("x"), s("B")]);
        assert!(Operator::In.matches(&tags, &list));
    }

    #[test]
    fn test_base() {
        let op = Operator::In.negate().negate();
        assert_eq!(op.base(), &Operator::In);
    }
}
