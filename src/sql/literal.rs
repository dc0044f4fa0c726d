use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use super::ast::ValueToken;
use super::lexer::{Token, TokenKind};
use super::value::{FieldType, FieldValue};
use crate::error::{DbError, DbResult};

/// Parses raw literal text into a typed value; the error is a short reason.
pub type LiteralParser = fn(&str) -> Result<FieldValue, String>;

fn parse_signed<T>(raw: &str) -> Result<FieldValue, String>
where
    T: FromStr + Into<i64>,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map(|v| FieldValue::Int(v.into()))
        .map_err(|e| e.to_string())
}

fn parse_unsigned<T>(raw: &str) -> Result<FieldValue, String>
where
    T: FromStr + Into<u64>,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map(|v| FieldValue::UInt(v.into()))
        .map_err(|e| e.to_string())
}

fn parse_float<T>(raw: &str) -> Result<FieldValue, String>
where
    T: FromStr + Into<f64>,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map(|v| FieldValue::Float(v.into()))
        .map_err(|e| e.to_string())
}

fn parse_bool(raw: &str) -> Result<FieldValue, String> {
    if raw.eq_ignore_ascii_case("true") {
        Ok(FieldValue::Bool(true))
    } else if raw.eq_ignore_ascii_case("false") {
        Ok(FieldValue::Bool(false))
    } else {
        Err("expected 'true' or 'false'".to_string())
    }
}

fn parse_guid(raw: &str) -> Result<FieldValue, String> {
    Uuid::parse_str(raw)
        .map(FieldValue::Guid)
        .map_err(|e| e.to_string())
}

fn parse_datetime(raw: &str) -> Result<FieldValue, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| FieldValue::DateTime(d.with_timezone(&Utc)))
        .map_err(|e| e.to_string())
}

/// Registry of literal parsers keyed by destination type.
#[derive(Clone)]
pub struct LiteralParsers {
    parsers: HashMap<FieldType, LiteralParser>,
}

static DEFAULT_PARSERS: Lazy<LiteralParsers> = Lazy::new(LiteralParsers::with_defaults);

impl LiteralParsers {
    /// An empty registry; only `null` and `String` destinations coerce.
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry
            .register(FieldType::Guid, parse_guid)
            .register(FieldType::Bool, parse_bool)
            .register(FieldType::I8, parse_signed::<i8>)
            .register(FieldType::I16, parse_signed::<i16>)
            .register(FieldType::I32, parse_signed::<i32>)
            .register(FieldType::I64, parse_signed::<i64>)
            .register(FieldType::U8, parse_unsigned::<u8>)
            .register(FieldType::U16, parse_unsigned::<u16>)
            .register(FieldType::U32, parse_unsigned::<u32>)
            .register(FieldType::U64, parse_unsigned::<u64>)
            .register(FieldType::F32, parse_float::<f32>)
            .register(FieldType::F64, parse_float::<f64>)
            .register(FieldType::DateTime, parse_datetime);
        registry
    }

    /// The shared default registry.
    pub fn global() -> &'static LiteralParsers {
        &DEFAULT_PARSERS
    }

    pub fn register(&mut self, field_type: FieldType, parser: LiteralParser) -> &mut Self {
        self.parsers.insert(field_type, parser);
        self
    }

    pub fn supports(&self, field_type: &FieldType) -> bool {
        match field_type {
            FieldType::String => true,
            FieldType::List(element) => self.supports(element),
            other => self.parsers.contains_key(other),
        }
    }

    /// Coerces raw literal text to `field_type`.
    ///
    /// `null` becomes `FieldValue::Null` for every type and `String`
    /// destinations keep the text unchanged. List columns coerce with
    /// their element type.
    pub fn coerce(&self, raw: &str, field_type: &FieldType) -> DbResult<FieldValue> {
        if raw.eq_ignore_ascii_case("null") {
            return Ok(FieldValue::Null);
        }
        match field_type {
            FieldType::String => Ok(FieldValue::String(raw.to_string())),
            FieldType::List(element) => self.coerce(raw, element),
            other => {
                let parser = self.parsers.get(other).ok_or_else(|| {
                    DbError::UnsupportedLiteralType(format!(
                        "no literal parser is registered for {}",
                        other
                    ))
                })?;
                parser(raw).map_err(|reason| {
                    DbError::InvalidLiteral(format!(
                        "'{}' is not a valid {}: {}",
                        raw, other, reason
                    ))
                })
            }
        }
    }

    /// Coerces one token. Quoted text is never treated as `null`.
    pub fn coerce_token(&self, token: &Token, field_type: &FieldType) -> DbResult<FieldValue> {
        if token.kind == TokenKind::Text {
            return match field_type {
                FieldType::String => Ok(FieldValue::String(token.content.clone())),
                FieldType::List(element) if **element == FieldType::String => {
                    Ok(FieldValue::String(token.content.clone()))
                }
                _ if token.content.eq_ignore_ascii_case("null") => Err(DbError::InvalidLiteral(
                    format!("quoted 'null' is not a valid {}", field_type),
                )),
                _ => self.coerce(&token.content, field_type),
            };
        }
        self.coerce(&token.content, field_type)
    }

    /// Coerces a filter's value; arrays become `FieldValue::List`.
    pub fn coerce_value(&self, value: &ValueToken, field_type: &FieldType) -> DbResult<FieldValue> {
        match value {
            ValueToken::Single(token) => self.coerce_token(token, field_type),
            ValueToken::Array(tokens) => tokens
                .iter()
                .map(|token| self.coerce_token(token, field_type))
                .collect::<DbResult<Vec<_>>>()
                .map(FieldValue::List),
        }
    }
}

impl Default for LiteralParsers {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for LiteralParsers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiteralParsers")
            .field("types", &self.parsers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coerce(raw: &str, field_type: FieldType) -> DbResult<FieldValue> {
        LiteralParsers::global().coerce(raw, &field_type)
    }

    #[test]
    fn test_null_for_any_type() {
        assert_eq!(coerce("null", FieldType::I32).unwrap(), FieldValue::Null);
        assert_eq!(coerce("NULL", FieldType::Guid).unwrap(), FieldValue::Null);
        assert_eq!(coerce("null", FieldType::Json).unwrap(), FieldValue::Null);
    }

    #[test]
    fn test_string_is_unchanged() {
        assert_eq!(
            coerce("42", FieldType::String).unwrap(),
            FieldValue::String("42".to_string())
        );
    }

    #[test]
    fn test_numeric_widths() {
        assert_eq!(coerce("-7", FieldType::I8).unwrap(), FieldValue::Int(-7));
        assert_eq!(coerce("70000", FieldType::U32).unwrap(), FieldValue::UInt(70000));
        assert_eq!(coerce("2.5", FieldType::F64).unwrap(), FieldValue::Float(2.5));
        assert!(matches!(
            coerce("300", FieldType::U8),
            Err(DbError::InvalidLiteral(_))
        ));
    }

    #[test]
    fn test_bool_and_guid() {
        assert_eq!(coerce("TRUE", FieldType::Bool).unwrap(), FieldValue::Bool(true));
        let id = Uuid::new_v4();
        assert_eq!(
            coerce(&id.to_string(), FieldType::Guid).unwrap(),
            FieldValue::Guid(id)
        );
    }

    #[test]
    fn test_datetime() {
        let value = coerce("2024-03-01T12:00:00Z", FieldType::DateTime).unwrap();
        assert!(matches!(value, FieldValue::DateTime(_)));
    }

    #[test]
    fn test_unsupported_type() {
        let err = coerce("{}", FieldType::Json).unwrap_err();
        assert!(matches!(err, DbError::UnsupportedLiteralType(_)));
        assert!(!LiteralParsers::global().supports(&FieldType::Json));
    }

    #[test]
    fn test_custom_registration() {
        fn parse_json(raw: &str) -> Result<FieldValue, String> {
            serde_json::from_str(raw)
                .map(FieldValue::Json)
                .map_err(|e| e.to_string())
        }
        let mut parsers = LiteralParsers::with_defaults();
        parsers.register(FieldType::Json, parse_json);
        assert!(parsers.supports(&FieldType::Json));
        assert!(parsers.coerce("[1,2]", &FieldType::Json).is_ok());
    }

    #[test]
    fn test_quoted_null_stays_text() {
        let parsers = LiteralParsers::global();
        assert_eq!(
            parsers
                .coerce_token(&Token::text("null"), &FieldType::String)
                .unwrap(),
            FieldValue::String("null".to_string())
        );
        assert_eq!(
            parsers
                .coerce_token(&Token::query("null"), &FieldType::String)
                .unwrap(),
            FieldValue::Null
        );
    }

    #[test]
    fn test_array_value() {
        let value = ValueToken::Array(vec![Token::query("1"), Token::query("2")]);
        assert_eq!(
            LiteralParsers::global()
                .coerce_value(&value, &FieldType::I32)
                .unwrap(),
            FieldValue::List(vec![FieldValue::Int(1), FieldValue::Int(2)])
        );
    }
}
