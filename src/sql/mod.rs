//! SQL dialect support: tokenizer, parser, literal coercion and evaluation
//! of filter predicates against typed rows.

pub mod ast;
pub mod evaluator;
pub mod lexer;
pub mod literal;
pub mod operators;
pub mod parser;
pub mod value;

pub use ast::{
    ColumnExpression, ColumnRef, Filter, LogicalFilterGroup, OrderByItem, QueryModel, TableRef,
    ValueToken,
};
pub use evaluator::BoundQuery;
pub use lexer::{tokenize, SqlLexer, Token, TokenKind};
pub use literal::{LiteralParser, LiteralParsers};
pub use operators::Operator;
pub use parser::{parse, SqlParser};
pub use value::{FieldType, FieldValue};
