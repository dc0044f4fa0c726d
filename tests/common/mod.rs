#![allow(dead_code)]

use emudb::storage::{Container, Row, Schema};
use emudb::{CancellationToken, FieldType, FieldValue};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixture row with one column of each commonly queried type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub email_address: String,
    pub name: String,
    pub age: i32,
    pub score: f64,
    pub active: bool,
    pub token: Uuid,
    pub nickname: Option<String>,
}

impl Row for Person {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Person>> = Lazy::new(|| {
            Schema::builder()
                .column("id", FieldType::String, |p: &Person| p.id.clone().into())
                .column("emailAddress", FieldType::String, |p: &Person| {
                    p.email_address.clone().into()
                })
                .column("name", FieldType::String, |p: &Person| p.name.clone().into())
                .column("age", FieldType::I32, |p: &Person| p.age.into())
                .column("score", FieldType::F64, |p: &Person| p.score.into())
                .column("active", FieldType::Bool, |p: &Person| p.active.into())
                .column("token", FieldType::Guid, |p: &Person| p.token.into())
                .column("nickname", FieldType::String, |p: &Person| {
                    p.nickname.clone().into()
                })
                .build()
        });
        &SCHEMA
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// A second row type, used to check type mismatches between containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub text: String,
}

impl Row for Note {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Note>> = Lazy::new(|| {
            Schema::builder()
                .column("id", FieldType::String, |n: &Note| n.id.clone().into())
                .column("text", FieldType::String, |n: &Note| n.text.clone().into())
                .build()
        });
        &SCHEMA
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// Row with full-width integer columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub id: String,
    pub n: i64,
    pub u: u64,
}

impl Row for Counter {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Counter>> = Lazy::new(|| {
            Schema::builder()
                .column("id", FieldType::String, |c: &Counter| c.id.clone().into())
                .column("n", FieldType::I64, |c: &Counter| c.n.into())
                .column("u", FieldType::U64, |c: &Counter| c.u.into())
                .build()
        });
        &SCHEMA
    }

    fn id(&self) -> &str {
        &self.id
    }
}

pub fn note(id: &str, text: &str) -> Note {
    Note {
        id: id.to_string(),
        text: text.to_string(),
    }
}

/// Five people with distinct values in every column; two have no nickname.
pub fn people() -> Vec<Person> {
    (1..=5)
        .map(|i| Person {
            id: format!("person-{}", i),
            email_address: format!("person{}@example.com", i),
            name: format!("Person {}", i),
            age: 20 + i,
            score: i as f64 * 1.5,
            active: i % 2 == 0,
            token: Uuid::new_v4(),
            nickname: if i <= 3 { Some(format!("P{}", i)) } else { None },
        })
        .collect()
}

pub fn seeded_container(name: &str) -> (Container<Person>, Vec<Person>) {
    let container = Container::<Person>::new(name, "/emailAddress").unwrap();
    let rows = people();
    let cancel = CancellationToken::new();
    for row in &rows {
        container.upsert_item(row.clone(), &cancel).unwrap();
    }
    (container, rows)
}

/// Runs `query` to completion and returns ids in sorted order.
pub fn query_ids(container: &Container<Person>, query: &str) -> Vec<String> {
    let mut ids: Vec<String> = container
        .query(Some(query), &CancellationToken::new())
        .unwrap()
        .read_all()
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    ids.sort();
    ids
}

/// Renders a value as a query literal.
pub fn literal(value: &FieldValue) -> String {
    match value {
        FieldValue::String(s) => format!("'{}'", s.replace('\'', "''")),
        FieldValue::Guid(g) => format!("'{}'", g),
        other => other.to_string(),
    }
}
