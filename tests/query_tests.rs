mod common;

use common::{literal, query_ids, seeded_container, Counter, Person};
use emudb::storage::{Container, QueryOptions, Row};
use emudb::{tokenize, CancellationToken, DbError, ErrorCategory};
use emudb::sql::{Token, TokenKind};

#[test]
fn test_tokenize_select_star() {
    let tokens = tokenize("select * from table").unwrap();
    assert_eq!(
        tokens,
        vec![
            Token::query("select"),
            Token::query("*"),
            Token::query("from"),
            Token::query("table"),
        ]
    );
}

#[test]
fn test_tokenize_escaped_quotes() {
    let tokens =
        tokenize("select * from t where a = 'a string with ''string'' content'").unwrap();
    let text: Vec<&Token> = tokens.iter().filter(|t| t.kind == TokenKind::Text).collect();
    assert_eq!(text.len(), 1);
    assert_eq!(text[0].content, "a string with 'string' content");
}

#[test]
fn test_no_predicate_returns_all_live_documents() {
    let (container, rows) = seeded_container("people");
    let cancel = CancellationToken::new();
    container
        .delete_item(&rows[0].id, &rows[0].email_address, &cancel)
        .unwrap();

    let mut expected: Vec<String> = rows[1..].iter().map(|p| p.id.clone()).collect();
    expected.sort();
    assert_eq!(query_ids(&container, "select * from people"), expected);

    let all = container.query(None, &cancel).unwrap().read_all().unwrap();
    assert_eq!(all.len(), 4);
}

#[test]
fn test_select_by_age() {
    let (container, rows) = seeded_container("test");
    for row in &rows {
        let ids = query_ids(&container, &format!("select * from test where age = {}", row.age));
        assert_eq!(ids, vec![row.id.clone()]);
    }
}

#[test]
fn test_equality_for_every_column_type() {
    let (container, rows) = seeded_container("people");
    let schema = Person::schema();

    for column in ["name", "age", "score", "token", "emailAddress"] {
        let accessor = schema.column(column).unwrap();
        for row in &rows {
            let query = format!(
                "select * from people p where p.{} = {}",
                column,
                literal(&accessor.read(row))
            );
            assert_eq!(query_ids(&container, &query), vec![row.id.clone()], "{}", query);
        }
    }
}

#[test]
fn test_bool_equality() {
    let (container, rows) = seeded_container("people");
    let mut expected: Vec<String> = rows
        .iter()
        .filter(|p| p.active)
        .map(|p| p.id.clone())
        .collect();
    expected.sort();
    assert_eq!(
        query_ids(&container, "select * from people where active = true"),
        expected
    );
}

#[test]
fn test_is_null_partitions_documents() {
    let (container, rows) = seeded_container("people");
    let null = query_ids(&container, "select * from people where nickname is null");
    let not_null = query_ids(&container, "select * from people where nickname is not null");

    assert_eq!(null.len() + not_null.len(), rows.len());
    assert!(null.iter().all(|id| !not_null.contains(id)));
    for row in &rows {
        if row.nickname.is_none() {
            assert!(null.contains(&row.id));
        } else {
            assert!(not_null.contains(&row.id));
        }
    }
}

#[test]
fn test_quoted_null_is_text() {
    let (container, _) = seeded_container("people");
    assert!(query_ids(&container, "select * from people where nickname = 'null'").is_empty());
}

#[test]
fn test_range_and_or_groups() {
    let (container, _) = seeded_container("people");
    assert_eq!(
        query_ids(&container, "select * from people where age > 21 and age <= 23"),
        vec!["person-2", "person-3"]
    );
    assert_eq!(
        query_ids(
            &container,
            "select * from people where age = 21 or age = 25 and active = false"
        ),
        vec!["person-1", "person-5"]
    );
    assert_eq!(
        query_ids(
            &container,
            "select * from people where age = 21 or age = 22 and age = 23 or age = 24"
        ),
        Vec::<String>::new()
    );
}

#[test]
fn test_in_and_not_in() {
    let (container, _) = seeded_container("people");
    assert_eq!(
        query_ids(&container, "select * from people where age in (21, 23)"),
        vec!["person-1", "person-3"]
    );
    assert_eq!(
        query_ids(
            &container,
            "select * from people where name not in ('Person 1', 'Person 2')"
        ),
        vec!["person-3", "person-4", "person-5"]
    );
}

#[test]
fn test_order_by() {
    let (container, _) = seeded_container("people");
    let rows = container
        .query(
            Some("select * from people order by age desc"),
            &CancellationToken::new(),
        )
        .unwrap()
        .read_all()
        .unwrap();
    let ages: Vec<i32> = rows.iter().map(|p| p.age).collect();
    assert_eq!(ages, vec![25, 24, 23, 22, 21]);
}

#[test]
fn test_paging_with_options() {
    let (container, _) = seeded_container("people");
    let mut feed = container
        .query_with_options(
            Some("select * from people where age > 20"),
            &QueryOptions::default().with_max_item_count(2),
            &CancellationToken::new(),
        )
        .unwrap();

    let mut pages = Vec::new();
    while feed.has_more_results() {
        pages.push(feed.read_next().unwrap().len());
    }
    assert_eq!(pages, vec![2, 2, 1]);
}

#[test]
fn test_feed_is_point_in_time() {
    let (container, rows) = seeded_container("people");
    let cancel = CancellationToken::new();
    let feed = container.query(None, &cancel).unwrap();

    let mut changed = rows[0].clone();
    changed.age = 99;
    container.upsert_item(changed, &cancel).unwrap();
    container
        .delete_item(&rows[1].id, &rows[1].email_address, &cancel)
        .unwrap();

    let seen = feed.read_all().unwrap();
    assert_eq!(seen, rows);
}

#[test]
fn test_parse_errors_surface_from_query() {
    let (container, _) = seeded_container("people");
    let cancel = CancellationToken::new();

    let err = container
        .query(Some("select * from table t where age is is"), &cancel)
        .err()
        .unwrap();
    assert!(matches!(err, DbError::StateError(_)));
    assert!(err.to_string().contains("operator has already been recorded"));

    let err = container
        .query(Some("select * from table t where name in ('A', 'B',)"), &cancel)
        .err()
        .unwrap();
    assert!(matches!(err, DbError::NotSupported(_)));
    assert_eq!(err.category(), ErrorCategory::Parse);
}

#[test]
fn test_evaluation_errors() {
    let (container, _) = seeded_container("people");
    let cancel = CancellationToken::new();

    let err = container
        .query(Some("select * from people where height = 1"), &cancel)
        .err()
        .unwrap();
    assert!(matches!(err, DbError::UnknownColumn(_)));
    assert_eq!(err.category(), ErrorCategory::Evaluation);

    let err = container
        .query(Some("select * from people where token = 'not-a-guid'"), &cancel)
        .err()
        .unwrap();
    assert!(matches!(err, DbError::InvalidLiteral(_)));
}

#[test]
fn test_wide_integer_columns_match_exactly() {
    let container = Container::<Counter>::new("counters", "/id").unwrap();
    let cancel = CancellationToken::new();
    let big = 1i64 << 53;
    for (id, n, u) in [("a", big, u64::MAX - 1), ("b", big + 1, u64::MAX)] {
        let row = Counter {
            id: id.to_string(),
            n,
            u,
        };
        container.upsert_item(row, &cancel).unwrap();
    }

    let ids = |query: String| -> Vec<String> {
        container
            .query(Some(&query), &cancel)
            .unwrap()
            .read_all()
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect()
    };

    assert_eq!(ids(format!("select * from c where n = {}", big + 1)), vec!["b"]);
    assert_eq!(ids(format!("select * from c where n > {}", big)), vec!["b"]);
    assert_eq!(ids(format!("select * from c where u = {}", u64::MAX)), vec!["b"]);
    assert_eq!(ids(format!("select * from c where u < {}", u64::MAX)), vec!["a"]);
}
