//! Connector surface tests: resolution, pushdown, scans and inserts

mod common;

use common::{config, cpu_chunk, MockStoreClient, DB};
use influxql_connector::client::{FieldValue, QueryResponse};
use influxql_connector::connector::{Connector, RetryMode, SchemaTableName, SortItem, TableHandle};
use influxql_connector::predicate::{Domain, Predicate, Range, ScalarValue};
use influxql_connector::schema::{Column, ColumnType};
use influxql_connector::session::MetadataSession;
use influxql_connector::timestamp::TimestampTz;
use influxql_connector::Error;
use serde_json::json;
use std::sync::Arc;

fn connector_over(mock: Arc<MockStoreClient>) -> Connector {
    Connector::with_session(Arc::new(MetadataSession::with_client(config(), mock)))
}

#[tokio::test]
async fn resolves_table_with_default_policy() {
    let connector = connector_over(Arc::new(MockStoreClient::with_metadata()));
    let handle = connector
        .metadata()
        .get_table_handle(DB, "cpu")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(handle, TableHandle::new(DB, "autogen", "cpu"));
}

#[tokio::test]
async fn resolves_explicit_retention_policy() {
    let connector = connector_over(Arc::new(MockStoreClient::with_metadata()));
    let metadata = connector.metadata();

    let handle = metadata.get_table_handle(DB, "weekly.cpu").await.unwrap().unwrap();
    assert_eq!(handle.retention_policy(), "weekly");
    assert_eq!(handle.table_name(), "cpu");

    for malformed in ["a.b.cpu", ".cpu", "weekly.", "weekly.disk"] {
        assert!(metadata.get_table_handle(DB, malformed).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn unknown_schema_or_table_is_unresolved() {
    let connector = connector_over(Arc::new(MockStoreClient::with_metadata()));
    let metadata = connector.metadata();
    assert!(metadata.get_table_handle("nope", "cpu").await.unwrap().is_none());
    assert!(metadata.get_table_handle(DB, "disk").await.unwrap().is_none());
}

#[tokio::test]
async fn lists_tables_of_every_schema() {
    let mock = Arc::new(MockStoreClient::with_metadata());
    let connector = connector_over(mock);
    let tables = connector.metadata().list_tables(Some(DB)).await.unwrap();
    assert_eq!(
        tables,
        vec![SchemaTableName::new(DB, "cpu"), SchemaTableName::new(DB, "mem")]
    );
}

#[tokio::test]
async fn lists_columns_for_a_prefix() {
    let mock = Arc::new(MockStoreClient::with_metadata());
    let connector = connector_over(mock);
    let columns = connector
        .metadata()
        .list_table_columns(Some(DB), Some("cpu"))
        .await
        .unwrap();
    let cpu = &columns[&SchemaTableName::new(DB, "cpu")];
    assert_eq!(cpu[0], Column::time());
    assert_eq!(cpu.len(), 6);
}

#[tokio::test]
async fn filter_limit_and_top_n_pushdown() {
    let connector = connector_over(Arc::new(MockStoreClient::with_metadata()));
    let metadata = connector.metadata();
    let handle = TableHandle::new(DB, "autogen", "cpu");

    let constraint = Predicate::all()
        .with_domain(
            Column::field("usage", ColumnType::Float64),
            Domain::from_ranges(vec![Range::greater_than(ScalarValue::Float64(50.0))]),
        )
        .unwrap();
    let filtered = metadata.apply_filter(&handle, &constraint).unwrap().unwrap();
    assert_eq!(filtered.constraint(), &constraint);
    assert!(metadata.apply_filter(&filtered, &constraint).unwrap().is_none());
    assert!(metadata.apply_filter(&handle, &Predicate::all()).unwrap().is_none());

    let limited = metadata.apply_limit(&filtered, 100).unwrap();
    assert_eq!(limited.limit(), Some(100));
    assert!(metadata.apply_limit(&limited, 200).is_none());
    assert_eq!(metadata.apply_limit(&limited, 10).unwrap().limit(), Some(10));

    let top = metadata
        .apply_top_n(&limited, 5, &[SortItem::new("time", false)])
        .unwrap();
    assert_eq!(top.limit(), Some(5));
    assert!(!top.ascending());
    assert!(metadata.apply_top_n(&top, 5, &[SortItem::new("time", false)]).is_none());
    assert!(metadata.apply_top_n(&limited, 5, &[SortItem::new("host", true)]).is_none());
}

#[tokio::test]
async fn inserts_require_no_retries() {
    let connector = connector_over(Arc::new(MockStoreClient::with_metadata()));
    let handle = TableHandle::new(DB, "autogen", "cpu");
    let err = connector
        .metadata()
        .begin_insert(&handle, vec![Column::time()], RetryMode::RetriesEnabled)
        .unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));

    let insert = connector
        .metadata()
        .begin_insert(&handle, vec![Column::time()], RetryMode::NoRetries)
        .unwrap();
    assert_eq!(insert.retention_policy, "autogen");
}

#[tokio::test]
async fn scan_streams_rows_past_the_implicit_time_value() {
    let mock = Arc::new(MockStoreClient::with_metadata());
    let query = r#"select "host","usage" from "autogen"."cpu" order by time desc limit 2"#;
    mock.respond_chunks(
        query,
        vec![
            cpu_chunk(vec![
                vec![json!("2024-01-01T00:00:01Z"), json!("b"), json!(2.5)],
                vec![json!("2024-01-01T00:00:00Z"), json!("a"), json!(null)],
            ]),
            QueryResponse::done(),
        ],
    );
    let connector = connector_over(mock.clone());
    let handle = TableHandle::new(DB, "autogen", "cpu")
        .with_limit(2)
        .with_ascending(false);
    let columns = vec![Column::tag("host"), Column::field("usage", ColumnType::Float64)];

    let mut cursor = connector
        .record_sets()
        .open_cursor(&handle, &columns)
        .await
        .unwrap();
    assert!(cursor.advance().await.unwrap());
    assert_eq!(cursor.get_string(0).unwrap(), "b");
    assert_eq!(cursor.get_double(1).unwrap(), 2.5);
    assert!(cursor.advance().await.unwrap());
    assert_eq!(cursor.get_string(0).unwrap(), "a");
    assert!(cursor.is_null(1).unwrap());
    assert!(!cursor.advance().await.unwrap());
    assert_eq!(mock.chunked_queries().len(), 1);
}

#[tokio::test]
async fn unsatisfiable_predicate_skips_the_store() {
    let mock = Arc::new(MockStoreClient::with_metadata());
    let connector = connector_over(mock.clone());
    let predicate = Predicate::all()
        .with_domain(Column::tag("host"), Domain::none())
        .unwrap();
    let handle = TableHandle::new(DB, "autogen", "cpu").with_constraint(predicate);

    let mut cursor = connector
        .record_sets()
        .open_cursor(&handle, &[Column::time()])
        .await
        .unwrap();
    assert!(!cursor.advance().await.unwrap());
    assert!(mock.chunked_queries().is_empty());
}

#[tokio::test]
async fn page_sink_writes_one_batch_per_page() {
    let mock = Arc::new(MockStoreClient::with_metadata());
    let connector = connector_over(mock.clone());
    let handle = TableHandle::new(DB, "autogen", "cpu");
    let columns = vec![
        Column::time(),
        Column::tag("host"),
        Column::field("usage", ColumnType::Float64),
        Column::field("cores", ColumnType::Int64),
    ];
    let insert = connector
        .metadata()
        .begin_insert(&handle, columns, RetryMode::NoRetries)
        .unwrap();
    let mut sink = connector.page_sink(insert);

    let ts = TimestampTz::new(1_704_067_200_000, 1_500).unwrap();
    sink.append_rows(&[
        vec![
            Some(ScalarValue::TimestampTz(ts)),
            Some(ScalarValue::Utf8("a".into())),
            Some(ScalarValue::Float64(0.5)),
            None,
        ],
        vec![
            None,
            Some(ScalarValue::Utf8("b".into())),
            None,
            Some(ScalarValue::Int64(4)),
        ],
    ])
    .await
    .unwrap();

    let writes = mock.writes();
    assert_eq!(writes.len(), 1);
    let batch = &writes[0];
    assert_eq!(batch.database, DB);
    assert_eq!(batch.retention_policy, "autogen");
    assert_eq!(batch.len(), 2);

    let first = &batch.points[0];
    assert_eq!(first.timestamp, Some(1_704_067_200_000_000_002));
    assert_eq!(first.tags["host"], "a");
    assert_eq!(first.fields["usage"], FieldValue::Float(0.5));
    assert!(!first.fields.contains_key("cores"));

    let second = &batch.points[1];
    assert!(second.timestamp.is_some());
    assert_eq!(second.fields["cores"], FieldValue::Integer(4));
    assert_eq!(sink.rows_written(), 2);
}

#[tokio::test]
async fn page_sink_rejects_misaligned_rows() {
    let mock = Arc::new(MockStoreClient::with_metadata());
    let connector = connector_over(mock.clone());
    let insert = connector
        .metadata()
        .begin_insert(
            &TableHandle::new(DB, "autogen", "cpu"),
            vec![Column::time(), Column::tag("host")],
            RetryMode::NoRetries,
        )
        .unwrap();
    let mut sink = connector.page_sink(insert);

    let err = sink.append_rows(&[vec![None]]).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(mock.writes().is_empty());
}
