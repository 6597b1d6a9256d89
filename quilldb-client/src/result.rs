//! Unified result facade over one-shot and streaming query results.

use crate::connection::{Connection, QueryOutcome};
use crate::cursor::Cursor;
use crate::error::ClientError;
use quilldb_protocol::Query;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

enum Inner {
    /// A fully-materialized one-shot result.
    Immediate { value: Value, index: usize },
    /// A lazily-fetched paginated result.
    Stream(Box<Cursor>),
}

/// The result of running a query: either a one-shot value or a cursor,
/// behind one iteration interface.
pub struct QueryResult {
    inner: Inner,
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Immediate { value, index } => f
                .debug_struct("QueryResult")
                .field("value", value)
                .field("index", index)
                .finish(),
            Inner::Stream(cursor) => f.debug_tuple("QueryResult").field(cursor).finish(),
        }
    }
}

impl QueryResult {
    /// Wraps a one-shot result value.
    pub fn immediate(value: Value) -> Self {
        Self {
            inner: Inner::Immediate { value, index: 0 },
        }
    }

    /// Wraps a paginated result.
    pub fn stream(cursor: Cursor) -> Self {
        Self {
            inner: Inner::Stream(Box::new(cursor)),
        }
    }

    /// Builds the facade for a decoded outcome. Paginated pages become a
    /// cursor over the original query; everything else is one-shot.
    pub(crate) fn from_outcome(
        outcome: QueryOutcome,
        query: Query,
        conn: Arc<Connection>,
    ) -> Self {
        match outcome {
            QueryOutcome::Page(page) => Self::stream(Cursor::new(conn, query, page)),
            QueryOutcome::Document(doc) => Self::immediate(doc.unwrap_or(Value::Null)),
            QueryOutcome::Count(count) => Self::immediate(json!(count)),
            QueryOutcome::Write(receipt) => Self::immediate(Value::Array(receipt.inserted)),
            QueryOutcome::Names(names) => Self::immediate(json!(names)),
            QueryOutcome::Ack(ok) => Self::immediate(json!(ok)),
            QueryOutcome::Value(value) => Self::immediate(value),
            QueryOutcome::Plan(plan) => Self::immediate(plan),
            QueryOutcome::Auth(auth) => Self::immediate(auth),
            QueryOutcome::Pong => Self::immediate(Value::Null),
        }
    }

    /// Whether this is a one-shot result (no cursor behind it).
    pub fn is_immediate(&self) -> bool {
        matches!(self.inner, Inner::Immediate { .. })
    }

    /// The underlying one-shot value, if any.
    pub fn result(&self) -> Option<&Value> {
        match &self.inner {
            Inner::Immediate { value, .. } => Some(value),
            Inner::Stream(_) => None,
        }
    }

    /// Yields the next item.
    ///
    /// For one-shot results: a sequence yields each element, a non-null
    /// scalar yields exactly once, and null yields nothing. For streaming
    /// results this delegates to the cursor and may fetch a page.
    pub async fn next(&mut self) -> Result<Option<Value>, ClientError> {
        match &mut self.inner {
            Inner::Immediate { value, index } => {
                let item = match value {
                    Value::Null => None,
                    Value::Array(items) => items.get(*index).cloned(),
                    scalar => (*index == 0).then(|| scalar.clone()),
                };
                if item.is_some() {
                    *index += 1;
                }
                Ok(item)
            }
            Inner::Stream(cursor) => cursor.next().await,
        }
    }

    /// Drains all remaining items.
    pub async fn to_array(&mut self) -> Result<Vec<Value>, ClientError> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await? {
            out.push(item);
        }
        Ok(out)
    }

    /// Yields the first remaining item, if any.
    pub async fn first(&mut self) -> Result<Option<Value>, ClientError> {
        self.next().await
    }

    /// Applies a callback to every remaining item.
    pub async fn for_each<F: FnMut(Value)>(&mut self, mut f: F) -> Result<(), ClientError> {
        while let Some(item) = self.next().await? {
            f(item);
        }
        Ok(())
    }

    /// Closes the result. A no-op for one-shot results; stops pagination
    /// for streaming ones.
    pub fn close(&mut self) {
        if let Inner::Stream(cursor) = &mut self.inner {
            cursor.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionConfig, CursorResult, WriteOutcome};
    use quilldb_protocol::{QueryOp, WriteStats};

    fn dummy_query() -> Query {
        Query::new(QueryOp::Table {
            source: Box::new(QueryOp::Database {
                name: "mydb".to_string(),
            }),
            name: "users".to_string(),
        })
    }

    fn offline_conn() -> Arc<Connection> {
        Arc::new(Connection::new(ConnectionConfig::new(
            "127.0.0.1:6090".parse().unwrap(),
        )))
    }

    #[tokio::test]
    async fn test_immediate_array_yields_elements() {
        let mut result = QueryResult::immediate(json!([1, 2, 3]));
        assert!(result.is_immediate());
        assert_eq!(result.to_array().await.unwrap(), vec![json!(1), json!(2), json!(3)]);
        assert_eq!(result.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_immediate_scalar_yields_once() {
        let mut result = QueryResult::immediate(json!(42));
        assert_eq!(result.next().await.unwrap(), Some(json!(42)));
        assert_eq!(result.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_immediate_null_yields_nothing() {
        let mut result = QueryResult::immediate(Value::Null);
        assert_eq!(result.next().await.unwrap(), None);
        assert_eq!(result.first().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_outcome_is_one_shot_inserted_array() {
        let inserted = vec![json!({ "id": "123", "name": "Alice", "age": 30 })];
        let outcome = QueryOutcome::Write(WriteOutcome {
            inserted: inserted.clone(),
            stats: WriteStats {
                inserted_count: 1,
                ..Default::default()
            },
        });

        let result = QueryResult::from_outcome(outcome, dummy_query(), offline_conn());
        assert!(result.is_immediate());
        assert_eq!(result.result(), Some(&Value::Array(inserted)));
    }

    #[tokio::test]
    async fn test_page_outcome_streams() {
        let outcome = QueryOutcome::Page(CursorResult {
            items: vec![json!(1)],
            cursor: None,
            metadata: None,
        });
        let mut result = QueryResult::from_outcome(outcome, dummy_query(), offline_conn());
        assert!(!result.is_immediate());
        assert_eq!(result.result(), None);
        assert_eq!(result.to_array().await.unwrap(), vec![json!(1)]);
    }

    #[tokio::test]
    async fn test_debug_formats_both_shapes() {
        let immediate = QueryResult::immediate(json!(7));
        assert!(format!("{immediate:?}").contains("value"));

        let outcome = QueryOutcome::Page(CursorResult {
            items: vec![json!(1), json!(2)],
            cursor: None,
            metadata: None,
        });
        let streamed = QueryResult::from_outcome(outcome, dummy_query(), offline_conn());
        let rendered = format!("{streamed:?}");
        assert!(rendered.contains("Cursor"));
        assert!(rendered.contains("buffered: 2"));
    }

    #[tokio::test]
    async fn test_for_each_and_close() {
        let mut result = QueryResult::immediate(json!(["a", "b"]));
        let mut seen = Vec::new();
        result.for_each(|v| seen.push(v)).await.unwrap();
        assert_eq!(seen, vec![json!("a"), json!("b")]);

        // close is a no-op for one-shot results
        result.close();
    }
}
