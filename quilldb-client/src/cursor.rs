//! Paginated result cursor and continuation engine.
//!
//! A cursor wraps the first page of a paginated result together with the
//! original query tree, and fetches further pages on demand by rewriting
//! that tree: `skip` nodes are elided (their effect is baked into the first
//! page) and `limit` counts shrink by the items already returned. Pages are
//! fetched strictly sequentially; items within a buffered page are served
//! without suspending.

use crate::connection::{Connection, CursorResult, QueryOutcome};
use crate::error::ClientError;
use quilldb_protocol::{CursorSpec, Query, QueryOp, DEFAULT_BATCH_SIZE};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Finds the limit node closest to the top of the source chain, if any.
fn find_limit(op: &QueryOp) -> Option<u64> {
    match op {
        QueryOp::Limit { count, .. } => Some(*count),
        other => other.source().and_then(find_limit),
    }
}

/// Rewrites the operation tree for a continuation request.
///
/// Returns `None` when the adjusted limit reaches zero, meaning pagination
/// must stop even if the server has more data.
fn continuation_op(op: &QueryOp, remaining: Option<u64>) -> Option<QueryOp> {
    match op {
        QueryOp::Skip { source, .. } => continuation_op(source, remaining),
        QueryOp::Limit { source, .. } => {
            let count = remaining.unwrap_or(0);
            if count == 0 {
                return None;
            }
            Some(QueryOp::Limit {
                source: Box::new(continuation_op(source, remaining)?),
                count,
            })
        }
        other => match other.source() {
            Some(source) => Some(other.with_source(continuation_op(source, remaining)?)),
            None => Some(other.clone()),
        },
    }
}

/// A stateful, resumable view over a paginated result sequence.
pub struct Cursor {
    conn: Arc<Connection>,
    /// The original query tree, reused read-only across continuations.
    query: Query,
    items: Vec<Value>,
    index: usize,
    cursor: Option<CursorSpec>,
    batch_size: u32,
    exhausted: bool,
    /// Items received from the server so far, across all pages.
    total_returned: u64,
    original_limit: Option<u64>,
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("buffered", &(self.items.len() - self.index))
            .field("total_returned", &self.total_returned)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl Cursor {
    /// Builds a cursor from the first page of a result.
    pub fn new(conn: Arc<Connection>, query: Query, first: CursorResult) -> Self {
        let batch_size = query
            .cursor
            .as_ref()
            .and_then(|c| c.batch_size)
            .or_else(|| first.cursor.as_ref().and_then(|c| c.batch_size))
            .unwrap_or(DEFAULT_BATCH_SIZE);

        let original_limit = find_limit(&query.op);
        let total_returned = first.items.len() as u64;
        let short_page = first.items.len() < batch_size as usize;
        let no_start_key = first
            .cursor
            .as_ref()
            .and_then(|c| c.start_key.as_ref())
            .is_none();
        let limit_reached = original_limit.is_some_and(|l| total_returned >= l);

        Self {
            conn,
            query,
            items: first.items,
            index: 0,
            cursor: first.cursor,
            batch_size,
            exhausted: short_page || no_start_key || limit_reached,
            total_returned,
            original_limit,
        }
    }

    /// Whether another item may be available (buffered or fetchable).
    pub fn has_more(&self) -> bool {
        self.index < self.items.len() || !self.exhausted
    }

    /// Stops pagination: buffered items remain consumable, but no further
    /// page is fetched.
    pub fn close(&mut self) {
        self.exhausted = true;
    }

    /// Yields the next item, fetching the next page if the buffer ran out.
    pub async fn next(&mut self) -> Result<Option<Value>, ClientError> {
        while self.index >= self.items.len() {
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_next_page().await?;
        }

        let item = self.items[self.index].clone();
        self.index += 1;
        Ok(Some(item))
    }

    /// Eagerly drains all remaining items, fetching every remaining page.
    pub async fn to_array(&mut self) -> Result<Vec<Value>, ClientError> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await? {
            out.push(item);
        }
        Ok(out)
    }

    fn remaining_limit(&self) -> Option<u64> {
        self.original_limit
            .map(|l| l.saturating_sub(self.total_returned))
    }

    async fn fetch_next_page(&mut self) -> Result<(), ClientError> {
        let start_key = match self.cursor.as_ref().and_then(|c| c.start_key.clone()) {
            Some(key) => key,
            None => {
                self.exhausted = true;
                return Ok(());
            }
        };

        let op = match continuation_op(&self.query.op, self.remaining_limit()) {
            Some(op) => op,
            None => {
                // Adjusted limit hit zero: done regardless of server state.
                self.exhausted = true;
                return Ok(());
            }
        };

        let continuation = Query {
            op,
            cursor: Some(CursorSpec {
                start_key: Some(start_key),
                batch_size: Some(self.batch_size),
            }),
            options: self.query.options.clone(),
        };

        let page = match self.conn.query(&continuation).await {
            Ok(QueryOutcome::Page(page)) => page,
            Ok(_) => {
                self.exhausted = true;
                return Err(ClientError::UnexpectedResponse("paginated page"));
            }
            Err(e) => {
                // Any transport/protocol failure permanently exhausts the
                // cursor; items already buffered stay consumable.
                self.exhausted = true;
                return Err(e);
            }
        };

        let fetched = page.items.len();
        self.items.extend(page.items);
        self.total_returned += fetched as u64;
        self.cursor = page.cursor;

        let no_start_key = self
            .cursor
            .as_ref()
            .and_then(|c| c.start_key.as_ref())
            .is_none();
        if fetched < self.batch_size as usize
            || no_start_key
            || self.original_limit.is_some_and(|l| self.total_returned >= l)
        {
            self.exhausted = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionConfig;
    use quilldb_protocol::{
        CursorPage, Datum, Decoder, Encoder, Envelope, QueryResultPayload, Response,
    };
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn users_table() -> QueryOp {
        QueryOp::Table {
            source: Box::new(QueryOp::Database {
                name: "mydb".to_string(),
            }),
            name: "users".to_string(),
        }
    }

    fn offline_conn() -> Arc<Connection> {
        Arc::new(Connection::new(ConnectionConfig::new(
            "127.0.0.1:6090".parse().unwrap(),
        )))
    }

    fn page(items: Vec<Value>, start_key: Option<&str>, batch_size: u32) -> CursorResult {
        CursorResult {
            items,
            cursor: Some(CursorSpec {
                start_key: start_key.map(str::to_string),
                batch_size: Some(batch_size),
            }),
            metadata: None,
        }
    }

    #[test]
    fn test_find_limit_walks_source_chain() {
        let op = QueryOp::OrderBy {
            source: Box::new(QueryOp::Limit {
                source: Box::new(QueryOp::Skip {
                    source: Box::new(users_table()),
                    count: 10,
                }),
                count: 25,
            }),
            field: "age".to_string(),
            descending: false,
        };
        assert_eq!(find_limit(&op), Some(25));
        assert_eq!(find_limit(&users_table()), None);
    }

    #[test]
    fn test_continuation_elides_skip_and_shrinks_limit() {
        let op = QueryOp::Limit {
            source: Box::new(QueryOp::Skip {
                source: Box::new(users_table()),
                count: 10,
            }),
            count: 25,
        };

        let rewritten = continuation_op(&op, Some(7)).unwrap();
        assert_eq!(
            rewritten,
            QueryOp::Limit {
                source: Box::new(users_table()),
                count: 7,
            }
        );
    }

    #[test]
    fn test_continuation_stops_at_zero_limit() {
        let op = QueryOp::Limit {
            source: Box::new(users_table()),
            count: 25,
        };
        assert!(continuation_op(&op, Some(0)).is_none());
    }

    #[test]
    fn test_continuation_copies_other_ops() {
        let op = QueryOp::Filter {
            source: Box::new(QueryOp::Skip {
                source: Box::new(users_table()),
                count: 3,
            }),
            predicate: quilldb_protocol::Expression::Field {
                name: "active".to_string(),
            },
        };

        let rewritten = continuation_op(&op, None).unwrap();
        match rewritten {
            QueryOp::Filter { source, .. } => assert_eq!(*source, users_table()),
            other => panic!("expected filter, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_full_page_with_start_key_has_more() {
        let query = Query::new(users_table());
        let cursor = Cursor::new(
            offline_conn(),
            query,
            page(vec![json!(1), json!(2)], Some("k2"), 2),
        );
        assert!(cursor.has_more());
        assert!(!cursor.exhausted);
    }

    #[tokio::test]
    async fn test_short_page_exhausts_without_network() {
        let query = Query::new(users_table());
        // One item against a batch size of 2: no continuation possible.
        let mut cursor = Cursor::new(offline_conn(), query, page(vec![json!(1)], Some("k1"), 2));
        assert!(cursor.exhausted);

        // The connection was never connected; any fetch attempt would fail,
        // so a clean drain proves no network call happened.
        assert_eq!(cursor.next().await.unwrap(), Some(json!(1)));
        assert_eq!(cursor.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_start_key_exhausts_without_network() {
        let query = Query::new(users_table());
        let mut cursor = Cursor::new(
            offline_conn(),
            query,
            page(vec![json!(1), json!(2)], None, 2),
        );
        assert!(cursor.exhausted);
        assert_eq!(cursor.to_array().await.unwrap(), vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_close_stops_pagination() {
        let query = Query::new(users_table());
        let mut cursor = Cursor::new(
            offline_conn(),
            query,
            page(vec![json!(1), json!(2)], Some("k2"), 2),
        );
        cursor.close();
        assert_eq!(cursor.next().await.unwrap(), Some(json!(1)));
        assert_eq!(cursor.next().await.unwrap(), Some(json!(2)));
        assert_eq!(cursor.next().await.unwrap(), None);
    }

    /// Serves limit-page continuations and records each adjusted limit.
    async fn limit_server(
        listener: TcpListener,
        pages: Vec<(Vec<i64>, Option<&'static str>)>,
        seen_limits: tokio::sync::mpsc::UnboundedSender<u64>,
    ) {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut decoder = Decoder::new();
        let mut buf = vec![0u8; 4096];

        for (items, next_key) in pages {
            let envelope = loop {
                if let Some(envelope) = decoder.decode_envelope().unwrap() {
                    break envelope;
                }
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "client hung up early");
                decoder.extend(&buf[..n]);
            };

            let count = envelope.payload["limit"]["count"].as_u64().unwrap();
            seen_limits.send(count).unwrap();

            let body = Response::result(QueryResultPayload::Limit(CursorPage {
                items: items.into_iter().map(Datum::Int).collect(),
                cursor: next_key.map(|k| CursorSpec {
                    start_key: Some(k.to_string()),
                    batch_size: Some(2),
                }),
            }));
            let reply = Envelope::response(&envelope.query_id, &body).unwrap();
            stream
                .write_all(&Encoder::encode_envelope(&reply).unwrap())
                .await
                .unwrap();
        }
        // Keep the socket alive until the client is done iterating.
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn test_limit_caps_total_across_pages() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        // Two continuation pages: full, then final short page.
        tokio::spawn(limit_server(
            listener,
            vec![(vec![3, 4], Some("k4")), (vec![5], None)],
            tx,
        ));

        let conn = Arc::new(Connection::new(
            ConnectionConfig::new(addr).with_request_timeout(Duration::from_secs(2)),
        ));
        conn.connect().await.unwrap();
        let reader = conn.clone();
        tokio::spawn(async move { reader.read_loop().await });

        // Original query: limit 5, batch size 2, first page already served.
        let query = Query::new(QueryOp::Limit {
            source: Box::new(users_table()),
            count: 5,
        })
        .with_cursor(CursorSpec {
            start_key: None,
            batch_size: Some(2),
        });
        let first = page(vec![json!(1), json!(2)], Some("k2"), 2);

        let mut cursor = Cursor::new(conn, query, first);
        let all = cursor.to_array().await.unwrap();

        assert_eq!(all, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
        assert!(!cursor.has_more());

        // Each continuation asked for exactly the rows still owed.
        assert_eq!(rx.recv().await, Some(3));
        assert_eq!(rx.recv().await, Some(1));
    }

    #[tokio::test]
    async fn test_fetch_error_exhausts_but_keeps_buffer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            // Accept the continuation request, then hang up without replying.
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let _ = stream.read(&mut buf).await;
        });

        let conn = Arc::new(Connection::new(
            ConnectionConfig::new(addr).with_request_timeout(Duration::from_secs(2)),
        ));
        conn.connect().await.unwrap();
        let reader = conn.clone();
        tokio::spawn(async move { reader.read_loop().await });

        let query = Query::new(users_table());
        let mut cursor = Cursor::new(conn, query, page(vec![json!(1), json!(2)], Some("k2"), 2));

        assert_eq!(cursor.next().await.unwrap(), Some(json!(1)));
        assert_eq!(cursor.next().await.unwrap(), Some(json!(2)));

        // Buffer exhausted: the next call triggers a fetch, which fails
        // (as a closed connection or a broken pipe, depending on timing).
        let err = cursor.next().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::ConnectionClosed | ClientError::Io(_)
        ));
        assert!(!cursor.has_more());
        assert_eq!(cursor.next().await.unwrap(), None);
    }
}
