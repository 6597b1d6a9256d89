//! Multiplexed connection transport.
//!
//! One TCP connection carries any number of in-flight requests; replies are
//! matched to callers purely by the envelope's query id, so responses may
//! arrive in any order relative to sends. Each request carries its own
//! timeout; closing the connection rejects everything still pending.

use crate::error::ClientError;
use quilldb_protocol::{
    CursorSpec, Decoder, Encoder, Envelope, MessageType, Query, QueryResultPayload, Response,
    ResponseMetadata, ResponsePayload, WriteStats,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// The decoded shape of a paginated response page.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorResult {
    pub items: Vec<Value>,
    pub cursor: Option<CursorSpec>,
    pub metadata: Option<ResponseMetadata>,
}

/// Receipt for a write operation, decoded to native values.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub inserted: Vec<Value>,
    pub stats: WriteStats,
}

/// A decoded response, tagged by the operation kind that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// First page of a paginated result.
    Page(CursorResult),
    /// A single optional document.
    Document(Option<Value>),
    Count(u64),
    Write(WriteOutcome),
    Names(Vec<String>),
    Ack(bool),
    /// A scalar expression result.
    Value(Value),
    Pong,
    Plan(Value),
    Auth(Value),
}

/// Maps a decoded response body onto a typed outcome.
///
/// A response whose populated variant is `error` becomes a typed server
/// error here, rejecting exactly the originating request.
pub(crate) fn outcome_from_response(response: Response) -> Result<QueryOutcome, ClientError> {
    let metadata = response.metadata;
    let payload = match response.payload {
        ResponsePayload::Error(info) => return Err(ClientError::server(info)),
        ResponsePayload::Pong {} => return Ok(QueryOutcome::Pong),
        ResponsePayload::Plan(plan) => return Ok(QueryOutcome::Plan(plan)),
        ResponsePayload::Auth(auth) => return Ok(QueryOutcome::Auth(auth)),
        ResponsePayload::Result(payload) => payload,
    };

    let outcome = match payload {
        QueryResultPayload::Table(page)
        | QueryResultPayload::GetAll(page)
        | QueryResultPayload::Filter(page)
        | QueryResultPayload::OrderBy(page)
        | QueryResultPayload::Limit(page)
        | QueryResultPayload::Skip(page)
        | QueryResultPayload::Subquery(page) => QueryOutcome::Page(CursorResult {
            items: page.items.into_iter().map(|d| d.into_json()).collect(),
            cursor: page.cursor,
            metadata,
        }),
        QueryResultPayload::Get(doc) => {
            QueryOutcome::Document(doc.document.map(|d| d.into_json()))
        }
        QueryResultPayload::Count(c) => QueryOutcome::Count(c.count),
        QueryResultPayload::Insert(receipt)
        | QueryResultPayload::Update(receipt)
        | QueryResultPayload::Delete(receipt) => QueryOutcome::Write(WriteOutcome {
            inserted: receipt.inserted.into_iter().map(|d| d.into_json()).collect(),
            stats: receipt.stats,
        }),
        QueryResultPayload::TableList(list) | QueryResultPayload::DatabaseList(list) => {
            QueryOutcome::Names(list.names)
        }
        QueryResultPayload::TableCreate(ack)
        | QueryResultPayload::TableDrop(ack)
        | QueryResultPayload::DatabaseCreate(ack)
        | QueryResultPayload::DatabaseDrop(ack) => QueryOutcome::Ack(ack.ok),
        QueryResultPayload::Expression(v) => QueryOutcome::Value(v.value.into_json()),
    };
    Ok(outcome)
}

type PendingSender = oneshot::Sender<Result<Response, ClientError>>;

/// A multiplexed connection to a QuillDB server.
pub struct Connection {
    config: ConnectionConfig,
    /// Serializes connect attempts; holders of this lock never park on IO
    /// longer than the connect timeout.
    connect_lock: Mutex<()>,
    writer: Mutex<Option<WriteHalf<TcpStream>>>,
    reader: Mutex<Option<ReadHalf<TcpStream>>>,
    decoder: Mutex<Decoder>,
    /// Pending requests keyed by query id.
    pending: Mutex<HashMap<String, PendingSender>>,
    next_id: AtomicU64,
    connected: AtomicBool,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            connect_lock: Mutex::new(()),
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            decoder: Mutex::new(Decoder::new()),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(false),
        }
    }

    /// Connects to the server. Idempotent: a call while already connected
    /// is a no-op, and a call during an in-flight attempt awaits that
    /// attempt instead of dialing a second socket.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let _connecting = self.connect_lock.lock().await;
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        tracing::debug!("connecting to {}", self.config.addr);
        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| {
            tracing::debug!("connect timeout");
            ClientError::Timeout
        })?
        .map_err(ClientError::Io)?;

        stream.set_nodelay(true).ok();

        let (read_half, write_half) = tokio::io::split(stream);
        *self.writer.lock().await = Some(write_half);
        *self.reader.lock().await = Some(read_half);
        self.decoder.lock().await.clear();
        self.connected.store(true, Ordering::SeqCst);

        tracing::debug!("connected");
        Ok(())
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Generates a fresh correlation id: `query-{counter}-{wall clock ms}`.
    fn next_query_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        format!("query-{n}-{ms}")
    }

    /// Sends a query and awaits its typed outcome.
    pub async fn query(&self, query: &Query) -> Result<QueryOutcome, ClientError> {
        let id = self.next_query_id();
        let envelope = Envelope::query(&id, query).map_err(ClientError::Protocol)?;
        let response = self.roundtrip(id, envelope).await?;
        outcome_from_response(response)
    }

    /// Pings the server.
    pub async fn ping(&self) -> Result<(), ClientError> {
        let id = self.next_query_id();
        let envelope = Envelope::raw_query(&id, json!({ "ping": {} }));
        match outcome_from_response(self.roundtrip(id, envelope).await?)? {
            QueryOutcome::Pong => Ok(()),
            _ => Err(ClientError::UnexpectedResponse("pong")),
        }
    }

    async fn roundtrip(&self, id: String, envelope: Envelope) -> Result<Response, ClientError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }

        let encoded = Encoder::encode_envelope(&envelope)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        let written = {
            let mut writer_guard = self.writer.lock().await;
            match writer_guard.as_mut() {
                Some(writer) => writer.write_all(&encoded).await.map_err(ClientError::Io),
                None => Err(ClientError::NotConnected),
            }
        };
        if let Err(e) = written {
            // A request that never reached the wire has no reply to wait for.
            self.pending.lock().await.remove(&id);
            return Err(e);
        }
        tracing::debug!(query_id = %id, bytes = encoded.len(), "request sent");

        match tokio::time::timeout(self.config.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            // Sender dropped: the read loop cleared pending on close.
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                tracing::debug!(query_id = %id, "request timed out");
                self.pending.lock().await.remove(&id);
                Err(ClientError::Timeout)
            }
        }
    }

    /// Reads and dispatches responses (run this in a background task).
    ///
    /// Takes ownership of the read half, so no lock is held while parked
    /// in a read and `close()` can always proceed. Returns when the
    /// connection closes or a protocol error makes the stream unusable;
    /// either way every pending request is rejected.
    pub async fn read_loop(&self) -> Result<(), ClientError> {
        let mut reader = self
            .reader
            .lock()
            .await
            .take()
            .ok_or(ClientError::NotConnected)?;
        let mut buf = vec![0u8; self.config.read_buffer_size];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    self.shutdown_pending().await;
                    return Err(ClientError::Io(e));
                }
            };

            if n == 0 {
                tracing::debug!("connection closed by server");
                self.shutdown_pending().await;
                return Err(ClientError::ConnectionClosed);
            }

            let envelopes = {
                let mut decoder = self.decoder.lock().await;
                decoder.extend(&buf[..n]);

                let mut complete = Vec::new();
                loop {
                    match decoder.decode_envelope() {
                        Ok(Some(envelope)) => complete.push(envelope),
                        Ok(None) => break,
                        Err(e) => {
                            drop(decoder);
                            self.shutdown_pending().await;
                            return Err(ClientError::Protocol(e));
                        }
                    }
                }
                complete
            };

            for envelope in envelopes {
                self.dispatch(envelope).await;
            }
        }
    }

    async fn dispatch(&self, envelope: Envelope) {
        let id = envelope.query_id.clone();
        let result = match envelope.message_type {
            MessageType::Response => envelope.decode_response().map_err(ClientError::Protocol),
            MessageType::Error => match envelope.decode_error() {
                Ok(info) => Err(ClientError::server(info)),
                Err(e) => Err(ClientError::Protocol(e)),
            },
            MessageType::Query => {
                tracing::warn!(query_id = %id, "server sent a QUERY envelope, ignoring");
                return;
            }
        };

        match self.pending.lock().await.remove(&id) {
            Some(tx) => {
                let _ = tx.send(result);
            }
            // Late reply for a timed-out request, or a server bug. Either
            // way it is not attributable to a caller.
            None => tracing::warn!(query_id = %id, "response for unknown query id"),
        }
    }

    /// Marks the connection dead and rejects everything still pending.
    async fn shutdown_pending(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let mut pending = self.pending.lock().await;
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "rejecting pending requests");
        }
        // Dropping the senders rejects the awaiting side with ConnectionClosed.
        pending.clear();
    }

    /// Closes the connection, rejecting any pending requests.
    ///
    /// Pending requests are rejected first, before any lock the read loop
    /// could be holding, so callers are unblocked even while the read loop
    /// is parked in a read.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);
        self.shutdown_pending().await;

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        let _ = self.reader.lock().await.take();

        Ok(())
    }

    /// Returns the number of in-flight requests.
    pub fn pending_count(&self) -> usize {
        self.pending.try_lock().map(|p| p.len()).unwrap_or(0)
    }
}
