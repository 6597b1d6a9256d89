//! High-level client: owns the connection and its read task, and runs
//! builder terms to typed results.

use crate::connection::{Connection, ConnectionConfig, QueryOutcome, WriteOutcome};
use crate::error::ClientError;
use crate::result::QueryResult;
use crate::term::{compile, Term};
use quilldb_protocol::DEFAULT_PORT;
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub addr: SocketAddr,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            ..Self::default()
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

/// A QuillDB client over one multiplexed connection.
///
/// `connect` establishes the socket and spawns the background read task
/// that resolves responses by query id; any number of concurrent `run`
/// calls then share the connection.
pub struct Client {
    conn: Arc<Connection>,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Connects to the server at `addr` with default timeouts.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        Self::connect_with(ClientConfig::new(addr)).await
    }

    /// Connects with explicit configuration.
    pub async fn connect_with(config: ClientConfig) -> Result<Self, ClientError> {
        let conn = Arc::new(Connection::new(
            ConnectionConfig::new(config.addr)
                .with_connect_timeout(config.connect_timeout)
                .with_request_timeout(config.request_timeout),
        ));
        conn.connect().await?;

        let reader = Arc::clone(&conn);
        let read_task = tokio::spawn(async move {
            if let Err(e) = reader.read_loop().await {
                tracing::debug!(error = %e, "read loop terminated");
            }
        });

        Ok(Self {
            conn,
            read_task: Mutex::new(Some(read_task)),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Runs a term, returning the unified result facade: paginated
    /// operations stream through a cursor, everything else is one-shot.
    pub async fn run(&self, term: &Term) -> Result<QueryResult, ClientError> {
        let query = compile(term)?;
        let outcome = self.conn.query(&query).await?;
        Ok(QueryResult::from_outcome(
            outcome,
            query,
            Arc::clone(&self.conn),
        ))
    }

    /// Runs a point lookup to its optional document.
    pub async fn run_document(&self, term: &Term) -> Result<Option<Value>, ClientError> {
        match self.conn.query(&compile(term)?).await? {
            QueryOutcome::Document(doc) => Ok(doc),
            _ => Err(ClientError::UnexpectedResponse("document")),
        }
    }

    /// Runs a count to its number.
    pub async fn run_count(&self, term: &Term) -> Result<u64, ClientError> {
        match self.conn.query(&compile(term)?).await? {
            QueryOutcome::Count(count) => Ok(count),
            _ => Err(ClientError::UnexpectedResponse("count")),
        }
    }

    /// Runs a write to its receipt.
    pub async fn run_write(&self, term: &Term) -> Result<WriteOutcome, ClientError> {
        match self.conn.query(&compile(term)?).await? {
            QueryOutcome::Write(receipt) => Ok(receipt),
            _ => Err(ClientError::UnexpectedResponse("write receipt")),
        }
    }

    /// Runs a listing to its names.
    pub async fn run_names(&self, term: &Term) -> Result<Vec<String>, ClientError> {
        match self.conn.query(&compile(term)?).await? {
            QueryOutcome::Names(names) => Ok(names),
            _ => Err(ClientError::UnexpectedResponse("name list")),
        }
    }

    /// Runs a create/drop to its acknowledgement.
    pub async fn run_ack(&self, term: &Term) -> Result<bool, ClientError> {
        match self.conn.query(&compile(term)?).await? {
            QueryOutcome::Ack(ok) => Ok(ok),
            _ => Err(ClientError::UnexpectedResponse("ack")),
        }
    }

    /// Runs a bare expression to its value. An explain run returns the
    /// server's plan here as well.
    pub async fn run_value(&self, term: &Term) -> Result<Value, ClientError> {
        match self.conn.query(&compile(term)?).await? {
            QueryOutcome::Value(value) | QueryOutcome::Plan(value) => Ok(value),
            _ => Err(ClientError::UnexpectedResponse("value")),
        }
    }

    /// Pings the server.
    pub async fn ping(&self) -> Result<(), ClientError> {
        self.conn.ping().await
    }

    /// Closes the connection and stops the read task. Pending requests
    /// are rejected.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await?;
        if let Some(task) = self.read_task.lock().await.take() {
            task.abort();
        }
        Ok(())
    }
}
