//! Pooled one-shot transport strategy.
//!
//! An alternative to the multiplexed [`Connection`](crate::Connection):
//! each pooled socket carries exactly one in-flight request at a time, and
//! concurrency comes from growing the pool rather than from correlation
//! ids. Useful against servers or proxies that do not interleave replies.

use crate::connection::{outcome_from_response, QueryOutcome};
use crate::error::ClientError;
use quilldb_protocol::{Decoder, Encoder, Envelope, MessageType, Query};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Semaphore};

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Upper bound on pooled connections.
    pub max_connections: usize,
    /// Socket-level timeout applied to connect, write, and read.
    pub socket_timeout: Duration,
}

impl PoolConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            max_connections: 4,
            socket_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }
}

/// One pooled socket with its own receive buffer.
struct PooledTransport {
    stream: TcpStream,
    decoder: Decoder,
}

impl PooledTransport {
    /// Liveness check applied before reuse.
    fn validate(&self) -> bool {
        self.stream.peer_addr().is_ok()
    }
}

/// A bounded pool of one-shot transports.
pub struct PooledClient {
    config: PoolConfig,
    idle: Mutex<VecDeque<PooledTransport>>,
    permits: Semaphore,
    next_id: AtomicU64,
}

impl PooledClient {
    pub fn new(config: PoolConfig) -> Self {
        let permits = Semaphore::new(config.max_connections);
        Self {
            config,
            idle: Mutex::new(VecDeque::new()),
            permits,
            next_id: AtomicU64::new(1),
        }
    }

    /// Runs one query over a pooled transport and decodes its outcome.
    pub async fn query(&self, query: &Query) -> Result<QueryOutcome, ClientError> {
        let id = self.next_query_id();
        let envelope = Envelope::query(&id, query).map_err(ClientError::Protocol)?;
        let reply = self.send(&envelope).await?;

        match reply.message_type {
            MessageType::Response => {
                let response = reply.decode_response().map_err(ClientError::Protocol)?;
                outcome_from_response(response)
            }
            MessageType::Error => match reply.decode_error() {
                Ok(info) => Err(ClientError::server(info)),
                Err(e) => Err(ClientError::Protocol(e)),
            },
            MessageType::Query => Err(ClientError::UnexpectedResponse("response envelope")),
        }
    }

    fn next_query_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        format!("query-{n}-{ms}")
    }

    /// Sends one envelope and awaits the next complete inbound frame.
    ///
    /// The transport is returned to the pool on success and destroyed on
    /// failure; if acquisition itself fails, nothing was taken and nothing
    /// is released.
    pub async fn send(&self, envelope: &Envelope) -> Result<Envelope, ClientError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ClientError::PoolClosed)?;

        let mut transport = self.checkout().await?;
        match self.exchange(&mut transport, envelope).await {
            Ok(reply) => {
                self.idle.lock().await.push_back(transport);
                Ok(reply)
            }
            Err(e) => {
                // Broken transport: drop it instead of returning it.
                tracing::debug!(error = %e, "destroying pooled transport");
                Err(e)
            }
        }
    }

    /// Closes the pool: outstanding sends finish, new sends fail, idle
    /// sockets are shut down.
    pub async fn close(&self) {
        self.permits.close();
        let mut idle = self.idle.lock().await;
        for mut transport in idle.drain(..) {
            let _ = transport.stream.shutdown().await;
        }
    }

    /// Number of idle pooled connections.
    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }

    async fn checkout(&self) -> Result<PooledTransport, ClientError> {
        // Prefer a live idle transport; stale ones are discarded.
        loop {
            let candidate = self.idle.lock().await.pop_front();
            match candidate {
                Some(transport) if transport.validate() => return Ok(transport),
                Some(_) => continue,
                None => break,
            }
        }
        self.create().await
    }

    async fn create(&self) -> Result<PooledTransport, ClientError> {
        let stream = tokio::time::timeout(
            self.config.socket_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| ClientError::Timeout)?
        .map_err(ClientError::Io)?;
        stream.set_nodelay(true).ok();

        Ok(PooledTransport {
            stream,
            decoder: Decoder::new(),
        })
    }

    async fn exchange(
        &self,
        transport: &mut PooledTransport,
        envelope: &Envelope,
    ) -> Result<Envelope, ClientError> {
        let encoded = Encoder::encode_envelope(envelope)?;
        let timeout = self.config.socket_timeout;

        tokio::time::timeout(timeout, transport.stream.write_all(&encoded))
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(ClientError::Io)?;

        let mut buf = vec![0u8; 8 * 1024];
        loop {
            if let Some(reply) = transport.decoder.decode_envelope()? {
                return Ok(reply);
            }
            let n = tokio::time::timeout(timeout, transport.stream.read(&mut buf))
                .await
                .map_err(|_| ClientError::Timeout)?
                .map_err(ClientError::Io)?;
            if n == 0 {
                return Err(ClientError::ConnectionClosed);
            }
            transport.decoder.extend(&buf[..n]);
        }
    }
}
