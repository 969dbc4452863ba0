//! I/O traits and implementations
//!
//! Trait abstractions for line reading, frame writing, TCP connections, and
//! HTTP requests. The traits enable mockall-based testing without actual
//! network operations; the default implementations use TCP sockets and
//! reqwest for production use.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{FleetError, Result};

/// Connection pair containing a reader and writer
pub struct ConnectionPair {
    /// Reader for receiving frames
    pub reader: Box<dyn LineReader>,
    /// Writer for sending frames
    pub writer: Box<dyn MessageWriter>,
}

impl std::fmt::Debug for ConnectionPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPair").finish_non_exhaustive()
    }
}

// ============================================================================
// LineReader trait and implementations
// ============================================================================

/// Trait for reading newline-delimited frames from a connection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait LineReader: Send {
    /// Read one line from the connection
    ///
    /// Returns `Ok(Some(line))` if a line was read successfully,
    /// `Ok(None)` if the connection was closed (EOF),
    /// or an error if reading failed.
    async fn read_line(&mut self) -> Result<Option<String>>;
}

/// TCP implementation of LineReader using a buffered reader
pub struct TcpLineReader {
    reader: BufReader<ReadHalf<TcpStream>>,
    buffer: String,
}

impl TcpLineReader {
    pub fn new(reader: ReadHalf<TcpStream>) -> Self {
        Self {
            reader: BufReader::new(reader),
            buffer: String::new(),
        }
    }
}

#[async_trait]
impl LineReader for TcpLineReader {
    async fn read_line(&mut self) -> Result<Option<String>> {
        self.buffer.clear();
        match self.reader.read_line(&mut self.buffer).await {
            Ok(0) => Ok(None), // EOF
            Ok(_) => Ok(Some(self.buffer.trim().to_string())),
            Err(e) => Err(FleetError::Io(e)),
        }
    }
}

// ============================================================================
// MessageWriter trait and implementations
// ============================================================================

/// Trait for writing frames to a connection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait MessageWriter: Send {
    /// Write one frame, newline-terminated and flushed
    async fn write_message(&mut self, message: &str) -> Result<()>;

    /// Shutdown the writer
    async fn shutdown(&mut self) -> Result<()>;
}

/// TCP implementation of MessageWriter
pub struct TcpMessageWriter {
    writer: WriteHalf<TcpStream>,
}

impl TcpMessageWriter {
    pub fn new(writer: WriteHalf<TcpStream>) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl MessageWriter for TcpMessageWriter {
    async fn write_message(&mut self, message: &str) -> Result<()> {
        self.writer
            .write_all(format!("{}\n", message).as_bytes())
            .await
            .map_err(|e| FleetError::SendError(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| FleetError::SendError(e.to_string()))?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await.map_err(FleetError::Io)
    }
}

// ============================================================================
// ConnectionFactory trait and implementations
// ============================================================================

/// Trait for creating stream connections
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ConnectionFactory: Send + Sync {
    /// Attempt to connect to the specified address
    ///
    /// Returns a connection pair (reader and writer) on success.
    async fn connect(&self, addr: &str, timeout: Duration) -> Result<ConnectionPair>;
}

/// TCP implementation of ConnectionFactory
#[derive(Default, Clone)]
pub struct TcpConnectionFactory;

impl TcpConnectionFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConnectionFactory for TcpConnectionFactory {
    async fn connect(&self, addr: &str, timeout: Duration) -> Result<ConnectionPair> {
        debug!("Connecting to {} with timeout {:?}", addr, timeout);

        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| FleetError::Timeout(format!("Connection to {} timed out", addr)))?
            .map_err(|e| {
                FleetError::ConnectionFailed(format!("Failed to connect to {}: {}", addr, e))
            })?;

        debug!("TCP connection established to {}", addr);

        let (reader, writer) = tokio::io::split(stream);

        Ok(ConnectionPair {
            reader: Box::new(TcpLineReader::new(reader)),
            writer: Box::new(TcpMessageWriter::new(writer)),
        })
    }
}

// ============================================================================
// HttpClient trait and implementations
// ============================================================================

/// HTTP response from a request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Abstraction over HTTP for the downtime ledger
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a GET request to the given URL
    async fn get(&self, url: &str) -> Result<HttpResponse>;

    /// Send a DELETE request with a JSON body
    async fn delete_json(&self, url: &str, body: &str) -> Result<HttpResponse>;
}

/// Production HTTP client using reqwest, with an optional bearer credential
#[derive(Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl ReqwestHttpClient {
    pub fn new(bearer_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            bearer_token,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        debug!("GET {}", url);
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| FleetError::Http(format!("GET {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FleetError::Http(format!("Reading response body: {}", e)))?;

        debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse { status, body })
    }

    async fn delete_json(&self, url: &str, body: &str) -> Result<HttpResponse> {
        debug!("DELETE {}", url);
        let response = self
            .authorize(self.client.delete(url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| FleetError::Http(format!("DELETE {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FleetError::Http(format!("Reading response body: {}", e)))?;

        debug!("DELETE {} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}
