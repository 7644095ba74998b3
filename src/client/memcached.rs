//! memcached ASCII protocol client
//!
//! Speaks the text protocol's `set` and `get` commands over a single blocking
//! TCP connection with Nagle disabled and read/write timeouts set, so a stalled
//! server surfaces as `ClientError::Io` instead of hanging a worker.

use super::{CacheClient, ClientError, GetResponse};
use crate::Result;
use anyhow::Context;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// Longest key the text protocol accepts
pub const MAX_KEY_LENGTH: usize = 250;

/// Largest value block accepted from the server (memcached's default item size)
pub const MAX_VALUE_LENGTH: usize = 1024 * 1024;

/// Blocking memcached text-protocol connection
pub struct MemcachedClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    line: Vec<u8>,
    request: Vec<u8>,
}

impl MemcachedClient {
    /// Connect to `addr` (host:port)
    ///
    /// # Arguments
    ///
    /// * `addr` - Server address, resolved with `ToSocketAddrs`
    /// * `timeout` - Connect timeout and per-request read/write timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not resolve or no resolved
    /// address accepts the connection.
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let addrs: Vec<_> = addr
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve {}", addr))?
            .collect();

        let mut last_err = None;
        for sock_addr in &addrs {
            match TcpStream::connect_timeout(sock_addr, timeout) {
                Ok(stream) => return Self::from_stream(stream, timeout),
                Err(e) => {
                    debug!(address = %sock_addr, error = %e, "connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e).with_context(|| format!("Failed to connect to {}", addr)),
            None => anyhow::bail!("{} did not resolve to any address", addr),
        }
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream, timeout: Duration) -> Result<Self> {
        stream.set_nodelay(true).context("Failed to set TCP_NODELAY")?;
        stream
            .set_read_timeout(Some(timeout))
            .context("Failed to set read timeout")?;
        stream
            .set_write_timeout(Some(timeout))
            .context("Failed to set write timeout")?;

        let writer = stream.try_clone().context("Failed to clone TCP stream")?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            line: Vec::with_capacity(128),
            request: Vec::with_capacity(4096),
        })
    }

    /// Read one `\r\n` terminated response line into `self.line` (terminator stripped)
    fn read_line(&mut self) -> std::result::Result<(), ClientError> {
        self.line.clear();
        let n = self.reader.read_until(b'\n', &mut self.line)?;
        if n == 0 {
            return Err(ClientError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        if !self.line.ends_with(b"\r\n") {
            return Err(ClientError::Protocol(format!(
                "unterminated response line: {}",
                String::from_utf8_lossy(&self.line)
            )));
        }
        self.line.truncate(self.line.len() - 2);
        Ok(())
    }

    fn line_str(&self) -> String {
        String::from_utf8_lossy(&self.line).into_owned()
    }

    /// Map a non-success response line to an error
    fn classify_error_line(&self) -> ClientError {
        let line = self.line_str();
        if line.starts_with("SERVER_ERROR")
            || line == "NOT_STORED"
            || line == "EXISTS"
            || line == "NOT_FOUND"
        {
            ClientError::Rejected(line)
        } else {
            ClientError::Protocol(format!("unexpected response: {}", line))
        }
    }
}

fn check_key(key: &[u8]) -> std::result::Result<(), ClientError> {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return Err(ClientError::Protocol(format!(
            "key length {} outside 1..={}",
            key.len(),
            MAX_KEY_LENGTH
        )));
    }
    if key.iter().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
        return Err(ClientError::Protocol(format!(
            "key contains whitespace or control bytes: {}",
            String::from_utf8_lossy(key)
        )));
    }
    Ok(())
}

impl CacheClient for MemcachedClient {
    fn set(&mut self, key: &[u8], value: &[u8], ttl: u32) -> std::result::Result<(), ClientError> {
        check_key(key)?;

        self.request.clear();
        self.request.extend_from_slice(b"set ");
        self.request.extend_from_slice(key);
        write!(self.request, " 0 {} {}\r\n", ttl, value.len())?;
        self.request.extend_from_slice(value);
        self.request.extend_from_slice(b"\r\n");
        self.writer.write_all(&self.request)?;

        self.read_line()?;
        if self.line == b"STORED" {
            Ok(())
        } else {
            Err(self.classify_error_line())
        }
    }

    fn get(&mut self, key: &[u8]) -> std::result::Result<GetResponse, ClientError> {
        check_key(key)?;

        self.request.clear();
        self.request.extend_from_slice(b"get ");
        self.request.extend_from_slice(key);
        self.request.extend_from_slice(b"\r\n");
        self.writer.write_all(&self.request)?;

        self.read_line()?;
        if self.line == b"END" {
            return Err(ClientError::NotFound);
        }
        if !self.line.starts_with(b"VALUE ") {
            return Err(self.classify_error_line());
        }

        // VALUE <key> <flags> <bytes> [<cas>]
        let header = self.line_str();
        let mut fields = header.split_ascii_whitespace().skip(2);
        let flags: u32 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| ClientError::Protocol(format!("bad VALUE header: {}", header)))?;
        let length: usize = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| ClientError::Protocol(format!("bad VALUE header: {}", header)))?;

        if length > MAX_VALUE_LENGTH {
            return Err(ClientError::Protocol(format!(
                "value length {} exceeds the {} byte limit",
                length, MAX_VALUE_LENGTH
            )));
        }
        let mut data = vec![0u8; length + 2];
        self.reader.read_exact(&mut data)?;
        if !data.ends_with(b"\r\n") {
            return Err(ClientError::Protocol(
                "value block not terminated by CRLF".to_string(),
            ));
        }
        data.truncate(length);

        self.read_line()?;
        if self.line != b"END" {
            return Err(ClientError::Protocol(format!(
                "expected END after value, got: {}",
                self.line_str()
            )));
        }

        Ok(GetResponse { value: data, flags })
    }

    fn name(&self) -> &'static str {
        "memcached"
    }
}
