/// Sentinel lookup of the current primary
///
/// The sentinel is asked with one plaintext line,
/// `sentinel get-master-addr-by-name <name>`, over a fresh connection per
/// poll. Its reply is read once into a bounded buffer and split on `\r\n`.
/// For a healthy group the reply is the two-element array
/// `*2\r\n$<n>\r\n<host>\r\n$<n>\r\n<port>\r\n`, so host and port sit at
/// fixed positions 2 and 4 of the split. Those positions are the contract;
/// the reply is not parsed any further.
use super::PrimaryLocator;
use crate::core::PrimaryAddress;
use crate::error::{VigiaError, VigiaResult};
use crate::utils::with_default_host;
use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

const HOST_FIELD: usize = 2;
const PORT_FIELD: usize = 4;
const MIN_FIELDS: usize = 5;

/// Build the lookup line sent to the sentinel
pub fn query_command(master_name: &str) -> String {
    format!("sentinel get-master-addr-by-name {}\n", master_name)
}

/// Decode a sentinel reply into the primary address.
pub fn parse_reply(reply: &[u8]) -> VigiaResult<PrimaryAddress> {
    let text = String::from_utf8_lossy(reply);
    let fields: Vec<&str> = text.split("\r\n").collect();

    if fields.len() < MIN_FIELDS {
        return Err(VigiaError::malformed(format!(
            "expected at least {} fields, got {}: {:?}",
            MIN_FIELDS,
            fields.len(),
            text
        )));
    }

    let host = fields[HOST_FIELD];
    if host.is_empty() {
        return Err(VigiaError::malformed("empty host field"));
    }

    let port = fields[PORT_FIELD]
        .parse::<u16>()
        .map_err(|e| VigiaError::malformed(format!("invalid port {:?}: {}", fields[PORT_FIELD], e)))?;

    Ok(PrimaryAddress::new(host, port))
}

/// Sentinel client implementing the primary lookup
#[derive(Debug, Clone)]
pub struct SentinelClient {
    addr: String,
    master_name: String,
    connect_timeout: Duration,
    buffer_size: usize,
}

impl SentinelClient {
    pub fn new<S: Into<String>>(
        addr: S,
        master_name: S,
        connect_timeout: Duration,
        buffer_size: usize,
    ) -> Self {
        let addr: String = addr.into();
        Self {
            addr: with_default_host(&addr, "127.0.0.1"),
            master_name: master_name.into(),
            connect_timeout,
            buffer_size,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send the lookup line and read the reply. Both the connect and the
    /// reply wait are bounded by `connect_timeout`.
    async fn exchange(&self) -> VigiaResult<BytesMut> {
        let mut stream = timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| VigiaError::timeout(format!("connect to sentinel {}", self.addr)))?
            .map_err(|e| VigiaError::oracle_unreachable(self.addr.clone(), e))?;

        stream
            .write_all(query_command(&self.master_name).as_bytes())
            .await
            .map_err(|e| VigiaError::oracle_unreachable(self.addr.clone(), e))?;

        let mut reply = BytesMut::with_capacity(self.buffer_size);
        timeout(self.connect_timeout, stream.read_buf(&mut reply))
            .await
            .map_err(|_| VigiaError::timeout(format!("sentinel {} reply", self.addr)))?
            .map_err(|e| VigiaError::oracle_unreachable(self.addr.clone(), e))?;
        reply.truncate(self.buffer_size);

        Ok(reply)
    }
}

#[async_trait]
impl PrimaryLocator for SentinelClient {
    async fn locate(&self) -> VigiaResult<PrimaryAddress> {
        debug!(sentinel = %self.addr, master = %self.master_name, "Querying sentinel");

        let reply = self.exchange().await?;

        if reply.is_empty() {
            return Err(VigiaError::malformed("sentinel closed without replying"));
        }

        parse_reply(&reply)
    }

    fn describe(&self) -> String {
        format!("sentinel {} ({})", self.addr, self.master_name)
    }
}
