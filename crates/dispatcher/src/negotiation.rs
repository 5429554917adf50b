//! Negotiation - the single request a client sends after connecting
//!
//! `<interval_ms>[ <encoding>]\n`, `\r\n` accepted. Clients that send the bare
//! number without a terminator are served from whatever arrived before the
//! deadline or EOF.

use std::time::Duration;

use contracts::{Encoding, ServerConfig};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{timeout_at, Instant};
use tracing::trace;

use crate::error::NegotiationError;

/// Longest accepted request, terminator excluded
pub const MAX_REQUEST_LEN: usize = 64;

/// What the client asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub interval: Duration,
    pub encoding: Encoding,
}

/// Server-side limits applied to requests
#[derive(Debug, Clone)]
pub struct NegotiationRules {
    pub timeout: Duration,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    pub default_encoding: Encoding,
}

impl NegotiationRules {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            timeout: config.negotiation_timeout(),
            min_interval_ms: config.min_interval_ms,
            max_interval_ms: config.max_interval_ms,
            default_encoding: config.default_encoding,
        }
    }
}

impl Default for NegotiationRules {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

/// Read and validate the request from `reader`
pub async fn negotiate<R>(
    reader: &mut R,
    rules: &NegotiationRules,
) -> Result<StreamRequest, NegotiationError>
where
    R: AsyncRead + Unpin,
{
    let deadline = Instant::now() + rules.timeout;
    let mut buf = Vec::with_capacity(MAX_REQUEST_LEN + 2);
    let mut chunk = [0u8; MAX_REQUEST_LEN + 2];
    let mut timed_out = false;

    loop {
        match timeout_at(deadline, reader.read(&mut chunk)).await {
            Err(_) => {
                timed_out = true;
                break;
            }
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
            Ok(Err(e)) => return Err(NegotiationError::Io(e)),
        }
        if let Some(end) = buf.iter().position(|b| *b == b'\n') {
            buf.truncate(end);
            break;
        }
        // room for a trailing '\r' before the '\n'
        if buf.len() > MAX_REQUEST_LEN + 1 {
            break;
        }
    }

    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    if buf.len() > MAX_REQUEST_LEN {
        return Err(NegotiationError::TooLong {
            len: buf.len(),
            max: MAX_REQUEST_LEN,
        });
    }
    if buf.is_empty() {
        return Err(if timed_out {
            NegotiationError::Timeout {
                waited_ms: rules.timeout.as_millis() as u64,
            }
        } else {
            NegotiationError::Empty
        });
    }

    let line = String::from_utf8_lossy(&buf);
    trace!(request = %line, timed_out, "negotiation request received");
    parse_request(&line, rules)
}

/// Validate one request line (terminator already stripped)
pub fn parse_request(line: &str, rules: &NegotiationRules) -> Result<StreamRequest, NegotiationError> {
    let mut tokens = line.split_whitespace();
    let interval = tokens.next().ok_or_else(|| NegotiationError::NotANumber {
        value: String::new(),
    })?;
    let encoding = tokens.next();
    if tokens.next().is_some() {
        return Err(NegotiationError::Malformed {
            line: line.to_string(),
        });
    }

    let interval_ms: u64 = interval.parse().map_err(|_| NegotiationError::NotANumber {
        value: interval.to_string(),
    })?;
    if interval_ms < rules.min_interval_ms || interval_ms > rules.max_interval_ms {
        return Err(NegotiationError::OutOfRange {
            interval_ms,
            min_ms: rules.min_interval_ms,
            max_ms: rules.max_interval_ms,
        });
    }

    let encoding = match encoding {
        None => rules.default_encoding,
        Some(token) => token
            .parse::<Encoding>()
            .map_err(|_| NegotiationError::UnknownEncoding {
                value: token.to_string(),
            })?,
    };

    Ok(StreamRequest {
        interval: Duration::from_millis(interval_ms),
        encoding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn rules() -> NegotiationRules {
        NegotiationRules {
            timeout: Duration::from_millis(100),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_interval_and_encoding() {
        let rules = rules();
        let req = parse_request("200", &rules).unwrap();
        assert_eq!(req.interval, Duration::from_millis(200));
        assert_eq!(req.encoding, Encoding::Text);

        assert_eq!(parse_request("1000 binary", &rules).unwrap().encoding, Encoding::Binary);
        assert_eq!(parse_request(" 50  json ", &rules).unwrap().encoding, Encoding::Text);
    }

    #[test]
    fn test_parse_rejections() {
        let rules = rules();
        let reason = |line: &str| parse_request(line, &rules).unwrap_err().reason();
        assert_eq!(reason("notanumber"), "not_a_number");
        assert_eq!(reason("-5"), "not_a_number");
        assert_eq!(reason("12.5"), "not_a_number");
        assert_eq!(reason("   "), "not_a_number");
        assert_eq!(reason("0"), "out_of_range");
        assert_eq!(reason("9"), "out_of_range");
        assert_eq!(reason("3600001"), "out_of_range");
        assert_eq!(reason("200 xml"), "unknown_encoding");
        assert_eq!(reason("200 text extra"), "malformed");
    }

    #[test]
    fn test_range_is_inclusive() {
        let rules = rules();
        assert!(parse_request("10", &rules).is_ok());
        assert!(parse_request("3600000", &rules).is_ok());
    }

    #[tokio::test]
    async fn test_negotiate_line_with_crlf() {
        let (mut client, mut server) = tokio::io::duplex(256);
        client.write_all(b"250 binary\r\n").await.unwrap();
        let req = negotiate(&mut server, &rules()).await.unwrap();
        assert_eq!(req.interval, Duration::from_millis(250));
        assert_eq!(req.encoding, Encoding::Binary);
    }

    #[tokio::test]
    async fn test_negotiate_split_across_reads() {
        let (mut client, mut server) = tokio::io::duplex(256);
        let task = tokio::spawn(async move {
            client.write_all(b"12").await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            client.write_all(b"00\n").await.unwrap();
            client
        });
        let req = negotiate(&mut server, &rules()).await.unwrap();
        assert_eq!(req.interval, Duration::from_millis(1200));
        drop(task.await.unwrap());
    }

    #[tokio::test]
    async fn test_legacy_bare_number_on_timeout() {
        let (mut client, mut server) = tokio::io::duplex(256);
        client.write_all(b"500").await.unwrap();
        let req = negotiate(&mut server, &rules()).await.unwrap();
        assert_eq!(req.interval, Duration::from_millis(500));
        drop(client);
    }

    #[tokio::test]
    async fn test_legacy_bare_number_then_eof() {
        let (mut client, mut server) = tokio::io::duplex(256);
        client.write_all(b"300").await.unwrap();
        drop(client);
        let req = negotiate(&mut server, &rules()).await.unwrap();
        assert_eq!(req.interval, Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_silence_times_out() {
        let (_client, mut server) = tokio::io::duplex(256);
        let err = negotiate(&mut server, &rules()).await.unwrap_err();
        assert_eq!(err.reason(), "timeout");
    }

    #[tokio::test]
    async fn test_immediate_eof_is_empty() {
        let (client, mut server) = tokio::io::duplex(256);
        drop(client);
        let err = negotiate(&mut server, &rules()).await.unwrap_err();
        assert_eq!(err.reason(), "empty");
    }

    #[tokio::test]
    async fn test_too_long() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(&[b'1'; 200]).await.unwrap();
        let err = negotiate(&mut server, &rules()).await.unwrap_err();
        assert_eq!(err.reason(), "too_long");

        let (mut client, mut server) = tokio::io::duplex(1024);
        let mut line = vec![b'1'; MAX_REQUEST_LEN + 1];
        line.push(b'\n');
        client.write_all(&line).await.unwrap();
        assert_eq!(negotiate(&mut server, &rules()).await.unwrap_err().reason(), "too_long");
    }
}
