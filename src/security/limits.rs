//! Request body limits.
//!
//! # Responsibilities
//! - Reject requests whose declared `Content-Length` exceeds the cap
//! - Read the body while enforcing the cap on the bytes actually received
//! - Give up on senders that stall mid-body
//!
//! # Design Decisions
//! - The declared check is only a cheap early exit; the header is untrusted
//! - The actual check always runs, so an under-reported length is still caught
//! - Reading stops as soon as the cap is crossed; nothing partial is returned
//! - The read deadline covers the whole body, not each chunk

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header::CONTENT_LENGTH, HeaderMap};
use futures_util::StreamExt;
use thiserror::Error;

use crate::config::{LimitsConfig, TimeoutConfig};

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Which check rejected the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCheck {
    Declared,
    Actual,
}

/// The body exceeds the configured cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("payload of {size} bytes exceeds limit of {limit} bytes ({check:?} check)")]
pub struct PayloadTooLarge {
    pub check: SizeCheck,
    pub size: usize,
    pub limit: usize,
}

/// Failure while reading a request body.
#[derive(Debug, Error)]
pub enum BodyReadError {
    #[error(transparent)]
    TooLarge(#[from] PayloadTooLarge),

    /// The transport failed or the client went away mid-body.
    #[error("failed to read request body: {0}")]
    Transport(#[source] axum::Error),

    /// The sender stopped before the body was complete.
    #[error("request body not received within {timeout:?} ({received} bytes read)")]
    TimedOut { timeout: Duration, received: usize },
}

/// Enforces the maximum body size before and after reading.
#[derive(Debug, Clone, Copy)]
pub struct PayloadGuard {
    max_bytes: usize,
    read_timeout: Duration,
}

impl PayloadGuard {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn from_config(limits: &LimitsConfig, timeouts: &TimeoutConfig) -> Self {
        Self::new(limits.max_body_bytes)
            .with_read_timeout(Duration::from_secs(timeouts.request_secs))
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Check the `Content-Length` header, if any.
    ///
    /// A missing or unparsable header passes; the actual check decides.
    pub fn check_declared(&self, headers: &HeaderMap) -> Result<(), PayloadTooLarge> {
        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        match declared {
            Some(size) if size > self.max_bytes as u64 => Err(PayloadTooLarge {
                check: SizeCheck::Declared,
                size: usize::try_from(size).unwrap_or(usize::MAX),
                limit: self.max_bytes,
            }),
            _ => Ok(()),
        }
    }

    /// Check the number of bytes actually received.
    pub fn check_actual(&self, len: usize) -> Result<(), PayloadTooLarge> {
        if len > self.max_bytes {
            return Err(PayloadTooLarge {
                check: SizeCheck::Actual,
                size: len,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Read the whole body, failing once more than `max_bytes` arrive or
    /// the read deadline passes.
    pub async fn read_body(&self, body: Body) -> Result<Bytes, BodyReadError> {
        let deadline = tokio::time::Instant::now() + self.read_timeout;
        let mut stream = body.into_data_stream();
        let mut buf: Vec<u8> = Vec::new();

        loop {
            let next = tokio::time::timeout_at(deadline, stream.next())
                .await
                .map_err(|_| BodyReadError::TimedOut {
                    timeout: self.read_timeout,
                    received: buf.len(),
                })?;
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(BodyReadError::Transport)?;
            self.check_actual(buf.len() + chunk.len())?;
            buf.extend_from_slice(&chunk);
        }

        self.check_actual(buf.len())?;
        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const MIB: usize = 1024 * 1024;

    fn with_length(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn declared_size_at_limit_passes() {
        let guard = PayloadGuard::new(MIB);
        assert!(guard.check_declared(&with_length("1048576")).is_ok());
    }

    #[test]
    fn declared_size_over_limit_fails() {
        let guard = PayloadGuard::new(MIB);
        let err = guard.check_declared(&with_length("1048577")).unwrap_err();
        assert_eq!(err.check, SizeCheck::Declared);
        assert_eq!(err.size, MIB + 1);
    }

    #[test]
    fn missing_or_garbage_length_passes_declared_check() {
        let guard = PayloadGuard::new(MIB);
        assert!(guard.check_declared(&HeaderMap::new()).is_ok());
        assert!(guard.check_declared(&with_length("lots")).is_ok());
        assert!(guard.check_declared(&with_length("-5")).is_ok());
    }

    #[test]
    fn huge_declared_length_fails() {
        let guard = PayloadGuard::new(MIB);
        let err = guard
            .check_declared(&with_length("18446744073709551615"))
            .unwrap_err();
        assert_eq!(err.check, SizeCheck::Declared);
    }

    #[test]
    fn actual_size_checks_boundary() {
        let guard = PayloadGuard::new(MIB);
        assert!(guard.check_actual(MIB).is_ok());
        assert_eq!(guard.check_actual(MIB + 1).unwrap_err().check, SizeCheck::Actual);
    }

    #[tokio::test]
    async fn reads_body_within_limit() {
        let guard = PayloadGuard::new(16);
        let bytes = guard.read_body(Body::from("hello")).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn reads_empty_body() {
        let guard = PayloadGuard::new(16);
        let bytes = guard.read_body(Body::empty()).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn streamed_body_over_limit_fails() {
        let guard = PayloadGuard::new(10);
        let chunks: Vec<Result<&'static str, std::io::Error>> =
            vec![Ok("12345"), Ok("67890"), Ok("x")];
        let body = Body::from_stream(futures_util::stream::iter(chunks));

        match guard.read_body(body).await {
            Err(BodyReadError::TooLarge(err)) => {
                assert_eq!(err.check, SizeCheck::Actual);
                assert_eq!(err.size, 11);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_error_is_reported() {
        let guard = PayloadGuard::new(1024);
        let chunks: Vec<Result<&'static str, std::io::Error>> = vec![
            Ok("partial"),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let body = Body::from_stream(futures_util::stream::iter(chunks));

        assert!(matches!(
            guard.read_body(body).await,
            Err(BodyReadError::Transport(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_body_times_out() {
        let guard = PayloadGuard::new(1024).with_read_timeout(Duration::from_secs(5));
        let first = futures_util::stream::iter(vec![Ok::<_, std::io::Error>("partial")]);
        let body = Body::from_stream(first.chain(futures_util::stream::pending()));

        match guard.read_body(body).await {
            Err(BodyReadError::TimedOut { timeout, received }) => {
                assert_eq!(timeout, Duration::from_secs(5));
                assert_eq!(received, 7);
            }
            other => panic!("expected TimedOut, got {other:?}"),
        }
    }

    #[test]
    fn read_timeout_comes_from_request_timeout() {
        let timeouts = TimeoutConfig { request_secs: 7 };
        let guard = PayloadGuard::from_config(&LimitsConfig::default(), &timeouts);
        assert_eq!(guard.read_timeout, Duration::from_secs(7));
        assert_eq!(guard.max_bytes(), 1_048_576);
    }
}
