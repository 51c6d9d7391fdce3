// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Request body handling: content negotiation, gzip, size limits.

use std::io::Read;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use flate2::read::MultiGzDecoder;
use serde::de::DeserializeOwned;

use crate::error::IngestError;

/// Identity bodies up to this size are parsed on the request task. Larger
/// bodies, and every gzip body, are decoded on the blocking pool.
pub const INLINE_DECODE_LIMIT: usize = 64 * 1024;

/// How the request body is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Identity,
    Gzip,
}

impl BodyEncoding {
    /// Read `Content-Encoding`. A missing header means identity.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, IngestError> {
        let Some(value) = headers.get(CONTENT_ENCODING) else {
            return Ok(Self::Identity);
        };
        let value = value
            .to_str()
            .map_err(|_| IngestError::UnsupportedEncoding("<non-ascii>".to_string()))?
            .trim()
            .to_ascii_lowercase();

        match value.as_str() {
            "" | "identity" => Ok(Self::Identity),
            "gzip" | "x-gzip" => Ok(Self::Gzip),
            _ => Err(IngestError::UnsupportedEncoding(value)),
        }
    }
}

/// Reject protobuf bodies; anything else is parsed as JSON.
pub fn check_content_type(headers: &HeaderMap) -> Result<(), IngestError> {
    let Some(value) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return Ok(());
    };
    if value.to_ascii_lowercase().contains("protobuf") {
        return Err(IngestError::UnsupportedContentType(value.to_string()));
    }
    Ok(())
}

/// Inflate a gzip body, failing if it expands past `limit` bytes.
pub fn gunzip(compressed: &[u8], limit: usize) -> Result<Vec<u8>, IngestError> {
    let mut out = Vec::new();
    MultiGzDecoder::new(compressed)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| IngestError::Decompress(e.to_string()))?;

    if out.len() > limit {
        return Err(IngestError::BodyTooLarge { limit });
    }
    Ok(out)
}

fn received(body: Result<Bytes, BytesRejection>, limit: usize) -> Result<Bytes, IngestError> {
    let bytes = body.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => IngestError::BodyTooLarge { limit },
        _ => IngestError::Body(rejection.body_text()),
    })?;
    if bytes.len() > limit {
        return Err(IngestError::BodyTooLarge { limit });
    }
    Ok(bytes)
}

fn inflate(encoding: BodyEncoding, bytes: Bytes, limit: usize) -> Result<Bytes, IngestError> {
    match encoding {
        BodyEncoding::Identity => Ok(bytes),
        BodyEncoding::Gzip => gunzip(&bytes, limit).map(Bytes::from),
    }
}

fn decode_json<T: DeserializeOwned>(
    encoding: BodyEncoding,
    bytes: Bytes,
    limit: usize,
) -> Result<T, IngestError> {
    let json = inflate(encoding, bytes, limit)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Turn the extracted body into plain JSON bytes.
pub fn read_body(
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
    limit: usize,
) -> Result<Bytes, IngestError> {
    check_content_type(headers)?;
    let encoding = BodyEncoding::from_headers(headers)?;
    inflate(encoding, received(body, limit)?, limit)
}

/// Read and deserialize an OTLP JSON request body.
///
/// Small identity bodies are parsed inline; everything else runs on
/// [`tokio::task::spawn_blocking`] so inflation and large parses do not
/// stall other connections.
pub async fn parse_body<T>(
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
    limit: usize,
) -> Result<T, IngestError>
where
    T: DeserializeOwned + Send + 'static,
{
    check_content_type(headers)?;
    let encoding = BodyEncoding::from_headers(headers)?;
    let bytes = received(body, limit)?;

    if encoding == BodyEncoding::Identity && bytes.len() <= INLINE_DECODE_LIMIT {
        return decode_json(encoding, bytes, limit);
    }
    tokio::task::spawn_blocking(move || decode_json(encoding, bytes, limit))
        .await
        .map_err(|e| IngestError::Internal(format!("body decode task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_encoding_from_headers() {
        assert_eq!(
            BodyEncoding::from_headers(&HeaderMap::new()).unwrap(),
            BodyEncoding::Identity
        );
        assert_eq!(
            BodyEncoding::from_headers(&headers(&[("content-encoding", "GZIP")])).unwrap(),
            BodyEncoding::Gzip
        );
        assert!(matches!(
            BodyEncoding::from_headers(&headers(&[("content-encoding", "br")])),
            Err(IngestError::UnsupportedEncoding(e)) if e == "br"
        ));
    }

    #[test]
    fn test_protobuf_rejected() {
        assert!(check_content_type(&headers(&[("content-type", "application/json")])).is_ok());
        assert!(check_content_type(&HeaderMap::new()).is_ok());
        assert!(matches!(
            check_content_type(&headers(&[("content-type", "application/x-protobuf")])),
            Err(IngestError::UnsupportedContentType(_))
        ));
    }

    #[test]
    fn test_gunzip_round_trip_and_errors() {
        let payload = br#"{"resourceMetrics":[]}"#;
        assert_eq!(gunzip(&gzip(payload), 1024).unwrap(), payload);

        assert!(matches!(
            gunzip(b"definitely not gzip", 1024),
            Err(IngestError::Decompress(_))
        ));

        let big = vec![b'a'; 4096];
        assert!(matches!(
            gunzip(&gzip(&big), 1024),
            Err(IngestError::BodyTooLarge { limit: 1024 })
        ));
    }

    #[test]
    fn test_read_body() {
        let raw = Bytes::from_static(b"{}");
        assert_eq!(&*read_body(&HeaderMap::new(), Ok(raw), 16).unwrap(), b"{}");

        let compressed = Bytes::from(gzip(b"{}"));
        let h = headers(&[("content-encoding", "gzip")]);
        assert_eq!(&*read_body(&h, Ok(compressed), 1024).unwrap(), b"{}");

        let long = Bytes::from(vec![b' '; 32]);
        assert!(matches!(
            read_body(&HeaderMap::new(), Ok(long), 16),
            Err(IngestError::BodyTooLarge { limit: 16 })
        ));
    }

    #[tokio::test]
    async fn test_parse_body_invalid_json() {
        let result: Result<serde_json::Value, _> =
            parse_body(&HeaderMap::new(), Ok(Bytes::from_static(b"not json")), 1024).await;
        assert!(matches!(result, Err(IngestError::InvalidJson(_))));
    }

    #[tokio::test]
    async fn test_parse_body_off_task_paths() {
        let json = format!(r#"{{"pad":"{}"}}"#, "a".repeat(INLINE_DECODE_LIMIT));
        let limit = 1024 * 1024;

        let large: serde_json::Value =
            parse_body(&HeaderMap::new(), Ok(Bytes::from(json.clone())), limit)
                .await
                .unwrap();
        assert_eq!(large["pad"].as_str().map(str::len), Some(INLINE_DECODE_LIMIT));

        let h = headers(&[("content-encoding", "gzip")]);
        let inflated: serde_json::Value =
            parse_body(&h, Ok(Bytes::from(gzip(json.as_bytes()))), limit)
                .await
                .unwrap();
        assert_eq!(inflated, large);

        let bad: Result<serde_json::Value, _> =
            parse_body(&h, Ok(Bytes::from(gzip(b"{oops"))), limit).await;
        assert!(matches!(bad, Err(IngestError::InvalidJson(_))));
    }
}
