//! Server-sent event decoding for streamed chat replies.
//!
//! Upstream streaming responses arrive as a byte stream of newline-delimited
//! `data: ` lines, each carrying a JSON chunk with an incremental text delta.
//! [`DeltaDecoder`] is the incremental push-parser; [`ReplyStream`] drives it
//! over a live response body.
//!
//! Chunks may split anywhere, including in the middle of a line or in the
//! middle of a multibyte UTF-8 character. Decoding a stream in one pass or in
//! many small chunks yields the identical fragment sequence.
//!
//! # Examples
//!
//! ```
//! use specter::sse::DeltaDecoder;
//!
//! let mut decoder = DeltaDecoder::new();
//! let fragments =
//!     decoder.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n");
//! assert_eq!(fragments, ["Hi"]);
//! ```

use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::error::{GatewayError, Result};

/// Line prefix carrying one streamed event.
const DATA_PREFIX: &str = "data: ";

/// End-of-stream marker sent by the provider. Yields no fragment; the
/// sequence still ends only when the underlying source ends.
const DONE_SENTINEL: &str = "[DONE]";

// ── Incremental decoder ───────────────────────────────────────

/// Incremental decoder from raw response bytes to reply text fragments.
///
/// Maintains two buffers: the tail bytes of a UTF-8 character split at a
/// chunk boundary, and the text of a line not yet terminated by a newline.
#[derive(Debug, Default)]
pub struct DeltaDecoder {
    /// Bytes of an incomplete UTF-8 sequence at the end of the last chunk.
    pending: Vec<u8>,
    /// Decoded text since the last newline.
    line_buffer: String,
}

impl DeltaDecoder {
    /// Create a fresh decoder. State is per-stream and never shared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes; returns the fragments its completed lines
    /// produced, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decode_utf8(chunk);
        let mut fragments = Vec::new();

        for ch in text.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.line_buffer);
                let line = line.strip_suffix('\r').unwrap_or(&line);
                if let Some(fragment) = decode_line(line) {
                    fragments.push(fragment);
                }
            } else {
                self.line_buffer.push(ch);
            }
        }

        fragments
    }

    /// Stream-aware UTF-8 decode.
    ///
    /// A multibyte character split across chunks is completed by the next
    /// chunk rather than corrupted: an incomplete trailing sequence is held
    /// back in `pending`. Genuinely invalid bytes become U+FFFD.
    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        out.push_str(text);
                    }
                    match err.error_len() {
                        // Incomplete sequence at the chunk boundary: wait
                        // for the rest of the character.
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                    }
                }
            }
        }
        out
    }
}

/// Decode one completed line into a text fragment, if it carries one.
///
/// Lines without the `data: ` prefix are ignored, as are `[DONE]` markers
/// and lines whose payload is not valid JSON (malformed or partial chunks
/// are skipped, not errors).
fn decode_line(line: &str) -> Option<String> {
    let data = line.strip_prefix(DATA_PREFIX)?;
    if data == DONE_SENTINEL {
        return None;
    }
    let parsed: serde_json::Value = serde_json::from_str(data).ok()?;
    let content = parsed["choices"][0]["delta"]["content"].as_str()?;
    if content.is_empty() {
        None
    } else {
        Some(content.to_owned())
    }
}

// ── Reply stream ──────────────────────────────────────────────

/// A lazy, finite sequence of reply fragments decoded from a byte stream.
///
/// Exactly one producer (the response body) and one consumer per instance;
/// [`next`](Self::next) suspends until a fragment is available, the source
/// closes, or the source errors. The stream is not restartable: once it has
/// closed or errored, further calls fail with
/// [`GatewayError::StreamClosed`]. Dropping the stream early releases the
/// underlying byte source.
pub struct ReplyStream {
    source: Option<Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>>,
    decoder: DeltaDecoder,
    ready: std::collections::VecDeque<String>,
}

impl ReplyStream {
    /// Wrap a fallible byte stream, e.g. `reqwest::Response::bytes_stream`.
    pub fn new<S, E>(source: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: std::fmt::Display,
    {
        let mapped = source.map(|item| item.map_err(|e| GatewayError::Stream(e.to_string())));
        Self {
            source: Some(Box::pin(mapped)),
            decoder: DeltaDecoder::new(),
            ready: std::collections::VecDeque::new(),
        }
    }

    /// The next text fragment.
    ///
    /// Returns `Ok(None)` exactly once, when the source ends; any trailing
    /// partial line is discarded rather than parsed. A read failure on the
    /// source terminates the sequence with [`GatewayError::Stream`].
    pub async fn next(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(fragment) = self.ready.pop_front() {
                return Ok(Some(fragment));
            }
            let Some(source) = self.source.as_mut() else {
                return Err(GatewayError::StreamClosed);
            };
            match source.next().await {
                Some(Ok(chunk)) => {
                    self.ready.extend(self.decoder.push(&chunk));
                }
                Some(Err(err)) => {
                    self.close();
                    return Err(err);
                }
                None => {
                    self.close();
                    return Ok(None);
                }
            }
        }
    }

    /// Drop the underlying byte source without draining it, releasing the
    /// transport. Subsequent [`next`](Self::next) calls fail.
    pub fn close(&mut self) {
        self.source = None;
    }

    /// Drain the remaining fragments into a single reply string.
    pub async fn collect_text(&mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await? {
            text.push_str(&fragment);
        }
        Ok(text)
    }
}

impl std::fmt::Debug for ReplyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyStream")
            .field("closed", &self.source.is_none())
            .field("ready", &self.ready.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use futures_util::stream;

    fn delta_line(content: &str) -> String {
        format!(
            "data: {}\n",
            serde_json::json!({"choices":[{"delta":{"content":content}}]})
        )
    }

    // ── decode_line ───────────────────────────────────────────

    #[test]
    fn line_without_data_prefix_ignored() {
        assert!(decode_line("event: ping").is_none());
        assert!(decode_line(": comment").is_none());
        assert!(decode_line("").is_none());
    }

    #[test]
    fn done_sentinel_yields_nothing() {
        assert!(decode_line("data: [DONE]").is_none());
    }

    #[test]
    fn malformed_json_skipped() {
        assert!(decode_line("data: {not json").is_none());
        assert!(decode_line("data: ").is_none());
    }

    #[test]
    fn missing_delta_content_skipped() {
        assert!(decode_line(r#"data: {"choices":[{"delta":{}}]}"#).is_none());
        assert!(decode_line(r#"data: {"choices":[]}"#).is_none());
    }

    #[test]
    fn empty_content_skipped() {
        assert!(decode_line(r#"data: {"choices":[{"delta":{"content":""}}]}"#).is_none());
    }

    #[test]
    fn content_extracted() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert_eq!(decode_line(line).as_deref(), Some("Hi"));
    }

    // ── DeltaDecoder ──────────────────────────────────────────

    #[test]
    fn single_chunk_single_fragment() {
        let mut decoder = DeltaDecoder::new();
        let fragments = decoder.push(delta_line("Hello").as_bytes());
        assert_eq!(fragments, ["Hello"]);
    }

    #[test]
    fn line_split_across_chunks() {
        let mut decoder = DeltaDecoder::new();
        let line = delta_line("Hello");
        let (a, b) = line.as_bytes().split_at(10);

        assert!(decoder.push(a).is_empty());
        assert_eq!(decoder.push(b), ["Hello"]);
    }

    #[test]
    fn crlf_line_endings() {
        let mut decoder = DeltaDecoder::new();
        let fragments =
            decoder.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\r\n");
        assert_eq!(fragments, ["ok"]);
    }

    #[test]
    fn multibyte_character_split_at_chunk_boundary() {
        let mut decoder = DeltaDecoder::new();
        // "é" is two bytes in UTF-8; split between them.
        let line = delta_line("café");
        let bytes = line.as_bytes();
        let split = line.find('é').unwrap() + 1;

        let mut fragments = decoder.push(&bytes[..split]);
        fragments.extend(decoder.push(&bytes[split..]));
        assert_eq!(fragments, ["café"]);
    }

    #[test]
    fn any_chunking_yields_identical_fragments() {
        // A stream with multibyte content, a [DONE] marker, a malformed
        // line, and a non-data line; split at every byte boundary.
        let mut raw = String::new();
        raw.push_str(&delta_line("héllo "));
        raw.push_str("data: not json\n");
        raw.push_str(": keep-alive\n");
        raw.push_str(&delta_line("wörld 🌒"));
        raw.push_str("data: [DONE]\n");
        let bytes = raw.as_bytes();

        let mut one_pass = DeltaDecoder::new();
        let expected = one_pass.push(bytes);
        assert_eq!(expected, ["héllo ", "wörld 🌒"]);

        for split in 0..=bytes.len() {
            let mut decoder = DeltaDecoder::new();
            let mut fragments = decoder.push(&bytes[..split]);
            fragments.extend(decoder.push(&bytes[split..]));
            assert_eq!(fragments, expected, "split at byte {split}");
        }
    }

    #[test]
    fn byte_at_a_time_matches_one_pass() {
        let raw = delta_line("déjà vu");
        let mut one_pass = DeltaDecoder::new();
        let expected = one_pass.push(raw.as_bytes());

        let mut decoder = DeltaDecoder::new();
        let mut fragments = Vec::new();
        for byte in raw.as_bytes() {
            fragments.extend(decoder.push(&[*byte]));
        }
        assert_eq!(fragments, expected);
    }

    #[test]
    fn invalid_bytes_become_replacement_character() {
        let mut decoder = DeltaDecoder::new();
        // 0xFF can never begin a UTF-8 sequence. It lands inside a line that
        // is not valid JSON, so the line is skipped rather than erroring.
        let fragments = decoder.push(b"data: \xFF\n");
        assert!(fragments.is_empty());
    }

    #[test]
    fn done_does_not_end_decoding() {
        let mut decoder = DeltaDecoder::new();
        let mut input = String::from("data: [DONE]\n");
        input.push_str(&delta_line("after"));
        let fragments = decoder.push(input.as_bytes());
        assert_eq!(fragments, ["after"]);
    }

    // ── ReplyStream ───────────────────────────────────────────

    fn ok_chunks(parts: &[&str]) -> Vec<std::result::Result<Bytes, std::io::Error>> {
        parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect()
    }

    #[tokio::test]
    async fn stream_yields_fragments_then_closes() {
        let body = format!("{}{}data: [DONE]\n", delta_line("Hello"), delta_line(" world"));
        let mut reply = ReplyStream::new(stream::iter(ok_chunks(&[body.as_str()])));

        assert_eq!(reply.next().await.unwrap().as_deref(), Some("Hello"));
        assert_eq!(reply.next().await.unwrap().as_deref(), Some(" world"));
        assert!(reply.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn polling_after_close_fails() {
        let mut reply = ReplyStream::new(stream::iter(ok_chunks(&["data: [DONE]\n"])));
        assert!(reply.next().await.unwrap().is_none());

        let err = reply.next().await.unwrap_err();
        assert!(matches!(err, GatewayError::StreamClosed));
    }

    #[tokio::test]
    async fn trailing_partial_line_discarded() {
        let mut body = delta_line("kept");
        // No trailing newline: this line is incomplete when the source ends.
        body.push_str(r#"data: {"choices":[{"delta":{"content":"dropped"}}]}"#);
        let mut reply = ReplyStream::new(stream::iter(ok_chunks(&[body.as_str()])));

        assert_eq!(reply.next().await.unwrap().as_deref(), Some("kept"));
        assert!(reply.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_failure_propagates_then_stream_is_closed() {
        let chunks: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(delta_line("one"))),
            Err(std::io::Error::other("connection reset")),
        ];
        let mut reply = ReplyStream::new(stream::iter(chunks));

        assert_eq!(reply.next().await.unwrap().as_deref(), Some("one"));
        let err = reply.next().await.unwrap_err();
        assert!(matches!(err, GatewayError::Stream(_)));
        assert!(matches!(
            reply.next().await.unwrap_err(),
            GatewayError::StreamClosed
        ));
    }

    #[tokio::test]
    async fn explicit_close_releases_source() {
        let mut reply = ReplyStream::new(stream::iter(ok_chunks(&[delta_line("unread").as_str()])));
        reply.close();
        assert!(matches!(
            reply.next().await.unwrap_err(),
            GatewayError::StreamClosed
        ));
    }

    #[tokio::test]
    async fn collect_text_concatenates_fragments() {
        let body = format!("{}{}", delta_line("Hel"), delta_line("lo"));
        let mut reply = ReplyStream::new(stream::iter(ok_chunks(&[body.as_str()])));
        assert_eq!(reply.collect_text().await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn fragments_identical_across_transport_chunking() {
        let body = format!("{}{}", delta_line("naïve"), delta_line(" résumé"));
        let bytes = body.as_bytes();

        let mut whole = ReplyStream::new(stream::iter(ok_chunks(&[body.as_str()])));
        let expected = whole.collect_text().await.unwrap();

        // Re-deliver the same bytes three at a time.
        let small: Vec<std::result::Result<Bytes, std::io::Error>> = bytes
            .chunks(3)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        let mut chunked = ReplyStream::new(stream::iter(small));
        assert_eq!(chunked.collect_text().await.unwrap(), expected);
    }
}
