//! Reframes an upstream SSE byte stream into the gateway's event protocol.
//!
//! Whatever the upstream, callers see exactly one shape:
//!
//! ```text
//! data: {"content":"<increment>"}\n\n
//! ...
//! data: [DONE]\n\n
//! ```
//!
//! [`StreamNormalizer`] is the synchronous core: bytes in, frames out.  It
//! holds back the trailing partial line of each chunk, so output does not
//! depend on where the network happened to split the upstream bytes.
//! [`normalize`] wraps it around an async byte stream.  It is pull-based:
//! the upstream is polled only when every frame produced so far has been
//! taken by the caller, so a slow caller slows the upstream read and nothing
//! accumulates.  A partial line longer than [`MAX_LINE_BYTES`] is treated
//! as a broken upstream: the caller stream closes without an end frame.
//! Dropping the returned stream drops the upstream body and with it the
//! upstream connection.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::json;

use crate::config::Provider;
use crate::error::LlmError;
use crate::llm::adapter::{ProviderAdapter, StreamDelta};

/// Upstream and gateway end-of-stream sentinel.
pub const DONE_SENTINEL: &str = "[DONE]";

/// The gateway's own end-of-stream frame.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Longest upstream line held while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Line-buffering state machine for one upstream stream.
pub struct StreamNormalizer {
    adapter: &'static dyn ProviderAdapter,
    /// Bytes after the last newline seen so far.
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
    /// Whether the end frame has been emitted.
    done_sent: bool,
    /// Set once a line outgrew [`MAX_LINE_BYTES`]; all later input is dropped.
    overflowed: bool,
}

impl StreamNormalizer {
    /// Create a normalizer for `provider`'s event format.
    pub fn new(provider: Provider) -> Self {
        Self {
            adapter: provider.adapter(),
            buffer: Vec::new(),
            scanned: 0,
            done_sent: false,
            overflowed: false,
        }
    }

    /// Whether the end frame has been emitted.
    pub fn is_done(&self) -> bool {
        self.done_sent
    }

    /// Whether a line exceeded [`MAX_LINE_BYTES`].  The stream is broken
    /// from that point on and should be closed without an end frame.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Feed one upstream chunk, returning the frames it completes.
    ///
    /// Only the newly appended bytes are searched for newlines.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let mut frames = Vec::new();
        if self.overflowed {
            return frames;
        }

        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.extend_from_slice(chunk);

        let mut start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = buffer[search_from..].iter().position(|&b| b == b'\n') {
            let end = search_from + offset;
            self.process_line(&buffer[start..=end], &mut frames);
            start = end + 1;
            search_from = start;
        }
        buffer.drain(..start);

        if buffer.len() > MAX_LINE_BYTES {
            self.overflowed = true;
            self.scanned = 0;
            return frames;
        }

        self.scanned = buffer.len();
        self.buffer = buffer;
        frames
    }

    /// Flush the held-back partial line at end of input.
    pub fn finish(&mut self) -> Vec<Bytes> {
        let mut frames = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if !rest.is_empty() && !self.overflowed {
            self.process_line(&rest, &mut frames);
        }
        frames
    }

    fn process_line(&mut self, raw: &[u8], frames: &mut Vec<Bytes>) {
        // Lines are complete here, so a multi-byte character split across
        // chunks has already been reassembled.
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        // Comments, `event:` lines and keep-alives.
        let Some(data) = line.strip_prefix("data:") else {
            tracing::trace!(line, "ignoring non-data stream line");
            return;
        };
        let data = data.trim_start();

        if data == DONE_SENTINEL {
            self.emit_done(frames);
            return;
        }

        match self.adapter.parse_stream_data(data) {
            Ok(StreamDelta::Text(text)) => frames.push(content_frame(&text)),
            Ok(StreamDelta::Done) => self.emit_done(frames),
            Ok(StreamDelta::Skip) => {}
            Err(e) => {
                tracing::debug!(error = %e, provider = %self.adapter.provider(), "skipping unparsable stream line");
            }
        }
    }

    fn emit_done(&mut self, frames: &mut Vec<Bytes>) {
        if !self.done_sent {
            self.done_sent = true;
            frames.push(Bytes::from_static(DONE_FRAME.as_bytes()));
        }
    }
}

/// Encode one text increment as a gateway frame.
pub fn content_frame(text: &str) -> Bytes {
    Bytes::from(format!("data: {}\n\n", json!({ "content": text })))
}

// ---------------------------------------------------------------------------
// Async relay
// ---------------------------------------------------------------------------

struct Relay<S> {
    upstream: S,
    normalizer: StreamNormalizer,
    pending: VecDeque<Bytes>,
    finished: bool,
}

/// Relay `upstream` through a [`StreamNormalizer`] for `provider`.
///
/// An upstream read error ends the output without a done frame, so callers
/// can tell a broken stream from a finished one.
pub fn normalize<S, E>(
    provider: Provider,
    upstream: S,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Display + Send + 'static,
{
    let relay = Relay {
        upstream,
        normalizer: StreamNormalizer::new(provider),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(relay, move |mut relay| async move {
        loop {
            if let Some(frame) = relay.pending.pop_front() {
                return Some((Ok(frame), relay));
            }
            if relay.finished {
                return None;
            }

            match relay.upstream.next().await {
                Some(Ok(chunk)) => {
                    relay.pending.extend(relay.normalizer.push(&chunk));
                    if relay.normalizer.overflowed() {
                        let err = LlmError::StreamError {
                            reason: format!("upstream line exceeds {MAX_LINE_BYTES} bytes"),
                        };
                        tracing::warn!(error = %err, %provider, "closing caller stream");
                        relay.finished = true;
                    }
                }
                Some(Err(e)) => {
                    let err = LlmError::StreamError {
                        reason: e.to_string(),
                    };
                    tracing::warn!(error = %err, %provider, "closing caller stream");
                    return None;
                }
                None => {
                    relay.pending.extend(relay.normalizer.finish());
                    relay.finished = true;
                    tracing::debug!(%provider, done = relay.normalizer.is_done(), "upstream stream ended");
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const OPENAI_STREAM: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n\n",
        "data: [DONE]\n\n",
    );

    const EXPECTED: &str = concat!(
        "data: {\"content\":\"A\"}\n\n",
        "data: {\"content\":\"B\"}\n\n",
        "data: [DONE]\n\n",
    );

    fn run(provider: Provider, chunks: &[&[u8]]) -> String {
        let mut normalizer = StreamNormalizer::new(provider);
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(normalizer.push(chunk));
        }
        out.extend(normalizer.finish());
        out.iter()
            .map(|b| String::from_utf8(b.to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn whole_stream() {
        assert_eq!(run(Provider::OpenAiCompatible, &[OPENAI_STREAM.as_bytes()]), EXPECTED);
    }

    #[test]
    fn one_byte_at_a_time() {
        let chunks: Vec<&[u8]> = OPENAI_STREAM.as_bytes().chunks(1).collect();
        assert_eq!(run(Provider::OpenAiCompatible, &chunks), EXPECTED);
    }

    #[test]
    fn every_split_point_gives_same_output() {
        let bytes = OPENAI_STREAM.as_bytes();
        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(run(Provider::OpenAiCompatible, &[a, b]), EXPECTED, "split at {split}");
        }
    }

    #[test]
    fn split_inside_data_prefix() {
        let second = OPENAI_STREAM.find("data: {\"choices\":[{\"delta\":{\"content\":\"B").unwrap();
        let bytes = OPENAI_STREAM.as_bytes();
        let chunks = [&bytes[..second + 3], &bytes[second + 3..second + 6], &bytes[second + 6..]];
        assert_eq!(run(Provider::OpenAiCompatible, &chunks), EXPECTED);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let stream = "data: {\"choices\":[{\"delta\":{\"content\":\"流程图\"}}]}\n";
        let chunks: Vec<&[u8]> = stream.as_bytes().chunks(1).collect();
        assert_eq!(
            run(Provider::OpenAiCompatible, &chunks),
            "data: {\"content\":\"流程图\"}\n\n"
        );
    }

    #[test]
    fn non_data_and_malformed_lines_are_skipped() {
        let stream = concat!(
            ": keep-alive\n",
            "event: message\n",
            "data: {not json}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
        );
        assert_eq!(
            run(Provider::OpenAiCompatible, &[stream.as_bytes()]),
            "data: {\"content\":\"ok\"}\n\n"
        );
    }

    #[test]
    fn trailing_partial_line_is_flushed() {
        let stream = "data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}";
        assert_eq!(
            run(Provider::OpenAiCompatible, &[stream.as_bytes()]),
            "data: {\"content\":\"tail\"}\n\n"
        );
    }

    #[test]
    fn frames_after_done_still_relay() {
        let stream = concat!(
            "data: [DONE]\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
            "data: [DONE]\n",
        );
        assert_eq!(
            run(Provider::OpenAiCompatible, &[stream.as_bytes()]),
            "data: [DONE]\n\ndata: {\"content\":\"late\"}\n\n"
        );
    }

    #[test]
    fn crlf_line_endings() {
        let stream = "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\r\n\r\ndata: [DONE]\r\n\r\n";
        assert_eq!(
            run(Provider::OpenAiCompatible, &[stream.as_bytes()]),
            "data: {\"content\":\"A\"}\n\ndata: [DONE]\n\n"
        );
    }

    #[test]
    fn anthropic_event_stream() {
        let stream = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_01\"}}\n\n",
            "event: content_block_start\n",
            "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
            "event: ping\n",
            "data: {\"type\":\"ping\"}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"lo\"}}\n\n",
            "event: content_block_stop\n",
            "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        let expected = "data: {\"content\":\"Hel\"}\n\ndata: {\"content\":\"lo\"}\n\ndata: [DONE]\n\n";

        assert_eq!(run(Provider::AnthropicCompatible, &[stream.as_bytes()]), expected);
        let chunks: Vec<&[u8]> = stream.as_bytes().chunks(7).collect();
        assert_eq!(run(Provider::AnthropicCompatible, &chunks), expected);
    }

    #[test]
    fn content_is_json_escaped() {
        let frame = content_frame("say \"hi\"\n<mxCell/>");
        assert_eq!(
            frame,
            Bytes::from_static(b"data: {\"content\":\"say \\\"hi\\\"\\n<mxCell/>\"}\n\n")
        );
    }

    #[tokio::test]
    async fn relay_preserves_order() {
        let chunks: Vec<Result<Bytes, String>> = OPENAI_STREAM
            .as_bytes()
            .chunks(5)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let out: Vec<Bytes> = normalize(Provider::OpenAiCompatible, futures::stream::iter(chunks))
            .map(|frame| match frame {
                Ok(bytes) => bytes,
                Err(never) => match never {},
            })
            .collect()
            .await;

        let text: String = out.iter().map(|b| String::from_utf8_lossy(b).into_owned()).collect();
        assert_eq!(text, EXPECTED);
    }

    #[tokio::test]
    async fn relay_stops_without_done_on_upstream_error() {
        let chunks: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n")),
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"partial")),
            Err("connection reset".into()),
            Ok(Bytes::from_static(b"data: [DONE]\n")),
        ];

        let out: Vec<Bytes> = normalize(Provider::OpenAiCompatible, futures::stream::iter(chunks))
            .filter_map(|frame| async move { frame.ok() })
            .collect()
            .await;

        assert_eq!(out, vec![content_frame("A")]);
    }

    #[test]
    fn oversized_line_marks_stream_broken() {
        let mut normalizer = StreamNormalizer::new(Provider::OpenAiCompatible);
        let chunk = vec![b'x'; 64 * 1024];

        let mut out = normalizer.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n");
        while !normalizer.overflowed() {
            out.extend(normalizer.push(&chunk));
        }
        assert_eq!(out, vec![content_frame("A")]);

        // Later input, including a newline and the sentinel, is dropped.
        assert!(normalizer.push(b"\ndata: [DONE]\n").is_empty());
        assert!(normalizer.finish().is_empty());
        assert!(!normalizer.is_done());
    }

    #[test]
    fn long_line_under_limit_still_parses() {
        let text = "y".repeat(MAX_LINE_BYTES / 2);
        let line = format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{text}\"}}}}]}}\n");
        let mut normalizer = StreamNormalizer::new(Provider::OpenAiCompatible);

        let mut out = Vec::new();
        for chunk in line.as_bytes().chunks(4096) {
            out.extend(normalizer.push(chunk));
        }
        assert!(!normalizer.overflowed());
        assert_eq!(out, vec![content_frame(&text)]);
    }

    #[tokio::test]
    async fn relay_closes_without_done_on_oversized_line() {
        let mut chunks: Vec<Result<Bytes, String>> = vec![Ok(Bytes::from_static(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n",
        ))];
        let filler = Bytes::from(vec![b'x'; 256 * 1024]);
        chunks.extend(std::iter::repeat_n(Ok(filler), 5));
        chunks.push(Ok(Bytes::from_static(b"\ndata: [DONE]\n")));

        let out: Vec<Bytes> = normalize(Provider::OpenAiCompatible, futures::stream::iter(chunks))
            .filter_map(|frame| async move { frame.ok() })
            .collect()
            .await;

        assert_eq!(out, vec![content_frame("A")]);
    }
}
