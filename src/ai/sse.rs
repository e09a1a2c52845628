//! Server-Sent Events decoding for streamed completions.
//!
//! Turns a raw HTTP body, delivered as arbitrary byte chunks, into the
//! ordered sequence of `data:` payloads it carries. The `[DONE]` sentinel
//! ends the sequence.

use crate::{Error, Result};
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::VecDeque;

pub const DONE_SENTINEL: &str = "[DONE]";

struct SseState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
    saw_bytes: bool,
    saw_event: bool,
}

impl SseState {
    fn push(&mut self, chunk: &[u8]) {
        self.saw_bytes |= chunk.iter().any(|b| !b.is_ascii_whitespace());
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
        while let Some(pos) = find_event_boundary(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            self.take_event(&block[..pos]);
        }
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            let block = std::mem::take(&mut self.buffer);
            self.take_event(&block);
        }
    }

    fn take_event(&mut self, block: &[u8]) {
        if self.finished {
            return;
        }
        let Some(data) = parse_event(&String::from_utf8_lossy(block)) else {
            return;
        };
        self.saw_event = true;
        if data == DONE_SENTINEL {
            self.finished = true;
        } else {
            self.pending.push_back(data);
        }
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Extract the joined `data:` value of one event block.
///
/// Returns `None` for blocks without data (comments, keep-alives).
pub fn parse_event(block: &str) -> Option<String> {
    let data_lines: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

/// Decode an SSE body into its data payloads.
///
/// Events split across chunks, including multi-byte characters split at a
/// chunk edge, are reassembled before decoding. A transport error is
/// yielded once and ends the stream, as is a non-empty body that carried
/// no `data:` event at all.
pub fn data_events<S>(body: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let state = SseState {
        body: body.boxed(),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
        saw_bytes: false,
        saw_event: false,
    };

    stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        loop {
            if let Some(data) = state.pending.pop_front() {
                return Some((Ok(data), Some(state)));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.push(&chunk),
                Some(Err(e)) => {
                    tracing::error!("Stream interrupted: {}", e);
                    return Some((Err(e.into()), None));
                }
                None => {
                    state.flush();
                    state.finished = true;
                    if state.saw_bytes && !state.saw_event {
                        tracing::error!("Stream body carried no data events");
                        return Some((
                            Err(Error::AiProvider(
                                "Chat stream ended without any data events".to_string(),
                            )),
                            None,
                        ));
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn collect(chunks: Vec<&'static [u8]>) -> Vec<String> {
        let body = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, reqwest::Error>(Bytes::from_static(c))),
        );
        data_events(body)
            .map(|item| item.unwrap())
            .collect()
            .await
    }

    #[test]
    fn test_parse_event_ignores_other_fields() {
        assert_eq!(
            parse_event("event: message\nid: 7\ndata: {\"a\":1}"),
            Some("{\"a\":1}".to_string())
        );
        assert_eq!(parse_event(": keep-alive"), None);
    }

    #[test]
    fn test_parse_event_joins_multiline_data() {
        assert_eq!(
            parse_event("data: first\ndata: second"),
            Some("first\nsecond".to_string())
        );
    }

    #[tokio::test]
    async fn test_data_events_in_order() {
        let events = collect(vec![&b"data: one\n\ndata: two\n\n"[..]]).await;
        assert_eq!(events, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_data_events_reassembles_split_event() {
        let events = collect(vec![&b"da"[..], &b"ta: hel"[..], &b"lo\n"[..], &b"\ndata: x\n\n"[..]]).await;
        assert_eq!(events, vec!["hello", "x"]);
    }

    #[tokio::test]
    async fn test_data_events_handles_split_utf8() {
        // "é" is 0xC3 0xA9.
        let events = collect(vec![&b"data: caf\xC3"[..], &b"\xA9\n\n"[..]]).await;
        assert_eq!(events, vec!["café"]);
    }

    #[tokio::test]
    async fn test_data_events_stops_at_done() {
        let events = collect(vec![&b"data: a\n\ndata: [DONE]\n\ndata: late\n\n"[..]]).await;
        assert_eq!(events, vec!["a"]);
    }

    #[tokio::test]
    async fn test_data_events_accepts_crlf_and_trailing_event() {
        let events = collect(vec![&b": ping\r\n\r\ndata: a\r\n\r\ndata: tail"[..]]).await;
        assert_eq!(events, vec!["a", "tail"]);
    }

    #[tokio::test]
    async fn test_data_events_empty_body() {
        let events = collect(vec![]).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_data_events_rejects_body_without_events() {
        let body = stream::iter(vec![Ok::<_, reqwest::Error>(Bytes::from_static(
            b"{\"error\":{\"message\":\"model overloaded\"}}",
        ))]);
        let items: Vec<Result<String>> = data_events(body).collect().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::AiProvider(_))));
    }

    #[tokio::test]
    async fn test_data_events_done_only_is_empty_reply() {
        let events = collect(vec![&b"data: [DONE]\n\n"[..]]).await;
        assert!(events.is_empty());
    }
}
