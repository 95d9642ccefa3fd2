//! Per-connection JSONL framing.
//!
//! Each line read from a connection is one [`InboundMessage`]. Responses are
//! queued on a channel and written by a separate task, so a slow unit of work
//! never blocks reading the next request. Every request occupies one of a
//! fixed number of in-flight slots until its response has been written; when
//! all slots are taken the reader stops consuming input, which pushes back on
//! a peer that sends requests without reading the answers.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, warn};

use super::DISPATCH_TARGET;
use super::dispatcher::Dispatcher;
use super::message::{InboundMessage, MessageError};
use super::sink::{ChannelSink, QueuedResponse, ResponseSink};
use crate::transport::{ConnectionHandler, ConnectionReader, ConnectionStream, ConnectionWriter};

/// Serves JSONL requests from accepted connections.
pub(crate) struct DispatchConnectionHandler {
    dispatcher: Arc<Dispatcher>,
    max_request_bytes: usize,
    max_in_flight: usize,
}

impl DispatchConnectionHandler {
    pub(crate) fn new(
        dispatcher: Arc<Dispatcher>,
        max_request_bytes: usize,
        max_in_flight: usize,
    ) -> Self {
        Self {
            dispatcher,
            max_request_bytes,
            max_in_flight: max_in_flight.max(1),
        }
    }

    async fn serve(&self, reader: ConnectionReader, writer: ConnectionWriter, peer: String) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_responses(writer, receiver, peer.clone()));
        let slots = Arc::new(Semaphore::new(self.max_in_flight));

        let mut reader = BufReader::new(reader);
        loop {
            if slots.available_permits() == 0 {
                debug!(
                    target: DISPATCH_TARGET,
                    peer = %peer,
                    limit = self.max_in_flight,
                    "in-flight limit reached, reading paused"
                );
            }
            // The semaphore is never closed.
            let Ok(slot) = Arc::clone(&slots).acquire_owned().await else {
                break;
            };
            match read_frame(&mut reader, self.max_request_bytes).await {
                Ok(Frame::Line(line)) => self.handle_line(&line, &peer, &sender, slot),
                Ok(Frame::TooLarge) => warn!(
                    target: DISPATCH_TARGET,
                    peer = %peer,
                    limit = self.max_request_bytes,
                    "oversized message skipped"
                ),
                Ok(Frame::Eof) => break,
                Err(read_error) => {
                    warn!(
                        target: DISPATCH_TARGET,
                        peer = %peer,
                        error = %read_error,
                        "connection read failed"
                    );
                    break;
                }
            }
        }

        // In-flight units of work keep their own sink handles; the writer
        // drains their responses before it exits.
        drop(sender);
        if let Err(join_error) = writer_task.await {
            error!(
                target: DISPATCH_TARGET,
                peer = %peer,
                error = %join_error,
                "response writer aborted"
            );
        }
    }

    fn handle_line(
        &self,
        line: &[u8],
        peer: &str,
        sender: &UnboundedSender<QueuedResponse>,
        slot: OwnedSemaphorePermit,
    ) {
        let mut message = match InboundMessage::parse(line) {
            Ok(message) => message,
            Err(MessageError::Empty) => return,
            Err(parse_error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    peer = %peer,
                    error = %parse_error,
                    "malformed message skipped"
                );
                return;
            }
        };
        if message.source.is_empty() {
            peer.clone_into(&mut message.source);
        }

        let sink: Arc<dyn ResponseSink> = Arc::new(ChannelSink::holding(sender.clone(), slot));
        match self.dispatcher.dispatch(message, sink) {
            Ok(ticket) => debug!(
                target: DISPATCH_TARGET,
                peer = %peer,
                correlation_id = %ticket.correlation_id(),
                "request dispatched"
            ),
            Err(rejection) => debug!(
                target: DISPATCH_TARGET,
                peer = %peer,
                error = %rejection,
                "request answered without dispatch"
            ),
        }
    }
}

#[async_trait]
impl ConnectionHandler for DispatchConnectionHandler {
    async fn handle(&self, stream: ConnectionStream) {
        let peer = stream.peer();
        debug!(target: DISPATCH_TARGET, peer = %peer, "connection opened");
        let (reader, writer) = stream.into_split();
        self.serve(reader, writer, peer.clone()).await;
        debug!(target: DISPATCH_TARGET, peer = %peer, "connection closed");
    }
}

/// Writes queued responses in arrival order.
///
/// Each entry is dropped only after its line is flushed, which is when the
/// request's in-flight slot becomes free again.
async fn write_responses(
    mut writer: ConnectionWriter,
    mut responses: UnboundedReceiver<QueuedResponse>,
    peer: String,
) {
    while let Some(queued) = responses.recv().await {
        let response = queued.message();
        let line = match response.to_line() {
            Ok(line) => line,
            Err(encode_error) => {
                error!(
                    target: DISPATCH_TARGET,
                    peer = %peer,
                    correlation_id = %response.correlation_id,
                    error = %encode_error,
                    "response could not be framed"
                );
                continue;
            }
        };
        let written = async {
            writer.write_all(&line).await?;
            writer.flush().await
        };
        if let Err(write_error) = written.await {
            warn!(
                target: DISPATCH_TARGET,
                peer = %peer,
                error = %write_error,
                "response write failed"
            );
            break;
        }
    }
    if let Err(shutdown_error) = writer.shutdown().await {
        debug!(
            target: DISPATCH_TARGET,
            peer = %peer,
            error = %shutdown_error,
            "connection shutdown failed"
        );
    }
}

/// One unit read from the connection.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Line(Vec<u8>),
    TooLarge,
    Eof,
}

/// Reads the next newline-terminated frame of at most `limit` bytes.
///
/// An oversized frame is consumed up to its terminating newline and reported
/// as [`Frame::TooLarge`]. A final frame without a newline is still returned.
async fn read_frame<R>(reader: &mut R, limit: usize) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let read = (&mut *reader).take(cap).read_until(b'\n', &mut line).await?;
    if read == 0 {
        return Ok(Frame::Eof);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
        return Ok(Frame::Line(line));
    }
    if line.len() > limit {
        discard_line(reader).await?;
        return Ok(Frame::TooLarge);
    }
    Ok(Frame::Line(line))
}

async fn discard_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let buffer = reader.fill_buf().await?;
        if buffer.is_empty() {
            return Ok(());
        }
        if let Some(end) = buffer.iter().position(|byte| *byte == b'\n') {
            reader.consume(end + 1);
            return Ok(());
        }
        let consumed = buffer.len();
        reader.consume(consumed);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;
    use crate::dispatch::{CorrelationId, JsonCodec, OutboundMessage, Privilege, Registry};
    use crate::tests::support::request;

    async fn frames(input: &[u8], limit: usize) -> Vec<Frame> {
        let mut reader = input;
        let mut frames = Vec::new();
        loop {
            let frame = read_frame(&mut reader, limit).await.expect("in-memory read");
            if frame == Frame::Eof {
                return frames;
            }
            frames.push(frame);
        }
    }

    #[rstest]
    #[tokio::test]
    async fn lines_are_split_on_newlines() {
        let frames = frames(b"one\ntwo\nthree", 16).await;
        assert_eq!(
            frames,
            [
                Frame::Line(b"one".to_vec()),
                Frame::Line(b"two".to_vec()),
                Frame::Line(b"three".to_vec()),
            ]
        );
    }

    #[rstest]
    #[case::exactly_at_limit(b"abcd\nok\n".as_slice(), 4, Frame::Line(b"abcd".to_vec()))]
    #[case::one_over_limit(b"abcde\nok\n".as_slice(), 4, Frame::TooLarge)]
    #[case::far_over_limit(b"abcdefghijklmnop\nok\n".as_slice(), 4, Frame::TooLarge)]
    #[tokio::test]
    async fn oversized_lines_are_skipped_whole(
        #[case] input: &[u8],
        #[case] limit: usize,
        #[case] first: Frame,
    ) {
        let frames = frames(input, limit).await;
        assert_eq!(frames, [first, Frame::Line(b"ok".to_vec())]);
    }

    #[rstest]
    #[tokio::test]
    async fn an_unterminated_oversized_tail_ends_the_stream() {
        let frames = frames(b"ok\nxxxxxxxxxxxxxxxx", 4).await;
        assert_eq!(frames, [Frame::Line(b"ok".to_vec()), Frame::TooLarge]);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn a_peer_that_never_reads_stalls_the_reader() {
        const REQUESTS: u64 = 200;
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(Registry::new()),
            Arc::new(JsonCodec),
            Duration::from_secs(1),
        ));
        let handler = DispatchConnectionHandler::new(dispatcher, 1024, 2);
        let (client, server) = tokio::io::duplex(256);
        let (server_reader, server_writer) = tokio::io::split(server);
        let connection = tokio::spawn(async move {
            handler
                .serve(
                    Box::new(server_reader),
                    Box::new(server_writer),
                    "duplex".to_owned(),
                )
                .await;
        });

        let (client_reader, mut client_writer) = tokio::io::split(client);
        let mut input = Vec::new();
        for id in 0..REQUESTS {
            let unknown = request(id, "DoesNotExist", Privilege::Session, serde_json::Value::Null);
            input.extend(serde_json::to_vec(&unknown).expect("request encodes"));
            input.push(b'\n');
        }
        let sender = tokio::spawn(async move {
            client_writer.write_all(&input).await.expect("write requests");
            client_writer.shutdown().await.expect("close write half");
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(
            !sender.is_finished(),
            "the reader kept consuming requests nobody collects answers for"
        );

        let mut lines = BufReader::new(client_reader).lines();
        let mut answered = Vec::new();
        while let Some(line) = lines.next_line().await.expect("read response") {
            let response: OutboundMessage =
                serde_json::from_str(&line).expect("response decodes");
            assert!(!response.success);
            answered.push(response.correlation_id);
        }
        sender.await.expect("sender task");
        connection.await.expect("connection task");

        let expected: Vec<_> = (0..REQUESTS).map(CorrelationId::new).collect();
        assert_eq!(answered, expected);
    }
}
