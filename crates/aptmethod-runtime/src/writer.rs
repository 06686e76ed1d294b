//! The outbound half of the channel.
//!
//! Every message leaves through one writer task that owns the output:
//!
//! ```text
//! Handler 1 ─┐
//! Handler 2 ─┼─► mpsc::UnboundedSender<Bytes> ─► Writer Task ─► stdout
//! Runtime   ─┘
//! ```
//!
//! Callers encode the whole message before queueing it, and the task writes
//! each buffer with a single `write_all`, so messages from concurrent
//! handlers never interleave.

use std::fmt;
use std::io;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use aptmethod_protocol::records::{
    AuthorizationCredentials, AuthorizationRequired, AuxRequest, Configuration, Log, MediaChanged,
    MediaFailure, Redirect, Status, UriDone, UriFailure, UriStart, Warning,
};
use aptmethod_protocol::{Message, Record};
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::authz::AuthorizationBroker;
use crate::config::MethodConfig;
use crate::error::{MethodError, MethodResult};
use crate::media::{MediaAccess, MediaGate};

/// State shared between the runtime and every writer handle.
#[derive(Default)]
pub(crate) struct Shared {
    pub(crate) config: MethodConfig,
    pub(crate) configuration: RwLock<Configuration>,
    pub(crate) authz: AuthorizationBroker,
    pub(crate) media: MediaGate,
}

impl Shared {
    pub(crate) fn new(config: MethodConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }
}

/// Handle for sending messages to the parent.
///
/// This is cheaply cloneable; every handler task gets its own.
#[derive(Clone)]
pub struct MessageWriter {
    tx: mpsc::UnboundedSender<Outgoing>,
    shared: Arc<Shared>,
}

/// One encoded message, optionally acknowledged once flushed.
struct Outgoing {
    bytes: Bytes,
    flushed: Option<oneshot::Sender<()>>,
}

/// Spawns a writer task over `output` with default settings.
///
/// The task ends once every [`MessageWriter`] is dropped and returns the
/// output, or at the first write error.
pub fn spawn_writer_task<W>(output: W) -> (MessageWriter, JoinHandle<io::Result<W>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    spawn_with_shared(output, Arc::new(Shared::default()))
}

pub(crate) fn spawn_with_shared<W>(
    output: W,
    shared: Arc<Shared>,
) -> (MessageWriter, JoinHandle<io::Result<W>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(writer_loop(output, rx));
    (MessageWriter { tx, shared }, task)
}

async fn writer_loop<W>(mut output: W, mut rx: mpsc::UnboundedReceiver<Outgoing>) -> io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(Outgoing { bytes, flushed }) = rx.recv().await {
        output.write_all(&bytes).await?;
        output.flush().await?;
        trace!(bytes = bytes.len(), "Wrote message");
        if let Some(flushed) = flushed {
            let _ = flushed.send(());
        }
    }
    debug!("Writer task finished");
    Ok(output)
}

impl MessageWriter {
    /// Queues an already built message.
    pub fn write(&self, message: &Message) -> MethodResult<()> {
        self.enqueue(message, None)
    }

    /// Writes `record` and waits until it has been flushed to the output.
    ///
    /// Fails with [`MethodError::ConnectionClosed`] when the writer task
    /// stopped before flushing it.
    pub async fn send_flushed<R: Record>(&self, record: &R) -> MethodResult<()> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(&record.to_message()?, Some(tx))?;
        rx.await.map_err(|_| MethodError::ConnectionClosed)
    }

    fn enqueue(&self, message: &Message, flushed: Option<oneshot::Sender<()>>) -> MethodResult<()> {
        let bytes = Bytes::from(message.encode()?);
        self.tx
            .send(Outgoing { bytes, flushed })
            .map_err(|_| MethodError::ConnectionClosed)
    }

    /// Encodes and queues any record.
    pub fn send<R: Record>(&self, record: &R) -> MethodResult<()> {
        self.write(&record.to_message()?)
    }

    /// Sends a 101 Log. Empty text is rejected and nothing is written.
    pub fn log(&self, text: impl Into<String>) -> MethodResult<()> {
        self.send(&Log::new(text))
    }

    /// Sends a 102 Status.
    pub fn status(&self, text: impl Into<String>) -> MethodResult<()> {
        self.send(&Status::new(text))
    }

    /// Sends a 104 Warning.
    pub fn warning(&self, text: impl Into<String>) -> MethodResult<()> {
        self.send(&Warning::new(text))
    }

    /// `log` with `format_args!`.
    pub fn log_fmt(&self, args: fmt::Arguments<'_>) -> MethodResult<()> {
        self.log(args.to_string())
    }

    pub fn status_fmt(&self, args: fmt::Arguments<'_>) -> MethodResult<()> {
        self.status(args.to_string())
    }

    pub fn warning_fmt(&self, args: fmt::Arguments<'_>) -> MethodResult<()> {
        self.warning(args.to_string())
    }

    pub fn uri_start(&self, start: &UriStart) -> MethodResult<()> {
        self.send(start)
    }

    pub fn uri_done(&self, done: &UriDone) -> MethodResult<()> {
        self.send(done)
    }

    pub fn uri_failure(&self, failure: &UriFailure) -> MethodResult<()> {
        self.send(failure)
    }

    pub fn redirect(&self, redirect: &Redirect) -> MethodResult<()> {
        self.send(redirect)
    }

    pub fn aux_request(&self, request: &AuxRequest) -> MethodResult<()> {
        self.send(request)
    }

    /// Snapshot of the configuration received so far.
    pub fn configuration(&self) -> Configuration {
        self.shared
            .configuration
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Asks the parent for credentials for `site` and waits for them.
    ///
    /// Only the task that asked receives the answer; other requests keep
    /// running meanwhile.
    pub async fn authorize(&self, site: &str) -> MethodResult<AuthorizationCredentials> {
        let answer = self.shared.authz.register(site)?;
        self.send(&AuthorizationRequired::new(site))?;
        debug!(site, "Waiting for credentials");

        wait(answer, self.shared.config.authorization_timeout)
            .await
            .ok_or_else(|| MethodError::authorization_timeout(site))?
    }

    /// Takes shared access to the current media.
    ///
    /// Drop the returned guard before calling [`change_media`](Self::change_media)
    /// from the same task.
    pub async fn media_access(&self) -> MediaAccess {
        self.shared.media.access().await
    }

    /// Asks the parent to insert `media` into `drive` and waits for the
    /// confirmation.
    ///
    /// Waits first for all outstanding [`MediaAccess`] guards to be dropped,
    /// and holds new ones back until the parent answers.
    pub async fn change_media(&self, media: &str, drive: &str) -> MethodResult<MediaChanged> {
        let _exclusive = self.shared.media.exclusive().await;
        let answer = self.shared.media.register()?;
        self.send(&MediaFailure::new(media, drive))?;
        debug!(media, drive, "Waiting for media change");

        let changed = wait(answer, self.shared.config.media_change_timeout)
            .await
            .ok_or_else(|| MethodError::media_change_timeout(media))??;
        if changed.fail {
            return Err(MethodError::media_change_aborted(media));
        }
        Ok(changed)
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }
}

/// Awaits an interrupt answer. `None` on timeout.
async fn wait<T>(answer: oneshot::Receiver<T>, timeout: Option<Duration>) -> Option<MethodResult<T>> {
    let answer = async { answer.await.map_err(|_| MethodError::ConnectionClosed) };
    match timeout {
        Some(limit) => tokio::time::timeout(limit, answer).await.ok(),
        None => Some(answer.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aptmethod_protocol::CodecError;
    use aptmethod_protocol::ProtocolError;
    use tokio::io::AsyncReadExt;

    async fn written(writer: MessageWriter, task: JoinHandle<io::Result<tokio::io::DuplexStream>>, mut peer: tokio::io::DuplexStream) -> String {
        drop(writer);
        drop(task.await.unwrap().unwrap());
        let mut out = String::new();
        peer.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn writes_informational_messages() {
        let (output, peer) = tokio::io::duplex(4096);
        let (writer, task) = spawn_writer_task(output);

        writer.log("Connecting").unwrap();
        writer.status_fmt(format_args!("{} of {} files", 1, 2)).unwrap();

        let out = written(writer, task, peer).await;
        insta::assert_snapshot!(out.replace('\n', "|"), @"101 Log|Message: Connecting||102 Status|Message: 1 of 2 files||");
    }

    #[tokio::test]
    async fn empty_informational_writes_nothing() {
        let (output, peer) = tokio::io::duplex(4096);
        let (writer, task) = spawn_writer_task(output);

        let err = writer.warning("").unwrap_err();
        assert!(matches!(
            err,
            MethodError::Protocol(ProtocolError::Codec(CodecError::EmptyInformational { .. }))
        ));

        assert_eq!(written(writer, task, peer).await, "");
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_interleave() {
        let (output, peer) = tokio::io::duplex(64 * 1024);
        let (writer, task) = spawn_writer_task(output);

        let mut handles = Vec::new();
        for task_id in 0..8 {
            let writer = writer.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..25 {
                    let uri = format!("http://example.com/{task_id}/{n}");
                    writer.uri_done(&UriDone::new(uri, format!("/tmp/{task_id}-{n}"))).unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let out = written(writer, task, peer).await;
        let frames: Vec<_> = out.split_terminator("\n\n").collect();
        assert_eq!(frames.len(), 200);
        for frame in frames {
            let message = Message::decode(frame.as_bytes()).unwrap();
            let uri = message.fields().get("URI").unwrap();
            let (task_id, n) = uri
                .trim_start_matches("http://example.com/")
                .split_once('/')
                .unwrap();
            assert_eq!(message.fields().get("Filename"), Some(format!("/tmp/{task_id}-{n}").as_str()));
        }
    }

    #[tokio::test]
    async fn closed_writer_reports_connection_closed() {
        let (output, peer) = tokio::io::duplex(16);
        let (writer, task) = spawn_writer_task(output);
        drop(peer);

        // The first write fails inside the task and ends it.
        let _ = writer.log("lost");
        assert!(task.await.unwrap().is_err());
        assert!(matches!(writer.log("after"), Err(MethodError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn multi_line_text_is_rejected() {
        let (output, peer) = tokio::io::duplex(4096);
        let (writer, task) = spawn_writer_task(output);

        let forged = "line one\n\n600 URI Acquire\nURI: http://evil/x\nFilename: /etc/passwd";
        assert!(matches!(
            writer.send(&Log::new(forged)),
            Err(MethodError::Protocol(ProtocolError::InvalidFieldValue { .. }))
        ));
        writer.log("line one").unwrap();

        let out = written(writer, task, peer).await;
        assert_eq!(out, "101 Log\nMessage: line one\n\n");
    }

    #[tokio::test]
    async fn send_flushed_waits_for_the_write() {
        let (output, mut peer) = tokio::io::duplex(4096);
        let (writer, _task) = spawn_writer_task(output);

        writer.send_flushed(&Status::new("ready")).await.unwrap();
        let mut buffer = [0u8; 64];
        let n = peer.read(&mut buffer).await.unwrap();
        assert_eq!(&buffer[..n], b"102 Status\nMessage: ready\n\n");
    }

    #[tokio::test]
    async fn send_flushed_reports_failed_write() {
        let (output, peer) = tokio::io::duplex(16);
        let (writer, _task) = spawn_writer_task(output);
        drop(peer);

        assert!(matches!(
            writer.send_flushed(&Status::new("ready")).await,
            Err(MethodError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn media_change_timeout() {
        let (output, _peer) = tokio::io::duplex(4096);
        let shared = Shared::new(MethodConfig::default().with_media_change_timeout(Duration::from_millis(10)));
        let (writer, _task) = spawn_with_shared(output, Arc::new(shared));

        assert!(matches!(
            writer.change_media("Disc 2", "/media/cdrom").await,
            Err(MethodError::MediaChangeTimeout { ref media }) if media == "Disc 2"
        ));
        // The exclusive side is released, so readers get through again.
        drop(writer.media_access().await);
    }

    #[tokio::test]
    async fn authorization_timeout() {
        let (output, _peer) = tokio::io::duplex(4096);
        let shared = Shared::new(MethodConfig::default().with_authorization_timeout(Duration::from_millis(10)));
        let (writer, _task) = spawn_with_shared(output, Arc::new(shared));

        assert!(matches!(
            writer.authorize("a.example").await,
            Err(MethodError::AuthorizationTimeout { ref site }) if site == "a.example"
        ));
    }
}
