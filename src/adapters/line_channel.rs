//! Line-oriented channel over a duplex serial byte stream.
//!
//! A [`LineChannel`] owns both halves of an open serial stream. Writes go
//! straight to the write half. A background reader task splits the read half
//! on the configured delimiter and publishes every trimmed line to all current
//! subscribers, in arrival order. Lines that arrive while nobody is subscribed
//! are logged and dropped.
//!
//! Closing the channel (or losing the underlying stream) ends every
//! outstanding [`LineSubscription`], so a response collector waiting on it
//! settles at once instead of running into its deadline.

use crate::error::{St24Error, St24Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
    WriteHalf,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Anything that looks like a serial port to the engine.
pub trait SerialIo: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialIo for T {}

/// Boxed serial stream handed out by a device catalog.
pub type DynSerial = Box<dyn SerialIo>;

/// Lines buffered per subscriber before it starts lagging.
const LINE_CAPACITY: usize = 256;

/// Longest accepted line, terminator excluded. Longer lines are discarded.
pub const MAX_LINE_LEN: usize = 1024;

/// State shared between the channel handle and its reader task.
struct ChannelState {
    open: AtomicBool,
    lines: StdMutex<Option<broadcast::Sender<String>>>,
}

impl ChannelState {
    fn publish(&self, line: String) {
        let guard = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = guard.as_ref() {
            if tx.send(line).is_err() {
                trace!("no line subscribers");
            }
        }
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<String>> {
        let guard = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().map(broadcast::Sender::subscribe)
    }

    /// Marks the channel closed and ends every subscription.
    fn shutdown(&self) {
        self.open.store(false, Ordering::SeqCst);
        let mut guard = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        guard.take();
    }
}

struct ChannelInner {
    identifier: String,
    terminator: u8,
    writer: Mutex<WriteHalf<DynSerial>>,
    state: Arc<ChannelState>,
    reader: StdMutex<Option<JoinHandle<()>>>,
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        self.state.shutdown();
        let mut reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = reader.take() {
            handle.abort();
        }
    }
}

/// Open duplex line channel to one device.
///
/// Cheap to clone; all clones refer to the same link.
#[derive(Clone)]
pub struct LineChannel {
    inner: Arc<ChannelInner>,
}

impl LineChannel {
    /// Wrap an open serial stream and start splitting its input into lines.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(identifier: impl Into<String>, io: DynSerial, terminator: u8) -> Self {
        let identifier = identifier.into();
        let (read_half, write_half) = tokio::io::split(io);
        let (tx, _) = broadcast::channel(LINE_CAPACITY);

        let state = Arc::new(ChannelState {
            open: AtomicBool::new(true),
            lines: StdMutex::new(Some(tx)),
        });

        let reader = tokio::spawn(read_lines(
            read_half,
            terminator,
            state.clone(),
            identifier.clone(),
        ));

        Self {
            inner: Arc::new(ChannelInner {
                identifier,
                terminator,
                writer: Mutex::new(write_half),
                state,
                reader: StdMutex::new(Some(reader)),
            }),
        }
    }

    /// Device identifier this channel was opened on.
    pub fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    /// Whether the link is still usable.
    pub fn is_open(&self) -> bool {
        self.inner.state.open.load(Ordering::SeqCst)
    }

    /// Write raw bytes and flush. No acknowledgement is expected from the device.
    pub async fn write(&self, bytes: &[u8]) -> St24Result<()> {
        if !self.is_open() {
            return Err(St24Error::NotConnected);
        }
        let mut writer = self.inner.writer.lock().await;
        writer.write_all(bytes).await.map_err(St24Error::Write)?;
        writer.flush().await.map_err(St24Error::Write)
    }

    /// Write a command, appending the line terminator when it is missing.
    pub async fn write_command(&self, command: &str) -> St24Result<()> {
        let mut payload = command.as_bytes().to_vec();
        if payload.last() != Some(&self.inner.terminator) {
            payload.push(self.inner.terminator);
        }
        debug!(port = %self.inner.identifier, command = %command.trim(), "TX");
        self.write(&payload).await
    }

    /// Start receiving lines. Only lines arriving after this call are seen.
    pub fn subscribe(&self) -> LineSubscription {
        let rx = self.inner.state.subscribe().unwrap_or_else(|| {
            // Closed channel: hand out a subscription that ends immediately.
            let (tx, rx) = broadcast::channel(1);
            drop(tx);
            rx
        });
        LineSubscription { rx }
    }

    /// Close the link. Outstanding subscriptions end; further writes fail.
    pub async fn close(&self) {
        self.inner.state.shutdown();
        let handle = {
            let mut reader = self.inner.reader.lock().unwrap_or_else(|e| e.into_inner());
            reader.take()
        };
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
        let mut writer = self.inner.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!(port = %self.inner.identifier, error = %e, "shutdown of write half failed");
        }
    }
}

/// Receiving end of a [`LineChannel`]. Dropping it unsubscribes.
pub struct LineSubscription {
    rx: broadcast::Receiver<String>,
}

impl LineSubscription {
    /// Next line in arrival order, or `None` once the channel is closed.
    ///
    /// Cancel safe, so it can be raced against a deadline.
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(line) => return Some(line),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "line subscriber lagged, lines dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

async fn read_lines(
    read_half: ReadHalf<DynSerial>,
    terminator: u8,
    state: Arc<ChannelState>,
    identifier: String,
) {
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::with_capacity(128);
    let mut discarding = false;

    loop {
        buf.clear();
        let limit = (MAX_LINE_LEN + 1) as u64;
        match (&mut reader).take(limit).read_until(terminator, &mut buf).await {
            Ok(0) => {
                debug!(port = %identifier, "serial stream ended");
                break;
            }
            Ok(_) => {
                let terminated = buf.last() == Some(&terminator);
                if !terminated && buf.len() <= MAX_LINE_LEN {
                    debug!(port = %identifier, bytes = buf.len(), "stream ended mid-line");
                    break;
                }
                if discarding || !terminated {
                    if !discarding {
                        warn!(port = %identifier, max = MAX_LINE_LEN, "line too long, discarding");
                    }
                    discarding = !terminated;
                    continue;
                }
                buf.pop();
                let line = String::from_utf8_lossy(&buf).trim().to_string();
                debug!(port = %identifier, line = %line, "RX");
                state.publish(line);
            }
            Err(e) => {
                warn!(port = %identifier, error = %e, "serial read failed");
                break;
            }
        }
    }

    state.shutdown();
}
