//! Response collector: delimits one response block on the line stream.
//!
//! The ST24 has no length field and no checksum. A response block is
//! optionally opened by a `>` line and closed by one of `>`, `#` or `*`:
//!
//! ```text
//!   AWAITING_START --">"--------------> COLLECTING   (line discarded)
//!   AWAITING_START --other non-empty--> COLLECTING   (line buffered)
//!   COLLECTING     --">" | "#" | "*"--> DONE         (yield buffer)
//!   COLLECTING     --other non-empty--> COLLECTING   (line buffered)
//! ```
//!
//! Empty lines are ignored in every state. A per-command deadline races the
//! state machine; when it wins, whatever was buffered is returned, or the
//! single placeholder line `(timeout)` if nothing was.

use crate::adapters::LineSubscription;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Line that opens a response block.
pub const START_SENTINEL: &str = ">";

/// Lines that close a response block.
pub const TERMINAL_SENTINELS: [&str; 3] = [">", "#", "*"];

/// Sole line of a block that settled without any data.
pub const TIMEOUT_PLACEHOLDER: &str = "(timeout)";

/// Position of a [`ResponseCollector`] within one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// Waiting for an optional `>` start line
    AwaitingStart,
    /// Buffering data lines
    Collecting,
    /// Terminal sentinel seen
    Done,
}

/// How a block came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// A terminal sentinel arrived
    Terminated,
    /// The deadline elapsed first
    TimedOut,
    /// The channel closed while collecting
    ChannelClosed,
    /// The command could not be written, nothing was collected
    WriteFailed,
}

/// Lines gathered for one command, in arrival order, sentinels excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedBlock {
    lines: Vec<String>,
    settlement: Settlement,
}

impl CollectedBlock {
    fn settled(mut lines: Vec<String>, settlement: Settlement) -> Self {
        if settlement != Settlement::Terminated && lines.is_empty() {
            lines.push(TIMEOUT_PLACEHOLDER.to_string());
        }
        Self { lines, settlement }
    }

    /// Block for a step whose command never reached the device.
    pub fn write_failed() -> Self {
        Self {
            lines: Vec::new(),
            settlement: Settlement::WriteFailed,
        }
    }

    /// Data lines, or the timeout placeholder.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Take the lines out of the block.
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// How the block ended.
    pub fn settlement(&self) -> Settlement {
        self.settlement
    }

    /// Whether the deadline ended the block.
    pub fn timed_out(&self) -> bool {
        self.settlement == Settlement::TimedOut
    }
}

/// State machine for one response block.
#[derive(Debug)]
pub struct ResponseCollector {
    state: CollectorState,
    buffer: Vec<String>,
}

impl ResponseCollector {
    /// `expect_start` selects whether the block may open with a `>` line.
    pub fn new(expect_start: bool) -> Self {
        Self {
            state: if expect_start {
                CollectorState::AwaitingStart
            } else {
                CollectorState::Collecting
            },
            buffer: Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Advance on one trimmed line. Returns `true` once the block is complete.
    pub fn feed(&mut self, line: &str) -> bool {
        if line.is_empty() {
            return self.state == CollectorState::Done;
        }

        match self.state {
            CollectorState::AwaitingStart => {
                self.state = CollectorState::Collecting;
                if line != START_SENTINEL {
                    // Device sometimes omits the start sentinel.
                    self.buffer.push(line.to_string());
                }
            }
            CollectorState::Collecting => {
                if TERMINAL_SENTINELS.contains(&line) {
                    self.state = CollectorState::Done;
                } else {
                    self.buffer.push(line.to_string());
                }
            }
            CollectorState::Done => {}
        }

        self.state == CollectorState::Done
    }

    /// Close the block with the given outcome.
    pub fn finish(self, settlement: Settlement) -> CollectedBlock {
        CollectedBlock::settled(self.buffer, settlement)
    }

    /// Collect from `subscription` until a terminal sentinel, channel close,
    /// or `timeout` elapses, whichever comes first.
    ///
    /// The subscription is dropped (unsubscribed) on return.
    pub async fn collect(
        mut self,
        mut subscription: LineSubscription,
        timeout: Duration,
    ) -> CollectedBlock {
        let deadline = tokio::time::sleep_until(Instant::now() + timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                line = subscription.next_line() => match line {
                    Some(line) => {
                        if self.feed(&line) {
                            return self.finish(Settlement::Terminated);
                        }
                    }
                    None => {
                        debug!(buffered = self.buffer.len(), "channel closed while collecting");
                        return self.finish(Settlement::ChannelClosed);
                    }
                },

                _ = &mut deadline => {
                    warn!(
                        buffered = self.buffer.len(),
                        timeout_ms = timeout.as_millis() as u64,
                        "response deadline elapsed"
                    );
                    return self.finish(Settlement::TimedOut);
                }
            }
        }
    }
}
