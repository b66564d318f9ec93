//! Public surface of the ST24 engine.
//!
//! [`St24Controller`] ties the connection lifecycle, the sequencer gate and
//! the poll sequencer together behind the five operations callers use:
//! list devices, open, close, send one manual command, and poll.

use crate::adapters::LineSubscription;
use crate::config::St24Config;
use crate::error::{St24Error, St24Result};
use crate::hardware::{Connection, DeviceCatalog, FramingConfig, SerialCatalog};
use crate::protocol::{PollResult, SequencerGate, Sequencer};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Acknowledgement of a manual command. Carries the command as requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAck {
    /// Command text exactly as passed to `send_raw`
    pub sent: String,
}

/// Single entry point to one ST24: owns the link, the gate and the sequencer.
pub struct St24Controller {
    connection: Connection,
    gate: SequencerGate,
    sequencer: Sequencer,
    config: St24Config,
}

impl St24Controller {
    /// Controller over any device catalog; nothing is opened yet.
    pub fn new(catalog: Box<dyn DeviceCatalog>, config: St24Config) -> Self {
        let sequencer = Sequencer::from_config(&config.protocol);
        Self {
            connection: Connection::new(catalog),
            gate: SequencerGate::new(),
            sequencer,
            config,
        }
    }

    /// Controller over the host's serial ports, filtered by the configured pattern.
    pub fn with_serial_catalog(config: St24Config) -> St24Result<Self> {
        let catalog = SerialCatalog::new(&config.serial.device_pattern)?;
        Ok(Self::new(Box::new(catalog), config))
    }

    /// Configuration the controller was built with.
    pub fn config(&self) -> &St24Config {
        &self.config
    }

    /// Identifiers of serial devices that look like they could be an ST24.
    pub fn list_candidate_devices(&self) -> St24Result<Vec<String>> {
        self.connection.list()
    }

    /// Open `identifier`, closing any link already open.
    ///
    /// `baud_rate` falls back to the configured default.
    pub async fn open_connection(&self, identifier: &str, baud_rate: Option<u32>) -> St24Result<()> {
        if identifier.trim().is_empty() {
            return Err(St24Error::Open {
                identifier: identifier.to_string(),
                reason: "missing device identifier".to_string(),
            });
        }

        let framing = FramingConfig::st24(baud_rate.unwrap_or(self.config.serial.baud_rate))
            .with_line_terminator(self.config.serial.terminator_byte());
        self.connection.open(identifier, &framing).await
    }

    /// Close the link. Returns whether one was open.
    pub async fn close_connection(&self) -> bool {
        self.connection.close().await
    }

    /// Whether a link is open and its stream still alive.
    pub async fn is_connected(&self) -> bool {
        self.connection.is_open().await
    }

    /// Whether a poll or manual command currently holds the sequencer.
    pub fn is_busy(&self) -> bool {
        self.gate.is_held()
    }

    /// Send one command outside the poll sequence.
    ///
    /// The line terminator is appended when missing. The command waits for a
    /// running poll to finish, up to `protocol.gate_timeout_ms`, so its bytes
    /// never land between two poll steps. Replies are not collected; watch
    /// them with [`subscribe_lines`](Self::subscribe_lines).
    ///
    /// # Errors
    /// - [`St24Error::InvalidCommand`] for an empty command
    /// - [`St24Error::NotConnected`] without an open link
    /// - [`St24Error::Busy`] if the poll did not finish in time
    /// - [`St24Error::Write`] if the bytes could not be written
    pub async fn send_raw(&self, command: &str) -> St24Result<SendAck> {
        if command.trim().is_empty() {
            return Err(St24Error::InvalidCommand("empty command".to_string()));
        }

        if !self.connection.is_open().await {
            return Err(St24Error::NotConnected);
        }
        let _gate = self
            .gate
            .acquire("manual", self.config.protocol.gate_timeout())
            .await?;

        // The link may have been replaced while waiting for the gate.
        let channel = self.connection.channel().await.ok_or(St24Error::NotConnected)?;
        channel.write_command(command).await?;
        info!(port = %channel.identifier(), command = %command.trim(), "manual command sent");

        Ok(SendAck {
            sent: command.to_string(),
        })
    }

    /// Receive every line from the open link, starting now.
    pub async fn subscribe_lines(&self) -> St24Result<LineSubscription> {
        let channel = self.connection.channel().await.ok_or(St24Error::NotConnected)?;
        Ok(channel.subscribe())
    }

    /// Run one full poll sequence and return the assembled result.
    ///
    /// Without an open link the result is `connected: false`; while another
    /// sequence holds the gate it is `busy: true`. Neither sends anything.
    pub async fn run_poll(&self) -> PollResult {
        let Some(channel) = self.connection.channel().await else {
            return PollResult::disconnected();
        };

        let Some(gate) = self.gate.try_acquire("poll") else {
            warn!(port = %channel.identifier(), "poll rejected, sequence already running");
            return PollResult::busy();
        };

        let snapshot = self.sequencer.run(&channel, &gate).await;
        drop(gate);

        PollResult::completed(snapshot)
    }
}
