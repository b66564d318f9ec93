//! Serial device catalog and single-link connection lifecycle.
//!
//! The engine talks to physical devices only through [`DeviceCatalog`]:
//! enumerate candidate identifiers, and open one with fixed framing. The
//! production catalog ([`SerialCatalog`]) sits on `tokio-serial`; tests plug in
//! an in-memory catalog.
//!
//! [`Connection`] holds at most one open [`LineChannel`]. Opening a new link
//! always closes the previous one first, because the ST24 does not tolerate
//! two concurrent openers.

use crate::adapters::{DynSerial, LineChannel};
use crate::error::{St24Error, St24Result};
use regex::Regex;
use tokio::sync::RwLock;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};
use tracing::{debug, info};

/// Framing parameters for one serial link.
#[derive(Clone, Debug, PartialEq)]
pub struct FramingConfig {
    /// Baud rate (9600 for the ST24)
    pub baud_rate: u32,
    /// Data bits per character
    pub data_bits: DataBits,
    /// Stop bits per character
    pub stop_bits: StopBits,
    /// Parity checking
    pub parity: Parity,
    /// Hardware or software flow control
    pub flow_control: FlowControl,
    /// Byte that terminates each response line
    pub line_terminator: u8,
}

impl FramingConfig {
    /// 8N1, no flow control, carriage-return terminated lines.
    pub fn st24(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            line_terminator: b'\r',
        }
    }

    /// Same framing with another line terminator.
    pub fn with_line_terminator(mut self, terminator: u8) -> Self {
        self.line_terminator = terminator;
        self
    }
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self::st24(9600)
    }
}

/// Source of serial devices.
pub trait DeviceCatalog: Send + Sync {
    /// Identifiers of the devices that could be an ST24.
    fn list(&self) -> St24Result<Vec<String>>;

    /// Open one device with the given framing.
    fn open(&self, identifier: &str, framing: &FramingConfig) -> St24Result<DynSerial>;
}

/// Keep only the names matching the platform naming pattern, in input order.
pub fn filter_candidates<I>(names: I, pattern: &Regex) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    names.into_iter().filter(|n| pattern.is_match(n)).collect()
}

/// Catalog backed by the host's serial ports.
pub struct SerialCatalog {
    pattern: Regex,
}

impl SerialCatalog {
    /// # Errors
    /// Returns [`St24Error::Catalog`] if `pattern` is not a valid regex.
    pub fn new(pattern: &str) -> St24Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| St24Error::Catalog(format!("invalid device pattern: {e}")))?;
        Ok(Self { pattern })
    }
}

impl DeviceCatalog for SerialCatalog {
    fn list(&self) -> St24Result<Vec<String>> {
        let ports =
            tokio_serial::available_ports().map_err(|e| St24Error::Catalog(e.to_string()))?;
        let candidates = filter_candidates(ports.into_iter().map(|p| p.port_name), &self.pattern);
        debug!(?candidates, "serial ports found");
        Ok(candidates)
    }

    fn open(&self, identifier: &str, framing: &FramingConfig) -> St24Result<DynSerial> {
        let port = tokio_serial::new(identifier, framing.baud_rate)
            .data_bits(framing.data_bits)
            .parity(framing.parity)
            .stop_bits(framing.stop_bits)
            .flow_control(framing.flow_control)
            .open_native_async()
            .map_err(|e| St24Error::Open {
                identifier: identifier.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(port))
    }
}

/// Owner of the single live link.
pub struct Connection {
    catalog: Box<dyn DeviceCatalog>,
    link: RwLock<Option<LineChannel>>,
}

impl Connection {
    /// No link open until [`Connection::open`].
    pub fn new(catalog: Box<dyn DeviceCatalog>) -> Self {
        Self {
            catalog,
            link: RwLock::new(None),
        }
    }

    /// Candidate devices from the catalog.
    pub fn list(&self) -> St24Result<Vec<String>> {
        self.catalog.list()
    }

    /// Open `identifier`, closing any link that is already open.
    ///
    /// On failure no link is left open.
    pub async fn open(&self, identifier: &str, framing: &FramingConfig) -> St24Result<()> {
        let mut link = self.link.write().await;
        if let Some(previous) = link.take() {
            info!(port = %previous.identifier(), "closing previous link");
            previous.close().await;
        }

        let io = self.catalog.open(identifier, framing)?;
        *link = Some(LineChannel::spawn(identifier, io, framing.line_terminator));
        info!(port = %identifier, baud_rate = framing.baud_rate, "serial link open");
        Ok(())
    }

    /// Close the current link. Returns whether one was open.
    pub async fn close(&self) -> bool {
        let mut link = self.link.write().await;
        match link.take() {
            Some(channel) => {
                info!(port = %channel.identifier(), "serial link closed");
                channel.close().await;
                true
            }
            None => false,
        }
    }

    /// The open channel, if any. A link whose stream has ended counts as closed.
    pub async fn channel(&self) -> Option<LineChannel> {
        self.link
            .read()
            .await
            .as_ref()
            .filter(|c| c.is_open())
            .cloned()
    }

    /// Whether [`Connection::channel`] would return a channel.
    pub async fn is_open(&self) -> bool {
        self.channel().await.is_some()
    }
}
