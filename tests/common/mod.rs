//! Common test utilities for st24_control integration tests
//!
//! This module provides:
//! - An in-memory device catalog handing out `tokio::io::duplex` streams
//! - A scripted fake ST24 that records the commands it receives

#![allow(dead_code)] // Utilities may not all be used by every test file

use regex::Regex;
use st24_control::adapters::DynSerial;
use st24_control::config::St24Config;
use st24_control::hardware::{filter_candidates, DeviceCatalog, FramingConfig};
use st24_control::{St24Controller, St24Error, St24Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

/// Catalog of in-memory devices. Each device can be opened once.
#[derive(Default)]
pub struct MockCatalog {
    names: Vec<String>,
    hosts: Mutex<HashMap<String, DuplexStream>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device and return the device end of its stream.
    pub fn add(&mut self, name: &str) -> DuplexStream {
        let (host, device) = tokio::io::duplex(1024);
        self.names.push(name.to_string());
        self.hosts.lock().unwrap().insert(name.to_string(), host);
        device
    }
}

impl DeviceCatalog for MockCatalog {
    fn list(&self) -> St24Result<Vec<String>> {
        let pattern = Regex::new(&St24Config::default().serial.device_pattern).unwrap();
        Ok(filter_candidates(self.names.clone(), &pattern))
    }

    fn open(&self, identifier: &str, _framing: &FramingConfig) -> St24Result<DynSerial> {
        match self.hosts.lock().unwrap().remove(identifier) {
            Some(host) => Ok(Box::new(host)),
            None => Err(St24Error::Open {
                identifier: identifier.to_string(),
                reason: "No such file or directory".to_string(),
            }),
        }
    }
}

/// Reply per command; `None` means the device stays silent.
pub type Script = HashMap<String, Option<String>>;

/// Replies of a healthy ST24, in the shapes seen on the wire.
pub fn standard_script() -> Script {
    [
        ("$", Some(">\r>\r")),
        ("R", Some(">L2234t2033N055F@@R1:35\r>\r")),
        ("P", Some(">\rE0372A1993p0015R0000\r*\r")),
        ("H", Some(">XT:+00.0, YT:-01.1, RP:+014.7:+014.8\r#\r")),
        ("G", Some(">\rRL:+00.1, PT:-01.1, YA:199.5\r>\r")),
        ("^S", Some(">\r0007\r#\r")),
        ("%", Some(">\r>\r")),
    ]
    .into_iter()
    .map(|(cmd, reply)| (cmd.to_string(), reply.map(str::to_string)))
    .collect()
}

/// Standard script with the given commands silenced.
pub fn script_silent_on(commands: &[&str]) -> Script {
    let mut script = standard_script();
    for cmd in commands {
        script.insert(cmd.to_string(), None);
    }
    script
}

/// Scripted ST24 on the device end of a duplex stream.
pub struct FakeSt24 {
    commands: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl FakeSt24 {
    pub fn spawn(device: DuplexStream, script: Script) -> Self {
        let commands = Arc::new(Mutex::new(Vec::new()));
        let log = commands.clone();

        let task = tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(device);
            let mut reader = BufReader::new(read_half);
            let mut buf = Vec::new();

            loop {
                buf.clear();
                match reader.read_until(b'\r', &mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let command = String::from_utf8_lossy(&buf).trim().to_string();
                log.lock().unwrap().push(command.clone());

                if let Some(Some(reply)) = script.get(&command) {
                    if write_half.write_all(reply.as_bytes()).await.is_err() {
                        break;
                    }
                }
            }
        });

        Self { commands, task }
    }

    /// Commands received so far, terminator stripped.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Yield until at least `count` commands have arrived.
    pub async fn wait_for_commands(&self, count: usize) -> Vec<String> {
        loop {
            let commands = self.commands();
            if commands.len() >= count {
                return commands;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Wait until the host side hangs up, then return every command received.
    pub async fn hung_up(self) -> Vec<String> {
        let FakeSt24 { commands, task } = self;
        let _ = task.await;
        let received = commands.lock().unwrap().clone();
        received
    }
}

/// Controller over `catalog` with default timing.
pub fn controller(catalog: MockCatalog) -> Arc<St24Controller> {
    Arc::new(St24Controller::new(Box::new(catalog), St24Config::default()))
}

/// Controller already connected to one fake ST24 running `script`.
pub async fn connected(script: Script) -> (Arc<St24Controller>, FakeSt24) {
    let mut catalog = MockCatalog::new();
    let device = catalog.add("/dev/ttyUSB0");
    let fake = FakeSt24::spawn(device, script);
    let controller = controller(catalog);
    controller
        .open_connection("/dev/ttyUSB0", None)
        .await
        .expect("open fake device");
    (controller, fake)
}

/// Yield until a poll or manual command holds the sequencer.
pub async fn wait_until_busy(controller: &St24Controller) {
    while !controller.is_busy() {
        tokio::task::yield_now().await;
    }
}
