//! The fixed poll sequence and the sequencer that runs it.
//!
//! One poll writes `$ R P H G ^S %` in that order, one command at a time.
//! Each write is followed by a response collection (bounded by the response
//! deadline), a parse into the step's domain, and a settle pause. Steps never
//! overlap and nothing in a step is fatal: a failed write or a silent device
//! just leaves that domain empty.

use super::collector::{CollectedBlock, ResponseCollector};
use super::gate::GateGuard;
use super::snapshot::Snapshot;
use super::telemetry::Domain;
use crate::adapters::LineChannel;
use crate::config::ProtocolConfig;
use std::time::Duration;
use tracing::{debug, error, info};

/// One command of a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandStep {
    /// Command text without terminator
    pub command: String,
    /// Pause after the response settles
    pub settle: Duration,
    /// Telemetry the response feeds, if any
    pub domain: Option<Domain>,
    /// Whether the response may open with a `>` start line
    pub expect_start: bool,
}

impl CommandStep {
    /// Step expecting the usual `>` start line.
    pub fn new(command: &str, settle: Duration, domain: Option<Domain>) -> Self {
        Self {
            command: command.to_string(),
            settle,
            domain,
            expect_start: true,
        }
    }
}

/// Ordered list of command steps.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSequence {
    steps: Vec<CommandStep>,
}

impl PollSequence {
    /// `$` opens the session and `%` releases it; the five in between feed
    /// one domain each. `settle` follows every step except the last.
    pub fn standard(settle: Duration) -> Self {
        let steps = [
            ("$", None),
            ("R", Some(Domain::Signal)),
            ("P", Some(Domain::Position)),
            ("H", Some(Domain::Inclinometer)),
            ("G", Some(Domain::Attitude)),
            ("^S", Some(Domain::Status)),
            ("%", None),
        ];
        let last = steps.len() - 1;
        let steps = steps
            .iter()
            .enumerate()
            .map(|(i, &(command, domain))| {
                let settle = if i == last { Duration::ZERO } else { settle };
                CommandStep::new(command, settle, domain)
            })
            .collect();
        Self { steps }
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[CommandStep] {
        &self.steps
    }
}

/// Runs a [`PollSequence`] against an open channel.
#[derive(Debug, Clone)]
pub struct Sequencer {
    sequence: PollSequence,
    response_timeout: Duration,
}

impl Sequencer {
    /// Sequencer with an explicit per-command deadline.
    pub fn new(sequence: PollSequence, response_timeout: Duration) -> Self {
        Self {
            sequence,
            response_timeout,
        }
    }

    /// Standard sequence with the configured timing.
    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(
            PollSequence::standard(config.settle_delay()),
            config.response_timeout(),
        )
    }

    /// The sequence this sequencer runs.
    pub fn sequence(&self) -> &PollSequence {
        &self.sequence
    }

    /// Run every step in order and merge the decoded records.
    ///
    /// Holding `_gate` is what makes the run exclusive; the guard is only
    /// borrowed so the caller decides when it drops.
    pub async fn run(&self, channel: &LineChannel, _gate: &GateGuard) -> Snapshot {
        let mut snapshot = Snapshot::default();

        for step in self.sequence.steps() {
            let block = self.execute_step(channel, step).await;

            if let Some(domain) = step.domain {
                match domain.parse(block.lines()) {
                    Some(record) => snapshot.insert(record),
                    None => debug!(
                        command = %step.command,
                        ?domain,
                        settlement = ?block.settlement(),
                        lines = ?block.lines(),
                        "no record decoded"
                    ),
                }
            }

            if !step.settle.is_zero() {
                tokio::time::sleep(step.settle).await;
            }
        }

        info!(
            port = %channel.identifier(),
            matched = snapshot.matched(),
            "poll sequence complete"
        );
        snapshot
    }

    /// Write one command and collect its response block.
    ///
    /// The subscription is taken before the write so no reply line can slip
    /// past. The response deadline starts once the write returns.
    pub async fn execute_step(&self, channel: &LineChannel, step: &CommandStep) -> CollectedBlock {
        let subscription = channel.subscribe();

        if let Err(e) = channel.write_command(&step.command).await {
            error!(
                port = %channel.identifier(),
                command = %step.command,
                error = %e,
                "command write failed"
            );
            return CollectedBlock::write_failed();
        }

        ResponseCollector::new(step.expect_start)
            .collect(subscription, self.response_timeout)
            .await
    }
}
