//! NFC session driver.
//!
//! The driver owns the state machine and is the only task that runs
//! transitions. It polls the NFC reader for tags and, between polls, serves
//! operator commands from a bounded queue:
//!
//! ```text
//!            ┌────────────┐  poll()   ┌──────────────┐
//!            │ NFC reader │◄──────────│              │──► LockerStateMachine
//!            └────────────┘           │ SessionDriver│
//!  SessionHandle ──► command queue ──►│              │──► watch<LockerState>
//!                                     └──────────────┘
//! ```
//!
//! A tag that stays on the reader is reported on every poll. Only the first
//! detection is dispatched; the tag has to leave the field (one empty poll)
//! before it counts as a new presentation.

use crate::error::{ControllerError, StateMachineError};
use crate::state_machine::{DispatchOutcome, LockerSignal, LockerStateMachine, LockerStatus};
use bikelocker_core::{LockerState, NfcConfig, TagId};
use bikelocker_hardware::{ActuatorCommand, AnyNfcReader, NfcReader, TagRead};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Operator request served by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Signal(LockerSignal),
    Transition(LockerState),
    Actuator(ActuatorCommand),
    ClearFault(LockerState),
    Status,
}

/// Successful answer to a [`SessionCommand`].
#[derive(Debug, Clone, Serialize)]
pub enum CommandReply {
    Outcome(DispatchOutcome),
    Done(LockerState),
    Status(LockerStatus),
}

/// How the driver task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionExit {
    /// Shutdown was requested.
    Cancelled,
    /// The reader never came up; the driver disabled itself.
    InitFailed { attempts: u32 },
}

type Reply = oneshot::Sender<Result<CommandReply, StateMachineError>>;

#[derive(Debug)]
struct SessionRequest {
    command: SessionCommand,
    reply: Reply,
}

/// NFC session driver.
#[derive(Debug)]
pub struct SessionDriver {
    machine: LockerStateMachine,
    reader: AnyNfcReader,
    config: NfcConfig,
    commands: mpsc::Receiver<SessionRequest>,
    cancel: CancellationToken,
    last_seen: Option<TagId>,
}

impl SessionDriver {
    pub fn new(
        machine: LockerStateMachine,
        reader: AnyNfcReader,
        config: NfcConfig,
        cancel: CancellationToken,
    ) -> (Self, SessionHandle) {
        let (tx, commands) = mpsc::channel(config.command_queue_capacity);
        let handle = SessionHandle {
            commands: tx,
            state: machine.subscribe(),
        };

        let driver = Self {
            machine,
            reader,
            config,
            commands,
            cancel,
            last_seen: None,
        };

        (driver, handle)
    }

    /// Run until cancelled or until the reader fails to initialize.
    pub async fn run(mut self) -> SessionExit {
        if let Err(exit) = self.init_reader().await {
            return exit;
        }

        loop {
            while let Ok(request) = self.commands.try_recv() {
                self.serve(request).await;
            }

            let polled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                polled = self.reader.poll() => polled,
            };
            let pause = self.on_poll(polled).await;

            if self.cancel.is_cancelled() || !self.idle(pause).await {
                break;
            }
        }

        info!(state = %self.machine.current_state(), "Session driver stopped");
        SessionExit::Cancelled
    }

    async fn init_reader(&mut self) -> Result<(), SessionExit> {
        let attempts = self.config.init_attempts;

        for attempt in 1..=attempts {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Err(SessionExit::Cancelled),
                result = self.reader.init() => result,
            };

            match result {
                Ok(()) => {
                    match self.reader.get_reader_info().await {
                        Ok(info) => info!(
                            attempt,
                            reader = %info.name,
                            firmware = info.firmware_version.as_deref().unwrap_or("-"),
                            "NFC reader initialized"
                        ),
                        Err(_) => info!(attempt, "NFC reader initialized"),
                    }
                    return Ok(());
                }
                Err(err) => warn!(attempt, attempts, error = %err, "NFC reader init failed"),
            }

            if attempt < attempts {
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(SessionExit::Cancelled),
                    _ = tokio::time::sleep(self.config.init_retry()) => {}
                }
            }
        }

        error!(attempts, "NFC reader unavailable, session driver disabled");
        Err(SessionExit::InitFailed { attempts })
    }

    /// Handle one poll result and return how long to wait before the next.
    async fn on_poll(&mut self, polled: bikelocker_hardware::Result<Option<TagRead>>) -> Duration {
        match polled {
            Ok(None) => {
                if let Some(tag) = self.last_seen.take() {
                    debug!(tag = %tag, "Tag left the field");
                }
                trace!("No tag");
                self.config.no_tag_backoff()
            }
            Ok(Some(read)) if self.last_seen.as_ref() == Some(&read.tag) => {
                trace!(tag = %read.tag, "Tag still present");
                self.config.no_tag_backoff()
            }
            Ok(Some(read)) => {
                info!(tag = %read.tag, state = %self.machine.current_state(), "Tag detected");
                self.last_seen = Some(read.tag.clone());

                match self.machine.handle_tag(read.tag).await {
                    Ok(outcome) => debug!(%outcome, "Tag dispatched"),
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => error!(error = %err, "Tag dispatch failed"),
                }
                self.config.settle_delay()
            }
            Err(err) => {
                warn!(error = %err, "NFC poll failed");
                self.config.no_tag_backoff()
            }
        }
    }

    /// Sleep for `pause` while serving commands. Returns `false` on cancel.
    async fn idle(&mut self, pause: Duration) -> bool {
        let deadline = tokio::time::sleep(pause);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                Some(request) = self.commands.recv() => self.serve(request).await,
                _ = &mut deadline => return true,
            }
        }
    }

    async fn serve(&mut self, request: SessionRequest) {
        let SessionRequest { command, reply } = request;
        debug!(?command, "Operator command");
        let result = self.execute(command).await;

        if let Err(err) = &result
            && !err.is_cancelled()
        {
            warn!(error = %err, "Operator command failed");
        }
        // The requester may have given up waiting.
        let _ = reply.send(result);
    }

    async fn execute(&mut self, command: SessionCommand) -> Result<CommandReply, StateMachineError> {
        let machine = &mut self.machine;
        match command {
            SessionCommand::Signal(signal) => {
                machine.handle_signal(signal).await.map(CommandReply::Outcome)
            }
            SessionCommand::Transition(target) => {
                machine.transition_to(target).await?;
                Ok(CommandReply::Done(machine.current_state()))
            }
            SessionCommand::Actuator(command) => {
                machine.run_manual(command).await?;
                Ok(CommandReply::Done(machine.current_state()))
            }
            SessionCommand::ClearFault(target) => {
                machine.clear_fault(target)?;
                Ok(CommandReply::Done(machine.current_state()))
            }
            SessionCommand::Status => Ok(CommandReply::Status(machine.status())),
        }
    }
}

/// Client side of a session driver.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionRequest>,
    state: watch::Receiver<LockerState>,
}

impl SessionHandle {
    /// Last published state.
    pub fn state(&self) -> LockerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LockerState> {
        self.state.clone()
    }

    /// Queue a command and wait for the driver to serve it.
    ///
    /// # Errors
    ///
    /// [`ControllerError::SessionStopped`] if the driver is gone, otherwise
    /// the state machine error the command produced.
    pub async fn send(&self, command: SessionCommand) -> Result<CommandReply, ControllerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionRequest { command, reply })
            .await
            .map_err(|_| ControllerError::SessionStopped)?;

        response
            .await
            .map_err(|_| ControllerError::SessionStopped)?
            .map_err(ControllerError::from)
    }

    pub async fn status(&self) -> Result<LockerStatus, ControllerError> {
        match self.send(SessionCommand::Status).await? {
            CommandReply::Status(status) => Ok(status),
            other => Err(ControllerError::TaskFailed(format!(
                "unexpected reply to status: {other:?}"
            ))),
        }
    }

    pub async fn signal(&self, signal: LockerSignal) -> Result<DispatchOutcome, ControllerError> {
        match self.send(SessionCommand::Signal(signal)).await? {
            CommandReply::Outcome(outcome) => Ok(outcome),
            other => Err(ControllerError::TaskFailed(format!(
                "unexpected reply to signal: {other:?}"
            ))),
        }
    }

    /// Whether the driver has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
