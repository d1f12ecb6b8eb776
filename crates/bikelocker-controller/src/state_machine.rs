//! Locker lifecycle state machine.
//!
//! The machine owns the actuators and the tag registry and moves the locker
//! through its cycle:
//!
//! ```text
//! Vacant → UnlockedEmpty → Loading → Closed → CompVision → Charging
//!   ↑                                                          │
//!   └──── Empty ← Unloading ← Unlocked ←───────────────────────┘
//! ```
//!
//! Each transition runs a fixed plan of actuator commands and interlock
//! waits. The state only changes after every wait in the plan has been
//! confirmed through a direct switch read. The sled is never driven out
//! until LIM4 reads the door open; if the door was shut again the bolt is
//! released first. If a command fails or an
//! interlock times out the plan is abandoned, the mechanism is made safe
//! (motor off, bolt locked, ring red) and the machine parks in
//! [`LockerState::Fault`] until an operator clears it.
//!
//! # Tag dispatch
//!
//! | State         | Tag                        | Runs                         |
//! |---------------|----------------------------|------------------------------|
//! | Vacant        | registers the tag          | `to_unlocked_empty`          |
//! | UnlockedEmpty | owner only                 | `to_loading`                 |
//! | Loading       | owner only                 | `to_closed`, `to_comp_vision`|
//! | Charging      | owner only                 | `to_unlocked`                |
//! | Unlocked      | owner only                 | `to_unloading`               |
//! | Unloading     | owner only                 | `to_empty`, `to_vacant`      |
//! | others        | ignored                    |                              |
//!
//! `CompVision` leaves on [`LockerSignal::VisionComplete`].

use crate::error::{Result, StateMachineError};
use crate::interlock::wait_for_switch;
use crate::monitor::{LimitSwitchMonitorHandle, SwitchLevels};
use crate::registry::{TagCheck, TagRegistry};
use bikelocker_core::constants::MAX_HISTORY_SIZE;
use bikelocker_core::{InterlockConfig, LockerState, SessionId, SwitchId, TagId};
use bikelocker_hardware::{
    ActuatorCommand, AnyLedRing, AnyMotor, AnySolenoid, DoorSolenoid, DutyCycle, LedColor,
    LedPattern, LedRing, MotorDirection, SledMotor,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// External events that are not tag presentations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockerSignal {
    /// The vision system finished inspecting the bike.
    VisionComplete,
}

/// What a tag or signal did to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The machine ran one or more transitions and is now in this state.
    Advanced(LockerState),
    /// The tag is not the registered owner's.
    Foreign,
    /// A tag reached `Vacant` while the registry was still occupied.
    Occupied,
    /// The current state does not react to this event.
    Ignored,
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advanced(state) => write!(f, "advanced to {state}"),
            Self::Foreign => write!(f, "foreign tag rejected"),
            Self::Occupied => write!(f, "locker already occupied"),
            Self::Ignored => write!(f, "ignored"),
        }
    }
}

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub from: LockerState,
    pub to: LockerState,
    pub timestamp: DateTime<Utc>,
}

impl StateTransition {
    pub fn new(from: LockerState, to: LockerState) -> Self {
        Self {
            from,
            to,
            timestamp: Utc::now(),
        }
    }
}

/// Why the machine entered `Fault`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    pub from_state: LockerState,
    pub target_state: LockerState,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time view of the machine for operators.
#[derive(Debug, Clone, Serialize)]
pub struct LockerStatus {
    pub state: LockerState,
    pub tag: Option<String>,
    pub session: Option<SessionId>,
    pub registered_at: Option<DateTime<Utc>>,
    pub fault: Option<FaultRecord>,
    pub switches: SwitchLevels,
    pub time_in_state_ms: u64,
    pub transitions: usize,
}

impl fmt::Display for LockerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "state={} tag={} LIM1={} LIM2={} LIM3={} LIM4={} in_state={}ms",
            self.state.as_str(),
            self.tag.as_deref().unwrap_or("-"),
            u8::from(self.switches.lim1),
            u8::from(self.switches.lim2),
            u8::from(self.switches.lim3),
            u8::from(self.switches.lim4),
            self.time_in_state_ms,
        )?;
        if let Some(fault) = &self.fault {
            write!(f, " fault=\"{}\"", fault.reason)?;
        }
        Ok(())
    }
}

/// The three actuators driven by the machine.
#[derive(Debug)]
pub struct Actuators {
    pub motor: AnyMotor,
    pub solenoid: AnySolenoid,
    pub led_ring: AnyLedRing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Act(ActuatorCommand),
    Wait(SwitchId, bool),
    /// Door must read open; release it again if it was shut.
    DoorOpen,
}

const RELEASE_DOOR: &[Step] = &[
    Step::Act(ActuatorCommand::UnlockDoor),
    Step::Wait(SwitchId::DOOR_CLOSED, false),
    Step::Act(ActuatorCommand::LockDoor),
];

const SLED_OUT: &[Step] = &[
    Step::DoorOpen,
    Step::Act(ActuatorCommand::SetDirection(MotorDirection::Forward)),
    Step::Act(ActuatorCommand::SetDuty(DutyCycle::STANDARD)),
    Step::Act(ActuatorCommand::EnableMotor),
    Step::Wait(SwitchId::SLED_OUT, true),
    Step::Act(ActuatorCommand::DisableMotor),
];

const SLED_IN_AND_CLOSE: &[Step] = &[
    Step::Act(ActuatorCommand::SetDirection(MotorDirection::Reverse)),
    Step::Act(ActuatorCommand::SetDuty(DutyCycle::STANDARD)),
    Step::Act(ActuatorCommand::EnableMotor),
    Step::Wait(SwitchId::SLED_IN, true),
    Step::Act(ActuatorCommand::DisableMotor),
    Step::Wait(SwitchId::DOOR_CLOSED, true),
];

const WORK_LIGHT: &[Step] = &[Step::Act(ActuatorCommand::SetSolid(LedColor::White))];

const CHARGING_PATTERN: &[Step] = &[Step::Act(ActuatorCommand::StartPattern(
    LedPattern::RainbowChase,
))];

const RELEASE_BIKE: &[Step] = &[
    Step::Act(ActuatorCommand::StopPattern),
    Step::Act(ActuatorCommand::UnlockDoor),
    Step::Wait(SwitchId::DOOR_CLOSED, false),
    Step::Act(ActuatorCommand::LockDoor),
];

const LIGHTS_OFF: &[Step] = &[Step::Act(ActuatorCommand::SetSolid(LedColor::Off))];

/// Plan that enters `target` from its predecessor.
fn plan_for(target: LockerState) -> &'static [Step] {
    match target {
        LockerState::UnlockedEmpty => RELEASE_DOOR,
        LockerState::Loading | LockerState::Unloading => SLED_OUT,
        LockerState::Closed | LockerState::Empty => SLED_IN_AND_CLOSE,
        LockerState::CompVision => WORK_LIGHT,
        LockerState::Charging => CHARGING_PATTERN,
        LockerState::Unlocked => RELEASE_BIKE,
        LockerState::Vacant => LIGHTS_OFF,
        LockerState::Fault => &[],
    }
}

/// Locker state machine.
///
/// Not shared: the session driver owns it and is the only caller, so
/// transitions never overlap.
#[derive(Debug)]
pub struct LockerStateMachine {
    actuators: Actuators,
    switches: LimitSwitchMonitorHandle,
    interlock: InterlockConfig,
    cancel: CancellationToken,
    registry: TagRegistry,
    state: LockerState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
    fault: Option<FaultRecord>,
    state_tx: watch::Sender<LockerState>,
}

impl LockerStateMachine {
    /// Create a machine in `Vacant` with an empty registry.
    pub fn new(
        actuators: Actuators,
        switches: LimitSwitchMonitorHandle,
        interlock: InterlockConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (state_tx, _) = watch::channel(LockerState::Vacant);
        Self {
            actuators,
            switches,
            interlock,
            cancel,
            registry: TagRegistry::new(),
            state: LockerState::Vacant,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            fault: None,
            state_tx,
        }
    }

    /// Start from `state` instead of `Vacant`, optionally with an occupant.
    ///
    /// Intended for bench testing a single transition.
    pub fn with_initial_state(mut self, state: LockerState, owner: Option<TagId>) -> Self {
        self.state = state;
        self.state_tx.send_replace(state);
        if let Some(tag) = owner {
            self.registry.delete_tag();
            // An empty registry accepts any tag.
            let _ = self.registry.new_tag(tag);
        }
        self
    }

    pub fn current_state(&self) -> LockerState {
        self.state
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.registry.session_id()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    pub fn fault(&self) -> Option<&FaultRecord> {
        self.fault.as_ref()
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<LockerState> {
        self.state_tx.subscribe()
    }

    pub fn status(&self) -> LockerStatus {
        let registration = self.registry.registration();
        LockerStatus {
            state: self.state,
            tag: registration.map(|r| r.tag.to_hex()),
            session: registration.map(|r| r.session),
            registered_at: registration.map(|r| r.registered_at),
            fault: self.fault.clone(),
            switches: self.switches.snapshot(),
            time_in_state_ms: u64::try_from(self.time_in_current_state().as_millis())
                .unwrap_or(u64::MAX),
            transitions: self.history.len(),
        }
    }

    /// React to a tag presentation.
    ///
    /// # Errors
    ///
    /// Returns the error that abandoned a transition. Unless it was a
    /// cancellation, the machine is in `Fault` when this returns.
    pub async fn handle_tag(&mut self, tag: TagId) -> Result<DispatchOutcome> {
        match self.state {
            LockerState::Vacant => {
                if let Err(err) = self.registry.new_tag(tag.clone()) {
                    warn!(tag = %tag, error = %err, "Registry conflict, tag not registered");
                    return Ok(DispatchOutcome::Occupied);
                }
                info!(
                    tag = %tag,
                    session = ?self.registry.session_id(),
                    "Tag registered"
                );
                self.to_unlocked_empty().await?;
            }
            LockerState::UnlockedEmpty
            | LockerState::Loading
            | LockerState::Charging
            | LockerState::Unlocked
            | LockerState::Unloading => {
                if self.registry.check_tag(&tag) == TagCheck::Different {
                    warn!(tag = %tag, state = %self.state, "Foreign tag rejected");
                    return Ok(DispatchOutcome::Foreign);
                }

                match self.state {
                    LockerState::UnlockedEmpty => self.to_loading().await?,
                    LockerState::Loading => {
                        self.to_closed().await?;
                        self.to_comp_vision().await?;
                    }
                    LockerState::Charging => self.to_unlocked().await?,
                    LockerState::Unlocked => self.to_unloading().await?,
                    _ => {
                        self.to_empty().await?;
                        self.to_vacant().await?;
                    }
                }
            }
            LockerState::Closed
            | LockerState::CompVision
            | LockerState::Empty
            | LockerState::Fault => {
                debug!(tag = %tag, state = %self.state, "Tag ignored in this state");
                return Ok(DispatchOutcome::Ignored);
            }
        }

        Ok(DispatchOutcome::Advanced(self.state))
    }

    /// React to an external signal.
    ///
    /// # Errors
    ///
    /// Same as [`handle_tag`](Self::handle_tag).
    pub async fn handle_signal(&mut self, signal: LockerSignal) -> Result<DispatchOutcome> {
        match (signal, self.state) {
            (LockerSignal::VisionComplete, LockerState::CompVision) => {
                self.to_charging().await?;
                Ok(DispatchOutcome::Advanced(self.state))
            }
            (signal, state) => {
                debug!(?signal, %state, "Signal ignored in this state");
                Ok(DispatchOutcome::Ignored)
            }
        }
    }

    /// Run the transition that enters `target`.
    ///
    /// # Errors
    ///
    /// [`StateMachineError::InvalidTransition`] if `target` is not the
    /// successor of the current state, otherwise as the `to_*` functions.
    pub async fn transition_to(&mut self, target: LockerState) -> Result<()> {
        match target {
            LockerState::Vacant => self.to_vacant().await,
            LockerState::UnlockedEmpty => self.to_unlocked_empty().await,
            LockerState::Loading => self.to_loading().await,
            LockerState::Closed => self.to_closed().await,
            LockerState::CompVision => self.to_comp_vision().await,
            LockerState::Charging => self.to_charging().await,
            LockerState::Unlocked => self.to_unlocked().await,
            LockerState::Unloading => self.to_unloading().await,
            LockerState::Empty => self.to_empty().await,
            LockerState::Fault => Err(StateMachineError::invalid_transition(
                self.state,
                LockerState::Fault,
            )),
        }
    }

    /// Release the door so the owner can open it.
    pub async fn to_unlocked_empty(&mut self) -> Result<()> {
        self.run_transition(LockerState::UnlockedEmpty).await
    }

    /// Drive the sled out to receive the bike.
    pub async fn to_loading(&mut self) -> Result<()> {
        self.run_transition(LockerState::Loading).await
    }

    /// Pull the bike in and wait for the door to shut.
    pub async fn to_closed(&mut self) -> Result<()> {
        self.run_transition(LockerState::Closed).await
    }

    /// Light the bay for the camera.
    pub async fn to_comp_vision(&mut self) -> Result<()> {
        self.run_transition(LockerState::CompVision).await
    }

    /// Show the charging pattern.
    pub async fn to_charging(&mut self) -> Result<()> {
        self.run_transition(LockerState::Charging).await
    }

    /// Stop charging and release the door for the returning owner.
    pub async fn to_unlocked(&mut self) -> Result<()> {
        self.run_transition(LockerState::Unlocked).await
    }

    /// Drive the sled out so the owner can take the bike.
    pub async fn to_unloading(&mut self) -> Result<()> {
        self.run_transition(LockerState::Unloading).await
    }

    /// Pull the empty sled in and wait for the door to shut.
    pub async fn to_empty(&mut self) -> Result<()> {
        self.run_transition(LockerState::Empty).await
    }

    /// Forget the owner and blank the ring.
    pub async fn to_vacant(&mut self) -> Result<()> {
        self.run_transition(LockerState::Vacant).await
    }

    /// Leave `Fault` for `target` without actuating anything.
    ///
    /// The operator is expected to have put the mechanism in the position
    /// `target` implies. Clearing to `Vacant` also forgets the occupant.
    ///
    /// # Errors
    ///
    /// [`StateMachineError::NotFaulted`] outside `Fault`;
    /// [`StateMachineError::InvalidTransition`] if `target` is `Fault`.
    pub fn clear_fault(&mut self, target: LockerState) -> Result<()> {
        if self.state != LockerState::Fault {
            return Err(StateMachineError::NotFaulted { state: self.state });
        }
        if !self.state.can_transition_to(&target) {
            return Err(StateMachineError::invalid_transition(self.state, target));
        }

        if target == LockerState::Vacant
            && let Some(previous) = self.registry.delete_tag()
        {
            info!(tag = %previous.tag, "Occupant forgotten while clearing fault");
        }

        let fault = self.fault.take();
        info!(
            to = %target,
            reason = fault.as_ref().map(|f| f.reason.as_str()).unwrap_or("-"),
            "Fault cleared by operator"
        );
        self.enter(target);
        Ok(())
    }

    /// Send one raw actuator command, bypassing the cycle.
    ///
    /// # Errors
    ///
    /// [`StateMachineError::Hardware`] if the actuator rejects the command.
    /// The state is never changed.
    pub async fn run_manual(&mut self, command: ActuatorCommand) -> Result<()> {
        warn!(%command, state = %self.state, "Manual actuator override");
        self.execute(command).await.map_err(StateMachineError::from)
    }

    async fn run_transition(&mut self, target: LockerState) -> Result<()> {
        let from = self.state;
        if target == LockerState::Fault || !from.can_transition_to(&target) {
            return Err(StateMachineError::invalid_transition(from, target));
        }

        let session = self
            .registry
            .session_id()
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        let span = info_span!("transition", from = %from, to = %target, session = %session);

        async {
            for step in plan_for(target) {
                if let Err(err) = self.run_step(*step).await {
                    return Err(self.abandon(from, target, err).await);
                }
            }

            if target == LockerState::Vacant
                && let Some(previous) = self.registry.delete_tag()
            {
                info!(tag = %previous.tag, "Occupant checked out");
            }
            self.enter(target);
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn run_step(&mut self, step: Step) -> Result<()> {
        match step {
            Step::Act(command) => {
                debug!(%command, "Actuator command");
                self.execute(command).await?;
            }
            Step::Wait(switch, expected) => self.wait(switch, expected).await?,
            Step::DoorOpen => {
                if self.switches.get_current_value(SwitchId::DOOR_CLOSED) {
                    warn!("Door shut before sled motion, releasing it");
                    self.execute(ActuatorCommand::UnlockDoor).await?;
                    self.wait(SwitchId::DOOR_CLOSED, false).await?;
                    self.execute(ActuatorCommand::LockDoor).await?;
                }
            }
        }
        Ok(())
    }

    async fn wait(&self, switch: SwitchId, expected: bool) -> Result<()> {
        wait_for_switch(
            &self.switches,
            switch,
            expected,
            self.interlock.poll_interval(),
            self.interlock.timeout(),
            &self.cancel,
        )
        .await?;
        Ok(())
    }

    async fn execute(&mut self, command: ActuatorCommand) -> bikelocker_hardware::Result<()> {
        let Actuators {
            motor,
            solenoid,
            led_ring,
        } = &mut self.actuators;

        match command {
            ActuatorCommand::SetDirection(direction) => motor.set_direction(direction).await,
            ActuatorCommand::SetDuty(duty) => motor.set_duty(duty).await,
            ActuatorCommand::EnableMotor => motor.enable().await,
            ActuatorCommand::DisableMotor => motor.disable().await,
            ActuatorCommand::LockDoor => solenoid.lock().await,
            ActuatorCommand::UnlockDoor => solenoid.unlock().await,
            ActuatorCommand::StartPattern(pattern) => led_ring.start_pattern(pattern).await,
            ActuatorCommand::StopPattern => led_ring.stop_pattern().await,
            ActuatorCommand::SetSolid(color) => led_ring.set_solid(color).await,
        }
    }

    /// Make the mechanism safe after a failed step and decide where to park.
    async fn abandon(
        &mut self,
        from: LockerState,
        target: LockerState,
        err: StateMachineError,
    ) -> StateMachineError {
        self.safe_stop().await;

        if err.is_cancelled() {
            warn!("Transition cancelled, state unchanged");
            return err;
        }

        if let Err(led_err) = self.actuators.led_ring.set_solid(LedColor::Red).await {
            warn!(error = %led_err, "Could not show fault color");
        }

        error!(error = %err, "Transition failed, entering fault");
        self.fault = Some(FaultRecord {
            from_state: from,
            target_state: target,
            reason: err.to_string(),
            timestamp: Utc::now(),
        });
        self.enter(LockerState::Fault);
        err
    }

    async fn safe_stop(&mut self) {
        if let Err(err) = self.actuators.motor.disable().await {
            warn!(error = %err, "Could not disable motor");
        }
        if let Err(err) = self.actuators.solenoid.lock().await {
            warn!(error = %err, "Could not lock door");
        }
    }

    fn enter(&mut self, target: LockerState) {
        let from = self.state;
        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(StateTransition::new(from, target));

        self.state = target;
        self.state_entered_at = Instant::now();
        self.state_tx.send_replace(target);

        info!(%from, to = %target, "State changed");
    }
}
