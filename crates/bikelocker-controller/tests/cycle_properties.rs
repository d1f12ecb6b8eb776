//! Property-based tests for the locker cycle.
//!
//! Random sequences of tag presentations and vision signals are fed straight
//! into a state machine wired to the plant simulator. Whatever the order, the
//! machine must only ever step to the successor state, never drive the sled
//! into a closed door, and keep the registry in step with occupancy.

use bikelocker_controller::{
    Actuators, DispatchOutcome, LimitSwitchMonitor, LockerSignal, LockerStateMachine,
};
use bikelocker_core::{InterlockConfig, LockerState, MonitorConfig, SimulatorConfig, TagId};
use bikelocker_hardware::mock::MockLocker;
use proptest::prelude::*;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
enum Event {
    Tag(u8),
    Vision,
}

/// Two distinct tags plus the vision signal, tags twice as likely.
fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        2 => (0u8..2).prop_map(Event::Tag),
        1 => Just(Event::Vision),
    ]
}

fn tag(n: u8) -> TagId {
    TagId::new(vec![0xC0, n]).unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

async fn run_sequence(events: Vec<Event>) -> Result<(), TestCaseError> {
    let cancel = CancellationToken::new();
    let locker = MockLocker::docked(Duration::from_millis(10));
    let (plant, plant_handle) = locker.handles.plant(SimulatorConfig::default());
    tokio::spawn(plant.run(cancel.clone()));

    let (switches, _task) = LimitSwitchMonitor::new(locker.switches, MonitorConfig::default())
        .start(cancel.clone())
        .unwrap();
    let mut machine = LockerStateMachine::new(
        Actuators {
            motor: locker.motor,
            solenoid: locker.solenoid,
            led_ring: locker.led_ring,
        },
        switches,
        InterlockConfig::default(),
        cancel.clone(),
    );

    for event in events {
        let before = machine.current_state();
        let outcome = match event {
            Event::Tag(n) => machine.handle_tag(tag(n)).await,
            Event::Vision => machine.handle_signal(LockerSignal::VisionComplete).await,
        };
        let outcome = outcome.map_err(|err| TestCaseError::fail(err.to_string()))?;
        let after = machine.current_state();

        match outcome {
            DispatchOutcome::Advanced(state) => {
                prop_assert_eq!(state, after);
                prop_assert_ne!(before, after);
            }
            DispatchOutcome::Foreign | DispatchOutcome::Occupied | DispatchOutcome::Ignored => {
                prop_assert_eq!(before, after);
            }
        }

        prop_assert_ne!(after, LockerState::Fault);
        prop_assert_eq!(
            machine.registry().is_empty(),
            after == LockerState::Vacant,
            "registry out of step in {}",
            after
        );
    }

    for transition in machine.history() {
        prop_assert_eq!(
            transition.from.next(),
            Some(transition.to),
            "{} -> {} skips the cycle",
            transition.from,
            transition.to
        );
    }
    prop_assert_eq!(plant_handle.safety_violations(), 0);

    cancel.cancel();
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: any interleaving of tags and signals follows the cycle.
    #[test]
    fn prop_events_follow_cycle(events in prop::collection::vec(event(), 1..24)) {
        runtime().block_on(run_sequence(events))?;
    }
}
