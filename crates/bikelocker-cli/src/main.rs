//! Bench console for the bike locker controller.
//!
//! Runs one bay against the mock devices and the plant simulator and reads
//! operator commands from stdin, one per line. `tag <hex>` and `remove_tag`
//! stand in for a user at the reader.
//!
//! Logging goes to stderr and follows `RUST_LOG` (default `info`). Set
//! `LOCKER_CONFIG` to a JSON file to override the defaults.

mod commands;

use anyhow::Context;
use bikelocker_controller::{
    CommandReply, ControllerHandle, LockerController, LockerSignal, SessionCommand,
};
use bikelocker_core::LockerConfig;
use bikelocker_hardware::mock::{MockLocker, MockLockerHandles};
use commands::Command;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "LOCKER_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config()?;
    info!(version = bikelocker_core::VERSION, "Starting bike locker bench console");

    let bay = MockLocker::docked(config.nfc.poll_timeout());
    let mocks = bay.handles.clone();
    let plant_cancel = CancellationToken::new();
    let (plant, _plant_handle) = mocks.plant(config.simulator.clone());
    let plant_task = tokio::spawn(plant.run(plant_cancel.clone()));

    let mut controller = LockerController::new(config);
    controller.register_motor(bay.motor);
    controller.register_solenoid(bay.solenoid);
    controller.register_led_ring(bay.led_ring);
    controller.register_nfc(bay.nfc);
    controller.register_switches(bay.switches);
    let handle = controller
        .start()
        .await
        .context("starting locker controller")?;

    run_console(&handle, &mocks).await?;

    let exit = handle.shutdown().await?;
    plant_cancel.cancel();
    plant_task.await.context("plant simulator")?;
    info!(?exit, "Bench console stopped");
    Ok(())
}

fn load_config() -> anyhow::Result<LockerConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            let path = Path::new(&path);
            let config = LockerConfig::from_path(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?;
            info!(path = %path.display(), "Configuration loaded");
            Ok(config)
        }
        None => Ok(LockerConfig::default()),
    }
}

async fn run_console(handle: &ControllerHandle, mocks: &MockLockerHandles) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line.context("reading console input")?,
        };
        // EOF
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(command) => {
                if let Err(err) = execute(command, handle, mocks).await {
                    warn!(error = %err, "Console command failed");
                    println!("Error: {err:#}");
                }
            }
            Err(err) => println!("{err}"),
        }
    }

    Ok(())
}

async fn execute(
    command: Command,
    handle: &ControllerHandle,
    mocks: &MockLockerHandles,
) -> anyhow::Result<()> {
    match command {
        Command::Actuate(actuations) => {
            for actuation in actuations {
                handle.send(SessionCommand::Actuator(actuation)).await?;
                println!("OK: {actuation}");
            }
        }
        Command::Transition(target) => {
            handle.send(SessionCommand::Transition(target)).await?;
            println!("State: {}", handle.state().as_str());
        }
        Command::VisionDone => {
            let outcome = handle.signal(LockerSignal::VisionComplete).await?;
            println!("Vision complete: {outcome}");
        }
        Command::ClearFault(target) => {
            if let CommandReply::Done(state) =
                handle.send(SessionCommand::ClearFault(target)).await?
            {
                println!("State: {}", state.as_str());
            }
        }
        Command::Status => println!("{}", handle.status().await?),
        Command::Tag(tag) => {
            println!("Tag {tag} in field");
            mocks.nfc.present(tag);
        }
        Command::RemoveTag => {
            mocks.nfc.remove();
            println!("Field empty");
        }
        Command::Quit => {}
    }

    Ok(())
}
