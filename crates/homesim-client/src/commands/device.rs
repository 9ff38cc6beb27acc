//! Device commands: get, set, init and watch.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, select};
use serde_json::Value;
use tracing::{debug, warn};

use homesim_core::codec::{Message, SchemaViolation};
use homesim_core::{Capability, MethodDescriptor, MethodKind, StateMap};
use homesim_protocol::CallResult;

use crate::config::ClientConfig;
use crate::device::DeviceClient;
use crate::error::{ClientError, ClientResult};
use crate::poller::{PollConfig, PollEvent, Poller};

/// Reads the aggregate state, or the state behind `method`.
///
/// Device commands return whether every call came back `OK`.
pub fn get<C: Capability>(config: &ClientConfig, method: Option<&str>) -> ClientResult<bool> {
    let method = method
        .map(|name| resolve::<C>(name, MethodKind::Get))
        .transpose()?;
    let client = DeviceClient::<C>::connect(config)?;
    let result = match method {
        None => client.get_state(),
        Some(method) => client.invoke(method, &StateMap::new())?,
    };
    print_result(&result)
}

/// Writes a partial state given as a JSON object.
pub fn set<C: Capability>(
    config: &ClientConfig,
    state: &str,
    method: Option<&str>,
) -> ClientResult<bool> {
    let partial = parse_state::<C>(state)?;
    let method = method
        .map(|name| resolve::<C>(name, MethodKind::Set))
        .transpose()?;
    method
        .map_or(<C::State as Message>::schema(), |method| method.schema)
        .validate(&partial)?;

    let client = DeviceClient::<C>::connect(config)?;
    let result = match method {
        None => client.set_state(&partial)?,
        Some(method) => client.invoke(method, &partial)?,
    };
    print_result(&result)
}

/// Pushes the capability's initial state in one session.
pub fn init<C: Capability>(config: &ClientConfig) -> ClientResult<bool> {
    let steps = C::initial_state();
    if steps.is_empty() {
        println!("{} has no initial state to push", C::LABEL);
        return Ok(true);
    }

    let steps = steps
        .into_iter()
        .map(|(name, partial)| Ok((resolve::<C>(name, MethodKind::Set)?, partial)))
        .collect::<ClientResult<Vec<_>>>()?;

    let client = DeviceClient::<C>::connect(config)?;
    let results = client
        .with_session(|session| {
            steps
                .iter()
                .map(|(method, partial)| session.invoke(C::service(), *method, partial))
                .collect::<Result<Vec<_>, SchemaViolation>>()
        })
        .ok_or_else(|| ClientError::Connection("device channel stayed busy".into()))??;

    for ((method, _), result) in steps.iter().zip(&results) {
        println!("{}: {}", method.name, result.status);
    }
    Ok(results.iter().all(CallResult::is_ok))
}

/// Polls the device and prints every field change until interrupted, or
/// until `count` change events were seen.
pub fn watch<C: Capability>(
    config: &ClientConfig,
    interval_ms: Option<u64>,
    count: Option<usize>,
) -> ClientResult<bool> {
    let poll = interval_ms
        .map(|ms| PollConfig::new(Duration::from_millis(ms)))
        .unwrap_or_else(|| config.poll_config());
    if poll.interval.is_zero() {
        return Err(ClientError::Config("poll interval must be greater than zero".into()));
    }

    let client = Arc::new(DeviceClient::<C>::connect(config)?);
    let poller = Poller::spawn(client, poll)?;
    let interrupt = interrupt_channel()?;

    let mut seen = 0;
    loop {
        select! {
            recv(poller.events()) -> event => match event {
                Ok(event) => {
                    if print_event(&event) {
                        seen += 1;
                    }
                    if count.is_some_and(|count| seen >= count) {
                        break;
                    }
                }
                Err(_) => break,
            },
            recv(interrupt) -> _ => {
                debug!("interrupted");
                break;
            }
        }
    }

    poller.stop()?;
    Ok(true)
}

/// Looks up a method of the capability's service by name and kind.
fn resolve<C: Capability>(name: &str, kind: MethodKind) -> ClientResult<&'static MethodDescriptor> {
    let service = C::service();
    service
        .method(name)
        .filter(|method| method.kind == kind)
        .ok_or_else(|| {
            let candidates: Vec<_> = service
                .methods
                .iter()
                .filter(|method| method.kind == kind)
                .map(|method| method.name)
                .collect();
            ClientError::Config(format!(
                "{} has no {:?} method `{}` (expected one of: {})",
                service.name,
                kind,
                name,
                candidates.join(", ")
            ))
        })
}

fn parse_state<C: Capability>(text: &str) -> ClientResult<StateMap> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(SchemaViolation::Malformed {
            message: C::service().name,
            detail: format!("expected a JSON object, got {}", other),
        }
        .into()),
        Err(e) => Err(SchemaViolation::Malformed {
            message: C::service().name,
            detail: format!("invalid JSON: {}", e),
        }
        .into()),
    }
}

fn print_result(result: &CallResult) -> ClientResult<bool> {
    let json =
        serde_json::to_string_pretty(result).map_err(|e| ClientError::Protocol(e.into()))?;
    println!("{}", json);
    Ok(result.is_ok())
}

/// Prints one poll event. Returns true for a change event.
fn print_event(event: &PollEvent) -> bool {
    match event {
        PollEvent::Changed { at, changes } => {
            let time = at.format("%H:%M:%S%.3f");
            for change in changes {
                let old = change
                    .old
                    .as_ref()
                    .map_or_else(|| "-".to_string(), Value::to_string);
                println!("{} {} {} -> {}", time, change.path, old, change.new);
            }
            true
        }
        PollEvent::Failed { at, method, status } => {
            eprintln!("{} {} failed: {}", at.format("%H:%M:%S%.3f"), method, status);
            false
        }
        PollEvent::Skipped { .. } => false,
    }
}

/// Fires once on Ctrl+C.
fn interrupt_channel() -> ClientResult<Receiver<()>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::Builder::new()
        .name("homesim-signal".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!(error = %e, "cannot listen for Ctrl+C");
                    return;
                }
            };
            if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                let _ = tx.send(());
            }
        })
        .map_err(|e| ClientError::Thread(format!("failed to spawn signal listener: {}", e)))?;
    Ok(rx)
}
