//! Background status polling.
//!
//! A poller owns one thread per device client. Every interval it reads each
//! distinct state message plus the device lifecycle under a single channel
//! session, reconciles the replies into its [`Mirror`], and publishes the
//! fields that changed as [`PollEvent`]s.
//!
//! The loop never interrupts a call in flight: [`PollerHandle::stop`] clears
//! the liveness flag, wakes the thread, joins it, and only then closes the
//! client's channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded, unbounded};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use homesim_core::codec::{Message, SchemaViolation};
use homesim_core::devices::DEVICE_SERVICE;
use homesim_core::{Capability, MethodDescriptor, ServiceDescriptor, StateMap};
use homesim_protocol::{CallResult, Status};

use crate::device::DeviceClient;
use crate::error::{ClientError, ClientResult};
use crate::mirror::{EditGuard, EditTracker, FieldChange, Mirror};
use crate::transport::{TcpTransport, Transport};

/// Events kept for a slow consumer before new ones are dropped.
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

/// Control messages for a running poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollCommand {
    /// Poll right away instead of waiting for the interval.
    PollNow,
    Pause,
    Resume,
    Stop,
}

/// What one poll cycle produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PollEvent {
    /// Fields whose remote value differs from the last-known one.
    Changed {
        at: DateTime<Utc>,
        changes: Vec<FieldChange>,
    },
    /// A read returned a non-OK status; the mirror keeps its old values.
    Failed {
        at: DateTime<Utc>,
        method: &'static str,
        status: Status,
    },
    /// The channel was busy for the whole lock wait.
    Skipped { at: DateTime<Utc> },
}

/// Counters and flags of a poller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollerState {
    pub cycles: u64,
    pub skipped: u64,
    pub failures: u64,
    pub paused: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_status: Option<Status>,
}

struct Shared<C: Capability, T: Transport> {
    client: Arc<DeviceClient<C, T>>,
    running: AtomicBool,
    mirror: Mutex<Mirror>,
    edits: EditTracker,
    state: Mutex<PollerState>,
}

/// Starts pollers.
pub struct Poller;

impl Poller {
    /// Spawns the poll thread for `client`.
    ///
    /// The first poll runs immediately.
    pub fn spawn<C: Capability, T: Transport + 'static>(
        client: Arc<DeviceClient<C, T>>,
        config: PollConfig,
    ) -> ClientResult<PollerHandle<C, T>> {
        let shared = Arc::new(Shared {
            client,
            running: AtomicBool::new(true),
            mirror: Mutex::new(Mirror::new()),
            edits: EditTracker::new(),
            state: Mutex::new(PollerState::default()),
        });
        let (command_tx, command_rx) = unbounded();
        let (event_tx, event_rx) = bounded(EVENT_BUFFER);

        let thread = std::thread::Builder::new()
            .name(format!("homesim-poll-{}", C::LABEL))
            .spawn({
                let shared = Arc::clone(&shared);
                move || run(shared, config, command_rx, event_tx)
            })
            .map_err(|e| ClientError::Thread(format!("failed to spawn poller: {}", e)))?;

        Ok(PollerHandle {
            shared,
            commands: command_tx,
            events: event_rx,
            thread: Some(thread),
        })
    }
}

/// Owner of a running poller. Dropping it stops the poller.
pub struct PollerHandle<C: Capability, T: Transport = TcpTransport> {
    shared: Arc<Shared<C, T>>,
    commands: Sender<PollCommand>,
    events: Receiver<PollEvent>,
    thread: Option<JoinHandle<()>>,
}

impl<C: Capability, T: Transport> PollerHandle<C, T> {
    pub fn events(&self) -> &Receiver<PollEvent> {
        &self.events
    }

    pub fn client(&self) -> &Arc<DeviceClient<C, T>> {
        &self.shared.client
    }

    /// Tracker consulted before merging remote values.
    pub fn edits(&self) -> &EditTracker {
        &self.shared.edits
    }

    /// Copy of the last-known state.
    pub fn snapshot(&self) -> StateMap {
        self.shared.mirror.lock().snapshot().clone()
    }

    pub fn state(&self) -> PollerState {
        self.shared.state.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Writes a partial state with its fields shielded from polling until the
    /// call returns. The written values go into the mirror on success.
    pub fn set_state(&self, partial: &StateMap) -> Result<CallResult, SchemaViolation> {
        let _edit: EditGuard = self.shared.edits.begin(partial);
        let result = self.shared.client.set_state(partial)?;
        if result.is_ok() {
            let mut written = partial.clone();
            <C::State as Message>::schema().normalize(&mut written);
            self.shared.mirror.lock().apply_local(&written);
        }
        Ok(result)
    }

    pub fn poll_now(&self) {
        self.send(PollCommand::PollNow);
    }

    pub fn pause(&self) {
        self.send(PollCommand::Pause);
    }

    pub fn resume(&self) {
        self.send(PollCommand::Resume);
    }

    /// Stops the loop, waits for the in-flight cycle to finish, then closes
    /// the client's channel.
    pub fn stop(mut self) -> ClientResult<()> {
        self.shutdown()
    }

    fn send(&self, command: PollCommand) {
        if self.commands.send(command).is_err() {
            debug!(?command, "poller already exited");
        }
    }

    fn shutdown(&mut self) -> ClientResult<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.shared.running.store(false, Ordering::Release);
        let _ = self.commands.send(PollCommand::Stop);

        let joined = thread
            .join()
            .map_err(|_| ClientError::Thread("poller thread panicked".to_string()));
        self.shared.client.close();
        info!(device = C::LABEL, "poller stopped");
        joined
    }
}

impl<C: Capability, T: Transport> Drop for PollerHandle<C, T> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "poller did not stop cleanly");
        }
    }
}

fn run<C: Capability, T: Transport>(
    shared: Arc<Shared<C, T>>,
    config: PollConfig,
    commands: Receiver<PollCommand>,
    events: Sender<PollEvent>,
) {
    info!(
        device = C::LABEL,
        interval_ms = config.interval.as_millis() as u64,
        "poller started"
    );
    let reads: Vec<_> = C::service()
        .state_getters()
        .into_iter()
        .map(|method| (C::service(), method))
        .chain(
            DEVICE_SERVICE
                .state_getters()
                .into_iter()
                .map(|method| (&DEVICE_SERVICE, method)),
        )
        .collect();
    let mut paused = false;
    let mut force = false;

    while shared.running.load(Ordering::Acquire) {
        if !paused || force {
            poll_once(&shared, &reads, &events);
        }
        force = false;

        match commands.recv_timeout(config.interval) {
            Ok(PollCommand::PollNow) => force = true,
            Ok(PollCommand::Pause) => paused = true,
            Ok(PollCommand::Resume) => paused = false,
            Ok(PollCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        shared.state.lock().paused = paused;
    }
    debug!(device = C::LABEL, "poll loop exited");
}

fn poll_once<C: Capability, T: Transport>(
    shared: &Shared<C, T>,
    reads: &[(&'static ServiceDescriptor, &'static MethodDescriptor)],
    events: &Sender<PollEvent>,
) {
    // Replies are merged before the session ends, so a write that follows
    // this cycle always lands in the mirror after the values read here.
    let outcome = shared.client.with_session(|session| {
        let empty = StateMap::new();
        let mut changes = Vec::new();
        let mut failures = Vec::new();
        for &(service, method) in reads {
            let result = session.invoke(service, method, &empty).unwrap_or_else(|e| {
                warn!(method = method.name, error = %e, "cannot encode poll request");
                CallResult::failed(Status::Internal)
            });
            if result.is_ok() {
                changes.extend(shared.mirror.lock().reconcile(&result.reply, &shared.edits));
            } else {
                debug!(
                    service = service.name,
                    method = method.name,
                    status = %result.status,
                    "poll read failed"
                );
                failures.push((method.name, result.status));
            }
        }
        (changes, failures)
    });

    let now = Utc::now();
    let Some((changes, failures)) = outcome else {
        shared.state.lock().skipped += 1;
        publish(events, PollEvent::Skipped { at: now });
        return;
    };

    {
        let mut state = shared.state.lock();
        state.cycles += 1;
        state.failures += failures.len() as u64;
        state.last_status = Some(failures.first().map_or(Status::Ok, |(_, status)| *status));
        if failures.is_empty() {
            state.last_success = Some(now);
        }
    }

    for (method, status) in failures {
        publish(events, PollEvent::Failed { at: now, method, status });
    }
    if !changes.is_empty() {
        publish(events, PollEvent::Changed { at: now, changes });
    }
}

fn publish(events: &Sender<PollEvent>, event: PollEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => debug!("event buffer full, dropping poll event"),
        Err(TrySendError::Disconnected(_)) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RpcChannel;
    use crate::device::DEFAULT_LOCK_TIMEOUT;
    use crate::mirror::FieldPath;
    use crate::test_support::{FailingTransport, StoreTransport};
    use homesim_core::devices::{AirPurifier, Window};
    use serde_json::{Value, json};
    use std::time::Instant;

    fn map(value: Value) -> StateMap {
        value.as_object().cloned().unwrap()
    }

    fn client<C: Capability, T: Transport>(transport: T) -> Arc<DeviceClient<C, T>> {
        Arc::new(DeviceClient::with_channel(
            RpcChannel::with_transport(transport),
            DEFAULT_LOCK_TIMEOUT,
        ))
    }

    fn next_change<C: Capability, T: Transport>(poller: &PollerHandle<C, T>) -> Vec<FieldChange> {
        loop {
            match poller.events().recv_timeout(Duration::from_secs(2)).unwrap() {
                PollEvent::Changed { changes, .. } => return changes,
                _ => continue,
            }
        }
    }

    #[test]
    fn first_poll_fills_the_mirror() {
        let poller = Poller::spawn(
            client::<AirPurifier, _>(StoreTransport::default()),
            PollConfig::new(Duration::from_millis(20)),
        )
        .unwrap();

        let changes = next_change(&poller);
        assert!(changes.iter().any(|c| c.path == FieldPath::new("OnOff", "OnOff")));
        assert!(changes.iter().any(|c| c.path == FieldPath::new("DeviceState", "state")));

        let snapshot = poller.snapshot();
        assert_eq!(snapshot["Pm25ConcentrationMeasurement"]["MeasuredValue"], json!(0.0));
        assert_eq!(snapshot["DeviceState"]["state"], json!(1));
        poller.stop().unwrap();
    }

    #[test]
    fn remote_changes_are_reported_once() {
        let transport = StoreTransport::default();
        let poller = Poller::spawn(
            client::<Window, _>(transport.clone()),
            PollConfig::new(Duration::from_millis(10)),
        )
        .unwrap();
        next_change(&poller);

        transport.store().lock().dispatch(
            "Window",
            "Set",
            &json!({"WindowCovering": {"CurrentPositionLiftPercent100ths": 4200}}),
        );
        poller.poll_now();

        let changes = next_change(&poller);
        assert_eq!(
            changes,
            vec![FieldChange {
                path: FieldPath::new("WindowCovering", "CurrentPositionLiftPercent100ths"),
                old: Some(json!(0)),
                new: json!(4200),
            }]
        );
        poller.stop().unwrap();
    }

    #[test]
    fn local_edit_lands_in_the_mirror() {
        let poller = Poller::spawn(
            client::<Window, _>(StoreTransport::default()),
            PollConfig::new(Duration::from_millis(10)),
        )
        .unwrap();
        next_change(&poller);

        let edit = map(json!({"OnOff": {"OnOff": true}}));
        assert!(poller.set_state(&edit).unwrap().is_ok());
        assert!(poller.edits().is_empty());
        assert_eq!(poller.snapshot()["OnOff"]["OnOff"], json!(true));
        poller.stop().unwrap();
    }

    #[test]
    fn integer_pm25_is_mirrored_as_a_float() {
        let poller = Poller::spawn(
            client::<AirPurifier, _>(StoreTransport::default()),
            PollConfig::new(Duration::from_millis(10)),
        )
        .unwrap();
        next_change(&poller);

        let edit = map(json!({"Pm25ConcentrationMeasurement": {"MeasuredValue": 12}}));
        assert!(poller.client().set_pm25(&edit).unwrap().is_ok());
        poller.poll_now();

        let changes = next_change(&poller);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].new, json!(12.0));
        assert_eq!(
            poller.snapshot()["Pm25ConcentrationMeasurement"]["MeasuredValue"],
            json!(12.0)
        );
        poller.stop().unwrap();
    }

    #[test]
    fn failures_keep_the_loop_alive() {
        let poller = Poller::spawn(
            client::<Window, _>(FailingTransport::default()),
            PollConfig::new(Duration::from_millis(5)),
        )
        .unwrap();

        for _ in 0..3 {
            match poller.events().recv_timeout(Duration::from_secs(2)).unwrap() {
                PollEvent::Failed { status, .. } => assert_eq!(status, Status::RpcError),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(poller.is_running());
        assert!(poller.state().failures >= 3);
        assert!(poller.snapshot().is_empty());
        poller.stop().unwrap();
    }

    #[test]
    fn poll_and_set_never_overlap_on_the_channel() {
        let transport = StoreTransport::default().with_delay(Duration::from_millis(1));
        let poller = Poller::spawn(
            client::<AirPurifier, _>(transport.clone()),
            PollConfig::new(Duration::from_millis(1)),
        )
        .unwrap();

        let writer = {
            let client = Arc::clone(poller.client());
            std::thread::spawn(move || {
                for i in 0..30 {
                    let partial = map(json!({"Fancontrol": {"FanMode": i % 4}}));
                    client.set_state(&partial).unwrap();
                }
            })
        };
        writer.join().unwrap();
        poller.stop().unwrap();

        let mut intervals = transport.intervals();
        assert!(intervals.len() > 30);
        intervals.sort_by_key(|(start, _)| *start);
        for pair in intervals.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "calls overlapped: {pair:?}");
        }
    }

    #[test]
    fn stop_waits_for_the_call_in_flight() {
        let transport = StoreTransport::default().with_delay(Duration::from_millis(100));
        let client = client::<Window, _>(transport.clone());
        let poller = Poller::spawn(Arc::clone(&client), PollConfig::default()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while transport.started() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(transport.started() > 0);

        poller.stop().unwrap();
        assert_eq!(transport.intervals().len(), transport.started());
        assert!(client.session().is_some());
        assert!(client.is_closed());
    }

    #[test]
    fn pause_and_resume() {
        let transport = StoreTransport::default();
        let poller = Poller::spawn(
            client::<Window, _>(transport.clone()),
            PollConfig::new(Duration::from_millis(5)),
        )
        .unwrap();
        next_change(&poller);

        poller.pause();
        std::thread::sleep(Duration::from_millis(30));
        assert!(poller.state().paused);
        let calls = transport.started();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(transport.started(), calls);

        poller.resume();
        std::thread::sleep(Duration::from_millis(30));
        assert!(transport.started() > calls);
        poller.stop().unwrap();
    }
}
