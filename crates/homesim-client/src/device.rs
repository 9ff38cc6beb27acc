//! Device clients: one capability, one channel, one lock.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use tracing::{debug, warn};

use homesim_core::codec::{Message, SchemaViolation};
use homesim_core::devices::{DEVICE_SERVICE, DeviceState, Empty};
use homesim_core::{
    Capability, MessageSchema, MethodDescriptor, MethodKind, ServiceDescriptor, StateMap, decode,
    decode_value, encode, encode_value, from_wire, to_wire,
};
use homesim_protocol::{CallResult, Endpoint, Status};

use crate::channel::RpcChannel;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::transport::{RpcTimeouts, TcpTransport, Transport};

/// Default bounded wait for the channel lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Client for one device capability.
///
/// Owns the RPC channel behind a mutex. Every call, or every sequence of
/// calls made through a [`Session`], holds the lock for its whole duration,
/// so at most one RPC is in flight per client. Acquisition waits at most
/// `lock_timeout`; a timed-out acquisition skips the work and is counted.
pub struct DeviceClient<C: Capability, T: Transport = TcpTransport> {
    channel: Mutex<RpcChannel<T>>,
    lock_timeout: Duration,
    skipped: AtomicU64,
    _capability: PhantomData<fn() -> C>,
}

impl<C: Capability> DeviceClient<C, TcpTransport> {
    /// Connects using the endpoint and timeouts from `config`.
    pub fn connect(config: &ClientConfig) -> ClientResult<Self> {
        Self::open(&config.endpoint, config.rpc_timeouts(), config.lock_timeout())
    }

    pub fn open(
        endpoint: &Endpoint,
        timeouts: RpcTimeouts,
        lock_timeout: Duration,
    ) -> ClientResult<Self> {
        let channel = RpcChannel::open(endpoint, timeouts)?;
        Ok(Self::with_channel(channel, lock_timeout))
    }
}

impl<C: Capability, T: Transport> DeviceClient<C, T> {
    pub fn with_channel(channel: RpcChannel<T>, lock_timeout: Duration) -> Self {
        Self {
            channel: Mutex::new(channel),
            lock_timeout,
            skipped: AtomicU64::new(0),
            _capability: PhantomData,
        }
    }

    /// RPC service of this capability.
    pub fn service(&self) -> &'static ServiceDescriptor {
        C::service()
    }

    /// Takes the channel lock, waiting at most the lock timeout.
    ///
    /// Returns `None` and bumps the skip counter if another caller kept the
    /// lock for the whole wait.
    pub fn session(&self) -> Option<Session<'_, C, T>> {
        match self.channel.try_lock_for(self.lock_timeout) {
            Some(channel) => Some(Session {
                channel,
                _capability: PhantomData,
            }),
            None => {
                let skipped = self.skipped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(device = C::LABEL, skipped, "channel busy, skipping");
                None
            }
        }
    }

    /// Runs `f` under the channel lock. `None` means the lock was busy.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session<'_, C, T>) -> R) -> Option<R> {
        self.session().map(|mut session| f(&mut session))
    }

    /// Reads the aggregate state.
    pub fn get_state(&self) -> CallResult {
        self.get::<C::State>(C::GET_STATE)
    }

    /// Writes a partial aggregate state. The mapping may span several
    /// clusters.
    pub fn set_state(&self, partial: &StateMap) -> Result<CallResult, SchemaViolation> {
        self.set::<C::State>(C::SET_STATE, partial)
    }

    /// Reads the backend lifecycle state.
    pub fn get_device_state(&self) -> CallResult {
        self.with_session(|s| s.get_device_state()).unwrap_or_else(busy)
    }

    /// One-shot `Get` of message `M` through `method`.
    pub fn get<M: Message>(&self, method: &str) -> CallResult {
        self.with_session(|s| s.get::<M>(method)).unwrap_or_else(busy)
    }

    /// One-shot `Set` of message `M` through `method`.
    ///
    /// The mapping is encoded before the lock is taken, so a schema violation
    /// never reaches the channel.
    pub fn set<M: Message>(
        &self,
        method: &str,
        partial: &StateMap,
    ) -> Result<CallResult, SchemaViolation> {
        let message: M = encode(partial)?;
        Ok(self
            .with_session(|s| s.send(method, &message))
            .unwrap_or_else(busy))
    }

    /// One-shot call of a method picked at runtime.
    pub fn invoke(
        &self,
        method: &'static MethodDescriptor,
        arg: &StateMap,
    ) -> Result<CallResult, SchemaViolation> {
        let wire = encode_argument(method, arg)?;
        Ok(self
            .with_session(|s| s.call_encoded(C::service(), method, wire))
            .unwrap_or_else(busy))
    }

    /// Closes the channel once any in-flight call has finished.
    pub fn close(&self) {
        self.channel.lock().close();
    }

    pub fn is_closed(&self) -> bool {
        self.channel.lock().is_closed()
    }

    /// Number of lock acquisitions that timed out.
    pub fn skipped_cycles(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

fn busy() -> CallResult {
    CallResult::failed(Status::Busy)
}

/// Exclusive use of a device client's channel.
///
/// Holding a session keeps other callers (including the poller) off the
/// channel, which is how read-modify-write sequences stay consistent.
pub struct Session<'a, C: Capability, T: Transport> {
    channel: MutexGuard<'a, RpcChannel<T>>,
    _capability: PhantomData<fn() -> C>,
}

impl<C: Capability, T: Transport> Session<'_, C, T> {
    pub fn get_state(&mut self) -> CallResult {
        self.get::<C::State>(C::GET_STATE)
    }

    pub fn set_state(&mut self, partial: &StateMap) -> Result<CallResult, SchemaViolation> {
        self.set::<C::State>(C::SET_STATE, partial)
    }

    pub fn get_device_state(&mut self) -> CallResult {
        self.get_from::<DeviceState>(&DEVICE_SERVICE, "GetDeviceState")
    }

    pub fn get<M: Message>(&mut self, method: &str) -> CallResult {
        self.get_from::<M>(C::service(), method)
    }

    pub fn set<M: Message>(
        &mut self,
        method: &str,
        partial: &StateMap,
    ) -> Result<CallResult, SchemaViolation> {
        let message: M = encode(partial)?;
        Ok(self.send(method, &message))
    }

    /// Sends an already encoded message and decodes the acknowledgement.
    pub fn send<M: Message>(&mut self, method: &str, message: &M) -> CallResult {
        let service = C::service().name;
        let (status, reply) = self.channel.call(service, method, to_wire(message));
        if !status.is_ok() {
            return CallResult::failed(status);
        }
        parse_ack(M::schema(), service, method, reply)
    }

    /// Calls a method picked at runtime on `service`, validating both the
    /// argument and the reply against the method's schema.
    pub fn invoke(
        &mut self,
        service: &'static ServiceDescriptor,
        method: &'static MethodDescriptor,
        arg: &StateMap,
    ) -> Result<CallResult, SchemaViolation> {
        let wire = encode_argument(method, arg)?;
        Ok(self.call_encoded(service, method, wire))
    }

    fn call_encoded(
        &mut self,
        service: &'static ServiceDescriptor,
        method: &'static MethodDescriptor,
        wire: Value,
    ) -> CallResult {
        let (status, reply) = self.channel.call(service.name, method.name, wire);
        if !status.is_ok() {
            return CallResult::failed(status);
        }
        if method.kind == MethodKind::Set {
            return parse_ack(method.schema, service.name, method.name, reply);
        }
        match decode_value(method.schema, reply) {
            Ok(reply) => CallResult::ok(reply),
            Err(e) => {
                warn!(service = service.name, method = method.name, error = %e, "malformed reply");
                CallResult::failed(Status::RpcError)
            }
        }
    }

    fn get_from<M: Message>(&mut self, service: &ServiceDescriptor, method: &str) -> CallResult {
        let (status, reply) = self
            .channel
            .call(service.name, method, to_wire(&Empty::default()));
        if !status.is_ok() {
            return CallResult::failed(status);
        }
        parse_reply::<M>(service.name, method, reply)
    }
}

fn encode_argument(method: &MethodDescriptor, arg: &StateMap) -> Result<Value, SchemaViolation> {
    match method.kind {
        MethodKind::Get => encode_value(Empty::schema(), arg),
        MethodKind::Set => encode_value(method.schema, arg),
    }
}

/// Checks the reply to a `Set`: either an empty acknowledgement or the
/// written message echoed back. The reply is returned as sent, without
/// defaults.
fn parse_ack(schema: &MessageSchema, service: &str, method: &str, reply: Value) -> CallResult {
    let mut ack = match reply {
        Value::Null => StateMap::new(),
        Value::Object(map) => map,
        other => {
            warn!(service, method, reply = %other, "malformed acknowledgement");
            return CallResult::failed(Status::RpcError);
        }
    };
    if let Err(e) = schema.validate(&ack) {
        warn!(service, method, error = %e, "malformed acknowledgement");
        return CallResult::failed(Status::RpcError);
    }
    schema.normalize(&mut ack);
    CallResult::ok(ack)
}

fn parse_reply<M: Message>(service: &str, method: &str, reply: Value) -> CallResult {
    match from_wire::<M>(reply) {
        Ok(message) => CallResult::ok(decode(&message)),
        Err(e) => {
            warn!(service, method, error = %e, "malformed reply");
            CallResult::failed(Status::RpcError)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CountingTransport, EchoTransport, FailingTransport, StoreTransport};
    use homesim_core::devices::{AirPurifier, AirPurifierState, Pm25, Window};
    use homesim_server::{BackgroundServer, ServerConfig};
    use serde_json::json;
    use std::sync::Arc;

    fn map(value: Value) -> StateMap {
        value.as_object().cloned().unwrap()
    }

    fn client<C: Capability, T: Transport>(transport: T) -> DeviceClient<C, T> {
        DeviceClient::with_channel(RpcChannel::with_transport(transport), DEFAULT_LOCK_TIMEOUT)
    }

    #[test]
    fn set_then_get_keeps_last_value() {
        let client = client::<AirPurifier, _>(StoreTransport::default());

        let set = client.set_state(&map(json!({"OnOff": {"OnOff": true}}))).unwrap();
        assert_eq!(set, CallResult::ok(StateMap::new()));

        let state = client.get_state();
        assert!(state.is_ok());
        assert_eq!(state.reply["OnOff"]["OnOff"], json!(true));
        assert_eq!(state.reply["Fancontrol"]["FanMode"], json!(0));
    }

    #[test]
    fn unknown_key_never_reaches_the_channel() {
        let transport = CountingTransport::default();
        let client = client::<Window, _>(transport.clone());

        let result = client.set_state(&map(json!({"Blinds": {"Open": true}})));
        assert!(matches!(result, Err(SchemaViolation::UnknownField { .. })));

        let method = Window::service().method("Set").unwrap();
        let result = client.invoke(method, &map(json!({"WindowCovering": {"Tilt": 1}})));
        assert!(result.is_err());
        assert_eq!(transport.exchanges(), 0);
    }

    #[test]
    fn failing_transport_is_rpc_error() {
        let client = client::<AirPurifier, _>(FailingTransport::default());
        assert_eq!(client.get_state(), CallResult::failed(Status::RpcError));
        assert_eq!(
            client.set_state(&map(json!({"OnOff": {"OnOff": false}}))).unwrap(),
            CallResult::failed(Status::RpcError)
        );
        assert_eq!(client.get_device_state(), CallResult::failed(Status::RpcError));
    }

    #[test]
    fn set_accepts_the_written_state_echoed_back() {
        let client = client::<AirPurifier, _>(EchoTransport::default());
        let partial = map(json!({"OnOff": {"OnOff": true}}));

        let result = client.set_state(&partial).unwrap();
        assert_eq!(result, CallResult::ok(partial.clone()));

        let method = AirPurifier::service().method("SetAirPurifierSensor").unwrap();
        assert_eq!(client.invoke(method, &partial).unwrap(), CallResult::ok(partial));

        let pm25 = map(json!({"Pm25ConcentrationMeasurement": {"MeasuredValue": 3}}));
        let result = client.set_pm25(&pm25).unwrap();
        assert!(result.is_ok());
        assert_eq!(
            result.reply["Pm25ConcentrationMeasurement"]["MeasuredValue"],
            json!(3.0)
        );
    }

    #[test]
    fn set_ack_of_a_foreign_shape_is_rpc_error() {
        let client = client::<Window, _>(EchoTransport::replying(json!({"Thermostat": {}})));
        let result = client.set_state(&map(json!({"OnOff": {"OnOff": true}}))).unwrap();
        assert_eq!(result, CallResult::failed(Status::RpcError));

        let client = self::client::<Window, _>(EchoTransport::replying(json!("done")));
        let method = Window::service().method("Set").unwrap();
        let result = client.invoke(method, &StateMap::new()).unwrap();
        assert_eq!(result, CallResult::failed(Status::RpcError));
    }

    #[test]
    fn reply_of_the_wrong_shape_is_rpc_error() {
        let client = client::<Window, _>(StoreTransport::default());
        let result = client.get::<Pm25>("Get");
        assert_eq!(result, CallResult::failed(Status::RpcError));
    }

    #[test]
    fn fine_grained_accessor_uses_its_own_schema() {
        let client = client::<AirPurifier, _>(StoreTransport::default());
        let partial = map(json!({"Pm25ConcentrationMeasurement": {"MeasuredValue": 35.5}}));
        assert!(client.set::<Pm25>("SetPM25", &partial).unwrap().is_ok());

        let result = client.get::<Pm25>("GetPM25");
        assert_eq!(
            result.reply["Pm25ConcentrationMeasurement"]["MeasuredValue"],
            json!(35.5)
        );

        let state = client.get::<AirPurifierState>("GetAirPurifierSensor");
        assert!(state.reply.get("Pm25ConcentrationMeasurement").is_none());
    }

    #[test]
    fn invoke_by_descriptor() {
        let client = client::<Window, _>(StoreTransport::default());
        let set = Window::service().method("Set").unwrap();
        let get = Window::service().method("Get").unwrap();

        let partial = map(json!({"WindowCovering": {"TargetPositionLiftPercent100ths": 2500}}));
        assert!(client.invoke(set, &partial).unwrap().is_ok());

        let state = client.invoke(get, &StateMap::new()).unwrap();
        assert_eq!(
            state.reply["WindowCovering"]["TargetPositionLiftPercent100ths"],
            json!(2500)
        );
        assert_eq!(state.reply["OnOff"]["OnOff"], json!(false));
    }

    #[test]
    fn busy_lock_skips_one_shot_calls() {
        let client = DeviceClient::<Window, _>::with_channel(
            RpcChannel::with_transport(CountingTransport::default()),
            Duration::from_millis(10),
        );

        let session = client.session().unwrap();
        std::thread::scope(|scope| {
            let result = scope.spawn(|| client.get_state()).join().unwrap();
            assert_eq!(result, CallResult::failed(Status::Busy));
        });
        drop(session);

        assert_eq!(client.skipped_cycles(), 1);
        assert!(client.get_state().is_ok());
    }

    #[test]
    fn session_spans_read_modify_write() {
        let client = client::<Window, _>(StoreTransport::default());
        let result = client.with_session(|session| {
            let current = session.get_state();
            let lift = current.reply["WindowCovering"]["TargetPositionLiftPercent100ths"]
                .as_u64()
                .unwrap();
            session
                .set_state(&map(json!({
                    "WindowCovering": {"TargetPositionLiftPercent100ths": lift + 100}
                })))
                .unwrap();
            session.get_state()
        });

        let state = result.unwrap();
        assert_eq!(
            state.reply["WindowCovering"]["TargetPositionLiftPercent100ths"],
            json!(100)
        );
    }

    #[test]
    fn close_cancels_later_calls() {
        let client = client::<Window, _>(CountingTransport::default());
        client.close();
        client.close();
        assert!(client.is_closed());
        assert_eq!(client.get_state(), CallResult::failed(Status::Cancelled));
    }

    #[test]
    fn clients_are_shareable_across_threads() {
        let client = Arc::new(client::<Window, _>(StoreTransport::default()));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let client = Arc::clone(&client);
                std::thread::spawn(move || {
                    client
                        .set_state(&map(json!({"OnOff": {"OnOff": i % 2 == 0}})))
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
    }

    #[test]
    fn against_a_live_backend() {
        let server = BackgroundServer::start(ServerConfig::ephemeral()).unwrap();
        let client = DeviceClient::<AirPurifier>::open(
            &server.endpoint(),
            RpcTimeouts::default(),
            DEFAULT_LOCK_TIMEOUT,
        )
        .unwrap();

        let partial = map(json!({"OnOff": {"OnOff": true}, "Fancontrol": {"FanMode": 2}}));
        assert!(client.set_state(&partial).unwrap().is_ok());

        let state = client.get_state();
        let typed: AirPurifierState = encode(&state.reply).unwrap();
        assert_eq!(typed.on_off.and_then(|o| o.on_off), Some(true));

        let device = client.get_device_state();
        assert_eq!(device.reply["DeviceState"]["state"], json!(1));
    }

    #[test]
    fn first_call_after_an_idle_timeout_succeeds() {
        let config = ServerConfig::ephemeral().with_connection_timeout(Duration::from_millis(100));
        let server = BackgroundServer::start(config).unwrap();
        let client = DeviceClient::<Window>::open(
            &server.endpoint(),
            RpcTimeouts::default(),
            DEFAULT_LOCK_TIMEOUT,
        )
        .unwrap();
        assert!(client.get_state().is_ok());

        std::thread::sleep(Duration::from_millis(400));

        let partial = map(json!({"WindowCovering": {"TargetPositionLiftPercent100ths": 1200}}));
        assert!(client.set_state(&partial).unwrap().is_ok());
        assert_eq!(
            client.get_state().reply["WindowCovering"]["TargetPositionLiftPercent100ths"],
            json!(1200)
        );
    }
}
