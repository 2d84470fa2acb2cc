//! MQTT transport.
//!
//! Publishing goes through the `rumqttc` client handle. The connection's
//! event loop runs on its own thread and forwards everything the session
//! needs as [`LoopEvent`]s on a channel, so the session stays single-owner.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use interclust_protocol::topics;
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use tracing::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::error::ClientError;
use crate::ids::SessionId;
use crate::transport::Transport;

const REQUEST_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Notifications from the connection thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// Broker acknowledged the (re)connection; subscriptions are renewed.
    Connected,
    Inbound { topic: String, payload: Vec<u8> },
    Disconnected(String),
}

fn qos(level: u8) -> QoS {
    match level {
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}

#[derive(Clone)]
pub struct MqttTransport {
    client: Client,
    qos: QoS,
}

impl MqttTransport {
    /// Opens the broker connection and starts the event loop thread.
    ///
    /// Returns before the broker answers; use [`wait_connected`] to block
    /// until it does.
    pub fn connect(
        config: &BrokerConfig,
        session: &SessionId,
        events: Sender<LoopEvent>,
    ) -> Result<(Self, JoinHandle<()>), ClientError> {
        let client_id = format!("{}-{}", config.client_prefix, session);
        let mut options = MqttOptions::new(client_id, config.host.as_str(), config.port);
        options.set_keep_alive(config.keep_alive());
        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        let qos = qos(config.qos);
        let subscriber = client.clone();
        let handle = std::thread::Builder::new()
            .name("interclust-mqtt".into())
            .spawn(move || run_event_loop(connection, &subscriber, qos, &events))?;
        info!(host = %config.host, port = config.port, "connecting to broker");
        Ok((Self { client, qos }, handle))
    }

    /// Closes the connection; the event loop thread ends afterwards.
    pub fn disconnect(&self) {
        if let Err(err) = self.client.disconnect() {
            debug!(error = %err, "disconnect failed");
        }
    }
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("qos", &self.qos)
            .finish_non_exhaustive()
    }
}

impl Transport for MqttTransport {
    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), ClientError> {
        self.client
            .publish(topic, self.qos, false, payload)
            .map_err(|err| ClientError::Transport(err.to_string().into()))
    }
}

fn text(raw: &impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(raw.as_ref()).into_owned()
}

fn run_event_loop(mut connection: Connection, client: &Client, qos: QoS, events: &Sender<LoopEvent>) {
    for notification in connection.iter() {
        let event = match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                if let Err(err) = client.try_subscribe(topics::FRONTEND_FILTER, qos) {
                    warn!(error = %err, "subscribe failed");
                }
                LoopEvent::Connected
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => LoopEvent::Inbound {
                topic: text(&publish.topic),
                payload: publish.payload.to_vec(),
            },
            Ok(Event::Incoming(Packet::Disconnect)) => {
                LoopEvent::Disconnected("broker closed the connection".into())
            }
            Ok(_) => continue,
            Err(err) => {
                let event = LoopEvent::Disconnected(err.to_string());
                if events.send(event).is_err() {
                    break;
                }
                std::thread::sleep(RECONNECT_DELAY);
                continue;
            }
        };
        if events.send(event).is_err() {
            debug!("event receiver dropped, stopping event loop");
            break;
        }
    }
}

/// Blocks until the broker acknowledges the connection.
///
/// Connection errors before that are retried by the event loop; only the
/// deadline ends the wait.
pub fn wait_connected(events: &Receiver<LoopEvent>, timeout: Duration) -> Result<(), ClientError> {
    let deadline = Instant::now() + timeout;
    let timed_out = || ClientError::ConnectTimeout {
        millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    };
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(LoopEvent::Connected) => return Ok(()),
            Ok(LoopEvent::Disconnected(reason)) => debug!(reason = %reason, "broker not reachable yet"),
            Ok(LoopEvent::Inbound { topic, .. }) => debug!(topic = %topic, "message before connect ignored"),
            Err(RecvTimeoutError::Timeout) => return Err(timed_out()),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ClientError::Transport("connection thread stopped".into()))
            }
        }
    }
}
