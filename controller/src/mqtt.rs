use std::time::Duration;

use rumqttc::{AsyncClient, ClientError, Event, Incoming, MqttOptions, QoS};
use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use ac_remote_common::{BrokerError, BrokerSession, ControllerConfig, Handshake, InboundMessage};

const INBOUND_QUEUE: usize = 16;
const REQUEST_QUEUE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    Connecting,
    Connected,
    Failed(String),
}

struct Session {
    client: AsyncClient,
    state: watch::Receiver<SessionState>,
    inbound: mpsc::Receiver<InboundMessage>,
    task: JoinHandle<()>,
}

/// rumqttc-backed broker session. The event loop runs as a tokio task; the
/// control loop only reads its state and drains its inbound queue.
pub struct MqttSession {
    runtime: Handle,
    options: MqttOptions,
    session: Option<Session>,
}

pub fn mqtt_options(config: &ControllerConfig) -> MqttOptions {
    let network = &config.network;
    let mut options = MqttOptions::new(
        format!("ac-remote-{}", config.device_id),
        network.mqtt_host.clone(),
        network.mqtt_port,
    );
    options.set_keep_alive(Duration::from_secs(config.timing.keep_alive_secs));
    if !network.mqtt_user.is_empty() {
        options.set_credentials(network.mqtt_user.clone(), network.mqtt_pass.clone());
    }
    options
}

impl MqttSession {
    pub fn new(options: MqttOptions, runtime: Handle) -> Self {
        Self {
            runtime,
            options,
            session: None,
        }
    }

    fn client(&self) -> Result<&AsyncClient, BrokerError> {
        self.session
            .as_ref()
            .map(|session| &session.client)
            .ok_or(BrokerError::NotConnected)
    }
}

impl BrokerSession for MqttSession {
    fn begin_connect(&mut self) -> Result<(), BrokerError> {
        self.abort();

        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_QUEUE);
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);

        let task = self.runtime.spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        state_tx.send_replace(SessionState::Connected);
                    }
                    Ok(Event::Incoming(Incoming::Publish(message))) => {
                        let inbound = InboundMessage {
                            topic: message.topic,
                            payload: message.payload.to_vec(),
                        };
                        if let Err(err) = inbound_tx.try_send(inbound) {
                            warn!("inbound queue full, dropping message: {err}");
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        // Reconnects are paced by the connectivity machine, not rumqttc.
                        state_tx.send_replace(SessionState::Failed(err.to_string()));
                        break;
                    }
                }
            }
        });

        let (host, port) = self.options.broker_address();
        info!("mqtt connecting to {host}:{port}");

        self.session = Some(Session {
            client,
            state: state_rx,
            inbound: inbound_rx,
            task,
        });
        Ok(())
    }

    fn handshake(&mut self) -> Handshake {
        let Some(session) = &self.session else {
            return Handshake::Failed(BrokerError::NotConnected);
        };
        let state = session.state.borrow().clone();
        match state {
            SessionState::Connecting => Handshake::Pending,
            SessionState::Connected => Handshake::Established,
            SessionState::Failed(reason) => Handshake::Failed(BrokerError::Handshake(reason)),
        }
    }

    fn abort(&mut self) {
        if let Some(session) = self.session.take() {
            session.task.abort();
            debug!("mqtt session dropped");
        }
    }

    fn service(&mut self) -> Result<(), BrokerError> {
        let Some(session) = &self.session else {
            return Err(BrokerError::NotConnected);
        };
        let state = session.state.borrow().clone();
        match state {
            SessionState::Connecting | SessionState::Connected => Ok(()),
            SessionState::Failed(reason) => Err(BrokerError::Transport(reason)),
        }
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.client()?
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(transport)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.client()?
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(transport)
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.session.as_mut()?.inbound.try_recv().ok()
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        self.abort();
    }
}

fn transport(err: ClientError) -> BrokerError {
    BrokerError::Transport(err.to_string())
}
