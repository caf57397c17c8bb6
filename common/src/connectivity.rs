//! Link and broker state machines.
//!
//! Both are advanced by [`Connectivity::poll`] once per loop iteration and never
//! block: the broker handshake is started in one poll and checked on later
//! polls until it is established, fails, or its timeout timer fires.

use tracing::{debug, info, warn};

use crate::{
    config::TimingConfig,
    error::{BrokerError, ConfigError},
    input::InboundMessage,
    timer::{TimerId, TimerRegistry},
    topics::{Topics, TOPIC_PRESENCE},
};

/// Radio association, driven by the board.
pub trait LinkDriver {
    /// Starts association. Called once, after the warm-up delay.
    fn begin(&mut self);
    fn is_up(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    Pending,
    Established,
    Failed(BrokerError),
}

/// Publish/subscribe transport. Every method must return without waiting on
/// the network.
pub trait BrokerSession {
    fn begin_connect(&mut self) -> Result<(), BrokerError>;
    fn handshake(&mut self) -> Handshake;
    /// Drops any session or half-open attempt.
    fn abort(&mut self);
    /// Keep-alive and read obligations; an error means the session is gone.
    fn service(&mut self) -> Result<(), BrokerError>;
    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError>;
    /// Next queued inbound message, if any.
    fn poll_inbound(&mut self) -> Option<InboundMessage>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Down,
    Attempting,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerPhase {
    Disconnected,
    Connecting,
    Connected,
}

/// What a poll of the broker machine reports back to the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerStatus {
    /// No attempt made yet.
    Unstarted,
    /// Disconnected and waiting out the backoff window.
    Retrying,
    Connecting,
    /// Already connected before this poll.
    Connected,
    /// Became connected during this poll; the caller owes a full resync.
    Reconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub link_up: bool,
    pub broker_connected: bool,
    pub retry_deadline_ms: Option<u64>,
    pub attempted_once: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityUpdate {
    pub link_changed: bool,
    pub broker_changed: bool,
    pub broker: BrokerStatus,
}

impl ConnectivityUpdate {
    /// Whether anything shown on the status display moved this poll.
    pub fn status_changed(&self) -> bool {
        self.link_changed || self.broker_changed
    }
}

pub struct Connectivity<L, B> {
    link: L,
    broker: B,
    topics: Topics,
    link_phase: LinkPhase,
    broker_phase: BrokerPhase,
    connected_once: bool,
    attempted_once: bool,
    retry_armed: bool,
    warmup: TimerId,
    backoff: TimerId,
    handshake_timeout: TimerId,
}

impl<L: LinkDriver, B: BrokerSession> Connectivity<L, B> {
    pub fn new(
        link: L,
        broker: B,
        topics: Topics,
        timing: &TimingConfig,
        timers: &mut TimerRegistry,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            link,
            broker,
            topics,
            link_phase: LinkPhase::Down,
            broker_phase: BrokerPhase::Disconnected,
            connected_once: false,
            attempted_once: false,
            retry_armed: false,
            warmup: timers.register(timing.link_warmup_ms)?,
            backoff: timers.register(timing.broker_retry_ms)?,
            handshake_timeout: timers.register(timing.connect_timeout_ms)?,
        })
    }

    pub fn link_phase(&self) -> LinkPhase {
        self.link_phase
    }

    pub fn broker_phase(&self) -> BrokerPhase {
        self.broker_phase
    }

    pub fn is_connected(&self) -> bool {
        self.broker_phase == BrokerPhase::Connected
    }

    pub fn state(&self, timers: &TimerRegistry) -> ConnectivityState {
        ConnectivityState {
            link_up: self.link_phase == LinkPhase::Up,
            broker_connected: self.is_connected(),
            retry_deadline_ms: self.retry_armed.then(|| timers.deadline_ms(self.backoff)),
            attempted_once: self.attempted_once,
        }
    }

    pub fn poll(&mut self, timers: &mut TimerRegistry) -> ConnectivityUpdate {
        let link_changed = self.poll_link(timers);
        let phase_before = self.broker_phase;
        let broker = self.poll_broker(timers);
        ConnectivityUpdate {
            link_changed,
            broker_changed: phase_before != self.broker_phase,
            broker,
        }
    }

    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        self.broker.publish(topic, payload)
    }

    /// At most one inbound message per call, and only while connected.
    pub fn next_inbound(&mut self) -> Option<InboundMessage> {
        if !self.is_connected() {
            return None;
        }
        self.broker.poll_inbound()
    }

    fn poll_link(&mut self, timers: &mut TimerRegistry) -> bool {
        match self.link_phase {
            LinkPhase::Down => {
                if timers.elapsed(self.warmup) {
                    info!("link warm-up elapsed, starting association");
                    self.link.begin();
                    self.link_phase = LinkPhase::Attempting;
                }
                false
            }
            LinkPhase::Attempting => {
                if !self.link.is_up() {
                    return false;
                }
                self.link_phase = LinkPhase::Up;
                if self.connected_once {
                    info!("link restored");
                } else {
                    self.connected_once = true;
                    info!("link up");
                }
                true
            }
            LinkPhase::Up => {
                if self.link.is_up() {
                    return false;
                }
                warn!("link lost");
                self.link_phase = LinkPhase::Attempting;
                true
            }
        }
    }

    fn poll_broker(&mut self, timers: &mut TimerRegistry) -> BrokerStatus {
        if self.link_phase != LinkPhase::Up {
            if self.broker_phase != BrokerPhase::Disconnected {
                warn!("link not up, dropping broker session");
                self.drop_session(timers);
            }
            return self.idle_status();
        }

        match self.broker_phase {
            BrokerPhase::Disconnected => self.attempt(timers),
            BrokerPhase::Connecting => self.check_handshake(timers),
            BrokerPhase::Connected => match self.broker.service() {
                Ok(()) => BrokerStatus::Connected,
                Err(err) => {
                    warn!("broker connection lost: {err}");
                    self.drop_session(timers);
                    BrokerStatus::Retrying
                }
            },
        }
    }

    fn attempt(&mut self, timers: &mut TimerRegistry) -> BrokerStatus {
        if self.attempted_once && !timers.elapsed(self.backoff) {
            return BrokerStatus::Retrying;
        }

        self.attempted_once = true;
        self.retry_armed = false;
        info!("attempting broker connection");

        match self.broker.begin_connect() {
            Ok(()) => {
                timers.reset(self.handshake_timeout);
                self.broker_phase = BrokerPhase::Connecting;
                BrokerStatus::Connecting
            }
            Err(err) => {
                self.fail(timers, &err);
                BrokerStatus::Retrying
            }
        }
    }

    fn check_handshake(&mut self, timers: &mut TimerRegistry) -> BrokerStatus {
        match self.broker.handshake() {
            Handshake::Established => {
                self.broker_phase = BrokerPhase::Connected;
                info!("broker connected");
                self.announce();
                BrokerStatus::Reconnected
            }
            Handshake::Failed(err) => {
                self.fail(timers, &err);
                BrokerStatus::Retrying
            }
            Handshake::Pending => {
                if !timers.elapsed(self.handshake_timeout) {
                    return BrokerStatus::Connecting;
                }
                let err = BrokerError::HandshakeTimeout(timers.interval_ms(self.handshake_timeout));
                self.fail(timers, &err);
                BrokerStatus::Retrying
            }
        }
    }

    fn announce(&mut self) {
        for topic in self.topics.subscriptions() {
            if let Err(err) = self.broker.subscribe(topic) {
                warn!("subscribe to {topic} failed: {err}");
            }
        }
        let presence = self.topics.presence_payload.clone();
        match self.broker.publish(TOPIC_PRESENCE, presence.as_bytes()) {
            Ok(()) => debug!("presence announced as `{presence}`"),
            Err(err) => warn!("presence announcement failed: {err}"),
        }
    }

    fn fail(&mut self, timers: &mut TimerRegistry, err: &BrokerError) {
        warn!(
            "broker connection failed: {err}; retrying in {}ms",
            timers.interval_ms(self.backoff)
        );
        self.drop_session(timers);
    }

    fn drop_session(&mut self, timers: &mut TimerRegistry) {
        self.broker.abort();
        self.broker_phase = BrokerPhase::Disconnected;
        timers.reset(self.backoff);
        self.retry_armed = true;
    }

    fn idle_status(&self) -> BrokerStatus {
        if self.attempted_once {
            BrokerStatus::Retrying
        } else {
            BrokerStatus::Unstarted
        }
    }
}
