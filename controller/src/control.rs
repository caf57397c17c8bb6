use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info, warn};

use ac_remote_common::{
    admit, decode_network, decode_remote, encode_state, BrokerSession, BrokerStatus, ButtonArbiter,
    ButtonLevels, CodeTable, Command, ConfigError, Connectivity, ControllerConfig, DecodeError,
    DeviceMachine, DeviceState, Effect, IrFrame, LinkDriver, OffBounce, StatusView, TimerId,
    TimerRegistry, Topics,
};

/// Peripherals the control loop drives directly.
pub trait Board {
    fn read_buttons(&mut self) -> ButtonLevels;
    fn poll_ir(&mut self) -> Option<IrFrame>;
    fn transmit_ir(&mut self, code: u32) -> anyhow::Result<()>;
    fn render(&mut self, view: &StatusView);
}

struct Display {
    splash_timer: TimerId,
    blink_timer: TimerId,
    off_timer: TimerId,
    splash: bool,
    blink: bool,
    off_label: OffBounce,
    dirty: bool,
}

/// Owns every piece of loop state. One [`Controller::step`] is one loop
/// iteration and never blocks.
pub struct Controller<H, L, B> {
    board: H,
    timers: TimerRegistry,
    connectivity: Connectivity<L, B>,
    machine: DeviceMachine,
    codes: CodeTable,
    topics: Topics,
    arbiter: ButtonArbiter,
    display: Display,
}

impl<H: Board, L: LinkDriver, B: BrokerSession> Controller<H, L, B> {
    pub fn new(
        config: &ControllerConfig,
        board: H,
        link: L,
        broker: B,
        now_ms: u64,
    ) -> Result<Self, ConfigError> {
        Self::with_rng(config, board, link, broker, now_ms, StdRng::from_entropy())
    }

    /// Same as [`Controller::new`] with a caller-chosen source for the idle animation.
    fn with_rng(
        config: &ControllerConfig,
        board: H,
        link: L,
        broker: B,
        now_ms: u64,
        rng: StdRng,
    ) -> Result<Self, ConfigError> {
        let codes = CodeTable::appliance()?;
        let topics = Topics::for_device(&config.device_id);
        let mut timers = TimerRegistry::new(now_ms);
        let connectivity =
            Connectivity::new(link, broker, topics.clone(), &config.timing, &mut timers)?;
        let display = Display {
            splash_timer: timers.register(config.timing.splash_ms)?,
            blink_timer: timers.register(config.timing.status_blink_ms)?,
            off_timer: timers.register(config.timing.off_anim_ms)?,
            splash: true,
            blink: false,
            off_label: OffBounce::new(rng),
            dirty: true,
        };

        info!(
            "controller ready for `{}` with {} IR codes",
            config.device_id,
            codes.len()
        );

        Ok(Self {
            board,
            timers,
            connectivity,
            machine: DeviceMachine::new(codes),
            codes,
            topics,
            arbiter: ButtonArbiter::new(),
            display,
        })
    }

    pub fn state(&self) -> DeviceState {
        self.machine.state()
    }

    pub fn status(&self) -> StatusView {
        let state = self.machine.state();
        let link = self.connectivity.state(&self.timers);
        let (off_x, off_y) = self.display.off_label.position();
        StatusView {
            powered: state.powered,
            temperature: state.temperature,
            mode: state.mode.as_str(),
            fan_speed: state.fan_speed.as_str(),
            link_up: link.link_up,
            broker_connected: link.broker_connected,
            retry_deadline_ms: link.retry_deadline_ms,
            splash: self.display.splash,
            blink: self.display.blink,
            off_x,
            off_y,
        }
    }

    pub fn step(&mut self, now_ms: u64) {
        self.timers.advance(now_ms);

        let update = self.connectivity.poll(&mut self.timers);
        if update.status_changed() {
            self.invalidate();
        }
        if update.broker == BrokerStatus::Reconnected {
            self.publish_sync(self.machine.state());
        }

        self.tick_display();

        let levels = self.board.read_buttons();
        if let Some(button) = self.arbiter.poll(levels, self.machine.state().powered) {
            self.dispatch("button", button.command());
        }

        if let Some(frame) = self.board.poll_ir() {
            match decode_remote(frame, &self.codes) {
                Ok(command) => self.dispatch("remote", command),
                Err(DecodeError::NoSignal) => {}
                Err(err) => warn!("dropping remote frame: {err}"),
            }
        }

        if let Some(message) = self.connectivity.next_inbound() {
            match decode_network(&message, &self.topics, &self.codes) {
                Ok(command) => self.dispatch("network", command),
                Err(err) => warn!("dropping message on {}: {err}", message.topic),
            }
        }

        if self.display.dirty {
            self.display.dirty = false;
            let view = self.status();
            self.board.render(&view);
        }
    }

    fn dispatch(&mut self, source: &str, command: Command) {
        let command = match admit(command, &self.state()) {
            Ok(command) => command,
            Err(rejection) => {
                debug!("{source} {command} refused: {rejection:?}");
                return;
            }
        };

        let effects = self.machine.apply(command);
        if effects.is_empty() {
            return;
        }
        info!("{source} {command} applied");

        for effect in effects {
            match effect {
                Effect::TransmitIr(code) => {
                    if let Err(err) = self.board.transmit_ir(code) {
                        warn!("IR transmit of {code:#010X} failed: {err:#}");
                    }
                }
                Effect::PublishSync(state) => self.publish_sync(state),
            }
        }
        self.invalidate();
    }

    fn publish_sync(&mut self, state: DeviceState) {
        if !self.connectivity.is_connected() {
            debug!("broker offline, sync deferred until reconnect");
            return;
        }
        let payload = encode_state(state);
        if let Err(err) = self.connectivity.publish(&self.topics.sync, &payload) {
            warn!("state sync publish failed: {err}");
        }
    }

    /// Marks the screen for redraw. Any content change ends the splash early.
    fn invalidate(&mut self) {
        self.display.splash = false;
        self.display.dirty = true;
    }

    fn tick_display(&mut self) {
        if self.display.splash && self.timers.elapsed(self.display.splash_timer) {
            self.invalidate();
        }

        // The blink timer is left untouched while the splash covers the indicator.
        let connected = self.connectivity.is_connected();
        if !connected && !self.display.splash && self.timers.elapsed(self.display.blink_timer) {
            self.timers.reset(self.display.blink_timer);
            self.display.blink = !self.display.blink;
            self.display.dirty = true;
        }
        if connected && self.display.blink {
            self.display.blink = false;
            self.display.dirty = true;
        }

        if !self.machine.state().powered && self.timers.elapsed(self.display.off_timer) {
            self.timers.reset(self.display.off_timer);
            self.display.off_label.step();
            self.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::VecDeque, rc::Rc};

    use pretty_assertions::assert_eq;

    use ac_remote_common::{
        BrokerError, FanSpeed, Handshake, InboundMessage, Mode, NetworkConfig,
    };

    use super::*;

    #[derive(Default)]
    struct BoardRecord {
        levels: ButtonLevels,
        frames: VecDeque<IrFrame>,
        transmitted: Vec<u32>,
        renders: Vec<StatusView>,
    }

    #[derive(Clone, Default)]
    struct FakeBoard(Rc<RefCell<BoardRecord>>);

    impl Board for FakeBoard {
        fn read_buttons(&mut self) -> ButtonLevels {
            self.0.borrow().levels
        }

        fn poll_ir(&mut self) -> Option<IrFrame> {
            self.0.borrow_mut().frames.pop_front()
        }

        fn transmit_ir(&mut self, code: u32) -> anyhow::Result<()> {
            self.0.borrow_mut().transmitted.push(code);
            Ok(())
        }

        fn render(&mut self, view: &StatusView) {
            self.0.borrow_mut().renders.push(view.clone());
        }
    }

    #[derive(Clone, Default)]
    struct FakeLink(Rc<RefCell<bool>>);

    impl LinkDriver for FakeLink {
        fn begin(&mut self) {}

        fn is_up(&self) -> bool {
            *self.0.borrow()
        }
    }

    #[derive(Default)]
    struct BrokerRecord {
        accept: bool,
        connected: bool,
        published: Vec<(String, Vec<u8>)>,
        inbound: VecDeque<InboundMessage>,
    }

    #[derive(Clone, Default)]
    struct FakeBroker(Rc<RefCell<BrokerRecord>>);

    impl BrokerSession for FakeBroker {
        fn begin_connect(&mut self) -> Result<(), BrokerError> {
            Ok(())
        }

        fn handshake(&mut self) -> Handshake {
            let mut record = self.0.borrow_mut();
            if record.accept {
                record.connected = true;
                Handshake::Established
            } else {
                Handshake::Pending
            }
        }

        fn abort(&mut self) {
            self.0.borrow_mut().connected = false;
        }

        fn service(&mut self) -> Result<(), BrokerError> {
            if self.0.borrow().connected {
                Ok(())
            } else {
                Err(BrokerError::ConnectionLost)
            }
        }

        fn subscribe(&mut self, _topic: &str) -> Result<(), BrokerError> {
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
            self.0
                .borrow_mut()
                .published
                .push((topic.to_string(), payload.to_vec()));
            Ok(())
        }

        fn poll_inbound(&mut self) -> Option<InboundMessage> {
            self.0.borrow_mut().inbound.pop_front()
        }
    }

    struct Rig {
        board: FakeBoard,
        link: FakeLink,
        broker: FakeBroker,
        controller: Controller<FakeBoard, FakeLink, FakeBroker>,
    }

    impl Rig {
        fn new() -> Self {
            let config = ControllerConfig {
                network: NetworkConfig {
                    wifi_ssid: "home".to_string(),
                    wifi_pass: "pw".to_string(),
                    mqtt_host: "broker".to_string(),
                    ..NetworkConfig::default()
                },
                ..ControllerConfig::default()
            };
            let board = FakeBoard::default();
            let link = FakeLink::default();
            let broker = FakeBroker::default();
            let controller = Controller::with_rng(
                &config,
                board.clone(),
                link.clone(),
                broker.clone(),
                0,
                StdRng::seed_from_u64(3),
            )
            .unwrap();
            Self {
                board,
                link,
                broker,
                controller,
            }
        }

        /// Walks the warm-up and one successful handshake, then clears the recordings.
        fn online() -> Self {
            let mut rig = Self::new();
            *rig.link.0.borrow_mut() = true;
            rig.broker.0.borrow_mut().accept = true;
            rig.controller.step(10_000);
            rig.controller.step(10_010);
            rig.controller.step(10_020);
            assert!(rig.controller.status().broker_connected);
            rig.broker.0.borrow_mut().published.clear();
            rig.board.0.borrow_mut().renders.clear();
            rig
        }

        fn published(&self) -> Vec<(String, String)> {
            self.broker
                .0
                .borrow()
                .published
                .iter()
                .map(|(topic, payload)| {
                    (topic.clone(), String::from_utf8(payload.clone()).unwrap())
                })
                .collect()
        }

        fn press(&self, levels: ButtonLevels) {
            self.board.0.borrow_mut().levels = levels;
        }

        fn inbound(&self, topic: &str, payload: &str) {
            self.broker.0.borrow_mut().inbound.push_back(InboundMessage {
                topic: topic.to_string(),
                payload: payload.as_bytes().to_vec(),
            });
        }
    }

    #[test]
    fn raise_temp_emits_code_and_full_snapshot() {
        let mut rig = Rig::online();
        rig.board
            .0
            .borrow_mut()
            .frames
            .push_back(IrFrame::nec(0x10AF_708F));

        rig.controller.step(20_000);

        assert_eq!(rig.controller.state().temperature, 73);
        assert_eq!(rig.board.0.borrow().transmitted, vec![0x10AF_708F]);
        assert_eq!(
            rig.published(),
            vec![(
                "ac/sync/ac_alpha".to_string(),
                r#"{"powered":1,"temperature":73,"mode":1,"fanSpeed":3}"#.to_string()
            )]
        );
    }

    #[test]
    fn connecting_publishes_presence_then_one_sync() {
        let mut rig = Rig::new();
        *rig.link.0.borrow_mut() = true;
        rig.broker.0.borrow_mut().accept = true;

        rig.controller.step(10_000);
        rig.controller.step(10_010);
        rig.controller.step(10_020);
        rig.controller.step(10_030);

        assert_eq!(
            rig.published(),
            vec![
                ("activate".to_string(), "name:ac_alpha".to_string()),
                (
                    "ac/sync/ac_alpha".to_string(),
                    r#"{"powered":1,"temperature":72,"mode":1,"fanSpeed":3}"#.to_string()
                ),
            ]
        );
    }

    #[test]
    fn commands_while_offline_change_state_without_publishing() {
        let mut rig = Rig::new();
        rig.press(ButtonLevels::released().with(ac_remote_common::Button::TempDown));

        rig.controller.step(100);

        assert_eq!(rig.controller.state().temperature, 71);
        assert_eq!(rig.board.0.borrow().transmitted, vec![0x10AF_B04F]);
        assert!(rig.published().is_empty());
    }

    #[test]
    fn each_source_contributes_one_command_per_iteration() {
        let mut rig = Rig::online();
        rig.press(ButtonLevels::released().with(ac_remote_common::Button::TempUp));
        rig.board
            .0
            .borrow_mut()
            .frames
            .push_back(IrFrame::nec(0x10AF_708F));
        rig.inbound("ac/ac_alpha", "0x10AF708F");
        rig.inbound("ac/ac_alpha", "0x10AF708F");

        rig.controller.step(20_000);
        assert_eq!(rig.controller.state().temperature, 75);
        assert_eq!(rig.board.0.borrow().transmitted.len(), 3);

        rig.controller.step(20_010);
        assert_eq!(rig.controller.state().temperature, 76);
    }

    #[test]
    fn powered_off_only_admits_power_toggle() {
        let mut rig = Rig::online();
        rig.inbound("ac/ac_alpha", "0x10AF8877");
        rig.controller.step(20_000);
        assert!(!rig.controller.state().powered);

        rig.inbound("ac/ac_alpha", "0x10AF708F");
        rig.inbound(
            "ac/overwrite/ac_alpha",
            r#"{"powered":1,"temperature":80,"mode":0,"fanSpeed":0}"#,
        );
        rig.controller.step(20_010);
        rig.controller.step(20_020);

        assert_eq!(
            rig.controller.state(),
            DeviceState {
                powered: false,
                ..DeviceState::default()
            }
        );
        assert_eq!(rig.board.0.borrow().transmitted, vec![0x10AF_8877]);
        assert_eq!(rig.published().len(), 1);
    }

    #[test]
    fn overwrite_syncs_without_ir() {
        let mut rig = Rig::online();
        rig.inbound(
            "ac/overwrite/ac_alpha",
            r#"{"powered":1,"temperature":64,"mode":2,"fanSpeed":1}"#,
        );

        rig.controller.step(20_000);

        assert_eq!(
            rig.controller.state(),
            DeviceState {
                powered: true,
                temperature: 64,
                mode: Mode::Fan,
                fan_speed: FanSpeed::High,
            }
        );
        assert!(rig.board.0.borrow().transmitted.is_empty());
        assert_eq!(
            rig.published(),
            vec![(
                "ac/sync/ac_alpha".to_string(),
                r#"{"powered":1,"temperature":64,"mode":2,"fanSpeed":1}"#.to_string()
            )]
        );
    }

    #[test]
    fn malformed_inbound_is_dropped() {
        let mut rig = Rig::online();
        rig.inbound("ac/ac_alpha", "not-a-code");
        rig.inbound("ac/ac_alpha", "0xDEADBEEF");
        rig.inbound("ac/overwrite/ac_alpha", r#"{"powered":1}"#);

        for now in [20_000, 20_010, 20_020] {
            rig.controller.step(now);
        }

        assert_eq!(rig.controller.state(), DeviceState::default());
        assert!(rig.published().is_empty());
    }

    #[test]
    fn no_signal_sentinel_is_ignored() {
        let mut rig = Rig::new();
        rig.board
            .0
            .borrow_mut()
            .frames
            .push_back(IrFrame::nec(u64::MAX));
        rig.controller.step(100);
        assert!(rig.board.0.borrow().transmitted.is_empty());
    }

    fn renders(rig: &Rig) -> Vec<StatusView> {
        rig.board.0.borrow().renders.clone()
    }

    #[test]
    fn blink_waits_for_the_splash_to_end() {
        let mut rig = Rig::new();

        rig.controller.step(0);
        rig.controller.step(500);
        rig.controller.step(1_000);
        let shown = renders(&rig);
        assert_eq!(shown.len(), 1);
        assert!(shown[0].splash);
        assert!(!shown[0].blink);

        rig.controller.step(5_000);
        let last = renders(&rig).last().cloned().unwrap();
        assert!(!last.splash);
        assert!(last.blink);
        assert!(!last.broker_connected);

        rig.controller.step(5_500);
        let last = renders(&rig).last().cloned().unwrap();
        assert!(!last.blink);
        assert_eq!(renders(&rig).len(), 3);
    }

    #[test]
    fn a_change_during_the_splash_ends_it() {
        let mut rig = Rig::new();
        rig.controller.step(0);

        rig.press(ButtonLevels::released().with(ac_remote_common::Button::TempUp));
        rig.controller.step(1_000);

        let last = renders(&rig).last().cloned().unwrap();
        assert!(!last.splash);
        assert_eq!(last.temperature, 73);
        assert!(!rig.controller.status().splash);
    }

    #[test]
    fn refused_press_while_off_does_not_block_power() {
        use ac_remote_common::Button;

        let mut rig = Rig::online();
        rig.press(ButtonLevels::released().with(Button::Power));
        rig.controller.step(20_000);
        rig.press(ButtonLevels::released());
        rig.controller.step(20_010);
        assert!(!rig.controller.state().powered);

        let up = ButtonLevels::released().with(Button::TempUp);
        rig.press(up);
        rig.controller.step(20_020);
        rig.press(up.with(Button::Power));
        rig.controller.step(20_030);

        assert!(rig.controller.state().powered);
        assert_eq!(rig.controller.state().temperature, 72);
        assert_eq!(rig.board.0.borrow().transmitted, vec![0x10AF_8877, 0x10AF_8877]);
    }

    #[test]
    fn off_label_moves_on_its_own_timer() {
        let mut rig = Rig::online();
        rig.press(ButtonLevels::released().with(ac_remote_common::Button::Power));

        for now in (20_000..=20_060).step_by(10) {
            rig.controller.step(now);
        }

        let shown = renders(&rig);
        assert_eq!(shown.len(), 3);
        assert!(shown.iter().all(|view| !view.powered));
        assert_eq!((shown[0].off_x, shown[0].off_y), (55, 25));
        assert_ne!((shown[1].off_x, shown[1].off_y), (55, 25));
        assert_ne!(
            (shown[2].off_x, shown[2].off_y),
            (shown[1].off_x, shown[1].off_y)
        );
        for view in &shown {
            assert!((1..=95).contains(&view.off_x));
            assert!((20..=64).contains(&view.off_y));
        }
    }

    #[test]
    fn renders_only_when_something_changed() {
        let mut rig = Rig::online();
        rig.controller.step(20_000);
        let before = rig.board.0.borrow().renders.len();
        rig.controller.step(20_001);
        rig.controller.step(20_002);
        assert_eq!(rig.board.0.borrow().renders.len(), before);
    }
}
