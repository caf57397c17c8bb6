use std::sync::Arc;

use tokio::sync::{
    mpsc::{self, error::TrySendError},
    watch,
};
use tracing::{info, trace};

use ac_remote_common::{ButtonLevels, IrFrame, LinkDriver, StatusView};

use crate::{control::Board, host::monotonic_ms, ir::{IrDiagnostics, IrTransmitter}};

const IR_RECEIVE_QUEUE: usize = 8;

/// The host's network is always there once association is requested.
pub struct HostLink {
    ssid: String,
    associated: bool,
}

impl HostLink {
    pub fn new(ssid: &str) -> Self {
        Self {
            ssid: ssid.to_string(),
            associated: false,
        }
    }
}

impl LinkDriver for HostLink {
    fn begin(&mut self) {
        info!("associating with `{}`", self.ssid);
        self.associated = true;
    }

    fn is_up(&self) -> bool {
        self.associated
    }
}

/// Loop-side half of the simulated board.
pub struct HostBoard {
    buttons: watch::Receiver<ButtonLevels>,
    frames: mpsc::Receiver<IrFrame>,
    transmitter: IrTransmitter,
    status: Arc<watch::Sender<Option<StatusView>>>,
    diagnostics: Arc<watch::Sender<IrDiagnostics>>,
}

/// HTTP-side half: injects inputs and reads back what the loop rendered.
#[derive(Clone)]
pub struct BoardHandle {
    buttons: Arc<watch::Sender<ButtonLevels>>,
    frames: mpsc::Sender<IrFrame>,
    status: watch::Receiver<Option<StatusView>>,
    diagnostics: watch::Receiver<IrDiagnostics>,
}

pub fn host_board() -> (HostBoard, BoardHandle) {
    let (buttons_tx, buttons_rx) = watch::channel(ButtonLevels::released());
    let (frames_tx, frames_rx) = mpsc::channel(IR_RECEIVE_QUEUE);
    let (status_tx, status_rx) = watch::channel(None);
    let (diagnostics_tx, diagnostics_rx) = watch::channel(IrDiagnostics::default());

    let board = HostBoard {
        buttons: buttons_rx,
        frames: frames_rx,
        transmitter: IrTransmitter::new(),
        status: Arc::new(status_tx),
        diagnostics: Arc::new(diagnostics_tx),
    };
    let handle = BoardHandle {
        buttons: Arc::new(buttons_tx),
        frames: frames_tx,
        status: status_rx,
        diagnostics: diagnostics_rx,
    };
    (board, handle)
}

impl Board for HostBoard {
    fn read_buttons(&mut self) -> ButtonLevels {
        *self.buttons.borrow()
    }

    fn poll_ir(&mut self) -> Option<IrFrame> {
        self.frames.try_recv().ok()
    }

    fn transmit_ir(&mut self, code: u32) -> anyhow::Result<()> {
        let result = self.transmitter.send(code, monotonic_ms());
        self.diagnostics.send_replace(self.transmitter.diagnostics());
        result
    }

    fn render(&mut self, view: &StatusView) {
        trace!(
            "render: powered={} {}F {} fan={} link={} broker={} splash={} blink={}",
            view.powered,
            view.temperature,
            view.mode,
            view.fan_speed,
            view.link_up,
            view.broker_connected,
            view.splash,
            view.blink
        );
        self.status.send_replace(Some(view.clone()));
    }
}

impl BoardHandle {
    /// Levels persist until replaced, like a physically held button.
    pub fn set_buttons(&self, levels: ButtonLevels) {
        self.buttons.send_replace(levels);
    }

    pub fn inject_ir(&self, frame: IrFrame) -> Result<(), TrySendError<IrFrame>> {
        self.frames.try_send(frame)
    }

    pub fn status(&self) -> Option<StatusView> {
        self.status.borrow().clone()
    }

    pub fn diagnostics(&self) -> IrDiagnostics {
        self.diagnostics.borrow().clone()
    }
}
