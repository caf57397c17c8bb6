use anyhow::bail;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize)]
pub struct IrDiagnostics {
    #[serde(rename = "lastSendMs")]
    pub last_send_ms: Option<u64>,
    #[serde(rename = "lastCode")]
    pub last_code: Option<String>,
    #[serde(rename = "sentFrames")]
    pub sent_frames: u64,
    #[serde(rename = "failedFrames")]
    pub failed_frames: u64,
    #[serde(rename = "lastError")]
    pub last_error: Option<String>,
}

/// Host stand-in for the IR LED driver. Frames are checked and logged
/// instead of modulated.
#[derive(Debug, Default)]
pub struct IrTransmitter {
    last_send_ms: Option<u64>,
    last_code: Option<u32>,
    sent_frames: u64,
    failed_frames: u64,
    last_error: Option<String>,
}

impl IrTransmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, code: u32, now_ms: u64) -> anyhow::Result<()> {
        let result = check_nec_frame(code);

        match &result {
            Ok(()) => {
                info!("IR transmit NEC {code:#010X}");
                self.last_send_ms = Some(now_ms);
                self.last_code = Some(code);
                self.sent_frames = self.sent_frames.saturating_add(1);
                self.last_error = None;
            }
            Err(err) => {
                warn!("IR frame rejected: {err:#}");
                self.failed_frames = self.failed_frames.saturating_add(1);
                self.last_error = Some(format!("{err:#}"));
            }
        }

        result
    }

    pub fn diagnostics(&self) -> IrDiagnostics {
        IrDiagnostics {
            last_send_ms: self.last_send_ms,
            last_code: self.last_code.map(|code| format!("{code:#010X}")),
            sent_frames: self.sent_frames,
            failed_frames: self.failed_frames,
            last_error: self.last_error.clone(),
        }
    }
}

/// NEC carries the command byte followed by its complement. The address half
/// may be extended, so only the command half is checked.
fn check_nec_frame(code: u32) -> anyhow::Result<()> {
    let command = (code >> 8) as u8;
    let inverse = code as u8;
    if command != !inverse {
        bail!("{code:#010X} is not an NEC frame: command {command:#04X} vs complement {inverse:#04X}");
    }
    Ok(())
}
