use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::info;

use crate::dispatch::{CommandDispatch, CommandRequest};
use crate::error::BoxError;

/// Remote control for a data recorder: `start`, `stop` and `status`.
pub struct Recorder {
    recording: AtomicBool,
    started: Instant,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            recording: AtomicBool::new(false),
            started: Instant::now(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    /// Returns true when the recording state actually changed.
    fn set_recording(&self, start: bool) -> bool {
        let was = self.recording.swap(start, Ordering::AcqRel);
        if was == start {
            info!(
                "recording already {}",
                if start { "started" } else { "stopped" }
            );
            return false;
        }
        info!(recording = start, "recording toggled");
        true
    }
}

impl CommandDispatch for Recorder {
    fn on_request(&self, request: &CommandRequest) -> Result<bool, BoxError> {
        match request.name.as_str() {
            "start" => Ok(self.set_recording(true)),
            "stop" => Ok(self.set_recording(false)),
            "status" => Ok(true),
            other => Err(format!("unknown command {:?}", other).into()),
        }
    }

    fn status(&self) -> String {
        let state = if self.is_recording() {
            "RECORDING"
        } else {
            "STOPPED"
        };
        format!(
            "Status: {}\nUptime: {}s\n",
            state,
            self.started.elapsed().as_secs()
        )
    }
}
