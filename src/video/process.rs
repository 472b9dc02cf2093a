use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use super::VideoSurface;
use crate::error::{PreviewError, Result};

/// Plays each shot's video in an external player process (ffplay by
/// default). Stopping kills the process.
#[derive(Debug)]
pub struct ProcessVideo {
    program: String,
    child: Option<Child>,
}

impl ProcessVideo {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            child: None,
        }
    }

    fn args<'a>(&self, url: &'a str) -> Vec<&'a str> {
        // -ss 0: 从头播放
        // -autoexit: 播放结束自动退出
        vec!["-hide_banner", "-loglevel", "error", "-autoexit", "-ss", "0", url]
    }
}

impl VideoSurface for ProcessVideo {
    fn start(&mut self, url: &str) -> Result<()> {
        self.stop();

        let child = Command::new(&self.program)
            .args(self.args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PreviewError::VideoError(format!("Failed to run {}: {}", self.program, e))
            })?;

        info!("Playing video {} (pid {:?})", url, child.id());
        self.child = Some(child);
        Ok(())
    }

    fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        // 进程可能已经自行退出
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        if let Err(e) = child.start_kill() {
            warn!("Failed to stop video player: {}", e);
        }
    }
}

impl Drop for ProcessVideo {
    fn drop(&mut self) {
        self.stop();
    }
}
