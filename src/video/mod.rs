mod process;

use tracing::info;

use crate::error::Result;

pub use process::ProcessVideo;

/// 当前分镜的视频播放窗口，同一时间只驱动一个视频
pub trait VideoSurface: Send {
    /// Rewind to the first frame and start playing `url`.
    fn start(&mut self, url: &str) -> Result<()>;

    /// Stop whatever is playing. Must be safe to call when idle.
    fn stop(&mut self);
}

impl<T: VideoSurface + ?Sized> VideoSurface for Box<T> {
    fn start(&mut self, url: &str) -> Result<()> {
        (**self).start(url)
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

/// Surface that only logs, for headless previews.
#[derive(Debug, Default)]
pub struct NullVideo {
    playing: Option<String>,
}

impl VideoSurface for NullVideo {
    fn start(&mut self, url: &str) -> Result<()> {
        info!("Video start: {}", url);
        self.playing = Some(url.to_string());
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(url) = self.playing.take() {
            info!("Video stop: {}", url);
        }
    }
}
