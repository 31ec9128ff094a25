//! Frame sources.
//!
//! The control loop pulls frames from a [`FrameSource`]. The desktop
//! implementation grabs a monitor through `xcap` and is compiled with the
//! `screen-capture` feature.

use crate::image::preprocess::Frame;
use crate::util::AutoSceneResult;

/// Produces one RGB frame per call.
pub trait FrameSource {
    fn capture(&mut self) -> AutoSceneResult<Frame>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> AutoSceneResult<Frame>,
{
    fn capture(&mut self) -> AutoSceneResult<Frame> {
        self()
    }
}

#[cfg(feature = "screen-capture")]
pub use screen::ScreenCapture;

#[cfg(feature = "screen-capture")]
mod screen {
    use super::FrameSource;
    use crate::image::preprocess::Frame;
    use crate::util::{AutoSceneError, AutoSceneResult};
    use tracing::debug;

    /// Captures a whole monitor selected by its 1-based index.
    ///
    /// The monitor is looked up again on every capture so the source can move
    /// to the loop thread and follows display changes.
    #[derive(Clone, Debug)]
    pub struct ScreenCapture {
        monitor_index: usize,
    }

    impl ScreenCapture {
        /// Checks that the monitor exists.
        pub fn open(monitor_index: usize) -> AutoSceneResult<Self> {
            let capture = Self { monitor_index };
            capture.monitor()?;
            debug!(monitor_index, "opened monitor");
            Ok(capture)
        }

        pub fn monitor_index(&self) -> usize {
            self.monitor_index
        }

        fn monitor(&self) -> AutoSceneResult<xcap::Monitor> {
            let failed = |reason: String| AutoSceneError::CaptureFailed { reason };
            let monitors =
                xcap::Monitor::all().map_err(|err| failed(format!("cannot list monitors: {err}")))?;
            let count = monitors.len();
            self.monitor_index
                .checked_sub(1)
                .and_then(|idx| monitors.into_iter().nth(idx))
                .ok_or_else(|| {
                    failed(format!(
                        "monitor {} not found ({count} available)",
                        self.monitor_index
                    ))
                })
        }
    }

    impl FrameSource for ScreenCapture {
        fn capture(&mut self) -> AutoSceneResult<Frame> {
            let shot = self
                .monitor()?
                .capture_image()
                .map_err(|err| AutoSceneError::CaptureFailed {
                    reason: err.to_string(),
                })?;
            let (width, height) = (shot.width(), shot.height());
            let rgba = shot.into_raw();
            let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
            for px in rgba.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
            }
            Frame::from_raw(width, height, rgb).ok_or(AutoSceneError::InvalidDimensions {
                width: width as usize,
                height: height as usize,
            })
        }
    }
}
