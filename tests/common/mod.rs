#![allow(dead_code)]

use autoscene::{ControlError, ControlResult, ControlSurface, Sleeper, SurfaceDialer};
use image::{Luma, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scene item id the fake surface hands out.
pub const ITEM_ID: i64 = 7;

/// One request observed by the fake surface.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Dial,
    SetScene(String),
    ItemId(String, String),
    SetEnabled(i64, bool),
    Version,
}

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    dial_results: VecDeque<bool>,
    call_results: VecDeque<bool>,
}

/// Test-side handle on the fake control surface.
#[derive(Clone, Default)]
pub struct FakeControl {
    script: Arc<Mutex<Script>>,
}

impl FakeControl {
    pub fn new() -> (Self, FakeDialer) {
        let control = Self::default();
        let dialer = FakeDialer {
            script: control.script.clone(),
        };
        (control, dialer)
    }

    /// Makes the next `n` dials fail.
    pub fn fail_dials(&self, n: usize) {
        let mut script = self.script.lock().unwrap();
        script.dial_results.extend(std::iter::repeat(false).take(n));
    }

    /// Makes the next `n` requests on any session fail.
    pub fn fail_calls(&self, n: usize) {
        let mut script = self.script.lock().unwrap();
        script.call_results.extend(std::iter::repeat(false).take(n));
    }

    /// Scripts the outcome of the next requests, in order; `false` fails.
    pub fn script_calls(&self, outcomes: &[bool]) {
        let mut script = self.script.lock().unwrap();
        script.call_results.extend(outcomes.iter().copied());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn clear(&self) {
        self.script.lock().unwrap().calls.clear();
    }

    pub fn dials(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Dial).count()
    }

    /// Visibility values sent with `SetSceneItemEnabled`, in order.
    pub fn visibility(&self) -> Vec<bool> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SetEnabled(_, enabled) => Some(enabled),
                _ => None,
            })
            .collect()
    }

    pub fn scenes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SetScene(scene) => Some(scene),
                _ => None,
            })
            .collect()
    }
}

pub struct FakeDialer {
    script: Arc<Mutex<Script>>,
}

impl SurfaceDialer for FakeDialer {
    type Surface = FakeSurface;

    fn dial(&mut self) -> ControlResult<FakeSurface> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::Dial);
        if script.dial_results.pop_front().unwrap_or(true) {
            Ok(FakeSurface {
                script: self.script.clone(),
            })
        } else {
            Err(ControlError::ConnectFailed {
                reason: "connection refused".into(),
            })
        }
    }
}

pub struct FakeSurface {
    script: Arc<Mutex<Script>>,
}

impl FakeSurface {
    fn record(&mut self, call: Call, request: &'static str) -> ControlResult<()> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(call);
        if !script.call_results.pop_front().unwrap_or(true) {
            return Err(ControlError::CallFailed {
                request,
                reason: "socket closed".into(),
            });
        }
        Ok(())
    }
}

impl ControlSurface for FakeSurface {
    fn set_current_program_scene(&mut self, scene: &str) -> ControlResult<()> {
        self.record(Call::SetScene(scene.into()), "SetCurrentProgramScene")
    }

    fn scene_item_id(&mut self, scene: &str, source: &str) -> ControlResult<i64> {
        self.record(Call::ItemId(scene.into(), source.into()), "GetSceneItemId")?;
        Ok(ITEM_ID)
    }

    fn set_scene_item_enabled(&mut self, _scene: &str, item_id: i64, enabled: bool) -> ControlResult<()> {
        self.record(Call::SetEnabled(item_id, enabled), "SetSceneItemEnabled")
    }

    fn version(&mut self) -> ControlResult<String> {
        self.record(Call::Version, "GetVersion")?;
        Ok("30.2.0".into())
    }
}

/// Sleeper that records requested durations without blocking.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    log: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.log.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.log.lock().unwrap().push(duration);
    }
}

/// Smooth full-range gray pattern, one period across each axis.
///
/// `width` should be a multiple of 4 so both 0 and 255 occur.
pub fn sinusoid(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let fx = (2.0 * PI * f64::from(x) / f64::from(width)).sin();
        let fy = (2.0 * PI * f64::from(y) / f64::from(height)).cos();
        let v = (127.5 + 127.5 * fx * fy).round().clamp(0.0, 255.0) as u8;
        Rgb([v, v, v])
    })
}

/// Uniform gray noise containing both 0 and 255.
pub fn noise(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = RgbImage::from_fn(width, height, |_, _| {
        let v: u8 = rng.random_range(0..=255);
        Rgb([v, v, v])
    });
    img.put_pixel(0, 0, Rgb([0, 0, 0]));
    img.put_pixel(1, 0, Rgb([255, 255, 255]));
    img
}

/// Copies `patch` into `frame` with its top-left corner at `(x, y)`.
pub fn embed(frame: &mut RgbImage, patch: &RgbImage, x: u32, y: u32) {
    for (px, py, pixel) in patch.enumerate_pixels() {
        frame.put_pixel(x + px, y + py, *pixel);
    }
}

/// Area-resizes a gray RGB image by `scale`.
pub fn rescale(src: &RgbImage, scale: f64) -> RgbImage {
    let width = (f64::from(src.width()) * scale).round() as u32;
    let height = (f64::from(src.height()) * scale).round() as u32;
    let gray = image::GrayImage::from_fn(src.width(), src.height(), |x, y| Luma([src.get_pixel(x, y)[0]]));
    let resized = image::imageops::resize(&gray, width, height, image::imageops::FilterType::Triangle);
    RgbImage::from_fn(width, height, |x, y| {
        let v = resized.get_pixel(x, y)[0];
        Rgb([v, v, v])
    })
}
