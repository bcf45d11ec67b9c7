//! Playback scheduler: stopped -> loading -> playing -> stopped.
//!
//! On start every keyframe of every layer is decoded into a [`FrameGrid`];
//! a dedicated thread then ticks a [`PlaybackLoop`] at the configured rate,
//! drawing straight into the registered surfaces. Cancellation is a shared
//! flag checked at the top of each tick, never mid-draw.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use renderer::RgbaImage;
use timeline::{Frame, Layer, LayerId};

use crate::SurfaceRegistry;

pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState { Stopped, Loading, Playing }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackEvent {
    Loaded,
    /// The frame just drawn; becomes the active frame.
    Frame(Frame),
    Stopped,
}

/// Rate and loop flag, read fresh on every tick.
#[derive(Debug)]
pub struct PlaybackSettings {
    frame_rate: AtomicU32,
    looping: AtomicBool,
}

impl PlaybackSettings {
    pub fn new(frame_rate: u32, looping: bool) -> Self {
        Self { frame_rate: AtomicU32::new(frame_rate.clamp(MIN_FPS, MAX_FPS)), looping: AtomicBool::new(looping) }
    }

    pub fn frame_rate(&self) -> u32 { self.frame_rate.load(Ordering::Relaxed) }

    pub fn set_frame_rate(&self, fps: u32) { self.frame_rate.store(fps.clamp(MIN_FPS, MAX_FPS), Ordering::Relaxed); }

    pub fn looping(&self) -> bool { self.looping.load(Ordering::Relaxed) }

    pub fn set_looping(&self, looping: bool) { self.looping.store(looping, Ordering::Relaxed); }

    /// `1000 / frame_rate` milliseconds.
    pub fn interval(&self) -> Duration { Duration::from_micros(1_000_000 / self.frame_rate() as u64) }
}

/// Decoded frames of one layer.
pub struct LayerTrack {
    pub layer: LayerId,
    pub hidden: bool,
    pub frames: Vec<Option<Arc<RgbaImage>>>,
}

impl LayerTrack {
    /// Decodes every keyframe. A frame that fails to decode reuses the previous frame's pixels.
    fn decode(layer: &Layer) -> Self {
        let mut frames: Vec<Option<Arc<RgbaImage>>> = Vec::with_capacity(layer.keyframes.len());
        for kf in &layer.keyframes {
            let decoded = if kf.bitmap.is_blank() {
                None
            } else {
                match renderer::decode_bitmap(&kf.bitmap) {
                    Ok(img) => Some(Arc::new(img)),
                    Err(err) => {
                        tracing::warn!("playback: layer '{}' keyframe {} failed to decode: {err}", layer.name, kf.id);
                        frames.last().cloned().flatten()
                    }
                }
            };
            frames.push(decoded);
        }
        Self { layer: layer.id, hidden: layer.settings.hidden, frames }
    }

    fn empty(layer: &Layer) -> Self { Self { layer: layer.id, hidden: layer.settings.hidden, frames: Vec::new() } }
}

/// Offscreen buffers indexed `[layer][frame]`.
pub struct FrameGrid {
    pub tracks: Vec<LayerTrack>,
}

impl FrameGrid {
    /// Decodes all layers concurrently; returns once every layer is complete.
    pub fn load(layers: &[Arc<Layer>]) -> Self {
        let tracks = thread::scope(|scope| {
            let workers: Vec<_> = layers.iter().map(|layer| scope.spawn(move || LayerTrack::decode(layer))).collect();
            workers
                .into_iter()
                .zip(layers)
                .map(|(worker, layer)| worker.join().unwrap_or_else(|_| LayerTrack::empty(layer)))
                .collect()
        });
        Self { tracks }
    }

    pub fn frame(&self, layer: usize, frame: Frame) -> Option<&Arc<RgbaImage>> {
        self.tracks.get(layer)?.frames.get(frame)?.as_ref()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    Advanced(Frame),
    Wrapped,
    Stopped,
}

/// One playback run. Owns the buffers and the frame counter.
pub struct PlaybackLoop {
    grid: FrameGrid,
    counter: Frame,
    length: usize,
    cancel: Arc<AtomicBool>,
}

impl PlaybackLoop {
    pub fn new(grid: FrameGrid, start: Frame, length: usize, cancel: Arc<AtomicBool>) -> Self {
        Self { grid, counter: start, length, cancel }
    }

    pub fn counter(&self) -> Frame { self.counter }

    /// One scheduled step: check cancellation, handle the end of the timeline, or draw the next frame.
    pub fn tick(&mut self, looping: bool, surfaces: &SurfaceRegistry) -> Tick {
        if self.cancel.load(Ordering::Acquire) { return Tick::Stopped; }
        if self.counter >= self.length {
            if !looping { return Tick::Stopped; }
            self.counter = 0;
            return Tick::Wrapped;
        }
        for (idx, track) in self.grid.tracks.iter().enumerate() {
            if track.hidden { continue; }
            let Some(handle) = surfaces.get(track.layer) else { continue };
            let mut surface = handle.lock();
            surface.clear();
            if let Some(image) = self.grid.frame(idx, self.counter) { surface.draw_image(image, 1.0); }
        }
        let shown = self.counter;
        self.counter += 1;
        Tick::Advanced(shown)
    }
}

/// Handle to the playback thread.
pub struct Playback {
    settings: Arc<PlaybackSettings>,
    state: Arc<Mutex<PlayState>>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    tx_events: Sender<PlaybackEvent>,
    pub rx_events: Receiver<PlaybackEvent>,
}

impl Playback {
    pub fn new(settings: Arc<PlaybackSettings>) -> Self {
        let (tx_events, rx_events) = unbounded();
        Self {
            settings,
            state: Arc::new(Mutex::new(PlayState::Stopped)),
            cancel: Arc::new(AtomicBool::new(false)),
            worker: None,
            tx_events,
            rx_events,
        }
    }

    pub fn state(&self) -> PlayState { *self.state.lock() }

    pub fn settings(&self) -> &Arc<PlaybackSettings> { &self.settings }

    /// Starts a run over `layers` from `start`. Refused unless stopped.
    pub fn start(&mut self, layers: Vec<Arc<Layer>>, start: Frame, length: usize, surfaces: SurfaceRegistry) -> bool {
        {
            let mut state = self.state.lock();
            if *state != PlayState::Stopped { return false; }
            *state = PlayState::Loading;
        }
        if let Some(done) = self.worker.take() { let _ = done.join(); }

        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel = cancel.clone();
        let settings = self.settings.clone();
        let state = self.state.clone();
        let tx = self.tx_events.clone();
        self.worker = Some(thread::spawn(move || {
            let started = Instant::now();
            let grid = FrameGrid::load(&layers);
            tracing::debug!("playback: decoded {} layers in {:?}", grid.tracks.len(), started.elapsed());
            *state.lock() = PlayState::Playing;
            let _ = tx.send(PlaybackEvent::Loaded);

            let mut run = PlaybackLoop::new(grid, start, length, cancel);
            let mut next = Instant::now();
            loop {
                match run.tick(settings.looping(), &surfaces) {
                    Tick::Stopped => break,
                    Tick::Advanced(frame) => { let _ = tx.send(PlaybackEvent::Frame(frame)); }
                    Tick::Wrapped => {}
                }
                next += settings.interval();
                let now = Instant::now();
                if next > now { thread::sleep(next - now); } else { next = now; }
            }
            *state.lock() = PlayState::Stopped;
            let _ = tx.send(PlaybackEvent::Stopped);
            tracing::info!("playback stopped at frame {}", run.counter());
        }));
        true
    }

    /// Requests a stop; honoured at the next tick.
    pub fn stop(&self) { self.cancel.store(true, Ordering::Release); }

    /// Blocks until the current run (if any) has finished.
    pub fn join(&mut self) {
        if let Some(worker) = self.worker.take() { let _ = worker.join(); }
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::{encode_image, Rgba, Surface};
    use timeline::Bitmap;

    fn painted(value: u8) -> Bitmap {
        let mut img = RgbaImage::new(4, 4);
        img.put_pixel(0, 0, Rgba([value, 0, 0, 255]));
        encode_image(&img).unwrap()
    }

    fn layer_with(frames: &[Bitmap]) -> Arc<Layer> {
        let mut layer = Layer::new("a", 0);
        let owner = layer.id;
        layer.keyframes.clear();
        for bitmap in frames {
            let mut kf = timeline::Keyframe::blank(owner);
            kf.bitmap = bitmap.clone();
            layer.keyframes.push(kf);
        }
        Arc::new(layer)
    }

    #[test]
    fn broken_frame_falls_back_to_previous() {
        let layer = layer_with(&[painted(10), Bitmap::from("garbage"), Bitmap::blank()]);
        let grid = FrameGrid::load(&[layer]);
        let first = grid.frame(0, 0).unwrap();
        assert!(Arc::ptr_eq(first, grid.frame(0, 1).unwrap()));
        assert!(grid.frame(0, 2).is_none());
    }

    #[test]
    fn runs_exactly_length_frames_without_loop() {
        let layer = layer_with(&[painted(1), painted(2), painted(3)]);
        let surfaces = SurfaceRegistry::new();
        let handle = Arc::new(Mutex::new(Surface::new(4, 4)));
        surfaces.register(layer.id, handle.clone());
        let mut run = PlaybackLoop::new(FrameGrid::load(&[layer]), 0, 3, Arc::new(AtomicBool::new(false)));

        let ticks: Vec<Tick> = (0..4).map(|_| run.tick(false, &surfaces)).collect();
        assert_eq!(ticks, vec![Tick::Advanced(0), Tick::Advanced(1), Tick::Advanced(2), Tick::Stopped]);
        assert_eq!(handle.lock().image().get_pixel(0, 0)[0], 3);
    }

    #[test]
    fn loop_mode_wraps_to_first_frame() {
        let layer = layer_with(&[painted(1), painted(2)]);
        let surfaces = SurfaceRegistry::new();
        let mut run = PlaybackLoop::new(FrameGrid::load(&[layer]), 1, 2, Arc::new(AtomicBool::new(false)));
        assert_eq!(run.tick(true, &surfaces), Tick::Advanced(1));
        assert_eq!(run.tick(true, &surfaces), Tick::Wrapped);
        assert_eq!(run.tick(true, &surfaces), Tick::Advanced(0));
        // loop flag is read per tick
        assert_eq!(run.tick(false, &surfaces), Tick::Advanced(1));
        assert_eq!(run.tick(false, &surfaces), Tick::Stopped);
    }

    #[test]
    fn cancellation_is_seen_before_drawing() {
        let layer = layer_with(&[painted(1)]);
        let surfaces = SurfaceRegistry::new();
        let handle = Arc::new(Mutex::new(Surface::new(4, 4)));
        surfaces.register(layer.id, handle.clone());
        let cancel = Arc::new(AtomicBool::new(true));
        let mut run = PlaybackLoop::new(FrameGrid::load(&[layer]), 0, 1, cancel);
        assert_eq!(run.tick(true, &surfaces), Tick::Stopped);
        assert!(handle.lock().is_transparent());
    }

    #[test]
    fn hidden_layers_are_left_alone() {
        let mut layer = (*layer_with(&[painted(1)])).clone();
        layer.settings.hidden = true;
        let surfaces = SurfaceRegistry::new();
        let handle = Arc::new(Mutex::new(Surface::new(4, 4)));
        surfaces.register(layer.id, handle.clone());
        let mut run = PlaybackLoop::new(FrameGrid::load(&[Arc::new(layer)]), 0, 1, Arc::new(AtomicBool::new(false)));
        assert_eq!(run.tick(false, &surfaces), Tick::Advanced(0));
        assert!(handle.lock().is_transparent());
    }

    #[test]
    fn settings_clamp_rate() {
        let s = PlaybackSettings::new(0, false);
        assert_eq!(s.frame_rate(), 1);
        s.set_frame_rate(240);
        assert_eq!(s.frame_rate(), 60);
        s.set_frame_rate(10);
        assert_eq!(s.interval(), Duration::from_millis(100));
    }
}
