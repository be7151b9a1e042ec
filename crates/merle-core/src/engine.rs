// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The process-wide engine owner.
//!
//! `Engine` owns one [`Renderer`] and one audio output, plus the interval
//! update scheduling that application logic registers against. There is no
//! global engine pointer: the application entry point creates the engine,
//! threads it explicitly to whoever needs it, and tears it down when the
//! run loop exits.

use std::time::Duration;

use crate::audio::{AudioDevice, StreamInfo};
use crate::renderer::{GraphicsBackend, RenderError, Renderer, RendererSettings};

/// Construction-time settings for the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    /// The application name, used for logging and window titles.
    pub app_name: String,
    /// Settings forwarded to the renderer.
    pub renderer: RendererSettings,
}

/// Identifies a scheduled update callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpdateCallbackId(u64);

struct ScheduledUpdate {
    id: UpdateCallbackId,
    interval: Duration,
    accumulated: Duration,
    priority: i32,
    callback: Box<dyn FnMut(Duration) + Send>,
}

/// The process-wide owner of the renderer, the audio output, and the update
/// schedule.
pub struct Engine<B: GraphicsBackend> {
    renderer: Renderer<B>,
    updates: Vec<ScheduledUpdate>,
    next_update_id: u64,
    audio_started: bool,
    running: bool,
    active: bool,
}

impl<B: GraphicsBackend> Engine<B> {
    /// Creates the engine and its renderer over `backend`.
    pub fn new(backend: B, settings: EngineSettings) -> Result<Self, RenderError> {
        log::info!("Engine starting for '{}'.", settings.app_name);
        let renderer = Renderer::new(backend, settings.renderer)?;
        Ok(Self {
            renderer,
            updates: Vec::new(),
            next_update_id: 0,
            audio_started: false,
            running: true,
            active: true,
        })
    }

    /// Returns the renderer.
    pub fn renderer(&self) -> &Renderer<B> {
        &self.renderer
    }

    /// Returns the renderer mutably (render-thread operations).
    pub fn renderer_mut(&mut self) -> &mut Renderer<B> {
        &mut self.renderer
    }

    /// Starts the audio output, wiring `on_mix_needed` as the mix callback.
    ///
    /// The engine owns exactly one audio output; starting a second one is
    /// rejected.
    pub fn start_audio(
        &mut self,
        device: Box<dyn AudioDevice>,
        on_mix_needed: Box<dyn FnMut(&mut [f32], &StreamInfo) + Send>,
    ) -> anyhow::Result<()> {
        if self.audio_started {
            anyhow::bail!("audio output already started");
        }
        device.start(on_mix_needed)?;
        self.audio_started = true;
        Ok(())
    }

    /// Schedules `callback` to run every `interval` (a zero interval runs it
    /// every update). Callbacks with a higher `priority` run first within an
    /// update.
    pub fn schedule_update(
        &mut self,
        interval: Duration,
        priority: i32,
        callback: Box<dyn FnMut(Duration) + Send>,
    ) -> UpdateCallbackId {
        let id = UpdateCallbackId(self.next_update_id);
        self.next_update_id += 1;
        self.updates.push(ScheduledUpdate {
            id,
            interval,
            accumulated: Duration::ZERO,
            priority,
            callback,
        });
        self.updates
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.0.cmp(&b.id.0)));
        id
    }

    /// Removes a scheduled callback. Returns `false` for an unknown id.
    pub fn unschedule_update(&mut self, id: UpdateCallbackId) -> bool {
        let before = self.updates.len();
        self.updates.retain(|update| update.id != id);
        before != self.updates.len()
    }

    /// Advances the update schedule by `dt`, running every callback whose
    /// interval elapsed. Skipped entirely while the engine is paused.
    pub fn update(&mut self, dt: Duration) {
        if !self.active {
            return;
        }
        for update in &mut self.updates {
            update.accumulated += dt;
            if update.accumulated >= update.interval {
                let elapsed = update.accumulated;
                update.accumulated = Duration::ZERO;
                (update.callback)(elapsed);
            }
        }
    }

    /// Runs one whole frame: logic updates, then the renderer's
    /// process/draw pair (uploads always precede draws).
    pub fn run_frame(&mut self, dt: Duration) -> Result<(), RenderError> {
        self.update(dt);
        self.renderer.process()?;
        self.renderer.draw()
    }

    /// Requests the run loop to exit.
    pub fn exit(&mut self) {
        log::info!("Engine exit requested.");
        self.running = false;
    }

    /// Pauses logic updates (rendering continues).
    pub fn pause(&mut self) {
        self.active = false;
    }

    /// Resumes logic updates.
    pub fn resume(&mut self) {
        self.active = true;
    }

    /// Returns `true` until [`Engine::exit`] is called.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Returns `true` while logic updates are not paused.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::HeadlessBackend;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn engine() -> Engine<HeadlessBackend> {
        Engine::new(HeadlessBackend::new(), EngineSettings::default()).unwrap()
    }

    #[test]
    fn interval_callbacks_fire_when_elapsed() {
        let mut engine = engine();
        let count = Arc::new(AtomicU32::new(0));
        let count_in_callback = count.clone();

        engine.schedule_update(
            Duration::from_millis(100),
            0,
            Box::new(move |_| {
                count_in_callback.fetch_add(1, Ordering::Relaxed);
            }),
        );

        engine.update(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::Relaxed), 0);

        engine.update(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::Relaxed), 1);

        engine.update(Duration::from_millis(250));
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn priority_orders_callbacks() {
        let mut engine = engine();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for (priority, tag) in [(0, "low"), (10, "high")] {
            let order = order.clone();
            engine.schedule_update(
                Duration::ZERO,
                priority,
                Box::new(move |_| order.lock().unwrap().push(tag)),
            );
        }

        engine.update(Duration::from_millis(16));
        assert_eq!(*order.lock().unwrap(), vec!["high", "low"]);
    }

    #[test]
    fn unschedule_stops_a_callback() {
        let mut engine = engine();
        let count = Arc::new(AtomicU32::new(0));
        let count_in_callback = count.clone();

        let id = engine.schedule_update(
            Duration::ZERO,
            0,
            Box::new(move |_| {
                count_in_callback.fetch_add(1, Ordering::Relaxed);
            }),
        );

        engine.update(Duration::from_millis(16));
        assert!(engine.unschedule_update(id));
        assert!(!engine.unschedule_update(id));
        engine.update(Duration::from_millis(16));
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn paused_engine_skips_updates() {
        let mut engine = engine();
        let count = Arc::new(AtomicU32::new(0));
        let count_in_callback = count.clone();

        engine.schedule_update(
            Duration::ZERO,
            0,
            Box::new(move |_| {
                count_in_callback.fetch_add(1, Ordering::Relaxed);
            }),
        );

        engine.pause();
        assert!(!engine.is_active());
        engine.update(Duration::from_millis(16));
        assert_eq!(count.load(Ordering::Relaxed), 0);

        engine.resume();
        engine.update(Duration::from_millis(16));
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn run_frame_processes_and_draws() {
        let mut engine = engine();
        engine.run_frame(Duration::from_millis(16)).unwrap();

        let ops = engine.renderer_mut().backend_mut().take_ops();
        use crate::renderer::BackendOp;
        assert!(ops.contains(&BackendOp::BeginFrame));
        assert!(ops.contains(&BackendOp::Present));
    }
}
