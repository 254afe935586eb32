//! OSC manager service.
//!
//! [`OscManager`] owns the trigger state and wires it to its collaborators: a [`Clock`], a
//! [`ModeTransport`], an [`AmplitudeSource`] and a [`MixerVolume`] sink. Everything is injected,
//! so the manager runs the same against real sockets and in-memory fakes.
//!
//! [`OscService`] ticks a manager on a background thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio_engine::{AmplitudeSource, MixerVolume};
use crate::osc::transport::ModeTransport;
use crate::osc::trigger::{Effect, TriggerEvent, TriggerSettings, TriggerState, step};
use crate::osc::wire::decode_inbound;
use crate::osc::Mode;
use crate::scheduler::{Clock, Scheduler, TaskId};

/// How often the service thread ticks its manager.
pub const SERVICE_TICK: Duration = Duration::from_millis(10);

/// Datagrams handled per tick, so a flooding peer cannot stall the poll.
const MAX_DATAGRAMS_PER_TICK: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Timer {
    Poll,
    Countdown,
}

pub struct OscManager {
    clock: Arc<dyn Clock>,
    transport: Box<dyn ModeTransport>,
    amplitude: Arc<dyn AmplitudeSource>,
    mixer: Arc<dyn MixerVolume>,
    settings: TriggerSettings,
    poll_interval: Duration,
    state: TriggerState,
    scheduler: Scheduler<Timer>,
    poll_task: Option<TaskId>,
    countdown_task: Option<TaskId>,
}

impl OscManager {
    /// Creates a stopped manager in VR mode.
    ///
    /// # Parameters
    ///
    /// - `clock`: Time source for the poll and the countdown
    /// - `transport`: Link to the peer
    /// - `amplitude`: Microphone level, read once per poll
    /// - `mixer`: Receives the foreground/background volume on every mode change
    /// - `settings`: Threshold, countdown and volumes
    /// - `poll_interval`: Spacing of amplitude polls, and so the width of the rise window
    pub fn new(
        clock: Arc<dyn Clock>,
        transport: Box<dyn ModeTransport>,
        amplitude: Arc<dyn AmplitudeSource>,
        mixer: Arc<dyn MixerVolume>,
        settings: TriggerSettings,
        poll_interval: Duration,
    ) -> Self {
        Self {
            clock,
            transport,
            amplitude,
            mixer,
            settings,
            poll_interval,
            state: TriggerState::default(),
            scheduler: Scheduler::new(),
            poll_task: None,
            countdown_task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.poll_task.is_some()
    }

    pub fn current_mode(&self) -> Mode {
        self.state.mode
    }

    pub fn countdown_enabled(&self) -> bool {
        self.state.countdown_enabled
    }

    pub fn countdown_pending(&self) -> bool {
        self.countdown_task.is_some()
    }

    /// Seeds the amplitude baseline and starts polling.
    pub fn start(&mut self) {
        if self.is_running() {
            log::warn!("OSC: manager already started");
            return;
        }

        let amplitude = self.amplitude.amplitude();
        self.apply(TriggerEvent::Started { amplitude });

        let now = self.clock.now();
        self.poll_task = Some(
            self.scheduler
                .schedule_periodic(Timer::Poll, self.poll_interval, now),
        );
        log::info!("OSC: started manager (mode {})", self.state.mode);
    }

    /// Stops polling and drops any pending countdown. The mode is kept.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }

        self.scheduler.clear();
        self.poll_task = None;
        self.countdown_task = None;
        self.state.countdown_armed = false;
        log::info!("OSC: stopped manager");
    }

    pub fn enable_countdown(&mut self, enabled: bool) {
        self.apply(TriggerEvent::SetCountdown(enabled));
        log::info!(
            "OSC: countdown {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    /// Handles inbound datagrams, then every timer due now.
    pub fn tick(&mut self) {
        if !self.is_running() {
            return;
        }

        self.drain_inbound();

        let now = self.clock.now();
        for timer in self.scheduler.due(now) {
            match timer {
                Timer::Poll => {
                    let amplitude = self.amplitude.amplitude();
                    log::debug!("OSC: amplitude {:.4}", amplitude);
                    self.apply(TriggerEvent::Amplitude(amplitude));
                }
                Timer::Countdown => {
                    self.countdown_task = None;
                    log::info!("OSC: end of countdown");
                    self.apply(TriggerEvent::CountdownElapsed);
                }
            }
        }
    }

    fn drain_inbound(&mut self) {
        for _ in 0..MAX_DATAGRAMS_PER_TICK {
            let datagram = match self.transport.try_recv() {
                Ok(Some(datagram)) => datagram,
                Ok(None) => break,
                Err(err) => {
                    log::warn!("OSC: receive failed: {}", err);
                    break;
                }
            };

            for code in decode_inbound(&datagram) {
                match code {
                    Ok(code) if Mode::from_code(code).is_some() => {
                        log::info!("OSC: received mode = {}", code);
                        self.apply(TriggerEvent::Received(code));
                    }
                    Ok(code) => log::warn!("OSC: received invalid mode {}", code),
                    Err(err) => log::warn!("OSC: discarded message: {}", err),
                }
            }
        }
    }

    fn apply(&mut self, event: TriggerEvent) {
        let previous = self.state.mode;
        let (next, effects) = step(self.state, event, &self.settings);
        self.state = next;

        if next.mode != previous {
            log::info!("OSC: changing to {} mode", next.mode);
        }

        for effect in effects {
            match effect {
                Effect::Send(mode) => {
                    if let Err(err) = self.transport.send(mode) {
                        log::warn!("OSC: failed to send mode {}: {}", mode.code(), err);
                    } else {
                        log::info!("OSC: sent mode = {}", mode.code());
                    }
                }
                Effect::SetMixerVolume(volume) => self.mixer.set_mixer_volume(volume),
                Effect::ArmCountdown(delay) => {
                    if let Some(task) = self.countdown_task.take() {
                        self.scheduler.cancel(task);
                    }
                    let now = self.clock.now();
                    self.countdown_task =
                        Some(self.scheduler.schedule_once(Timer::Countdown, delay, now));
                    log::info!("OSC: starting countdown ({:?})", delay);
                }
                Effect::CancelCountdown => {
                    if let Some(task) = self.countdown_task.take() {
                        self.scheduler.cancel(task);
                        log::info!("OSC: countdown cancelled");
                    }
                }
            }
        }
    }
}

/// Runs an [`OscManager`] on a dedicated thread.
pub struct OscService {
    manager: Arc<Mutex<OscManager>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl OscService {
    pub fn spawn(manager: OscManager) -> Self {
        Self::spawn_with_tick(manager, SERVICE_TICK)
    }

    pub fn spawn_with_tick(manager: OscManager, tick: Duration) -> Self {
        let manager = Arc::new(Mutex::new(manager));
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let manager = manager.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    match manager.lock() {
                        Ok(mut manager) => manager.tick(),
                        Err(_) => {
                            log::error!("OSC: manager lock poisoned, stopping service");
                            break;
                        }
                    }
                    thread::sleep(tick);
                }
            })
        };

        Self {
            manager,
            stop,
            worker: Some(worker),
        }
    }

    /// Locks the manager; `None` if the service thread panicked while holding it.
    pub fn manager(&self) -> Option<MutexGuard<'_, OscManager>> {
        self.manager.lock().ok()
    }

    /// Stops the manager and joins the thread.
    pub fn shutdown(&mut self) {
        if let Some(mut manager) = self.manager() {
            manager.stop();
        }
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("OSC: service thread panicked");
            }
        }
    }
}

impl Drop for OscService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
