use std::{sync::Arc, thread, time::Duration};

use crossbeam_channel::{Receiver, Sender, never, select, unbounded};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{
    countdown::Countdown,
    round::{Judgement, RoundController},
};
use crate::{
    error::ClassifierError,
    pipeline::{ClassifierOutput, WorkerControl},
    types::{Frame, Move, Outcome},
};

#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub countdown_ticks: u32,
    pub tick_interval: Duration,
    /// How long to wait for a classification after the countdown. `None` waits forever.
    pub gesture_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            countdown_ticks: 3,
            tick_interval: Duration::from_secs(1),
            gesture_timeout: Some(Duration::from_secs(3)),
        }
    }
}

pub struct SessionInputs {
    pub preview_rx: Receiver<Frame>,
    pub classifier_rx: Receiver<ClassifierOutput>,
    pub worker_tx: Option<Sender<WorkerControl>>,
}

/// Messages for the presentation layer.
#[derive(Clone, Debug)]
pub enum UiUpdate {
    RoundStarted {
        round: u64,
    },
    Countdown {
        remaining: u32,
    },
    MachineMove {
        machine: Move,
        frozen_frame: Option<Arc<Frame>>,
    },
    Judged {
        round: u64,
        player: Move,
        machine: Move,
        outcome: Outcome,
    },
    ClassifierError {
        message: String,
        code: i32,
    },
    Aborted,
    Paused,
    Resumed,
}

impl From<Judgement> for UiUpdate {
    fn from(verdict: Judgement) -> Self {
        UiUpdate::Judged {
            round: verdict.round,
            player: verdict.player,
            machine: verdict.machine,
            outcome: verdict.outcome,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    StartRound,
    Abort,
    Pause,
    Resume,
    Shutdown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimerEvent {
    Tick { round: u64, remaining: u32 },
    CountdownFinished { round: u64 },
    GestureWindowExpired { round: u64 },
}

/// Cloneable sender side used by input handlers.
#[derive(Clone, Debug)]
pub struct SessionControl {
    commands: Sender<Command>,
}

impl SessionControl {
    pub fn start_round(&self) -> bool {
        self.send(Command::StartRound)
    }

    pub fn abort(&self) -> bool {
        self.send(Command::Abort)
    }

    /// Aborts the round and releases the classifier, e.g. when backgrounded.
    pub fn pause(&self) -> bool {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> bool {
        self.send(Command::Resume)
    }

    fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }
}

pub struct SessionHandle {
    control: SessionControl,
    handle: Option<thread::JoinHandle<()>>,
}

impl SessionHandle {
    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.control.commands.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct Session;

impl Session {
    pub fn start(
        config: SessionConfig,
        inputs: SessionInputs,
    ) -> (SessionHandle, Receiver<UiUpdate>) {
        Self::start_with_rng(config, inputs, StdRng::from_os_rng())
    }

    pub fn start_with_rng<R>(
        config: SessionConfig,
        inputs: SessionInputs,
        rng: R,
    ) -> (SessionHandle, Receiver<UiUpdate>)
    where
        R: Rng + Send + 'static,
    {
        let (command_tx, command_rx) = unbounded();
        let (ui_tx, ui_rx) = unbounded();

        let handle = thread::spawn(move || {
            log::info!("game session started");
            let (timer_tx, timer_rx) = unbounded();
            let session = SessionLoop {
                controller: RoundController::new(rng, config.countdown_ticks),
                config,
                ui_tx,
                timer_tx,
                worker_tx: inputs.worker_tx,
                latest_frame: None,
                last_error: None,
                countdown: None,
                gesture_window: None,
                paused: false,
            };
            session.run(command_rx, timer_rx, inputs.preview_rx, inputs.classifier_rx);
            log::info!("game session stopped");
        });

        let control = SessionControl {
            commands: command_tx,
        };
        (
            SessionHandle {
                control,
                handle: Some(handle),
            },
            ui_rx,
        )
    }
}

enum Input {
    Command(Option<Command>),
    // The loop holds a timer sender, so this is never `None`.
    Timer(Option<TimerEvent>),
    Preview(Option<Frame>),
    Classifier(Option<ClassifierOutput>),
}

struct SessionLoop<R> {
    controller: RoundController<R>,
    config: SessionConfig,
    ui_tx: Sender<UiUpdate>,
    timer_tx: Sender<TimerEvent>,
    worker_tx: Option<Sender<WorkerControl>>,
    latest_frame: Option<Arc<Frame>>,
    last_error: Option<ClassifierError>,
    countdown: Option<Countdown>,
    gesture_window: Option<Countdown>,
    paused: bool,
}

impl<R: Rng> SessionLoop<R> {
    fn run(
        mut self,
        commands: Receiver<Command>,
        timer_rx: Receiver<TimerEvent>,
        mut preview_rx: Receiver<Frame>,
        mut classifier_rx: Receiver<ClassifierOutput>,
    ) {
        loop {
            let input = select! {
                recv(commands) -> cmd => Input::Command(cmd.ok()),
                recv(timer_rx) -> event => Input::Timer(event.ok()),
                recv(preview_rx) -> frame => Input::Preview(frame.ok()),
                recv(classifier_rx) -> output => Input::Classifier(output.ok()),
            };

            match input {
                Input::Command(None) | Input::Command(Some(Command::Shutdown)) => break,
                Input::Command(Some(command)) => self.handle_command(command),
                Input::Timer(Some(event)) => self.handle_timer(event),
                Input::Timer(None) => {}
                Input::Preview(Some(frame)) => self.latest_frame = Some(Arc::new(frame)),
                Input::Preview(None) => preview_rx = never(),
                Input::Classifier(Some(output)) => self.handle_classifier(output),
                Input::Classifier(None) => {
                    log::warn!("gesture classifier disconnected");
                    classifier_rx = never();
                }
            }
        }

        self.cancel_timers();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartRound => {
                if self.paused {
                    log::debug!("ignoring round start while paused");
                    return;
                }
                match self.controller.start_round() {
                    Some(round) => {
                        self.cancel_timers();
                        self.emit(UiUpdate::RoundStarted { round });
                        self.start_countdown(round);
                    }
                    None => log::debug!(
                        "ignoring round start while round {} is {:?}",
                        self.controller.round().id,
                        self.controller.state()
                    ),
                }
            }
            Command::Abort => self.abort_round(),
            Command::Pause => {
                if self.paused {
                    return;
                }
                self.abort_round();
                self.paused = true;
                self.send_worker(WorkerControl::Suspend);
                self.emit(UiUpdate::Paused);
            }
            Command::Resume => {
                if !self.paused {
                    return;
                }
                self.paused = false;
                self.last_error = None;
                self.send_worker(WorkerControl::Resume);
                self.emit(UiUpdate::Resumed);
            }
            Command::Shutdown => {}
        }
    }

    fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Tick { round, remaining } => {
                if self.controller.on_tick(round, remaining) {
                    self.emit(UiUpdate::Countdown { remaining });
                }
            }
            TimerEvent::CountdownFinished { round } => {
                let frozen_frame = self.latest_frame.clone();
                if let Some(machine) = self
                    .controller
                    .complete_countdown(round, frozen_frame.clone())
                {
                    self.countdown = None;
                    self.emit(UiUpdate::MachineMove {
                        machine,
                        frozen_frame,
                    });
                    self.start_gesture_window(round);
                }
            }
            TimerEvent::GestureWindowExpired { round } => {
                if let Some(verdict) = self.controller.expire_gesture_window(round) {
                    self.gesture_window = None;
                    self.emit(verdict.into());
                }
            }
        }
    }

    fn handle_classifier(&mut self, output: ClassifierOutput) {
        match output {
            Ok(result) => {
                self.last_error = None;
                if let Some(verdict) = self.controller.on_classification(&result) {
                    self.gesture_window = None;
                    self.emit(verdict.into());
                }
            }
            Err(err) => {
                self.controller.on_classifier_error(&err);
                // A failing backend reports every frame; surface each distinct error once.
                if self.last_error.as_ref() != Some(&err) {
                    self.emit(UiUpdate::ClassifierError {
                        message: err.message.clone(),
                        code: err.code,
                    });
                    self.last_error = Some(err);
                }
            }
        }
    }

    fn abort_round(&mut self) {
        self.cancel_timers();
        if self.controller.abort() {
            self.emit(UiUpdate::Aborted);
        }
    }

    fn start_countdown(&mut self, round: u64) {
        let tick_tx = self.timer_tx.clone();
        let finish_tx = self.timer_tx.clone();
        self.countdown = Some(Countdown::start(
            self.config.countdown_ticks,
            self.config.tick_interval,
            move |remaining| {
                let _ = tick_tx.send(TimerEvent::Tick { round, remaining });
            },
            move || {
                let _ = finish_tx.send(TimerEvent::CountdownFinished { round });
            },
        ));
    }

    fn start_gesture_window(&mut self, round: u64) {
        let Some(timeout) = self.config.gesture_timeout else {
            return;
        };
        let expire_tx = self.timer_tx.clone();
        self.gesture_window = Some(Countdown::start(
            1,
            timeout,
            |_| {},
            move || {
                let _ = expire_tx.send(TimerEvent::GestureWindowExpired { round });
            },
        ));
    }

    fn cancel_timers(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }
        if let Some(window) = self.gesture_window.take() {
            window.cancel();
        }
    }

    fn send_worker(&self, control: WorkerControl) {
        if let Some(worker_tx) = &self.worker_tx {
            let _ = worker_tx.send(control);
        }
    }

    fn emit(&self, update: UiUpdate) {
        let _ = self.ui_tx.send(update);
    }
}
