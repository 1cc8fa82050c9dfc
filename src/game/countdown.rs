use std::{thread, time::Duration};

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};

/// Timer thread that reports `ticks..=1` one `interval` apart and then
/// finishes. Cancelled when the handle is dropped.
#[derive(Debug)]
pub struct Countdown {
    cancel: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Countdown {
    pub fn start<T, F>(ticks: u32, interval: Duration, mut on_tick: T, on_finish: F) -> Self
    where
        T: FnMut(u32) + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = bounded::<()>(0);

        let handle = thread::spawn(move || {
            for remaining in (1..=ticks).rev() {
                on_tick(remaining);
                match cancel_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    // Explicit cancel or the handle went away.
                    _ => return,
                }
            }
            on_finish();
        });

        Self {
            cancel: Some(cancel_tx),
            handle: Some(handle),
        }
    }

    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.cancel.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[derive(Debug, PartialEq)]
    enum Event {
        Tick(u32),
        Finished,
    }

    fn spawn(ticks: u32, interval: Duration) -> (Countdown, crossbeam_channel::Receiver<Event>) {
        let (tx, rx) = unbounded();
        let tick_tx = tx.clone();
        let countdown = Countdown::start(
            ticks,
            interval,
            move |remaining| {
                let _ = tick_tx.send(Event::Tick(remaining));
            },
            move || {
                let _ = tx.send(Event::Finished);
            },
        );
        (countdown, rx)
    }

    #[test]
    fn ticks_down_then_finishes_once() {
        let (countdown, rx) = spawn(3, Duration::from_millis(10));
        let mut events = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(2)) {
            events.push(event);
        }
        drop(countdown);
        assert_eq!(
            events,
            vec![
                Event::Tick(3),
                Event::Tick(2),
                Event::Tick(1),
                Event::Finished
            ]
        );
    }

    #[test]
    fn cancel_suppresses_finish() {
        let (countdown, rx) = spawn(3, Duration::from_secs(5));
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).ok(),
            Some(Event::Tick(3))
        );
        countdown.cancel();
        assert!(rx.try_iter().all(|event| event != Event::Finished));
    }

    #[test]
    fn zero_ticks_finishes_immediately() {
        let (_countdown, rx) = spawn(0, Duration::from_secs(5));
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).ok(),
            Some(Event::Finished)
        );
    }
}
