use std::{sync::Arc, time::Instant};

use rand::Rng;

use super::judge::{judge, random_machine_move};
use crate::{
    error::ClassifierError,
    types::{ClassificationResult, Frame, Move, Outcome},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    CountingDown,
    AwaitingGesture,
    Judged,
}

#[derive(Clone, Debug)]
pub struct Round {
    pub id: u64,
    pub state: RoundState,
    pub machine_move: Move,
    pub player_move: Move,
    pub outcome: Outcome,
    pub remaining: u32,
    pub window_opened_at: Option<Instant>,
    pub frozen_frame: Option<Arc<Frame>>,
}

impl Round {
    fn idle(id: u64) -> Self {
        Self {
            id,
            state: RoundState::Idle,
            machine_move: Move::Undefined,
            player_move: Move::Undefined,
            outcome: Outcome::Invalid,
            remaining: 0,
            window_opened_at: None,
            frozen_frame: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Judgement {
    pub round: u64,
    pub player: Move,
    pub machine: Move,
    pub outcome: Outcome,
}

/// Drives a single round of play. Not thread-safe on purpose: exactly one
/// owner (the session loop) feeds it every event in order.
pub struct RoundController<R> {
    rng: R,
    countdown_ticks: u32,
    round: Round,
}

impl<R: Rng> RoundController<R> {
    pub fn new(rng: R, countdown_ticks: u32) -> Self {
        Self {
            rng,
            countdown_ticks,
            round: Round::idle(0),
        }
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn state(&self) -> RoundState {
        self.round.state
    }

    /// Returns the id of the new round, or `None` if a round is in progress.
    pub fn start_round(&mut self) -> Option<u64> {
        if !matches!(self.round.state, RoundState::Idle | RoundState::Judged) {
            return None;
        }

        let mut round = Round::idle(self.round.id + 1);
        round.state = RoundState::CountingDown;
        round.remaining = self.countdown_ticks;
        self.round = round;
        log::info!("round {} started", self.round.id);
        Some(self.round.id)
    }

    pub fn on_tick(&mut self, round_id: u64, remaining: u32) -> bool {
        if !self.is_current(round_id, RoundState::CountingDown) {
            log::debug!("dropping stale tick for round {round_id}");
            return false;
        }
        self.round.remaining = remaining;
        true
    }

    pub fn complete_countdown(
        &mut self,
        round_id: u64,
        frozen_frame: Option<Arc<Frame>>,
    ) -> Option<Move> {
        let machine = random_machine_move(&mut self.rng);
        self.complete_countdown_with(round_id, machine, frozen_frame)
    }

    pub(crate) fn complete_countdown_with(
        &mut self,
        round_id: u64,
        machine: Move,
        frozen_frame: Option<Arc<Frame>>,
    ) -> Option<Move> {
        if !self.is_current(round_id, RoundState::CountingDown) {
            log::debug!("dropping stale countdown completion for round {round_id}");
            return None;
        }

        self.round.state = RoundState::AwaitingGesture;
        self.round.remaining = 0;
        self.round.machine_move = machine;
        self.round.player_move = Move::Undefined;
        self.round.frozen_frame = frozen_frame;
        self.round.window_opened_at = Some(Instant::now());
        Some(machine)
    }

    /// Judges the round with the first fresh classification of the gesture window.
    pub fn on_classification(&mut self, result: &ClassificationResult) -> Option<Judgement> {
        if self.round.state != RoundState::AwaitingGesture {
            return None;
        }
        if let Some(opened) = self.round.window_opened_at {
            if result.captured_at < opened {
                log::debug!("dropping classification captured before the gesture window");
                return None;
            }
        }

        self.round.player_move = result.player_move();
        Some(self.finish())
    }

    pub fn on_classifier_error(&mut self, error: &ClassifierError) {
        if self.round.state != RoundState::Judged {
            self.round.player_move = Move::Undefined;
        }
        log::warn!("classifier error during round {}: {error}", self.round.id);
    }

    pub fn expire_gesture_window(&mut self, round_id: u64) -> Option<Judgement> {
        if !self.is_current(round_id, RoundState::AwaitingGesture) {
            return None;
        }
        log::info!("round {round_id} gesture window expired without a classification");
        Some(self.finish())
    }

    /// Resets to idle. Returns whether a round was in progress.
    pub fn abort(&mut self) -> bool {
        let was_active = matches!(
            self.round.state,
            RoundState::CountingDown | RoundState::AwaitingGesture
        );
        self.round = Round::idle(self.round.id);
        if was_active {
            log::info!("round {} aborted", self.round.id);
        }
        was_active
    }

    fn finish(&mut self) -> Judgement {
        self.round.outcome = judge(self.round.player_move, self.round.machine_move);
        self.round.state = RoundState::Judged;
        log::info!(
            "round {} judged: player {:?} vs machine {:?} -> {:?}",
            self.round.id,
            self.round.player_move,
            self.round.machine_move,
            self.round.outcome
        );
        Judgement {
            round: self.round.id,
            player: self.round.player_move,
            machine: self.round.machine_move,
            outcome: self.round.outcome,
        }
    }

    fn is_current(&self, round_id: u64, state: RoundState) -> bool {
        self.round.id == round_id && self.round.state == state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GestureCategory;
    use rand::{SeedableRng, rngs::StdRng};
    use std::time::Duration;

    fn controller() -> RoundController<StdRng> {
        RoundController::new(StdRng::seed_from_u64(42), 3)
    }

    fn awaiting(machine: Move) -> RoundController<StdRng> {
        let mut ctl = controller();
        let id = ctl.start_round().expect("round starts from idle");
        ctl.complete_countdown_with(id, machine, None)
            .expect("countdown completes");
        ctl
    }

    fn classification(categories: &[(&str, f32)]) -> ClassificationResult {
        ClassificationResult::new(
            categories
                .iter()
                .map(|(label, score)| GestureCategory::new(*label, *score))
                .collect(),
        )
    }

    #[test]
    fn start_round_only_from_idle_or_judged() {
        let mut ctl = controller();
        assert_eq!(ctl.start_round(), Some(1));
        assert_eq!(ctl.state(), RoundState::CountingDown);
        assert_eq!(ctl.round().remaining, 3);
        assert_eq!(ctl.start_round(), None);

        ctl.complete_countdown_with(1, Move::Rock, None);
        assert_eq!(ctl.start_round(), None);

        ctl.on_classification(&classification(&[("Rock", 0.9)]));
        assert_eq!(ctl.state(), RoundState::Judged);
        assert_eq!(ctl.start_round(), Some(2));
        assert_eq!(ctl.round().player_move, Move::Undefined);
    }

    #[test]
    fn countdown_completion_samples_a_playable_move() {
        let mut ctl = controller();
        let id = ctl.start_round().unwrap();
        assert!(ctl.on_tick(id, 2));
        assert_eq!(ctl.round().remaining, 2);

        let machine = ctl.complete_countdown(id, None).unwrap();
        assert!(Move::PLAYABLE.contains(&machine));
        assert_eq!(ctl.state(), RoundState::AwaitingGesture);
        assert_eq!(ctl.round().machine_move, machine);
        assert_eq!(ctl.round().player_move, Move::Undefined);
    }

    #[test]
    fn countdown_freezes_the_supplied_frame() {
        let mut ctl = controller();
        let id = ctl.start_round().unwrap();
        let frame = Arc::new(Frame::new(vec![0; 16], 2, 2));
        ctl.complete_countdown(id, Some(frame.clone()));
        let frozen = ctl.round().frozen_frame.as_ref().expect("frame frozen");
        assert!(Arc::ptr_eq(frozen, &frame));
    }

    #[test]
    fn paper_beats_rock() {
        let mut ctl = awaiting(Move::Rock);
        let verdict = ctl
            .on_classification(&classification(&[("Paper", 0.9), ("Rock", 0.1)]))
            .unwrap();
        assert_eq!(verdict.player, Move::Paper);
        assert_eq!(verdict.outcome, Outcome::Win);
        assert_eq!(ctl.round().player_move, Move::Paper);
        assert_eq!(ctl.round().outcome, Outcome::Win);
    }

    #[test]
    fn empty_classification_is_invalid() {
        let mut ctl = awaiting(Move::Scissors);
        let verdict = ctl.on_classification(&classification(&[])).unwrap();
        assert_eq!(verdict.player, Move::Undefined);
        assert_eq!(verdict.outcome, Outcome::Invalid);
    }

    #[test]
    fn identical_moves_draw() {
        let mut ctl = awaiting(Move::Paper);
        let verdict = ctl
            .on_classification(&classification(&[("Paper", 0.8)]))
            .unwrap();
        assert_eq!(verdict.outcome, Outcome::Draw);
    }

    #[test]
    fn only_the_first_classification_is_judged() {
        let mut ctl = awaiting(Move::Paper);
        let first = ctl.on_classification(&classification(&[("Rock", 0.99)]));
        assert_eq!(first.map(|v| v.outcome), Some(Outcome::Lose));
        assert_eq!(ctl.state(), RoundState::Judged);

        let second = ctl.on_classification(&classification(&[("Scissors", 0.99)]));
        assert!(second.is_none());
        assert_eq!(ctl.round().player_move, Move::Rock);
        assert_eq!(ctl.round().outcome, Outcome::Lose);
    }

    #[test]
    fn classifications_outside_the_window_are_ignored() {
        let mut ctl = controller();
        assert!(ctl.on_classification(&classification(&[("Rock", 1.0)])).is_none());
        assert_eq!(ctl.state(), RoundState::Idle);

        let id = ctl.start_round().unwrap();
        assert!(ctl.on_classification(&classification(&[("Rock", 1.0)])).is_none());
        assert_eq!(ctl.state(), RoundState::CountingDown);
        assert_eq!(ctl.round().player_move, Move::Undefined);
        assert_eq!(ctl.round().outcome, Outcome::Invalid);

        ctl.complete_countdown_with(id, Move::Rock, None);
        let opened = ctl.round().window_opened_at.expect("window opened");
        let mut before_window = classification(&[("Paper", 1.0)]);
        before_window.captured_at = opened - Duration::from_millis(5);
        assert!(ctl.on_classification(&before_window).is_none());
        assert_eq!(ctl.state(), RoundState::AwaitingGesture);
    }

    #[test]
    fn stale_timer_events_are_dropped() {
        let mut ctl = controller();
        let first = ctl.start_round().unwrap();
        ctl.abort();
        let second = ctl.start_round().unwrap();
        assert_ne!(first, second);

        assert!(!ctl.on_tick(first, 1));
        assert!(ctl.complete_countdown(first, None).is_none());
        assert_eq!(ctl.state(), RoundState::CountingDown);
        assert_eq!(ctl.round().remaining, 3);
    }

    #[test]
    fn gesture_window_expiry_judges_invalid() {
        let mut ctl = awaiting(Move::Rock);
        let id = ctl.round().id;
        assert!(ctl.expire_gesture_window(id + 1).is_none());

        let verdict = ctl.expire_gesture_window(id).unwrap();
        assert_eq!(verdict.outcome, Outcome::Invalid);
        assert_eq!(ctl.state(), RoundState::Judged);
        assert!(ctl.expire_gesture_window(id).is_none());
    }

    #[test]
    fn classifier_errors_keep_state() {
        let mut ctl = awaiting(Move::Rock);
        ctl.on_classifier_error(&ClassifierError::input("camera hiccup"));
        assert_eq!(ctl.state(), RoundState::AwaitingGesture);
        assert_eq!(ctl.round().player_move, Move::Undefined);

        let verdict = ctl
            .on_classification(&classification(&[("Scissors", 0.7)]))
            .unwrap();
        assert_eq!(verdict.outcome, Outcome::Lose);

        ctl.on_classifier_error(&ClassifierError::input("late"));
        assert_eq!(ctl.round().player_move, Move::Scissors);
    }

    #[test]
    fn abort_discards_in_flight_round() {
        let mut ctl = awaiting(Move::Rock);
        assert!(ctl.abort());
        assert_eq!(ctl.state(), RoundState::Idle);

        assert!(ctl.on_classification(&classification(&[("Paper", 1.0)])).is_none());
        assert_eq!(ctl.round().player_move, Move::Undefined);
        assert!(!ctl.abort());
    }
}
