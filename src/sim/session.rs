//! Per-player session: score, current question and bound keys

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::motion::{ControllerId, Direction};
use super::scene::EntityId;
use crate::consts::*;
use crate::error::GameError;
use crate::surface::PanelView;
use crate::trivia::{self, Difficulty, Question};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    pub const ALL: [PlayerSlot; 2] = [PlayerSlot::One, PlayerSlot::Two];

    pub fn name(&self) -> &'static str {
        match self {
            PlayerSlot::One => "Player 1",
            PlayerSlot::Two => "Player 2",
        }
    }

    pub fn keys(&self) -> [char; 4] {
        match self {
            PlayerSlot::One => PLAYER_ONE_KEYS,
            PlayerSlot::Two => PLAYER_TWO_KEYS,
        }
    }

    /// Lane the car spawns in
    pub fn spawn_x(&self) -> f32 {
        match self {
            PlayerSlot::One => PLAYER_ONE_X,
            PlayerSlot::Two => PLAYER_TWO_X,
        }
    }
}

/// What an answer did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Correct; a new question is up
    Advanced { score: u32 },
    /// Correct and the winning score was reached; the session is now locked
    Won { score: u32 },
    /// Wrong with points to lose; a new question is up
    Penalized { score: u32 },
    /// Wrong at score 0; nothing changed except the question
    Missed,
}

impl AnswerOutcome {
    /// Car nudge this outcome asks for
    pub fn motion(&self) -> Option<Direction> {
        match self {
            AnswerOutcome::Advanced { .. } | AnswerOutcome::Won { .. } => {
                Some(Direction::TowardFinish)
            }
            AnswerOutcome::Penalized { .. } => Some(Direction::TowardStart),
            AnswerOutcome::Missed => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlayerSession {
    pub slot: PlayerSlot,
    pub car: EntityId,
    pub keys: [char; 4],
    difficulty: Difficulty,
    win_score: u32,
    score: u32,
    question: Option<Question>,
    locked: bool,
    /// Car animators this session started
    animators: Vec<ControllerId>,
}

impl PlayerSession {
    pub fn new(slot: PlayerSlot, car: EntityId, difficulty: Difficulty, win_score: u32) -> Self {
        Self {
            slot,
            car,
            keys: slot.keys(),
            difficulty,
            win_score,
            score: 0,
            question: None,
            locked: false,
            animators: Vec::new(),
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Stop accepting answers and questions
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Answer slot bound to `key`
    pub fn slot_for_key(&self, key: char) -> Option<usize> {
        self.keys.iter().position(|&k| k == key)
    }

    /// Replace the current question. No-op once locked.
    pub fn generate_question<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.locked {
            return false;
        }
        self.question = Some(trivia::generate(self.difficulty, rng));
        true
    }

    /// Score the option in `slot` and move on to the next question
    pub fn submit_answer<R: Rng + ?Sized>(
        &mut self,
        slot: usize,
        rng: &mut R,
    ) -> Result<AnswerOutcome, GameError> {
        if self.locked {
            return Err(GameError::StaleInputAfterGameEnd);
        }
        let Some(question) = &self.question else {
            return Err(GameError::InvalidTransition {
                phase: "waiting for a question",
                event: "answer",
            });
        };

        let outcome = if question.is_correct(slot) {
            self.score += 1;
            if self.score >= self.win_score {
                self.locked = true;
                AnswerOutcome::Won { score: self.score }
            } else {
                AnswerOutcome::Advanced { score: self.score }
            }
        } else if self.score > 0 {
            self.score -= 1;
            AnswerOutcome::Penalized { score: self.score }
        } else {
            AnswerOutcome::Missed
        };

        self.generate_question(rng);
        Ok(outcome)
    }

    pub fn track_animator(&mut self, id: ControllerId) {
        self.animators.push(id);
    }

    pub fn animators(&self) -> &[ControllerId] {
        &self.animators
    }

    pub fn take_animators(&mut self) -> Vec<ControllerId> {
        std::mem::take(&mut self.animators)
    }

    /// Forget animators that already finished
    pub fn retain_animators(&mut self, mut live: impl FnMut(ControllerId) -> bool) {
        self.animators.retain(|&id| live(id));
    }

    /// Question panel contents
    pub fn panel(&self, visible: bool) -> PanelView {
        PanelView {
            name: self.slot.name().to_string(),
            score: self.score,
            question: self.question.as_ref().map(|q| q.text.clone()),
            options: match &self.question {
                Some(q) => self
                    .keys
                    .iter()
                    .zip(q.options)
                    .map(|(key, value)| format!("{}: {}", key, value))
                    .collect(),
                None => Vec::new(),
            },
            visible,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_score(&mut self, score: u32) {
        self.score = score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn session() -> (PlayerSession, Pcg32) {
        let mut rng = Pcg32::seed_from_u64(12345);
        let mut session = PlayerSession::new(PlayerSlot::One, EntityId(1), Difficulty::Easy, 12);
        session.generate_question(&mut rng);
        (session, rng)
    }

    fn correct(session: &PlayerSession) -> usize {
        session.question().unwrap().correct_slot()
    }

    fn wrong(session: &PlayerSession) -> usize {
        (correct(session) + 1) % 4
    }

    #[test]
    fn test_correct_answer_advances() {
        let (mut s, mut rng) = session();
        let outcome = s.submit_answer(correct(&s), &mut rng).unwrap();
        assert_eq!(outcome, AnswerOutcome::Advanced { score: 1 });
        assert_eq!(outcome.motion(), Some(Direction::TowardFinish));
        assert_eq!(s.score(), 1);
        assert!(s.question().is_some());
    }

    #[test]
    fn test_wrong_answer_at_zero_stays_zero() {
        let (mut s, mut rng) = session();
        let outcome = s.submit_answer(wrong(&s), &mut rng).unwrap();
        assert_eq!(outcome, AnswerOutcome::Missed);
        assert_eq!(outcome.motion(), None);
        assert_eq!(s.score(), 0);
        assert!(s.question().is_some());
    }

    #[test]
    fn test_wrong_answer_loses_a_point() {
        let (mut s, mut rng) = session();
        s.set_score(4);
        let outcome = s.submit_answer(wrong(&s), &mut rng).unwrap();
        assert_eq!(outcome, AnswerOutcome::Penalized { score: 3 });
        assert_eq!(outcome.motion(), Some(Direction::TowardStart));
    }

    #[test]
    fn test_winning_answer_locks_session_once() {
        let (mut s, mut rng) = session();
        s.set_score(11);
        let last_question = s.question().cloned();
        let outcome = s.submit_answer(correct(&s), &mut rng).unwrap();
        assert_eq!(outcome, AnswerOutcome::Won { score: 12 });
        assert!(s.is_locked());

        // Locked: no new question, no further scoring
        assert_eq!(s.question().cloned(), last_question);
        assert!(matches!(
            s.submit_answer(0, &mut rng),
            Err(GameError::StaleInputAfterGameEnd)
        ));
        assert!(!s.generate_question(&mut rng));
        assert_eq!(s.score(), 12);
    }

    #[test]
    fn test_answer_before_first_question_is_rejected() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut s = PlayerSession::new(PlayerSlot::Two, EntityId(2), Difficulty::Hard, 12);
        assert!(s.submit_answer(0, &mut rng).is_err());
        assert_eq!(s.slot_for_key('o'), Some(2));
        assert_eq!(s.slot_for_key('q'), None);
    }

    #[test]
    fn test_panel_lists_keyed_options() {
        let (s, _) = session();
        let panel = s.panel(true);
        assert_eq!(panel.name, "Player 1");
        assert_eq!(panel.options.len(), 4);
        assert!(panel.options[0].starts_with("q: "));
        assert!(panel.question.unwrap().starts_with("What is "));
    }

    proptest! {
        #[test]
        fn prop_score_stays_within_bounds(answers in proptest::collection::vec(any::<bool>(), 0..80)) {
            let (mut s, mut rng) = session();
            let mut wins = 0;
            for right in answers {
                let slot = if right { correct(&s) } else { wrong(&s) };
                let before = s.score();
                match s.submit_answer(slot, &mut rng) {
                    Ok(AnswerOutcome::Won { .. }) => wins += 1,
                    Ok(AnswerOutcome::Advanced { score }) => prop_assert_eq!(score, before + 1),
                    Ok(AnswerOutcome::Penalized { score }) => prop_assert_eq!(score + 1, before),
                    Ok(AnswerOutcome::Missed) => prop_assert_eq!(before, 0),
                    Err(_) => prop_assert!(s.is_locked()),
                }
                prop_assert!(s.score() <= 12);
            }
            prop_assert!(wins <= 1);
            prop_assert_eq!(s.is_locked(), s.score() == 12);
        }
    }
}
