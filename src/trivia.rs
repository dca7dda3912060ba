//! Arithmetic question generator
//!
//! Pure with respect to its RNG: the same seed yields the same question.

use std::ops::RangeInclusive;

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};

/// Operand range for both sides of a question
pub const OPERAND_RANGE: RangeInclusive<i32> = 1..=10;
/// Wrong answers are drawn from this range
pub const DISTRACTOR_RANGE: RangeInclusive<i32> = -20..=20;
/// Answer slots per question
pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" | "med" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Operators a question may use at this difficulty
    pub fn operators(&self) -> &'static [Operator] {
        match self {
            Difficulty::Easy => &[Operator::Add],
            Difficulty::Medium => &[Operator::Add, Operator::Subtract],
            Difficulty::Hard => &[
                Operator::Add,
                Operator::Subtract,
                Operator::Multiply,
                Operator::Divide,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    /// Exact integer division only
    Divide,
}

impl Operator {
    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '*',
            Operator::Divide => '/',
        }
    }

    /// Integer result, or `None` when division is not exact
    pub fn apply(&self, left: i32, right: i32) -> Option<i32> {
        match self {
            Operator::Add => left.checked_add(right),
            Operator::Subtract => left.checked_sub(right),
            Operator::Multiply => left.checked_mul(right),
            Operator::Divide => {
                if right != 0 && left % right == 0 {
                    Some(left / right)
                } else {
                    None
                }
            }
        }
    }
}

/// One question with its shuffled answer options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub left: i32,
    pub op: Operator,
    pub right: i32,
    pub text: String,
    pub correct_answer: i32,
    /// Exactly one entry equals `correct_answer`; all entries distinct
    pub options: [i32; OPTION_COUNT],
}

impl Question {
    /// Build a question from fixed operands, drawing distractors from `rng`.
    /// Returns `None` for a division that is not exact.
    pub fn from_operands<R: Rng + ?Sized>(
        left: i32,
        op: Operator,
        right: i32,
        rng: &mut R,
    ) -> Option<Self> {
        let correct_answer = op.apply(left, right)?;
        Some(Self::with_answer(left, op, right, correct_answer, rng))
    }

    fn with_answer<R: Rng + ?Sized>(
        left: i32,
        op: Operator,
        right: i32,
        correct_answer: i32,
        rng: &mut R,
    ) -> Self {
        let mut options = [correct_answer; OPTION_COUNT];
        let mut filled = 1;
        while filled < OPTION_COUNT {
            let wrong = rng.random_range(DISTRACTOR_RANGE);
            if !options[..filled].contains(&wrong) {
                options[filled] = wrong;
                filled += 1;
            }
        }
        options.shuffle(rng);

        Self {
            left,
            op,
            right,
            text: format!("What is {} {} {}?", left, op.symbol(), right),
            correct_answer,
            options,
        }
    }

    /// Value shown in answer slot `slot`
    pub fn option(&self, slot: usize) -> Option<i32> {
        self.options.get(slot).copied()
    }

    pub fn is_correct(&self, slot: usize) -> bool {
        self.option(slot) == Some(self.correct_answer)
    }

    /// Slot holding the correct answer
    pub fn correct_slot(&self) -> usize {
        self.options
            .iter()
            .position(|&v| v == self.correct_answer)
            .unwrap_or(0)
    }
}

/// Generate a question for `difficulty`
pub fn generate<R: Rng + ?Sized>(difficulty: Difficulty, rng: &mut R) -> Question {
    let op = difficulty
        .operators()
        .choose(rng)
        .copied()
        .unwrap_or(Operator::Add);
    let a = rng.random_range(OPERAND_RANGE);
    let b = rng.random_range(OPERAND_RANGE);

    // Division is posed as (a*b) / b so the answer is always the integer a
    let (left, right, answer) = match op {
        Operator::Add => (a, b, a + b),
        Operator::Subtract => (a, b, a - b),
        Operator::Multiply => (a, b, a * b),
        Operator::Divide => (a * b, b, a),
    };
    Question::with_answer(left, op, right, answer, rng)
}
