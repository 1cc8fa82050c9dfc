use std::time::Instant;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    pub fn expected_len(&self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4)
    }
}

/// One ranked label reported by the classifier for a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct GestureCategory {
    pub label: String,
    pub score: f32,
}

impl GestureCategory {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClassificationResult {
    pub categories: Vec<GestureCategory>,
    /// Capture time of the frame the categories were computed from.
    pub captured_at: Instant,
}

impl ClassificationResult {
    #[cfg(test)]
    pub fn new(categories: Vec<GestureCategory>) -> Self {
        Self {
            categories,
            captured_at: Instant::now(),
        }
    }

    pub fn for_frame(frame: &Frame, categories: Vec<GestureCategory>) -> Self {
        Self {
            categories,
            captured_at: frame.timestamp,
        }
    }

    /// Highest scoring category; on equal scores the earlier one wins.
    pub fn top_category(&self) -> Option<&GestureCategory> {
        let mut best: Option<&GestureCategory> = None;
        for category in self.categories.iter().filter(|c| !c.score.is_nan()) {
            if best.is_none_or(|current| category.score > current.score) {
                best = Some(category);
            }
        }
        best
    }

    pub fn player_move(&self) -> Move {
        self.top_category()
            .map(|category| Move::from_label(&category.label))
            .unwrap_or(Move::Undefined)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Move {
    Rock,
    Paper,
    Scissors,
    Undefined,
}

impl Move {
    pub const PLAYABLE: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case("rock") {
            Move::Rock
        } else if label.eq_ignore_ascii_case("paper") {
            Move::Paper
        } else if label.eq_ignore_ascii_case("scissors") {
            Move::Scissors
        } else {
            Move::Undefined
        }
    }

    pub fn display_name(&self, locale: Locale) -> &'static str {
        match (locale, self) {
            (Locale::En, Move::Rock) => "Rock",
            (Locale::En, Move::Paper) => "Paper",
            (Locale::En, Move::Scissors) => "Scissors",
            (Locale::En, Move::Undefined) => "Undefined",
            (Locale::Es, Move::Rock) => "Piedra",
            (Locale::Es, Move::Paper) => "Papel",
            (Locale::Es, Move::Scissors) => "Tijera",
            (Locale::Es, Move::Undefined) => "Indefinido",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Move::Rock => "✊ ",
            Move::Paper => "🖐 ",
            Move::Scissors => "✌️ ",
            Move::Undefined => "⋯ ",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Win,
    Lose,
    Draw,
    Invalid,
}

impl Outcome {
    /// Short status string shown to the player.
    pub fn label(&self, locale: Locale) -> &'static str {
        match (locale, self) {
            (Locale::En, Outcome::Win) => "Win",
            (Locale::En, Outcome::Lose) => "Lose",
            (Locale::En, Outcome::Draw) => "Draw",
            (Locale::En, Outcome::Invalid) => "Invalid",
            (Locale::Es, Outcome::Win) => "Ganaste",
            (Locale::Es, Outcome::Lose) => "Perdiste",
            (Locale::Es, Outcome::Draw) => "Empate",
            (Locale::Es, Outcome::Invalid) => "Juego no válido",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Locale {
    #[default]
    En,
    Es,
}

impl Locale {
    pub fn play_again(&self) -> &'static str {
        match self {
            Locale::En => "Play again",
            Locale::Es => "Reiniciar Juego",
        }
    }
}
