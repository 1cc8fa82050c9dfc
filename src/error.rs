/// Failure reported by a frame classifier. Surfaced to the player as-is.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct ClassifierError {
    pub message: String,
    pub code: i32,
}

impl ClassifierError {
    /// The backend could not be loaded or failed while running.
    pub const MODEL: i32 = 1;
    /// The frame could not be turned into model input.
    pub const INPUT: i32 = 2;

    pub fn new(message: impl Into<String>, code: i32) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::new(message, Self::MODEL)
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(message, Self::INPUT)
    }
}

impl From<anyhow::Error> for ClassifierError {
    fn from(err: anyhow::Error) -> Self {
        Self::model(format!("{err:#}"))
    }
}
