#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("Timer with name '{0}' already exists")]
    DuplicateName(String),
    #[error("Invalid time format for timer '{name}': {input:?}")]
    InvalidDuration { name: String, input: String },
}
