/// Outcome of a journal operation as seen by a presentation layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoadState<T> {
    #[default]
    Loading,
    Success(T),
    /// Human-readable failure description.
    Error(String),
}

impl<T> LoadState<T> {
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => LoadState::Success(value),
            Err(e) => LoadState::Error(e.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LoadState::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            LoadState::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Error(msg) => Some(msg),
            _ => None,
        }
    }
}
