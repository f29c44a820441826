//! Two-case outcome of an operation.

/// Either a success value or an error, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<V, E> {
    Success(V),
    Failed(E),
}

impl<V, E> Completion<V, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, Completion::Success(_))
    }

    pub fn value(&self) -> Option<&V> {
        match self {
            Completion::Success(value) => Some(value),
            Completion::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Completion::Success(_) => None,
            Completion::Failed(error) => Some(error),
        }
    }

    pub fn into_result(self) -> Result<V, E> {
        self.into()
    }
}

impl<V, E> From<Result<V, E>> for Completion<V, E> {
    fn from(result: Result<V, E>) -> Self {
        match result {
            Ok(value) => Completion::Success(value),
            Err(error) => Completion::Failed(error),
        }
    }
}

impl<V, E> From<Completion<V, E>> for Result<V, E> {
    fn from(completion: Completion<V, E>) -> Self {
        match completion {
            Completion::Success(value) => Ok(value),
            Completion::Failed(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_exposes_value_only() {
        let c: Completion<u8, String> = Completion::Success(7);
        assert!(c.is_success());
        assert_eq!(c.value(), Some(&7));
        assert_eq!(c.error(), None);
    }

    #[test]
    fn failure_exposes_error_only() {
        let c: Completion<u8, String> = Completion::Failed("boom".to_string());
        assert!(!c.is_success());
        assert_eq!(c.value(), None);
        assert_eq!(c.error().map(String::as_str), Some("boom"));
        assert_eq!(c.into_result(), Err("boom".to_string()));
    }

    #[test]
    fn converts_from_result() {
        let c: Completion<u8, String> = Ok(1).into();
        assert_eq!(c, Completion::Success(1));
    }
}
