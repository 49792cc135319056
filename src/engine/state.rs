use super::dataset::Dataset;
use crate::error::{EngineError, Result};

/// Original snapshot plus working copy of the loaded dataset.
///
/// `original` is written only by [`DatasetState::load`]; `current` is swapped wholesale
/// after an operation has fully succeeded, so a failed operation can never leave a
/// half-edited dataset behind.
#[derive(Debug, Clone, Default)]
pub struct DatasetState {
    original: Option<Dataset>,
    current: Option<Dataset>,
}

impl DatasetState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, dataset: Dataset) -> Result<()> {
        if dataset.n_cols() == 0 {
            return Err(EngineError::validation("Cannot load a dataset without columns"));
        }
        self.current = Some(dataset.clone());
        self.original = Some(dataset);
        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        let original = self
            .original
            .as_ref()
            .ok_or_else(|| EngineError::validation("No dataset loaded to reset"))?;
        self.current = Some(original.clone());
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }

    pub fn original(&self) -> Result<&Dataset> {
        self.original
            .as_ref()
            .ok_or_else(|| EngineError::validation("No dataset loaded"))
    }

    pub fn current(&self) -> Result<&Dataset> {
        self.current
            .as_ref()
            .ok_or_else(|| EngineError::validation("No dataset loaded"))
    }

    pub(crate) fn replace_current(&mut self, dataset: Dataset) {
        self.current = Some(dataset);
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used)]
    use super::*;
    use polars::prelude::*;

    fn sample() -> Dataset {
        Dataset::new(df! { "x" => [1i64, 2, 3] }.unwrap()).unwrap()
    }

    #[test]
    fn test_load_rejects_empty_dataset() {
        let mut state = DatasetState::new();
        assert!(state.load(Dataset::default()).is_err());
        assert!(!state.is_loaded());
    }

    #[test]
    fn test_reset_without_load_fails() {
        let mut state = DatasetState::new();
        assert!(state.reset().is_err());
    }

    #[test]
    fn test_reset_restores_original() {
        let mut state = DatasetState::new();
        state.load(sample()).unwrap();
        state.replace_current(sample().take_rows(&[0]).unwrap());
        assert_eq!(state.current().unwrap().n_rows(), 1);
        state.reset().unwrap();
        assert_eq!(state.current().unwrap(), &sample());
        assert_eq!(state.original().unwrap(), &sample());
    }
}
