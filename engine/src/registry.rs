//! Output registry (§4.G): an insertion-only set enforcing unique output paths across all tasks
//! in one build run.

use std::{cell::RefCell, collections::HashSet, path::Path, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
#[error("multiple rules build {0}")]
pub struct DuplicateOutput(pub PathBuf);

#[derive(Debug, Default)]
pub struct OutputRegistry {
    seen: RefCell<HashSet<PathBuf>>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `resolved` (an absolute, resolved output path). Fails if some other task already
    /// registered the same path.
    pub fn insert(&self, resolved: PathBuf) -> Result<(), DuplicateOutput> {
        if !self.seen.borrow_mut().insert(resolved.clone()) {
            return Err(DuplicateOutput(resolved));
        }
        Ok(())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.seen.borrow().contains(path)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duplicate_rejected() {
        let registry = OutputRegistry::new();
        assert!(registry.insert(PathBuf::from("/build/x")).is_ok());
        assert!(registry.insert(PathBuf::from("/build/x")).is_err());
        assert!(registry.insert(PathBuf::from("/build/y")).is_ok());
    }
}
