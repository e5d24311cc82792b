//! The parallelism gate (§4.E): a global counted semaphore bounding concurrent command execution.
//! Held only around status emission and command invocation (§4.D steps 9-10), so dependency
//! resolution, path canonicalization, and staleness checks proceed unbounded.

use std::rc::Rc;

use tokio::sync::{Semaphore, SemaphorePermit};

/// `jobs == 0` means "effectively unbounded" (§4.E), represented internally as a large but finite
/// constant so the same `Semaphore` machinery works uniformly.
const UNBOUNDED: usize = 1_000;

pub struct Gate {
    semaphore: Semaphore,
}

impl Gate {
    pub fn new(jobs: usize) -> Rc<Gate> {
        let permits = if jobs == 0 { UNBOUNDED } else { jobs };
        Rc::new(Gate {
            semaphore: Semaphore::new(permits),
        })
    }

    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.semaphore
            .acquire()
            .await
            .expect("gate semaphore is never closed")
    }
}
