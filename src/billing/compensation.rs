use std::future::Future;
use std::pin::Pin;

use tracing::{error, info};

type UndoFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;
type UndoFn = Box<dyn FnOnce() -> UndoFuture + Send>;

/// Undo stack for multi-step checkout provisioning. Steps register their undo
/// action as they commit; on failure the whole stack runs in reverse order.
/// Undo failures are logged and do not stop later undos from running.
#[derive(Default)]
pub struct CompensationList {
    steps: Vec<(&'static str, UndoFn)>,
}

impl CompensationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F, Fut>(&mut self, label: &'static str, undo: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.steps.push((label, Box::new(move || Box::pin(undo()))));
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub async fn run(self) {
        for (label, undo) in self.steps.into_iter().rev() {
            match undo().await {
                Ok(()) => info!(step = label, "compensation step completed"),
                Err(err) => error!(step = label, error = %err, "compensation step failed"),
            }
        }
    }
}
