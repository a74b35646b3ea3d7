pub mod locks;
pub mod task;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::Result;
use crate::workflow::Orchestrator;

pub use locks::KeyedLocks;
pub use task::Task;

/// Runs each accepted task as an independent background unit of work.
///
/// Units for different logical keys run concurrently; units for the same
/// key are serialized so they never share a working copy or race on labels.
pub struct Dispatcher {
    orchestrator: Arc<Orchestrator>,
    locks: Arc<KeyedLocks>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Dispatcher {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            locks: Arc::new(KeyedLocks::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Spawn `task` and return immediately.
    pub fn dispatch(&self, task: Task) {
        tracing::info!(
            repo = %task.repo().full_name,
            task = %task.description(),
            key = %task.key(),
            "Dispatching task"
        );

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let orchestrator = Arc::clone(&self.orchestrator);
        let locks = Arc::clone(&self.locks);
        let in_flight = Arc::clone(&self.in_flight);
        let idle = Arc::clone(&self.idle);

        tokio::spawn(async move {
            let key = task.key();
            let _guard = locks.acquire(&key).await;

            if let Err(e) = run_task(&orchestrator, &task).await {
                tracing::error!(
                    task = %task.description(),
                    error = %e,
                    "Task failed"
                );
            }

            if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                idle.notify_waiters();
            }
        });
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait up to `grace` for in-flight units to finish. Returns `false` if
    /// some were still running when the grace period ran out.
    pub async fn drain(&self, grace: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(grace, wait).await.is_ok()
    }
}

async fn run_task(orchestrator: &Orchestrator, task: &Task) -> Result<()> {
    match task {
        Task::SolveIssue { repo, issue_number } => {
            let outcome = orchestrator.solve_issue(repo, *issue_number).await?;
            tracing::info!(task = %task.description(), outcome = ?outcome, "Task completed");
        }
        Task::ReviewFeedback {
            repo,
            pr_number,
            review_body,
            ..
        } => {
            let outcome = orchestrator
                .on_reviewer_feedback(repo, *pr_number, review_body)
                .await?;
            tracing::info!(
                task = %task.description(),
                verdict = %outcome.verdict,
                action = %outcome.action,
                iteration = outcome.iteration,
                "Task completed"
            );
        }
        Task::ReviewPullRequest { repo, pr_number, .. } => {
            let outcome = orchestrator.review_pull_request(repo, *pr_number).await?;
            tracing::info!(task = %task.description(), outcome = ?outcome, "Task completed");
        }
    }
    Ok(())
}
