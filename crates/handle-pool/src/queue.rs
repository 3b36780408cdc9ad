//! FIFO task queue with explicit completion tracking
//!
//! Popping a task does not finish it: a worker may hand it back with
//! `requeue` when its credential is cooling down. The queue therefore keeps
//! an outstanding count of tasks that have not reached a terminal result.
//! It is drained once that count reaches zero, and `join` resolves then.
//!
//! Requeued tasks go to the back so a single blocked handle never holds up
//! the rest of the queue.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tracing::warn;

/// One handle waiting to be checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub handle: String,
    /// How many times this task went back into the queue.
    pub requeues: u32,
}

impl Task {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            requeues: 0,
        }
    }
}

/// Thread-safe FIFO shared by all workers of a run.
///
/// The deque lock is a std `Mutex`: it is never held across an await.
/// Waiting poppers park on a `Notify`; the outstanding count lives in a
/// `watch` channel so `join` can await it reaching zero.
pub struct TaskQueue {
    tasks: Mutex<VecDeque<Task>>,
    available: Notify,
    outstanding: watch::Sender<usize>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            available: Notify::new(),
            outstanding: watch::Sender::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
        // A panic while holding the lock cannot leave the deque half-updated
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a new task to the back. Never blocks.
    pub fn push(&self, task: Task) {
        self.outstanding.send_modify(|n| *n += 1);
        self.lock().push_back(task);
        self.available.notify_one();
    }

    /// Hand a popped task back without finishing it.
    ///
    /// The task re-enters at the back; the outstanding count is unchanged.
    pub fn requeue(&self, mut task: Task) {
        task.requeues += 1;
        self.lock().push_back(task);
        self.available.notify_one();
    }

    /// Remove the front task, waiting up to `timeout` for one to appear.
    ///
    /// Returns `None` on timeout, or immediately once the queue is drained.
    pub async fn pop(&self, timeout: Duration) -> Option<Task> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so a push between check and await is not missed
            notified.as_mut().enable();

            if let Some(task) = self.lock().pop_front() {
                return Some(task);
            }
            if self.is_drained() {
                return None;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Record that a popped task reached a terminal result.
    pub fn mark_done(&self) {
        let mut underflow = false;
        self.outstanding.send_modify(|n| {
            if *n == 0 {
                underflow = true;
            } else {
                *n -= 1;
            }
        });
        if underflow {
            warn!("mark_done called with no outstanding tasks");
        }
        if self.is_drained() {
            // Wake idle poppers so they observe the drain instead of timing out
            self.available.notify_waiters();
        }
    }

    /// Number of tasks that have not reached a terminal result.
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Number of tasks currently sitting in the queue.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// True when every task ever pushed has been marked done.
    pub fn is_drained(&self) -> bool {
        self.outstanding() == 0 && self.is_empty()
    }

    /// Wait until the queue is drained.
    pub async fn join(&self) {
        let mut rx = self.outstanding.subscribe();
        // The sender lives as long as the queue, so this cannot fail while we borrow it
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test(start_paused = true)]
    async fn pops_in_fifo_order() {
        let q = TaskQueue::new();
        q.push(Task::new("first_handle"));
        q.push(Task::new("second_handle"));

        assert_eq!(q.pop(SHORT).await.unwrap().handle, "first_handle");
        assert_eq!(q.pop(SHORT).await.unwrap().handle, "second_handle");
    }

    #[tokio::test(start_paused = true)]
    async fn requeued_task_goes_behind_waiting_tasks() {
        let q = TaskQueue::new();
        q.push(Task::new("task_one"));
        q.push(Task::new("task_two"));
        q.push(Task::new("task_three"));

        let first = q.pop(SHORT).await.unwrap();
        assert_eq!(first.handle, "task_one");
        q.requeue(first);

        let order: Vec<String> = [
            q.pop(SHORT).await.unwrap(),
            q.pop(SHORT).await.unwrap(),
            q.pop(SHORT).await.unwrap(),
        ]
        .into_iter()
        .map(|t| t.handle)
        .collect();
        assert_eq!(order, vec!["task_two", "task_three", "task_one"]);
    }

    #[tokio::test(start_paused = true)]
    async fn requeue_increments_counter_but_not_outstanding() {
        let q = TaskQueue::new();
        q.push(Task::new("handle_x"));
        assert_eq!(q.outstanding(), 1);

        let task = q.pop(SHORT).await.unwrap();
        q.requeue(task);
        assert_eq!(q.outstanding(), 1);

        let task = q.pop(SHORT).await.unwrap();
        assert_eq!(task.requeues, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pop_times_out_while_work_is_in_flight() {
        let q = TaskQueue::new();
        q.push(Task::new("in_flight"));
        let _held = q.pop(SHORT).await.unwrap();

        let start = tokio::time::Instant::now();
        assert!(q.pop(SHORT).await.is_none());
        assert!(start.elapsed() >= SHORT);
        assert!(!q.is_drained(), "popped but unfinished task keeps queue alive");
    }

    #[tokio::test(start_paused = true)]
    async fn pop_returns_immediately_when_drained() {
        let q = TaskQueue::new();
        let start = tokio::time::Instant::now();
        assert!(q.pop(Duration::from_secs(60)).await.is_none());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(q.is_drained());
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_pop_wakes_on_push() {
        let q = Arc::new(TaskQueue::new());
        q.push(Task::new("placeholder"));
        let _held = q.pop(SHORT).await.unwrap();

        let waiter = {
            let q = q.clone();
            tokio::spawn(async move { q.pop(Duration::from_secs(10)).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        q.push(Task::new("late_arrival"));

        let popped = waiter.await.unwrap();
        assert_eq!(popped.unwrap().handle, "late_arrival");
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_pop_wakes_on_drain() {
        let q = Arc::new(TaskQueue::new());
        q.push(Task::new("only_task"));
        let _held = q.pop(SHORT).await.unwrap();

        let waiter = {
            let q = q.clone();
            tokio::spawn(async move {
                let start = tokio::time::Instant::now();
                let popped = q.pop(Duration::from_secs(60)).await;
                (popped, start.elapsed())
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        q.mark_done();

        let (popped, waited) = waiter.await.unwrap();
        assert!(popped.is_none());
        assert!(waited < Duration::from_secs(60), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn join_waits_for_outstanding_not_for_empty() {
        let q = Arc::new(TaskQueue::new());
        q.push(Task::new("handle_a"));
        q.push(Task::new("handle_b"));

        let a = q.pop(SHORT).await.unwrap();
        let b = q.pop(SHORT).await.unwrap();
        assert!(q.is_empty());

        let joiner = {
            let q = q.clone();
            tokio::spawn(async move { q.join().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!joiner.is_finished(), "empty queue with work in flight is not drained");

        q.requeue(a);
        q.mark_done(); // b finished
        drop(b);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!joiner.is_finished());

        let _a = q.pop(SHORT).await.unwrap();
        q.mark_done();
        joiner.await.unwrap();
        assert!(q.is_drained());
    }

    #[test]
    fn mark_done_without_outstanding_does_not_underflow() {
        let q = TaskQueue::new();
        q.mark_done();
        assert_eq!(q.outstanding(), 0);
    }
}
