//! Rate-limit-aware work distribution for handle availability checks
//!
//! Spreads a list of candidate handles across a pool of credentials. Each
//! credential gets its own worker that paces its calls and backs off when
//! the service signals a rate limit, while a global gate bounds how many
//! probe calls are in flight at once.
//!
//! Task lifecycle:
//! 1. Candidates failing the format rule are dropped, the rest are queued
//! 2. A worker pops a task; if its credential is cooling down the task goes
//!    to the back of the queue and the worker backs off
//! 3. The worker takes a gate slot and probes the handle
//! 4. Available, taken, invalid or error → terminal result, task done
//! 5. Rate limited → credential enters cooldown, task requeued
//! 6. The run finishes when every queued task is done, or on cancellation
//!
//! Available handles are appended to a `HandleSink` as they are found.

pub mod credential;
pub mod distributor;
pub mod error;
pub mod gate;
pub mod handles;
pub mod metrics;
pub mod queue;
pub mod report;
pub mod settings;
pub mod sink;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use credential::{CredentialState, CredentialStats, CredentialStatus};
pub use distributor::Distributor;
pub use error::{Error, Result};
pub use gate::{ConcurrencyGate, GatePermit};
pub use handles::{is_valid_handle, partition_handles};
pub use queue::{Task, TaskQueue};
pub use report::{CheckResult, OutcomeCounts, RunReport, Verdict};
pub use settings::{DelayRange, Settings};
pub use sink::{FileSink, HandleSink, MemorySink};
