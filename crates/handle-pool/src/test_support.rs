//! Scripted probe for engine tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use probe::{AvailabilityProbe, Credential, Outcome};

/// Returns scripted outcomes per handle, then a fallback.
///
/// Tracks every call and the highest number of concurrent calls seen.
pub struct ScriptedProbe {
    fallback: Outcome,
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    limited_credentials: HashSet<String>,
    latency: Duration,
    calls: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(fallback: Outcome) -> Self {
        Self {
            fallback,
            scripts: Mutex::new(HashMap::new()),
            limited_credentials: HashSet::new(),
            latency: Duration::from_millis(100),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Outcomes returned for `handle`, in order, before falling back.
    pub fn script(self, handle: &str, outcomes: Vec<Outcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(handle.to_string(), outcomes.into());
        self
    }

    /// Every call made with this credential is rate limited.
    pub fn always_limit(mut self, credential_id: &str) -> Self {
        self.limited_credentials.insert(credential_id.to_string());
        self
    }

    pub fn calls_for(&self, handle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, h)| h == handle)
            .count()
    }

    pub fn calls_by(&self, credential_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == credential_id)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, credential_id: &str, handle: &str) -> Outcome {
        if self.limited_credentials.contains(credential_id) {
            return Outcome::RateLimited {
                retry_after: Duration::from_secs(30),
            };
        }
        self.scripts
            .lock()
            .unwrap()
            .get_mut(handle)
            .and_then(|outcomes| outcomes.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl AvailabilityProbe for ScriptedProbe {
    fn id(&self) -> &str {
        "scripted"
    }

    fn check<'a>(
        &'a self,
        credential: &'a Credential,
        handle: &'a str,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send + 'a>> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls
                .lock()
                .unwrap()
                .push((credential.id.clone(), handle.to_string()));

            tokio::time::sleep(self.latency).await;
            let outcome = self.next_outcome(&credential.id, handle);

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            outcome
        })
    }
}
