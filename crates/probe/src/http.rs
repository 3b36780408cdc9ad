//! HTTP availability probe
//!
//! Issues `GET {base_url}/{handle}` with the credential's bearer token and
//! classifies the response status. The HTTP client is built by the caller so
//! transport concerns (proxy, TLS) stay outside the probe.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::classify::classify_status;
use crate::{AvailabilityProbe, Credential, Outcome};

pub struct HttpProbe {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url_for(&self, handle: &str) -> String {
        format!("{}/{handle}", self.base_url)
    }

    async fn check_inner(
        &self,
        credential: &Credential,
        handle: &str,
        timeout: Duration,
    ) -> Outcome {
        let mut request = self.client.get(self.url_for(handle)).timeout(timeout);
        if let Some(token) = &credential.token {
            request = request.bearer_auth(token.expose());
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Outcome::TransientError {
                    detail: format!("probe timed out after {}ms", timeout.as_millis()),
                };
            }
            Err(e) => {
                return Outcome::TransientError {
                    detail: format!("request failed: {e}"),
                };
            }
        };

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok());
        let outcome = classify_status(status, retry_after);
        debug!(
            account_id = %credential.id,
            handle,
            status,
            outcome = outcome.label(),
            "probe response classified"
        );
        outcome
    }
}

impl AvailabilityProbe for HttpProbe {
    fn id(&self) -> &str {
        "http"
    }

    fn check<'a>(
        &'a self,
        credential: &'a Credential,
        handle: &'a str,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send + 'a>> {
        Box::pin(self.check_inner(credential, handle, timeout))
    }
}
