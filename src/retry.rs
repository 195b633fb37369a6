use std::collections::BTreeSet;
use std::time::Duration;

use http::StatusCode;
use tracing::warn;

use crate::extensions::Sleeper;
use crate::response::Response;

/// Bounded retry rule for one request.
///
/// `max_attempts` bounds the number of retries, so a request runs at most
/// `max_attempts + 1` times. `attempt_count` is the number of retries
/// performed so far.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    retryable_statuses: BTreeSet<u16>,
    delay: Duration,
    max_attempts: usize,
    attempt_count: usize,
    enabled: bool,
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            retryable_statuses: BTreeSet::new(),
            delay: Duration::ZERO,
            max_attempts: 0,
            attempt_count: 0,
            enabled: false,
        }
    }

    pub fn new(
        max_attempts: usize,
        delay: Duration,
        retryable_statuses: impl IntoIterator<Item = u16>,
    ) -> Self {
        Self {
            retryable_statuses: retryable_statuses.into_iter().collect(),
            delay,
            max_attempts,
            attempt_count: 0,
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn retryable_statuses(&self) -> &BTreeSet<u16> {
        &self.retryable_statuses
    }

    pub fn attempt_count(&self) -> usize {
        self.attempt_count
    }

    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retryable_statuses.contains(&status.as_u16())
    }

    pub(crate) fn reset(&mut self) {
        self.attempt_count = 0;
    }

    fn should_retry(&self, outcome: &crate::Result<Response>) -> bool {
        if !self.enabled || self.attempt_count >= self.max_attempts {
            return false;
        }
        match outcome {
            Ok(response) => self.is_retryable_status(response.status()),
            Err(_) => true,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Whether `code` is a status code with a registered reason phrase.
pub(crate) fn is_known_status(code: u16) -> bool {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .is_some()
}

/// Runs `attempt` until it succeeds with a non-retryable status or the policy
/// is exhausted. `attempt` receives the 1-based attempt number.
///
/// The failed attempt's outcome is dropped before the next try, and the final
/// outcome is returned as is, with `Retry-Count` stamped on a response. The
/// delay between attempts always runs to completion.
pub fn run_with_retry<F>(
    policy: &mut RetryPolicy,
    sleeper: &dyn Sleeper,
    mut attempt: F,
) -> crate::Result<Response>
where
    F: FnMut(usize) -> crate::Result<Response>,
{
    loop {
        let outcome = attempt(policy.attempt_count + 1);
        if !policy.should_retry(&outcome) {
            return outcome.map(|mut response| {
                response.set_retry_count(policy.attempt_count);
                response
            });
        }

        match &outcome {
            Ok(response) => warn!(
                delay_ms = policy.delay.as_millis() as u64,
                status = response.status().as_u16(),
                retry = policy.attempt_count + 1,
                "retrying request after retryable status"
            ),
            Err(error) => warn!(
                delay_ms = policy.delay.as_millis() as u64,
                error = %error,
                retry = policy.attempt_count + 1,
                "retrying request after error"
            ),
        }
        drop(outcome);
        sleeper.sleep(policy.delay);
        policy.attempt_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use http::{HeaderMap, Method, StatusCode};

    use super::{RetryPolicy, is_known_status, run_with_retry};
    use crate::error::Error;
    use crate::extensions::Sleeper;
    use crate::response::Response;

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn delays(&self) -> Vec<Duration> {
            self.delays.lock().expect("sleeper lock").clone()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, delay: Duration) {
            self.delays.lock().expect("sleeper lock").push(delay);
        }
    }

    fn response(status: u16) -> Response {
        Response::new(
            StatusCode::from_u16(status).expect("valid status"),
            HeaderMap::new(),
            "",
        )
    }

    fn transport_error() -> Error {
        Error::Cancelled {
            method: Method::GET,
            uri: "http://localhost/".to_owned(),
        }
    }

    #[test]
    fn retries_retryable_status_until_success() {
        let mut policy = RetryPolicy::new(3, Duration::from_millis(5), [500]);
        let sleeper = RecordingSleeper::default();
        let mut statuses = vec![500, 500, 200].into_iter();
        let mut attempts = Vec::new();

        let response = run_with_retry(&mut policy, &sleeper, |attempt| {
            attempts.push(attempt);
            Ok(response(statuses.next().expect("scripted status")))
        })
        .expect("third attempt succeeds");

        assert_eq!(attempts, vec![1, 2, 3]);
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(5); 2]);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.retry_count(), Some(2));
        assert_eq!(policy.attempt_count(), 2);
    }

    #[test]
    fn exhaustion_returns_last_response_without_wrapping() {
        let mut policy = RetryPolicy::new(2, Duration::ZERO, [503]);
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;

        let response = run_with_retry(&mut policy, &sleeper, |_| {
            calls += 1;
            Ok(response(503))
        })
        .expect("exhausted loop still yields the response");

        assert_eq!(calls, 3);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.retry_count(), Some(2));
    }

    #[test]
    fn errors_are_retried_and_last_error_is_returned() {
        let mut policy = RetryPolicy::new(1, Duration::ZERO, []);
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;

        let outcome = run_with_retry(&mut policy, &sleeper, |_| {
            calls += 1;
            Err(transport_error())
        });

        assert_eq!(calls, 2);
        assert!(matches!(outcome, Err(Error::Cancelled { .. })));
        assert_eq!(sleeper.delays().len(), 1);
    }

    #[test]
    fn disabled_policy_runs_once() {
        let mut policy = RetryPolicy::disabled();
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;

        let response = run_with_retry(&mut policy, &sleeper, |_| {
            calls += 1;
            Ok(response(500))
        })
        .expect("response is returned");

        assert_eq!(calls, 1);
        assert_eq!(response.retry_count(), Some(0));
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn non_retryable_status_stops_immediately() {
        let mut policy = RetryPolicy::new(5, Duration::ZERO, [500]);
        let sleeper = RecordingSleeper::default();
        let response = run_with_retry(&mut policy, &sleeper, |_| Ok(response(404)))
            .expect("response is returned");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(policy.attempt_count(), 0);
    }

    #[test]
    fn known_status_codes_have_reason_phrases() {
        assert!(is_known_status(200));
        assert!(is_known_status(503));
        assert!(!is_known_status(299));
        assert!(!is_known_status(1000));
    }
}
