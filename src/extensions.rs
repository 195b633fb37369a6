use std::time::Duration;

/// Blocks the calling thread between retry attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, delay: Duration);
}

#[derive(Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

/// Byte counts and timing of the last attempt of a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestStats {
    pub request_bytes: u64,
    pub response_bytes: u64,
    pub duration: Duration,
}

/// Receives statistics once per completed `end()` call.
pub trait StatsRecorder: Send + Sync {
    fn record(&self, _stats: &RequestStats) {}
}
