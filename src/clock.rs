use chrono::{DateTime, Duration, Local};
use std::sync::{PoisonError, RwLock};

/// Source of "now" for record stamps and rotation decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Manually driven clock for tests and replay tools.
#[derive(Debug)]
pub struct MockClock {
    now: RwLock<DateTime<Local>>,
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MockClock {
    pub fn with_time(time: DateTime<Local>) -> Self {
        Self {
            now: RwLock::new(time),
        }
    }

    pub fn new() -> Self {
        Self::with_time(Local::now())
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now += duration;
    }

    pub fn set_time(&self, time: DateTime<Local>) {
        *self.now.write().unwrap_or_else(PoisonError::into_inner) = time;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}
