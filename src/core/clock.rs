use std::sync::atomic::{AtomicI64, Ordering};

type TimeSource = Box<dyn Fn() -> i64 + Send + Sync>;

/// Per-session timestamp allocator.
///
/// Every slot handed out is `>=` the previous one, even if the wall clock
/// steps backwards.
pub struct SessionClock {
    source: TimeSource,
    last: AtomicI64,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::with_source(|| chrono::Utc::now().timestamp_millis())
    }

    pub fn with_source(source: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        Self {
            source: Box::new(source),
            last: AtomicI64::new(i64::MIN),
        }
    }

    /// Allocate the next timestamp slot in milliseconds
    pub fn next(&self) -> i64 {
        let now = (self.source)();
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(last.max(now)))
            .unwrap_or_else(|last| last);
        previous.max(now)
    }

    /// Most recently allocated slot, if any
    pub fn last(&self) -> Option<i64> {
        match self.last.load(Ordering::Acquire) {
            i64::MIN => None,
            ts => Some(ts),
        }
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}
