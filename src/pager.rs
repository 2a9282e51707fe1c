use chrono::{DateTime, Duration, Utc};
use std::future::Future;

use crate::Clock;

/// Half-open interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        TimeWindow { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Upper bound of a paged range.
#[derive(Clone, Copy)]
pub enum WindowEnd<'a> {
    At(DateTime<Utc>),
    /// Read the clock again before every sub-window.
    Now(&'a dyn Clock),
}

impl<'a> WindowEnd<'a> {
    fn resolve(&self) -> DateTime<Utc> {
        match self {
            WindowEnd::At(end) => *end,
            WindowEnd::Now(clock) => clock.now(),
        }
    }
}

/// Walks a time range in sub-windows no wider than `max_span`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pager {
    max_span: Duration,
}

impl Pager {
    pub fn new(max_span: Duration) -> Self {
        Pager {
            max_span: max_span.max(Duration::milliseconds(1)),
        }
    }

    pub fn max_span(&self) -> Duration {
        self.max_span
    }

    /// Split `[start, end)` into consecutive sub-windows.
    pub fn windows(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<TimeWindow> {
        let mut windows = Vec::new();
        let mut cursor = start;
        while cursor < end {
            let window = TimeWindow::new(cursor, (cursor + self.max_span).min(end));
            windows.push(window);
            cursor = window.end;
        }
        windows
    }

    /// Call `fetch_one` for every sub-window of `[start, end)` and
    /// concatenate the results in window order.
    ///
    /// The first error aborts the walk and is returned as is.
    pub async fn page<T, E, F, Fut>(
        &self,
        start: DateTime<Utc>,
        end: WindowEnd<'_>,
        mut fetch_one: F,
    ) -> Result<Vec<T>, E>
    where
        F: FnMut(TimeWindow) -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        let mut out = Vec::new();
        let mut cursor = start;
        loop {
            let until = end.resolve();
            if cursor >= until {
                break;
            }
            let window = TimeWindow::new(cursor, (cursor + self.max_span).min(until));
            log::trace!("Fetching window {} to {}.", window.start, window.end);
            out.extend(fetch_one(window).await?);
            cursor = window.end;
        }
        Ok(out)
    }
}
