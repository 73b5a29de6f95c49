//! Debounced location search.
//!
//! Turns a keystroke-at-a-time query into at most one suggestion request per
//! quiet period. Each keystroke bumps a generation counter; a result is only
//! applied when its generation is still the latest and the owner is alive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use weathernav_core::AppError;
use weathernav_weather::{is_searchable, LocationSuggestion, WeatherApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchPhase {
    #[default]
    Idle,
    PendingDebounce,
    Fetching,
    Settled,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub phase: SearchPhase,
    pub suggestions: Vec<LocationSuggestion>,
    pub loading: bool,
    pub error: Option<String>,
}

struct SearchInner {
    api: Arc<dyn WeatherApi>,
    debounce: Duration,
    limit: u32,
    state: watch::Sender<SearchState>,
    generation: AtomicU64,
    /// Token for the armed debounce timer, if any
    timer: Mutex<Option<CancellationToken>>,
    lifetime: CancellationToken,
}

impl SearchInner {
    /// Cancel the armed timer and invalidate every outstanding result.
    /// Returns the new generation plus a fresh timer token when `arm` is set.
    fn rearm(&self, arm: bool) -> (u64, Option<CancellationToken>) {
        let mut slot = self.timer.lock();
        if let Some(previous) = slot.take() {
            previous.cancel();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let timer = arm.then(|| self.lifetime.child_token());
        *slot = timer.clone();
        (generation, timer)
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.lifetime.is_cancelled() && self.generation.load(Ordering::SeqCst) == generation
    }

    fn apply(&self, generation: u64, f: impl FnOnce(&mut SearchState)) -> bool {
        self.state.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            f(state);
            true
        })
    }

    async fn run(self: Arc<Self>, query: String, generation: u64, timer: CancellationToken) {
        tokio::select! {
            _ = timer.cancelled() => return,
            _ = tokio::time::sleep(self.debounce) => {}
        }

        if !self.apply(generation, |s| s.phase = SearchPhase::Fetching) {
            return;
        }
        tracing::debug!("Searching locations for '{}'", query);

        let result = tokio::select! {
            _ = self.lifetime.cancelled() => return,
            result = self.api.search_locations(&query, self.limit) => result,
        };

        let applied = match result {
            Ok(suggestions) => self.apply(generation, move |s| {
                s.suggestions = suggestions;
                s.error = None;
                s.loading = false;
                s.phase = SearchPhase::Settled;
            }),
            Err(e) => {
                tracing::warn!("Location search for '{}' failed: {}", query, e);
                let message = AppError::from(e).user_message();
                self.apply(generation, move |s| {
                    s.suggestions.clear();
                    s.error = Some(message);
                    s.loading = false;
                    s.phase = SearchPhase::Settled;
                })
            }
        };

        if !applied {
            tracing::debug!("Discarding stale search result for '{}'", query);
        }
    }
}

/// Suggestion source for the search field.
///
/// Dropping the search cancels its lifetime; any result still in flight is
/// discarded without touching state.
pub struct DebouncedLocationSearch {
    inner: Arc<SearchInner>,
    runtime: Handle,
}

impl DebouncedLocationSearch {
    pub fn new(api: Arc<dyn WeatherApi>, debounce: Duration, limit: u32, runtime: Handle) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            inner: Arc::new(SearchInner {
                api,
                debounce,
                limit,
                state,
                generation: AtomicU64::new(0),
                timer: Mutex::new(None),
                lifetime: CancellationToken::new(),
            }),
            runtime,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> SearchState {
        self.inner.state.borrow().clone()
    }

    /// Feed the latest text of the search field.
    pub fn query_changed(&self, query: &str) {
        if self.inner.lifetime.is_cancelled() {
            return;
        }

        if !is_searchable(query) {
            self.clear_suggestions();
            return;
        }

        let (generation, Some(timer)) = self.inner.rearm(true) else {
            return;
        };
        self.inner.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
            s.phase = SearchPhase::PendingDebounce;
        });

        let task = self
            .inner
            .clone()
            .run(query.trim().to_string(), generation, timer);
        self.runtime.spawn(task);
    }

    /// Drop the armed timer and any visible suggestions, whatever the query.
    pub fn clear_suggestions(&self) {
        if self.inner.lifetime.is_cancelled() {
            return;
        }
        self.inner.rearm(false);
        self.inner.state.send_modify(|s| {
            s.suggestions.clear();
            s.error = None;
            s.loading = false;
            s.phase = SearchPhase::Idle;
        });
    }

    pub fn shutdown(&self) {
        self.inner.lifetime.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lifetime.is_cancelled()
    }
}

impl Drop for DebouncedLocationSearch {
    fn drop(&mut self) {
        self.shutdown();
    }
}
