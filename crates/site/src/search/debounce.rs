//! Per-visitor debounce for search suggestions, and keyboard selection.
//!
//! Each keystroke sends a suggest request. A request bumps the visitor's
//! generation, waits out the debounce window, and only runs the search if no
//! newer request arrived meanwhile.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

/// Idle time before a query is searched.
pub const DEBOUNCE: Duration = Duration::from_millis(300);
/// Shorter queries never search.
pub const MIN_QUERY_CHARS: usize = 2;

/// Result of waiting out the debounce window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Debounced {
    /// Under the minimum length: hide the results, fetch nothing.
    TooShort,
    /// A newer request from the same visitor took over.
    Superseded,
    /// Search this (trimmed) query.
    Ready(String),
}

#[derive(Clone)]
pub struct SuggestGate {
    generations: Cache<Uuid, Arc<AtomicU64>>,
    delay: Duration,
}

impl Default for SuggestGate {
    fn default() -> Self {
        Self::new(DEBOUNCE)
    }
}

impl SuggestGate {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            generations: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(Duration::from_secs(10 * 60))
                .build(),
            delay,
        }
    }

    /// Register a keystroke and wait for the visitor to go idle.
    pub async fn settle(&self, visitor: Uuid, query: &str) -> Debounced {
        let counter = self
            .generations
            .get_with(visitor, async { Arc::new(AtomicU64::new(0)) })
            .await;
        let mine = counter.fetch_add(1, Ordering::SeqCst) + 1;

        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Debounced::TooShort;
        }

        tokio::time::sleep(self.delay).await;

        if counter.load(Ordering::SeqCst) == mine {
            Debounced::Ready(query.to_string())
        } else {
            Debounced::Superseded
        }
    }
}

/// Keys handled in the suggestion list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub enum Key {
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
}

/// What the list should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Highlight this item, or none.
    Select(Option<usize>),
    /// Open this item.
    Open(usize),
    /// Hide the list and reset the selection.
    Hide,
    /// Nothing to do (Enter with no selection).
    Ignore,
}

/// Selected index within `[-1, len - 1]`; `None` is -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    index: Option<usize>,
    len: usize,
}

impl Selection {
    #[must_use]
    pub const fn new(index: Option<usize>, len: usize) -> Self {
        let index = match index {
            Some(i) if i < len => Some(i),
            _ => None,
        };
        Self { index, len }
    }

    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        self.index
    }

    /// Apply a key press.
    pub const fn press(&mut self, key: Key) -> SelectionOutcome {
        match key {
            Key::ArrowDown => {
                if self.len > 0 {
                    self.index = match self.index {
                        None => Some(0),
                        Some(i) if i + 1 < self.len => Some(i + 1),
                        Some(i) => Some(i),
                    };
                }
                SelectionOutcome::Select(self.index)
            }
            Key::ArrowUp => {
                self.index = match self.index {
                    Some(0) | None => None,
                    Some(i) => Some(i - 1),
                };
                SelectionOutcome::Select(self.index)
            }
            Key::Enter => match self.index {
                Some(i) => SelectionOutcome::Open(i),
                None => SelectionOutcome::Ignore,
            },
            Key::Escape => {
                self.index = None;
                SelectionOutcome::Hide
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_only_last_keystroke_searches() {
        let gate = SuggestGate::default();
        let visitor = Uuid::new_v4();

        let (first, second) = tokio::join!(gate.settle(visitor, "bl"), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            gate.settle(visitor, "bla").await
        });

        assert_eq!(first, Debounced::Superseded);
        assert_eq!(second, Debounced::Ready("bla".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_query_supersedes_pending_search() {
        let gate = SuggestGate::default();
        let visitor = Uuid::new_v4();

        let (pending, short) = tokio::join!(gate.settle(visitor, "blade"), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            gate.settle(visitor, " b ").await
        });

        assert_eq!(pending, Debounced::Superseded);
        assert_eq!(short, Debounced::TooShort);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visitors_are_independent() {
        let gate = SuggestGate::default();
        let (a, b) = tokio::join!(
            gate.settle(Uuid::new_v4(), "cli"),
            gate.settle(Uuid::new_v4(), "faq")
        );
        assert_eq!(a, Debounced::Ready("cli".into()));
        assert_eq!(b, Debounced::Ready("faq".into()));
    }

    #[test]
    fn test_selection_bounds() {
        let mut sel = Selection::new(None, 2);
        assert_eq!(sel.press(Key::ArrowUp), SelectionOutcome::Select(None));
        assert_eq!(sel.press(Key::ArrowDown), SelectionOutcome::Select(Some(0)));
        assert_eq!(sel.press(Key::ArrowDown), SelectionOutcome::Select(Some(1)));
        assert_eq!(sel.press(Key::ArrowDown), SelectionOutcome::Select(Some(1)));
        assert_eq!(sel.press(Key::Enter), SelectionOutcome::Open(1));
        assert_eq!(sel.press(Key::Escape), SelectionOutcome::Hide);
        assert_eq!(sel.index(), None);
        assert_eq!(sel.press(Key::Enter), SelectionOutcome::Ignore);

        let mut empty = Selection::new(Some(3), 0);
        assert_eq!(empty.press(Key::ArrowDown), SelectionOutcome::Select(None));
    }
}
