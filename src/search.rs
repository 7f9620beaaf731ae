//! Debounced library search with stale-response discard.
//!
//! Callers pass the clock in, so the state machine is deterministic: feed
//! keystrokes through [`SearchState::input`], call [`SearchState::poll`]
//! whenever convenient, run the request for any ticket it hands out, then
//! offer the response back through [`SearchState::accept`].

use std::time::{Duration, Instant};

use log::debug;

use crate::playlist::TrackEntry;

/// One issued request. Responses are matched back by sequence and query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub sequence: u64,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct SearchState {
    delay: Duration,
    active_query: String,
    pending_since: Option<Instant>,
    issued_sequence: u64,
    results: Vec<TrackEntry>,
}

impl SearchState {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            active_query: String::new(),
            pending_since: None,
            issued_sequence: 0,
            results: Vec::new(),
        }
    }

    /// Records a keystroke. Restarts the debounce window.
    pub fn input(&mut self, query: &str, now: Instant) {
        self.active_query = query.trim().to_string();
        self.pending_since = Some(now);
    }

    /// When the pending query should fire, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending_since.map(|since| since + self.delay)
    }

    /// Trailing edge: hands out a ticket once the delay has passed since the
    /// last input. An empty query clears the results without a request.
    pub fn poll(&mut self, now: Instant) -> Option<SearchTicket> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.pending_since = None;
        self.issued_sequence += 1;

        if self.active_query.is_empty() {
            self.results.clear();
            return None;
        }
        debug!(
            "Issuing search {} for '{}'",
            self.issued_sequence, self.active_query
        );
        Some(SearchTicket {
            sequence: self.issued_sequence,
            query: self.active_query.clone(),
        })
    }

    /// Stores `results` if `ticket` is still the newest request for the
    /// current query. Returns whether they were applied.
    pub fn accept(&mut self, ticket: &SearchTicket, results: Vec<TrackEntry>) -> bool {
        if ticket.sequence != self.issued_sequence || ticket.query != self.active_query {
            debug!(
                "Dropping stale search {} for '{}'",
                ticket.sequence, ticket.query
            );
            return false;
        }
        self.results = results;
        true
    }

    pub fn active_query(&self) -> &str {
        &self.active_query
    }

    pub fn results(&self) -> &[TrackEntry] {
        &self.results
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::SearchState;
    use crate::playlist::{TrackDetails, TrackEntry};

    const DELAY: Duration = Duration::from_millis(300);

    fn hit(title: &str) -> Vec<TrackEntry> {
        vec![TrackEntry {
            details: TrackDetails {
                title: Some(title.to_string()),
                ..TrackDetails::default()
            },
            ..TrackEntry::default()
        }]
    }

    #[test]
    fn test_fires_only_after_quiet_period() {
        let start = Instant::now();
        let mut search = SearchState::new(DELAY);
        search.input("lo", start);
        search.input("low", start + Duration::from_millis(200));

        assert_eq!(search.poll(start + Duration::from_millis(400)), None);
        let ticket = search
            .poll(start + Duration::from_millis(500))
            .expect("debounce elapsed");
        assert_eq!(ticket.query, "low");
        assert_eq!(search.poll(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_stale_responses_are_discarded() {
        let start = Instant::now();
        let mut search = SearchState::new(DELAY);
        search.input("first", start);
        let first = search.poll(start + DELAY).expect("fires");

        search.input("second", start + DELAY);
        let second = search.poll(start + DELAY * 2).expect("fires");

        assert!(search.accept(&second, hit("B")));
        assert!(!search.accept(&first, hit("A")));
        assert_eq!(search.results()[0].title(), Some("B"));
    }

    #[test]
    fn test_response_for_superseded_query_is_ignored_before_next_fire() {
        let start = Instant::now();
        let mut search = SearchState::new(DELAY);
        search.input("abc", start);
        let ticket = search.poll(start + DELAY).expect("fires");

        search.input("abcd", start + DELAY);
        assert!(!search.accept(&ticket, hit("old")));
        assert!(search.results().is_empty());
    }

    #[test]
    fn test_empty_query_clears_results_without_request() {
        let start = Instant::now();
        let mut search = SearchState::new(DELAY);
        search.input("x", start);
        let ticket = search.poll(start + DELAY).expect("fires");
        assert!(search.accept(&ticket, hit("x")));

        search.input("   ", start + DELAY);
        assert_eq!(search.poll(start + DELAY * 2), None);
        assert!(search.results().is_empty());
        assert!(search.deadline().is_none());
    }
}
