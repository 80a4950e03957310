use crate::admission::AdmissionFilter;
use crate::normalize::normalize;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// A URL waiting to be fetched, with the depth it was discovered at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: usize,
}

/// Breadth-first work queue plus the set of URLs already dispatched.
///
/// Admission (scheme, host, depth) is checked once on `push`. The visited
/// mark is written by the driver at dispatch time through `mark_visited`,
/// so two discoveries of the same URL before it is dispatched both enqueue
/// but only the first one is fetched.
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    filter: AdmissionFilter,
    max_depth: usize,
}

impl Frontier {
    /// `max_depth == 0` means unlimited.
    pub fn new(filter: AdmissionFilter, max_depth: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            filter,
            max_depth,
        }
    }

    /// Enqueue the start URL at depth 0.
    pub fn seed(&mut self, url: &str) -> bool {
        self.push(url, 0)
    }

    /// Enqueue `url` unless it was already visited, is not allowed, is
    /// malformed or lies beyond the depth bound. Returns whether it was queued.
    pub fn push(&mut self, url: &str, depth: usize) -> bool {
        let normalized = match normalize(url) {
            Ok(normalized) => normalized,
            Err(e) => {
                debug!("Not queuing {}: {}", url, e);
                return false;
            }
        };

        if self.visited.contains(&normalized) {
            debug!("Not queuing already visited URL: {}", url);
            return false;
        }

        if !self.filter.is_allowed(url) {
            debug!("Not queuing URL outside allowed domain: {}", url);
            return false;
        }

        if self.exceeds_depth(depth) {
            debug!("Not queuing URL beyond max depth: {} (depth={})", url, depth);
            return false;
        }

        self.queue.push_back(FrontierEntry {
            url: normalized,
            depth,
        });
        true
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    /// Record `url` as dispatched. Returns false if it already was.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        match normalize(url) {
            Ok(normalized) => self.visited.insert(normalized),
            Err(_) => false,
        }
    }

    pub fn is_visited(&self, url: &str) -> bool {
        normalize(url)
            .map(|normalized| self.visited.contains(&normalized))
            .unwrap_or(false)
    }

    pub fn exceeds_depth(&self, depth: usize) -> bool {
        self.max_depth > 0 && depth > self.max_depth
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frontier(max_depth: usize) -> Frontier {
        Frontier::new(AdmissionFilter::new(["example.org"]), max_depth)
    }

    #[test]
    fn test_fifo_order_is_breadth_first() {
        let mut frontier = frontier(0);
        frontier.seed("http://example.org/");
        let root = frontier.pop().unwrap();
        assert_eq!(root.depth, 0);

        assert!(frontier.push("http://example.org/a", 1));
        assert!(frontier.push("http://example.org/b", 1));
        let a = frontier.pop().unwrap();
        assert!(frontier.push("http://example.org/a/1", 2));
        assert!(frontier.push("http://example.org/c", 1));

        let order: Vec<(String, usize)> = std::iter::from_fn(|| frontier.pop())
            .map(|entry| (entry.url, entry.depth))
            .collect();
        assert_eq!(a.url, "http://example.org/a");
        assert_eq!(
            order,
            vec![
                ("http://example.org/b".to_string(), 1),
                ("http://example.org/a/1".to_string(), 2),
                ("http://example.org/c".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_entries_are_stored_normalized() {
        let mut frontier = frontier(0);
        assert!(frontier.seed("http://Example.org:80/a#top"));
        assert_eq!(
            frontier.pop(),
            Some(FrontierEntry {
                url: "http://example.org/a".to_string(),
                depth: 0
            })
        );
    }

    #[test]
    fn test_push_skips_visited() {
        let mut frontier = frontier(0);
        assert!(frontier.mark_visited("http://example.org/a"));
        assert!(!frontier.push("http://example.org:80/a#x", 1));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_visited_mark_is_written_at_dispatch() {
        let mut frontier = frontier(0);
        // Two discoveries before dispatch both queue
        assert!(frontier.push("http://example.org/dup", 1));
        assert!(frontier.push("http://example.org/dup#again", 1));
        assert_eq!(frontier.len(), 2);
        assert_eq!(frontier.visited_count(), 0);

        let first = frontier.pop().unwrap();
        assert!(frontier.mark_visited(&first.url));
        let second = frontier.pop().unwrap();
        assert!(!frontier.mark_visited(&second.url));
        assert!(frontier.is_visited("http://EXAMPLE.org/dup"));
    }

    #[test]
    fn test_push_skips_disallowed_and_malformed() {
        let mut frontier = frontier(0);
        assert!(!frontier.push("http://other.org/", 1));
        assert!(!frontier.push("mailto:a@example.org", 1));
        assert!(!frontier.push("not a url", 1));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_depth_bound() {
        let mut frontier = frontier(2);
        assert!(frontier.push("http://example.org/d2", 2));
        assert!(!frontier.push("http://example.org/d3", 3));
        assert!(frontier.exceeds_depth(3));
        assert!(!frontier.exceeds_depth(2));
    }

    #[test]
    fn test_zero_depth_is_unlimited() {
        let mut frontier = frontier(0);
        assert!(frontier.push("http://example.org/deep", 10_000));
        assert!(!frontier.exceeds_depth(usize::MAX));
    }
}
