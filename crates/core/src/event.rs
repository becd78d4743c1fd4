use std::{cmp::Ordering, collections::BTreeMap};

/// A parameter change scheduled at a known absolute time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeEvent<P> {
    /// Absolute simulation time at which the event fires.
    pub fires_at: f64,

    /// Model-specific payload applied when the event fires.
    pub payload: P,

    /// Human-readable description used in logs.
    pub description: String,
}

impl<P> TimeEvent<P> {
    /// Creates a new time event.
    pub fn new(fires_at: f64, payload: P, description: impl Into<String>) -> Self {
        Self {
            fires_at,
            payload,
            description: description.into(),
        }
    }
}

/// Ordering key: time first, then insertion sequence for stability.
#[derive(Debug, Clone, Copy)]
struct Key {
    fires_at: f64,
    seq: u64,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fires_at
            .total_cmp(&other.fires_at)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Ordered queue of pending [`TimeEvent`]s.
///
/// Events are ordered by `fires_at` ascending. Events with equal times keep
/// their insertion order. An empty registry means no discontinuity is
/// pending, which is never an error.
///
/// # Example
///
/// ```
/// use hybrid_core::{TimeEvent, TimeEventRegistry};
///
/// let mut registry = TimeEventRegistry::new();
/// registry.insert(TimeEvent::new(20.0, 'b', "second"));
/// registry.insert(TimeEvent::new(10.0, 'a', "first"));
///
/// assert_eq!(registry.peek_earliest(), Some(10.0));
///
/// let due = registry.drain_due(10.0, 1e-6);
/// assert_eq!(due.len(), 1);
/// assert_eq!(due[0].payload, 'a');
/// assert!(registry.drain_due(10.0, 1e-6).is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct TimeEventRegistry<P> {
    events: BTreeMap<Key, TimeEvent<P>>,
    next_seq: u64,
}

impl<P> Default for TimeEventRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> TimeEventRegistry<P> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Inserts an event, keeping the registry ordered.
    ///
    /// The event time is not checked against the current simulation time.
    pub fn insert(&mut self, event: TimeEvent<P>) {
        let key = Key {
            fires_at: event.fires_at,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.events.insert(key, event);
    }

    /// Returns the earliest pending event time, if any.
    #[must_use]
    pub fn peek_earliest(&self) -> Option<f64> {
        self.events.first_key_value().map(|(key, _)| key.fires_at)
    }

    /// Removes and returns every event with `fires_at <= now + epsilon`.
    ///
    /// Returned events are ordered by time, with ties in insertion order.
    pub fn drain_due(&mut self, now: f64, epsilon: f64) -> Vec<TimeEvent<P>> {
        let limit = now + epsilon;
        let mut due = Vec::new();
        while let Some(entry) = self.events.first_entry() {
            if entry.key().fires_at > limit {
                break;
            }
            due.push(entry.remove());
        }
        due
    }

    /// Drops events strictly before `t` without returning them.
    ///
    /// Returns the number of discarded events.
    pub fn discard_before(&mut self, t: f64) -> usize {
        let mut discarded = 0;
        while let Some(entry) = self.events.first_entry() {
            if entry.key().fires_at >= t {
                break;
            }
            entry.remove();
            discarded += 1;
        }
        discarded
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if no events are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterates over pending events in firing order.
    pub fn iter(&self) -> impl Iterator<Item = &TimeEvent<P>> {
        self.events.values()
    }
}

impl<P> Extend<TimeEvent<P>> for TimeEventRegistry<P> {
    fn extend<T: IntoIterator<Item = TimeEvent<P>>>(&mut self, iter: T) {
        for event in iter {
            self.insert(event);
        }
    }
}

impl<P> FromIterator<TimeEvent<P>> for TimeEventRegistry<P> {
    fn from_iter<T: IntoIterator<Item = TimeEvent<P>>>(iter: T) -> Self {
        let mut registry = Self::new();
        registry.extend(iter);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn event(t: f64, id: usize) -> TimeEvent<usize> {
        TimeEvent::new(t, id, format!("event {id}"))
    }

    #[test]
    fn empty_registry_has_nothing_pending() {
        let mut registry = TimeEventRegistry::<usize>::new();
        assert!(registry.is_empty());
        assert_eq!(registry.peek_earliest(), None);
        assert!(registry.drain_due(1e9, 1e-6).is_empty());
    }

    #[test]
    fn equal_times_keep_insertion_order() {
        let mut registry = TimeEventRegistry::new();
        registry.insert(event(5.0, 0));
        registry.insert(event(1.0, 1));
        registry.insert(event(5.0, 2));
        registry.insert(event(5.0, 3));

        let ids: Vec<_> = registry
            .drain_due(5.0, 0.0)
            .into_iter()
            .map(|e| e.payload)
            .collect();
        assert_eq!(ids, vec![1, 0, 2, 3]);
    }

    #[test]
    fn epsilon_absorbs_landing_error() {
        let mut registry = TimeEventRegistry::new();
        registry.insert(event(10.0, 0));

        assert!(registry.drain_due(10.0 - 1e-3, 1e-6).is_empty());
        assert_eq!(registry.drain_due(10.0 - 1e-7, 1e-6).len(), 1);
    }

    #[test]
    fn discard_before_drops_passed_events() {
        let mut registry: TimeEventRegistry<_> =
            [event(1.0, 0), event(2.0, 1), event(3.0, 2)].into_iter().collect();

        assert_eq!(registry.discard_before(2.0), 1);
        assert_eq!(registry.peek_earliest(), Some(2.0));
        assert_eq!(registry.len(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

        #[test]
        fn drain_due_returns_exactly_due_events_in_order(
            times in proptest::collection::vec(0.0..100.0_f64, 0..40),
            now in 0.0..100.0_f64,
        ) {
            let eps = 1e-6;
            let mut registry = TimeEventRegistry::new();
            for (id, &t) in times.iter().enumerate() {
                registry.insert(event(t, id));
            }

            let due = registry.drain_due(now, eps);

            let expected = times.iter().filter(|&&t| t <= now + eps).count();
            prop_assert_eq!(due.len(), expected);
            prop_assert!(due.windows(2).all(|w| w[0].fires_at <= w[1].fires_at));
            prop_assert!(registry.iter().all(|e| e.fires_at > now + eps));

            let remaining: Vec<f64> = registry.iter().map(|e| e.fires_at).collect();
            prop_assert!(remaining.windows(2).all(|w| w[0] <= w[1]));

            prop_assert!(registry.drain_due(now, eps).is_empty());
        }
    }
}
