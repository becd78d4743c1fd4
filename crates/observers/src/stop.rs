use hybrid_core::Observer;

use crate::traits::{CanStopEarly, HasTime};

/// Requests a stop at the first event at or after time `t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopAt {
    pub t: f64,
}

impl<E: HasTime, A: CanStopEarly> Observer<E, A> for StopAt {
    fn observe(&mut self, event: &E) -> Option<A> {
        (event.time() >= self.t).then(A::stop_early)
    }
}
