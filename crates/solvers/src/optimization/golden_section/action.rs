/// Actions an observer can take during golden section search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop and return the best point found so far.
    StopEarly,

    /// Treat this point as worse than the other interior point.
    ///
    /// The search shrinks away from it and it is never reported as best.
    /// Returning this for a failed evaluation lets the search continue.
    AssumeWorse,
}
