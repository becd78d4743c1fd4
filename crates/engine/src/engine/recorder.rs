use hybrid_core::RecordSink;

/// Why a row was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RowKind {
    /// The initial time, a print point, or `t_final`.
    Print,

    /// A time event, a state event, or an early stop.
    Event,
}

/// Buffers one pending row so an event row merges with a neighbor closer
/// than `spacing`, keeping the latest values.
///
/// An event row and the print row at the same instant therefore produce a
/// single record holding the post-event state. Two print rows never merge,
/// so every print point keeps its row however small `t_print` is.
pub(super) struct Recorder<'s, S> {
    sink: &'s mut S,
    spacing: f64,
    pending: Option<(RowKind, Vec<f64>)>,
    written: usize,
}

impl<'s, S: RecordSink> Recorder<'s, S> {
    pub(super) fn new(sink: &'s mut S, spacing: f64) -> Self {
        Self {
            sink,
            spacing,
            pending: None,
            written: 0,
        }
    }

    /// Queues `row`, whose first value is the time.
    pub(super) fn record(&mut self, kind: RowKind, row: Vec<f64>) -> Result<(), S::Error> {
        let kind = match self.pending.take() {
            Some((pending_kind, pending))
                if row[0] - pending[0] <= self.spacing
                    && (pending_kind == RowKind::Event || kind == RowKind::Event) =>
            {
                if pending_kind == RowKind::Print {
                    RowKind::Print
                } else {
                    kind
                }
            }
            Some((_, pending)) => {
                self.sink.append(&pending)?;
                self.written += 1;
                kind
            }
            None => kind,
        };
        self.pending = Some((kind, row));
        Ok(())
    }

    /// Writes the pending row and finalizes the sink.
    ///
    /// The sink is finalized even when the last append fails.
    pub(super) fn finish(&mut self) -> Result<(), S::Error> {
        let flushed = match self.pending.take() {
            Some((_, pending)) => self.sink.append(&pending).map(|()| self.written += 1),
            None => Ok(()),
        };
        let finalized = self.sink.finalize();
        flushed.and(finalized)
    }

    /// Rows handed to the sink so far.
    pub(super) fn written(&self) -> usize {
        self.written
    }
}
