use std::sync::{Mutex, PoisonError};

use super::requests::Stream;
use crate::selection::Context;

/// Issued sequence number for one request on one `(context, stream)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub context: Context,
    pub stream: Stream,
    pub seq: u64,
}

/// Last-issued-wins ordering for every `(context, stream)` pair.
///
/// Each pair has its own counter and lock, so a slow summary never contends
/// with a plot and `raw` never contends with `ratio`.
#[derive(Debug, Default)]
pub struct SequenceGate {
    issued: [[Mutex<u64>; 3]; 2],
}

impl SequenceGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, context: Context, stream: Stream) -> &Mutex<u64> {
        &self.issued[context.index()][stream.index()]
    }

    /// Assign the next sequence number. The first ticket of a pair is 1.
    pub fn issue(&self, context: Context, stream: Stream) -> Ticket {
        let mut latest = self
            .slot(context, stream)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *latest += 1;
        Ticket {
            context,
            stream,
            seq: *latest,
        }
    }

    /// Highest sequence number issued so far (0 before the first request).
    #[must_use]
    pub fn latest(&self, context: Context, stream: Stream) -> u64 {
        *self
            .slot(context, stream)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `apply` only if `ticket` is still the newest request of its pair.
    ///
    /// The check and `apply` happen under the pair's lock, so no newer ticket
    /// can be issued between them. Returns the latest issued number as `Err`
    /// when the ticket has been superseded.
    pub fn settle<R>(&self, ticket: Ticket, apply: impl FnOnce() -> R) -> Result<R, u64> {
        let latest = self
            .slot(ticket.context, ticket.stream)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *latest == ticket.seq {
            Ok(apply())
        } else {
            Err(*latest)
        }
    }
}
