//! Chronological merge of purchases and sales into one replay sequence.

use crate::domain::Timestamp;

/// Anything positioned on the ledger timeline.
pub trait Chronological {
    fn timestamp(&self) -> Timestamp;
}

/// A tagged ledger event, consumed once by the replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent<P, S> {
    Purchase(P),
    Sale(S),
}

impl<P: Chronological, S: Chronological> Chronological for LedgerEvent<P, S> {
    fn timestamp(&self) -> Timestamp {
        match self {
            LedgerEvent::Purchase(p) => p.timestamp(),
            LedgerEvent::Sale(s) => s.timestamp(),
        }
    }
}

/// Stable ordering key for ledger events.
///
/// Ordering: timestamp -> input sequence. Purchases are numbered before
/// sales, so on equal timestamps purchases replay first and each kind keeps
/// its input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventOrderingKey {
    /// Event time (primary sort).
    pub timestamp: Timestamp,
    /// Position in the concatenated input (tie-break).
    pub seq: usize,
}

/// Interleave purchases and sales into one time-ordered sequence.
pub fn merge_chronological<P, S>(purchases: Vec<P>, sales: Vec<S>) -> Vec<LedgerEvent<P, S>>
where
    P: Chronological,
    S: Chronological,
{
    let mut keyed: Vec<(EventOrderingKey, LedgerEvent<P, S>)> = purchases
        .into_iter()
        .map(LedgerEvent::Purchase)
        .chain(sales.into_iter().map(LedgerEvent::Sale))
        .enumerate()
        .map(|(seq, event)| {
            let key = EventOrderingKey {
                timestamp: event.timestamp(),
                seq,
            };
            (key, event)
        })
        .collect();

    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, event)| event).collect()
}

/// Stable in-place sort by timestamp.
pub fn sort_chronological<T: Chronological>(items: &mut [T]) {
    items.sort_by_key(|item| item.timestamp());
}
