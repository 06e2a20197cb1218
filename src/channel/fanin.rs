//! # Fan-in: merge many input sources into one output channel.
//!
//! [`Fanin`] copies items from a set of inputs into a single bounded output.
//! One forwarding task runs per input; producers never read the output, so
//! the channel's own atomicity is the only synchronization involved.
//!
//! ## What it guarantees
//! - Items from one input arrive in that input's order (per-input FIFO).
//! - No item accepted from an input is dropped before the output closes.
//! - The output closes exactly once, after the last input has closed.
//!
//! ## What it does **not** guarantee
//! - No total order across inputs — only arrival-order interleaving.
//!
//! ## Diagram
//! ```text
//!   input 1 ──► forwarder 1 ──┐
//!   input 2 ──► forwarder 2 ──┼──► bounded mpsc ──► recv()
//!   input N ──► forwarder N ──┘
//! ```
//!
//! Zero inputs degenerate to an immediately-closed output; one input
//! degenerates to a pass-through.

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

/// Merge primitive combining multiple inputs into one bounded output.
///
/// The output receiver is owned exclusively by this value; only the
/// internal forwarders write to it.
pub struct Fanin<T> {
    rx: mpsc::Receiver<T>,
}

impl<T: Send + 'static> Fanin<T> {
    /// Merges a set of streams. Spawns one forwarding task per input.
    ///
    /// `capacity` bounds the shared output channel (clamped to 1); a full
    /// output stalls the forwarders and, transitively, the inputs.
    pub fn new<S>(inputs: Vec<S>, capacity: usize) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        for input in inputs {
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::pin!(input);
                while let Some(item) = input.next().await {
                    if tx.send(item).await.is_err() {
                        // Output side is gone; stop draining this input.
                        break;
                    }
                }
            });
        }
        // Forwarders hold the only remaining senders: when the last input
        // ends, the output closes.
        drop(tx);
        Self { rx }
    }

    /// Merges a set of mpsc receivers (the session-level case, where each
    /// input is the output channel of one connector).
    pub fn from_receivers(inputs: Vec<mpsc::Receiver<T>>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        for mut input in inputs {
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Some(item) = input.recv().await {
                    if tx.send(item).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);
        Self { rx }
    }

    /// Receives the next merged item; `None` once every input has closed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Consumes the fan-in, exposing the raw output receiver.
    pub fn into_receiver(self) -> mpsc::Receiver<T> {
        self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::time::Duration;

    #[tokio::test]
    async fn test_zero_inputs_closes_immediately() {
        let mut fanin: Fanin<u32> = Fanin::new(Vec::<stream::Iter<std::vec::IntoIter<u32>>>::new(), 8);
        assert_eq!(fanin.recv().await, None);
    }

    #[tokio::test]
    async fn test_single_input_passes_through_in_order() {
        let mut fanin = Fanin::new(vec![stream::iter(vec![1u32, 2, 3])], 8);
        assert_eq!(fanin.recv().await, Some(1));
        assert_eq!(fanin.recv().await, Some(2));
        assert_eq!(fanin.recv().await, Some(3));
        assert_eq!(fanin.recv().await, None);
    }

    #[tokio::test]
    async fn test_no_item_lost_across_inputs() {
        let a: Vec<u32> = (0..50).collect();
        let b: Vec<u32> = (50..100).collect();
        let mut fanin = Fanin::new(vec![stream::iter(a), stream::iter(b)], 4);

        let mut seen = Vec::new();
        while let Some(item) = fanin.recv().await {
            seen.push(item);
        }
        assert_eq!(seen.len(), 100);
        seen.sort_unstable();
        assert_eq!(seen, (0..100).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn test_per_input_order_preserved() {
        let a: Vec<(u8, u32)> = (0..20).map(|i| (0u8, i)).collect();
        let b: Vec<(u8, u32)> = (0..20).map(|i| (1u8, i)).collect();
        let mut fanin = Fanin::new(vec![stream::iter(a), stream::iter(b)], 2);

        let mut last = [None::<u32>, None::<u32>];
        while let Some((src, seq)) = fanin.recv().await {
            if let Some(prev) = last[src as usize] {
                assert!(seq > prev, "input {src} reordered: {seq} after {prev}");
            }
            last[src as usize] = Some(seq);
        }
        assert_eq!(last, [Some(19), Some(19)]);
    }

    #[tokio::test]
    async fn test_receivers_output_closes_after_last_input() {
        let (tx_a, rx_a) = mpsc::channel::<u32>(4);
        let (tx_b, rx_b) = mpsc::channel::<u32>(4);
        let mut fanin = Fanin::from_receivers(vec![rx_a, rx_b], 4);

        tx_a.send(1).await.unwrap();
        drop(tx_a);
        assert_eq!(fanin.recv().await, Some(1));

        // Second input still open: the output must stay open.
        tx_b.send(2).await.unwrap();
        assert_eq!(fanin.recv().await, Some(2));
        drop(tx_b);

        let end = tokio::time::timeout(Duration::from_secs(1), fanin.recv()).await;
        assert_eq!(end.expect("output did not close"), None);
    }
}
