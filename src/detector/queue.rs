use std::collections::VecDeque;

use super::types::AlertRecord;

/// FIFO of alerts awaiting delivery.
///
/// At most `batch_size` alerts leave per call to [`PendingQueue::next_batch`]; the rest wait for
/// later calls in their original order. Past `capacity` undelivered alerts the oldest are
/// dropped, so sustained overload loses alerts instead of growing without bound.
#[derive(Debug)]
pub struct PendingQueue {
    entries: VecDeque<AlertRecord>,
    batch_size: usize,
    capacity: usize,
}

impl PendingQueue {
    pub fn new(batch_size: usize, capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            batch_size,
            capacity: capacity.max(batch_size),
        }
    }

    /// Append alerts at the back. Returns how many of the oldest entries were dropped to stay
    /// within capacity.
    pub fn extend(&mut self, alerts: impl IntoIterator<Item = AlertRecord>) -> usize {
        self.entries.extend(alerts);

        let excess = self.entries.len().saturating_sub(self.capacity);
        self.entries.drain(..excess);
        excess
    }

    /// Put a batch that could not be delivered back at the front, in its original order.
    /// Returns how many of the oldest entries were dropped to stay within capacity.
    pub fn requeue(&mut self, batch: Vec<AlertRecord>) -> usize {
        for alert in batch.into_iter().rev() {
            self.entries.push_front(alert);
        }

        let excess = self.entries.len().saturating_sub(self.capacity);
        self.entries.drain(..excess);
        excess
    }

    /// Remove and return up to `batch_size` of the oldest alerts.
    pub fn next_batch(&mut self) -> Vec<AlertRecord> {
        let take = self.entries.len().min(self.batch_size);
        self.entries.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::types::AlertCategory;

    fn alert(n: u64) -> AlertRecord {
        AlertRecord {
            category: AlertCategory::Generic,
            from_address: "0xfrom".to_string(),
            to_address: "0xto".to_string(),
            transaction_hash: format!("0x{:x}", n),
            block_number: n,
            involved_addresses: Default::default(),
            anomaly_score: "0".to_string(),
        }
    }

    #[test]
    fn test_batches_are_fifo_across_calls() {
        let mut queue = PendingQueue::new(10, 100);
        assert_eq!(queue.extend((0..25).map(alert)), 0);

        let first = queue.next_batch();
        let second = queue.next_batch();
        let third = queue.next_batch();

        assert_eq!(first.len(), 10);
        assert_eq!(second.len(), 10);
        assert_eq!(third.len(), 5);
        assert!(queue.is_empty());

        let order: Vec<u64> = first
            .iter()
            .chain(&second)
            .chain(&third)
            .map(|a| a.block_number)
            .collect();
        assert_eq!(order, (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut queue = PendingQueue::new(10, 20);
        queue.extend((0..15).map(alert));
        let dropped = queue.extend((15..30).map(alert));

        assert_eq!(dropped, 10);
        assert_eq!(queue.len(), 20);
        assert_eq!(queue.next_batch()[0].block_number, 10);
    }

    #[test]
    fn test_requeued_batch_goes_out_first() {
        let mut queue = PendingQueue::new(3, 100);
        queue.extend((0..5).map(alert));

        let batch = queue.next_batch();
        queue.extend((5..7).map(alert));
        assert_eq!(queue.requeue(batch), 0);

        let order: Vec<u64> = std::iter::from_fn(|| Some(queue.next_batch()))
            .take_while(|b| !b.is_empty())
            .flatten()
            .map(|a| a.block_number)
            .collect();
        assert_eq!(order, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_capacity_never_below_batch() {
        let mut queue = PendingQueue::new(10, 3);
        assert_eq!(queue.extend((0..10).map(alert)), 0);
        assert_eq!(queue.next_batch().len(), 10);
    }
}
