//! Single-slot "latest wins" handoff between the audio thread and the
//! detector.
//!
//! Built on a capacity-one `crossbeam-channel`.  The producer keeps a clone of
//! the receiving end so it can evict a value the consumer has not picked up
//! yet; publishing therefore never blocks and never queues.  The consumer
//! reads-and-clears with [`MailboxReceiver::take`].
//!
//! Values also travel backwards: evicted values and values the consumer
//! hands to [`MailboxReceiver::recycle`] land in a bounded spare pool that the
//! producer draws from with [`MailboxSender::acquire`].  [`window_mailbox`]
//! seeds that pool with sample buffers so the audio thread only ever copies
//! into memory that already exists.
//!
//! ```rust
//! use vowel_detect::audio::mailbox;
//!
//! let (tx, rx) = mailbox::<u32>();
//! tx.publish(1);
//! tx.publish(2); // overwrites 1
//! assert_eq!(rx.take(), Some(2));
//! assert_eq!(rx.take(), None);
//! ```

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Buffers circulating per window mailbox: one in the slot, one held by the
/// consumer, one spare for the producer.
pub const WINDOW_BUFFERS: usize = 3;

/// Create a connected sender/receiver pair sharing one slot and an empty
/// spare pool.
pub fn mailbox<T>() -> (MailboxSender<T>, MailboxReceiver<T>) {
    mailbox_with_spares(Vec::new())
}

/// Like [`mailbox`], with `spares` pre-loaded into the spare pool.
pub fn mailbox_with_spares<T>(spares: Vec<T>) -> (MailboxSender<T>, MailboxReceiver<T>) {
    let (tx, rx) = bounded(1);
    let (spare_tx, spare_rx) = bounded(spares.len().max(1));
    for spare in spares {
        let _ = spare_tx.try_send(spare);
    }
    (
        MailboxSender {
            tx,
            evict: rx.clone(),
            spare_tx: spare_tx.clone(),
            spare_rx,
        },
        MailboxReceiver { rx, spare_tx },
    )
}

/// Mailbox for `len`-sample windows with [`WINDOW_BUFFERS`] pre-allocated
/// buffers.
pub fn window_mailbox(len: usize) -> (MailboxSender<Vec<f32>>, MailboxReceiver<Vec<f32>>) {
    mailbox_with_spares((0..WINDOW_BUFFERS).map(|_| vec![0.0; len]).collect())
}

/// Producer half.  Lives on the audio thread.
pub struct MailboxSender<T> {
    tx: Sender<T>,
    evict: Receiver<T>,
    spare_tx: Sender<T>,
    spare_rx: Receiver<T>,
}

impl<T> MailboxSender<T> {
    /// Put `value` in the slot, replacing any unread value.  A replaced
    /// value goes back to the spare pool.
    ///
    /// Returns `true` if an unread value was overwritten.
    pub fn publish(&self, value: T) -> bool {
        let mut value = value;
        let mut replaced = false;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return replaced,
                Err(TrySendError::Full(v)) => {
                    // Only this sender ever fills the slot, so after one
                    // eviction the next try_send succeeds.
                    if let Ok(stale) = self.evict.try_recv() {
                        replaced = true;
                        let _ = self.spare_tx.try_send(stale);
                    }
                    value = v;
                }
                Err(TrySendError::Disconnected(_)) => return replaced,
            }
        }
    }

    /// Take a spare value to fill and publish, if one is free.
    pub fn acquire(&self) -> Option<T> {
        self.spare_rx.try_recv().ok()
    }
}

/// Consumer half.  Lives on the detector's polling thread.
pub struct MailboxReceiver<T> {
    rx: Receiver<T>,
    spare_tx: Sender<T>,
}

impl<T> MailboxReceiver<T> {
    /// Take the pending value, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Hand a value back to the producer's spare pool.  Dropped when the
    /// pool is already full.
    pub fn recycle(&self, value: T) {
        let _ = self.spare_tx.try_send(value);
    }

    /// Move any pending value back to the spare pool.
    pub fn clear(&self) {
        if let Ok(value) = self.rx.try_recv() {
            self.recycle(value);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn empty_mailbox_yields_none() {
        let (tx, rx) = mailbox::<Vec<f32>>();
        assert!(rx.take().is_none());
        assert!(tx.acquire().is_none());
    }

    #[test]
    fn publish_reports_overwrite() {
        let (tx, rx) = mailbox();
        assert!(!tx.publish(1));
        assert!(tx.publish(2));
        assert_eq!(rx.take(), Some(2));
        assert!(!tx.publish(3));
    }

    #[test]
    fn take_clears_the_slot() {
        let (tx, rx) = mailbox();
        tx.publish("window");
        assert_eq!(rx.take(), Some("window"));
        assert_eq!(rx.take(), None);
    }

    #[test]
    fn clear_returns_pending_value_to_the_pool() {
        let (tx, rx) = mailbox();
        tx.publish(7);
        rx.clear();
        assert_eq!(rx.take(), None);
        assert_eq!(tx.acquire(), Some(7));
    }

    #[test]
    fn evicted_value_becomes_a_spare() {
        let (tx, rx) = mailbox();
        tx.publish(1);
        tx.publish(2);
        assert_eq!(tx.acquire(), Some(1));
        assert_eq!(rx.take(), Some(2));
    }

    #[test]
    fn window_buffers_circulate_without_new_allocations() {
        let (tx, rx) = window_mailbox(8);
        let mut seen = Vec::new();

        for round in 0..10 {
            let mut buf = tx.acquire().expect("a spare buffer is always free");
            assert_eq!(buf.len(), 8);
            buf[0] = round as f32;
            seen.push(buf.as_ptr() as usize);
            tx.publish(buf);

            let window = rx.take().unwrap();
            assert_eq!(window[0], round as f32);
            rx.recycle(window);
        }

        seen.sort_unstable();
        seen.dedup();
        assert!(seen.len() <= WINDOW_BUFFERS);
    }

    #[test]
    fn pool_never_grows_past_its_buffers() {
        let (tx, rx) = window_mailbox(4);
        let bufs: Vec<_> = std::iter::from_fn(|| tx.acquire()).collect();
        assert_eq!(bufs.len(), WINDOW_BUFFERS);
        // One lands in the slot, the others are evicted back as spares.
        for b in bufs {
            tx.publish(b);
        }
        rx.recycle(vec![0.0; 4]);
        rx.recycle(vec![0.0; 4]); // pool full: dropped
        let spares = std::iter::from_fn(|| tx.acquire()).count();
        assert_eq!(spares, WINDOW_BUFFERS);
        assert!(rx.take().is_some());
    }

    #[test]
    fn publish_after_receiver_dropped_does_not_block() {
        let (tx, rx) = mailbox();
        drop(rx);
        // The sender still holds an evicting receiver, so the slot stays
        // usable and publishing simply overwrites.
        tx.publish(1);
        tx.publish(2);
    }

    #[test]
    fn consumer_on_other_thread_sees_latest() {
        let (tx, rx) = mailbox();
        let producer = thread::spawn(move || {
            for i in 0..1_000u32 {
                tx.publish(i);
            }
        });
        producer.join().unwrap();
        assert_eq!(rx.take(), Some(999));
    }
}
