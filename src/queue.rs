//! Bounded telegram queues between the bus engine and its users.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use snafu::ensure;

use crate::telegram::Telegram;
use crate::types::{queue_full, Error};

/// Default capacity of the inbound and outbound queues.
pub const QUEUE_CAPACITY: usize = 32;

/// A bounded MPMC queue of telegrams. Senders never block; receivers may
/// wait with a timeout.
#[derive(Debug)]
pub struct PacketQueue {
    packets: Mutex<VecDeque<Telegram>>,
    capacity: usize,
    available: Condvar,
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::bounded(QUEUE_CAPACITY)
    }
}

impl PacketQueue {
    pub fn bounded(capacity: usize) -> Self {
        Self {
            packets: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Telegram>> {
        match self.packets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue a telegram without blocking.
    pub fn try_send(&self, telegram: Telegram) -> Result<(), Error> {
        let mut packets = self.lock();
        ensure!(packets.len() < self.capacity, queue_full());
        packets.push_back(telegram);
        drop(packets);
        self.available.notify_one();
        Ok(())
    }

    /// Take the oldest telegram, if any.
    pub fn try_recv(&self) -> Option<Telegram> {
        self.lock().pop_front()
    }

    /// Take the oldest telegram, waiting up to `timeout` for one to arrive.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Telegram> {
        let packets = self.lock();
        let (mut packets, _) = match self
            .available
            .wait_timeout_while(packets, timeout, |p| p.is_empty())
        {
            Ok(result) => result,
            Err(poisoned) => poisoned.into_inner(),
        };
        packets.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod queue_tests {
    use super::PacketQueue;
    use crate::telegram::Telegram;
    use std::sync::Arc;
    use std::time::Duration;

    fn telegram(byte: u8) -> Telegram {
        Telegram::from_bytes(&[byte]).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let queue = PacketQueue::default();
        queue.try_send(telegram(0x01)).unwrap();
        queue.try_send(telegram(0x02)).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_recv().unwrap().as_bytes(), &[0x01]);
        assert_eq!(queue.try_recv().unwrap().as_bytes(), &[0x02]);
        assert_eq!(queue.try_recv(), None);
    }

    #[test]
    fn test_capacity_limit() {
        let queue = PacketQueue::bounded(2);
        queue.try_send(telegram(0x01)).unwrap();
        queue.try_send(telegram(0x02)).unwrap();
        assert!(queue.try_send(telegram(0x03)).is_err());
        let _ = queue.try_recv();
        queue.try_send(telegram(0x03)).unwrap();
    }

    #[test]
    fn test_recv_timeout_expires() {
        let queue = PacketQueue::default();
        assert_eq!(queue.recv_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_recv_timeout_wakes_on_send() {
        let queue = Arc::new(PacketQueue::default());
        let sender = Arc::clone(&queue);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            sender.try_send(telegram(0x42)).unwrap();
        });
        let received = queue.recv_timeout(Duration::from_secs(5));
        handle.join().unwrap();
        assert_eq!(received.unwrap().as_bytes(), &[0x42]);
    }
}
