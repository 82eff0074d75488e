//! Single-shot debouncing per key
//!
//! Every edit re-arms the key; only the latest arming survives its delay.
//! Nothing is spawned or queued: the caller awaits [`Debouncer::settle`] and
//! simply stops when it returns `false`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

/// Proof of one arming of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket<K> {
    key: K,
    generation: u64,
}

impl<K: Copy> Ticket<K> {
    pub fn key(&self) -> K {
        self.key
    }
}

#[derive(Debug)]
pub struct Debouncer<K> {
    delay: Duration,
    generations: RefCell<HashMap<K, u64>>,
}

impl<K: Copy + Eq + Hash> Debouncer<K> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generations: RefCell::new(HashMap::new()),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Restart the timer for `key`, superseding earlier tickets
    pub fn arm(&self, key: K) -> Ticket<K> {
        let mut generations = self.generations.borrow_mut();
        let generation = generations.entry(key).or_insert(0);
        *generation += 1;
        Ticket {
            key,
            generation: *generation,
        }
    }

    /// Supersede any pending ticket for `key` without arming a new one
    pub fn cancel(&self, key: K) {
        self.arm(key);
    }

    pub fn is_current(&self, ticket: &Ticket<K>) -> bool {
        self.generations.borrow().get(&ticket.key) == Some(&ticket.generation)
    }

    /// Wait out the delay; `true` if no newer arming happened meanwhile
    pub async fn settle(&self, ticket: Ticket<K>) -> bool {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.is_current(&ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_latest_arming_wins() {
        let debouncer = Debouncer::new(Duration::from_millis(800));
        let first = debouncer.arm("rfc");
        let second = debouncer.arm("rfc");

        let (a, b) = tokio::join!(debouncer.settle(first), debouncer.settle(second));
        assert!(!a);
        assert!(b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let rfc = debouncer.arm("rfc");
        let curp = debouncer.arm("curp");
        assert!(debouncer.settle(rfc).await);
        assert!(debouncer.settle(curp).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_supersedes() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let ticket = debouncer.arm("nss");
        debouncer.cancel("nss");
        assert!(!debouncer.settle(ticket).await);
    }
}
