//! Keyed, cancel-safe interval/timeout registries (spec §4.3).
//!
//! Timer bodies never mutate shared state directly: firing a timer sends a
//! clone of its associated event onto the owner's channel, where it is
//! processed on the single dispatch context alongside inbound datagrams
//! (spec §5). This keeps handler execution serialized regardless of how
//! many timers are in flight.
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// A keyed family of timers (e.g. `helloInterval`, keyed by peer address).
/// Re-keying an existing key cancels the prior timer before installing the
/// replacement — cancellation is idempotent.
pub struct TimerRegistry<K, E> {
    handles: HashMap<K, JoinHandle<()>>,
    sender: UnboundedSender<E>,
}

impl<K, E> TimerRegistry<K, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new(sender: UnboundedSender<E>) -> Self {
        Self {
            handles: HashMap::new(),
            sender,
        }
    }

    /// Arms a repeating timer under `key`, firing `event` every `period`
    /// until cancelled.
    pub fn set_interval(&mut self, key: K, period: Duration, event: E) {
        self.cancel(&key);

        let sender = self.sender.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick fires immediately; skip it

            loop {
                interval.tick().await;

                if sender.send(event.clone()).is_err() {
                    return;
                }
            }
        });

        self.handles.insert(key, handle);
    }

    /// Arms a one-shot timer under `key`, firing `event` once after `delay`.
    pub fn set_timeout(&mut self, key: K, delay: Duration, event: E) {
        self.cancel(&key);

        let sender = self.sender.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(event);
        });

        self.handles.insert(key, handle);
    }

    /// Cancels the timer under `key`, if any. Idempotent.
    pub fn cancel(&mut self, key: &K) -> bool {
        if let Some(handle) = self.handles.remove(key) {
            handle.abort();
            true
        } else {
            false
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.handles.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.handles.keys()
    }
}

impl<K, E> Drop for TimerRegistry<K, E> {
    fn drop(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}

/// A single, unkeyed timer — used for the singleton transactions in spec
/// §3 (`joinInterval`, `preElectionTimeout`).
pub struct SingleTimer<E> {
    handle: Option<JoinHandle<()>>,
    sender: UnboundedSender<E>,
}

impl<E> SingleTimer<E>
where
    E: Clone + Send + 'static,
{
    pub fn new(sender: UnboundedSender<E>) -> Self {
        Self { handle: None, sender }
    }

    pub fn set_interval(&mut self, period: Duration, event: E) {
        self.cancel();

        let sender = self.sender.clone();
        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;

            loop {
                interval.tick().await;

                if sender.send(event.clone()).is_err() {
                    return;
                }
            }
        }));
    }

    pub fn set_timeout(&mut self, delay: Duration, event: E) {
        self.cancel();

        let sender = self.sender.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(event);
        }));
    }

    pub fn cancel(&mut self) -> bool {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

impl<E> Drop for SingleTimer<E> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use tokio::sync::mpsc::unbounded_channel;
    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn set_timeout_fires_once_after_delay() {
        let (tx, mut rx) = unbounded_channel::<&'static str>();
        let mut registry: TimerRegistry<Ipv4Addr, &'static str> = TimerRegistry::new(tx);

        registry.set_timeout(Ipv4Addr::new(10, 0, 0, 1), Duration::from_millis(10), "fired");

        let event = timeout(Duration::from_millis(200), rx.recv()).await.unwrap();
        assert_eq!(event, Some("fired"));
    }

    #[tokio::test]
    async fn cancel_prevents_a_pending_timeout_from_firing() {
        let (tx, mut rx) = unbounded_channel::<&'static str>();
        let mut registry: TimerRegistry<Ipv4Addr, &'static str> = TimerRegistry::new(tx);

        let key = Ipv4Addr::new(10, 0, 0, 1);
        registry.set_timeout(key, Duration::from_millis(50), "fired");
        registry.cancel(&key);

        let result = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_err(), "no event should have arrived");
    }

    #[tokio::test]
    async fn rekeying_cancels_the_prior_timer() {
        let (tx, mut rx) = unbounded_channel::<u32>();
        let mut registry: TimerRegistry<Ipv4Addr, u32> = TimerRegistry::new(tx);

        let key = Ipv4Addr::new(10, 0, 0, 1);
        registry.set_timeout(key, Duration::from_millis(20), 1);
        registry.set_timeout(key, Duration::from_millis(20), 2);

        let event = timeout(Duration::from_millis(200), rx.recv()).await.unwrap();
        assert_eq!(event, Some(2));

        let second = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(second.is_err(), "the cancelled first timer must not also fire");
    }

    #[tokio::test]
    async fn set_interval_fires_repeatedly_until_cancelled() {
        let (tx, mut rx) = unbounded_channel::<&'static str>();
        let mut registry: TimerRegistry<Ipv4Addr, &'static str> = TimerRegistry::new(tx);

        let key = Ipv4Addr::new(10, 0, 0, 1);
        registry.set_interval(key, Duration::from_millis(10), "tick");

        for _ in 0..3 {
            let event = timeout(Duration::from_millis(200), rx.recv()).await.unwrap();
            assert_eq!(event, Some("tick"));
        }

        registry.cancel(&key);
    }

    #[tokio::test]
    async fn cancel_all_stops_every_timer() {
        let (tx, mut rx) = unbounded_channel::<u32>();
        let mut registry: TimerRegistry<Ipv4Addr, u32> = TimerRegistry::new(tx);

        registry.set_interval(Ipv4Addr::new(10, 0, 0, 1), Duration::from_millis(10), 1);
        registry.set_interval(Ipv4Addr::new(10, 0, 0, 2), Duration::from_millis(10), 2);

        registry.cancel_all();
        assert!(registry.is_empty());

        let result = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn single_timer_rekeying_cancels_prior() {
        let (tx, mut rx) = unbounded_channel::<u32>();
        let mut timer: SingleTimer<u32> = SingleTimer::new(tx);

        timer.set_timeout(Duration::from_millis(50), 1);
        timer.set_timeout(Duration::from_millis(10), 2);

        let event = timeout(Duration::from_millis(200), rx.recv()).await.unwrap();
        assert_eq!(event, Some(2));
    }
}
