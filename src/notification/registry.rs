//! The set of sinks a logger fans notifications out to.

use crate::lifecycle::Lifecycle;
use crate::notification::{NotificationSink, SendError};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type SinkMap = HashMap<String, Arc<dyn NotificationSink>>;

/// Name-to-sink mapping with copy-on-write updates.
///
/// Readers take a lock-free snapshot, so registration may race with fan-out
/// traffic without either side observing a half-updated map.
pub struct SinkRegistry {
    sinks: ArcSwap<SinkMap>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self {
            sinks: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Inserts a sink, replacing and returning any sink registered under `name`.
    pub fn register(
        &self,
        name: impl Into<String>,
        sink: Arc<dyn NotificationSink>,
    ) -> Option<Arc<dyn NotificationSink>> {
        let name = name.into();
        let mut previous = None;
        self.sinks.rcu(|current| {
            let mut next = SinkMap::clone(current);
            previous = next.insert(name.clone(), sink.clone());
            next
        });
        debug!(sink = %name, replaced = previous.is_some(), "Registered notification sink");
        previous
    }

    /// Removes and returns the sink registered under `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn NotificationSink>> {
        let mut removed = None;
        self.sinks.rcu(|current| {
            let mut next = SinkMap::clone(current);
            removed = next.remove(name);
            next
        });
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn NotificationSink>> {
        self.sinks.load().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.sinks.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.load().is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sinks.load().keys().cloned().collect();
        names.sort();
        names
    }

    /// Spawns one tracked delivery task per registered sink and returns how
    /// many were spawned. Never waits for delivery.
    ///
    /// `on_failure` runs inside the failing task with the sink's registered
    /// name. Deliveries are independent: one failing sink does not affect the
    /// others.
    pub fn fan_out<F>(&self, lifecycle: &Lifecycle, payload: Arc<str>, on_failure: F) -> usize
    where
        F: Fn(&str, &SendError) + Clone + Send + 'static,
    {
        let sinks = self.sinks.load_full();
        if sinks.is_empty() {
            return 0;
        }

        for (name, sink) in sinks.iter() {
            let name = name.clone();
            let sink = sink.clone();
            let payload = payload.clone();
            let on_failure = on_failure.clone();
            lifecycle.spawn(&format!("notify:{}", name), async move {
                match sink.send(&payload).await {
                    Ok(()) => {
                        metrics::counter!("herald_notifications_sent_total", "sink" => name.clone())
                            .increment(1);
                    }
                    Err(e) => {
                        metrics::counter!("herald_notifications_failed_total", "sink" => name.clone())
                            .increment(1);
                        on_failure(&name, &e);
                    }
                }
            });
        }
        sinks.len()
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("sinks", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingSink, RecordingSink};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_register_overwrites_by_name() {
        let registry = SinkRegistry::new();
        assert!(registry.is_empty());

        let first = Arc::new(RecordingSink::new("first"));
        let second = Arc::new(RecordingSink::new("second"));
        assert!(registry.register("ops", first).is_none());
        let replaced = registry.register("ops", second).expect("previous sink");

        assert_eq!(replaced.name(), "first");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("ops").unwrap().name(), "second");
    }

    #[test]
    fn test_remove_and_names() {
        let registry = SinkRegistry::new();
        registry.register("b", Arc::new(RecordingSink::new("b")));
        registry.register("a", Arc::new(RecordingSink::new("a")));
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);

        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert_eq!(registry.names(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_fan_out_without_sinks_spawns_nothing() {
        let lifecycle = Lifecycle::new();
        let registry = SinkRegistry::new();

        let spawned = registry.fan_out(&lifecycle, Arc::from("msg"), |_, _| {});
        assert_eq!(spawned, 0);
        assert_eq!(lifecycle.pending(), 0);
    }

    #[tokio::test]
    async fn test_fan_out_reports_failures_by_name() {
        let lifecycle = Lifecycle::new();
        let registry = SinkRegistry::new();
        let good = Arc::new(RecordingSink::new("good"));
        registry.register("good", good.clone());
        registry.register("bad", Arc::new(FailingSink::new("bad")));

        let failures = Arc::new(Mutex::new(Vec::new()));
        let recorded = failures.clone();
        let spawned = registry.fan_out(&lifecycle, Arc::from("payload"), move |name, _| {
            recorded.lock().unwrap().push(name.to_string());
        });
        assert_eq!(spawned, 2);

        timeout(Duration::from_secs(1), lifecycle.wait())
            .await
            .expect("deliveries did not finish");
        assert_eq!(*failures.lock().unwrap(), vec!["bad".to_string()]);
        assert_eq!(good.messages(), vec!["payload".to_string()]);
    }
}
