use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A packet handler: takes the decoded packet by reference, does whatever it
/// wants (update state, log, forward). Generic over the packet type so this
/// crate never needs to depend on the protocol crates.
pub type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Dispatch table from packet-type name to the handlers registered for it.
///
/// Handlers for a packet type run in registration order. `register` with
/// `append = false` replaces any handlers already registered for that packet
/// type (the common case: one handler owns one packet type); `append = true`
/// adds alongside them, for cases like logging middleware that wants to see
/// every packet without taking over its handling.
pub struct HandlerRegistry<P> {
    handlers: RwLock<HashMap<String, Vec<Handler<P>>>>,
}

impl<P> HandlerRegistry<P> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, packet_type: &str, handler: Handler<P>, append: bool) {
        let mut map = self.handlers.write().expect("handler registry poisoned");
        let list = map.entry(packet_type.to_string()).or_default();
        if !append {
            list.clear();
        }
        list.push(handler);
    }

    /// Remove all handlers registered for a packet type.
    pub fn clear(&self, packet_type: &str) {
        self.handlers
            .write()
            .expect("handler registry poisoned")
            .remove(packet_type);
    }

    /// Run every handler registered for `packet_type` against `packet`, in
    /// registration order. Handlers that panic are not caught — a bad
    /// handler should fail loudly rather than silently drop packets.
    pub fn dispatch(&self, packet_type: &str, packet: &P) {
        let map = self.handlers.read().expect("handler registry poisoned");
        if let Some(list) = map.get(packet_type) {
            for handler in list {
                handler(packet);
            }
        }
    }

    pub fn handler_count(&self, packet_type: &str) -> usize {
        self.handlers
            .read()
            .expect("handler registry poisoned")
            .get(packet_type)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

impl<P> Default for HandlerRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_replace_by_default() {
        let registry: HandlerRegistry<i32> = HandlerRegistry::new();
        let calls = Arc::new(AtomicU32::new(0));
        let c1 = calls.clone();
        registry.register("keep_alive", Arc::new(move |_: &i32| { c1.fetch_add(1, Ordering::SeqCst); }), false);
        let c2 = calls.clone();
        registry.register("keep_alive", Arc::new(move |_: &i32| { c2.fetch_add(10, Ordering::SeqCst); }), false);

        registry.dispatch("keep_alive", &5);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_append_runs_both() {
        let registry: HandlerRegistry<i32> = HandlerRegistry::new();
        let calls = Arc::new(AtomicU32::new(0));
        let c1 = calls.clone();
        registry.register("chunk_data", Arc::new(move |_: &i32| { c1.fetch_add(1, Ordering::SeqCst); }), false);
        let c2 = calls.clone();
        registry.register("chunk_data", Arc::new(move |_: &i32| { c2.fetch_add(1, Ordering::SeqCst); }), true);

        registry.dispatch("chunk_data", &5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dispatch_unknown_type_is_noop() {
        let registry: HandlerRegistry<i32> = HandlerRegistry::new();
        registry.dispatch("nonexistent", &5);
    }
}
