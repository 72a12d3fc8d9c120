/*
 *  events.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Event queue and listener registry
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::collections::{BTreeMap, VecDeque};

use log::{debug, info, warn};

use crate::config::EventSettings;
use crate::types::{AssetId, ManagerType};

/// Default bounded queue capacity when the config does not override it.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Stop the main loop at the end of the current frame
    Quit,
    /// An asset finished its loading pass
    AssetLoaded(AssetId),
    /// Application-defined payload
    Custom(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Listener id of the poster, zero for the host itself
    pub source: u32,
}

pub type EventListener = Box<dyn FnMut(&Event)>;

/// Bounded event queue with a listener registry. Always the first manager
/// the Driver brings up: everything initialized after it may post events.
pub struct EventManager {
    capacity: usize,
    queue: VecDeque<Event>,
    listeners: BTreeMap<u32, EventListener>,
}

impl EventManager {
    pub fn new() -> Self {
        EventManager {
            capacity: DEFAULT_QUEUE_CAPACITY,
            queue: VecDeque::new(),
            listeners: BTreeMap::new(),
        }
    }

    pub fn initialize(&mut self, settings: Option<&EventSettings>) {
        if let Some(cap) = settings.and_then(|s| s.queue_capacity) {
            self.capacity = cap;
        }
        info!(
            "{} initialized (queue capacity {})",
            ManagerType::EventManager,
            self.capacity
        );
    }

    /// Register a listener under a caller-supplied unique id (drawn from
    /// the Driver's UidGenerator). Returns false on a duplicate id.
    pub fn add_listener(&mut self, id: u32, listener: EventListener) -> bool {
        if self.listeners.contains_key(&id) {
            warn!("listener id {id} already registered");
            return false;
        }
        self.listeners.insert(id, listener);
        true
    }

    pub fn remove_listener(&mut self, id: u32) -> bool {
        if self.listeners.remove(&id).is_none() {
            warn!("listener id {id} not registered");
            return false;
        }
        true
    }

    /// Post an event. Rejected (false) when the queue is at capacity; the
    /// poster decides whether that is fatal.
    pub fn queue_event(&mut self, event: Event) -> bool {
        if self.queue.len() >= self.capacity {
            warn!("event queue full ({}); event dropped", self.capacity);
            return false;
        }
        self.queue.push_back(event);
        true
    }

    /// Drain the queue through every listener, in listener-id order.
    /// Returns true if a Quit event was seen.
    pub fn pump(&mut self) -> bool {
        let mut quit = false;
        while let Some(event) = self.queue.pop_front() {
            if event.kind == EventKind::Quit {
                quit = true;
            }
            for listener in self.listeners.values_mut() {
                listener(&event);
            }
        }
        quit
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn cleanup(&mut self) {
        debug!(
            "{} cleanup: {} pending events, {} listeners dropped",
            ManagerType::EventManager,
            self.queue.len(),
            self.listeners.len()
        );
        self.queue.clear();
        self.listeners.clear();
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn host_event(kind: EventKind) -> Event {
        Event { kind, source: 0 }
    }

    #[test]
    fn test_queue_bounded() {
        let mut em = EventManager::new();
        em.initialize(Some(&EventSettings {
            queue_capacity: Some(2),
        }));
        assert!(em.queue_event(host_event(EventKind::Custom(1))));
        assert!(em.queue_event(host_event(EventKind::Custom(2))));
        assert!(!em.queue_event(host_event(EventKind::Custom(3))));
        assert_eq!(em.pending(), 2);
    }

    #[test]
    fn test_pump_reaches_listeners_and_reports_quit() {
        let mut em = EventManager::new();
        em.initialize(None);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        assert!(em.add_listener(1, Box::new(move |e| sink.borrow_mut().push(e.kind))));

        em.queue_event(host_event(EventKind::Custom(9)));
        em.queue_event(host_event(EventKind::Quit));
        assert!(em.pump());
        assert_eq!(*seen.borrow(), vec![EventKind::Custom(9), EventKind::Quit]);
        assert_eq!(em.pending(), 0);
    }

    #[test]
    fn test_duplicate_listener_rejected() {
        let mut em = EventManager::new();
        assert!(em.add_listener(5, Box::new(|_| {})));
        assert!(!em.add_listener(5, Box::new(|_| {})));
    }

    #[test]
    fn test_remove_listener() {
        let mut em = EventManager::new();
        assert!(em.add_listener(5, Box::new(|_| {})));
        assert!(em.remove_listener(5));
        assert!(!em.remove_listener(5));
    }
}
