use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::event::{EditorEvent, EventHandler};

/// Handle returned by [`EventBus::subscribe`], needed to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// A typed event bus for broadcasting editor events to registered handlers.
///
/// Events emitted from inside a handler are queued and delivered after the current
/// event has reached every handler, so delivery order always matches emission order.
pub struct EventBus {
    handlers: RefCell<Vec<(Subscription, Box<dyn EventHandler>)>>,
    next_id: Cell<u64>,
    queue: RefCell<VecDeque<EditorEvent>>,
    dispatching: Cell<bool>,
    removed: RefCell<Vec<Subscription>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &format!("<{} handlers>", self.handler_count()))
            .field("queued", &self.queue.borrow().len())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a new event bus
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            queue: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
            removed: RefCell::new(Vec::new()),
        }
    }

    /// Subscribe a handler to receive events
    pub fn subscribe(&self, handler: impl EventHandler + 'static) -> Subscription {
        let id = Subscription(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Returns false if the handle was unknown.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != subscription);
        let found = handlers.len() != before;
        if self.dispatching.get() {
            // The handler may be in the set currently being dispatched to
            self.removed.borrow_mut().push(subscription);
            return true;
        }
        found
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Emit an event to all registered handlers
    pub fn emit(&self, event: EditorEvent) {
        self.queue.borrow_mut().push_back(event);
        if self.dispatching.get() {
            return;
        }

        self.dispatching.set(true);
        loop {
            let Some(event) = self.queue.borrow_mut().pop_front() else {
                break;
            };

            let mut active = std::mem::take(&mut *self.handlers.borrow_mut());
            for (id, handler) in active.iter_mut() {
                if self.removed.borrow().contains(id) {
                    continue;
                }
                handler.handle_event(&event);
            }

            // Handlers subscribed during dispatch landed in the (now empty) live list
            let added = std::mem::take(&mut *self.handlers.borrow_mut());
            active.extend(added);
            let mut removed = self.removed.borrow_mut();
            active.retain(|(id, _)| !removed.contains(id));
            removed.clear();
            drop(removed);
            *self.handlers.borrow_mut() = active;
        }
        self.dispatching.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn page_event(page: usize) -> EditorEvent {
        EditorEvent::PageChanged { page }
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let sub = bus.subscribe(move |event: &EditorEvent| sink.borrow_mut().push(event.clone()));

        bus.emit(page_event(2));
        assert!(bus.unsubscribe(sub));
        bus.emit(page_event(3));

        assert_eq!(*seen.borrow(), vec![page_event(2)]);
        assert!(!bus.unsubscribe(sub));
    }

    #[test]
    fn test_nested_emit_is_delivered_in_order() {
        let bus = Rc::new(EventBus::new());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let inner_bus = Rc::downgrade(&bus);
        bus.subscribe(move |event: &EditorEvent| {
            if let EditorEvent::PageChanged { page: 1 } = event {
                if let Some(bus) = inner_bus.upgrade() {
                    bus.emit(page_event(2));
                }
            }
        });
        let sink = Rc::clone(&seen);
        bus.subscribe(move |event: &EditorEvent| sink.borrow_mut().push(event.clone()));

        bus.emit(page_event(1));
        assert_eq!(*seen.borrow(), vec![page_event(1), page_event(2)]);
    }

    #[test]
    fn test_unsubscribe_from_inside_handler() {
        let bus = Rc::new(EventBus::new());
        let count = Rc::new(Cell::new(0));
        let own_id: Rc<Cell<Option<Subscription>>> = Rc::new(Cell::new(None));

        let weak = Rc::downgrade(&bus);
        let counter = Rc::clone(&count);
        let id_slot = Rc::clone(&own_id);
        let sub = bus.subscribe(move |_: &EditorEvent| {
            counter.set(counter.get() + 1);
            if let (Some(bus), Some(id)) = (weak.upgrade(), id_slot.get()) {
                bus.unsubscribe(id);
            }
        });
        own_id.set(Some(sub));

        bus.emit(page_event(1));
        bus.emit(page_event(2));
        assert_eq!(count.get(), 1);
        assert_eq!(bus.handler_count(), 0);
    }
}
