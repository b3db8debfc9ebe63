//! Handler delivery and listener lifecycle shared by every subscription.
//!
//! `Delivery` owns the application handler and a closed flag. Once `close()`
//! returns, the handler is never invoked again, even if the store still has
//! pushes in flight. A handler may close its own subscription while it runs.
//!
//! `ListenerSlot` tracks the store registration of a subscription so that
//! activating twice never registers a second listener and releasing twice is
//! harmless.

use dash_core::Result;
use dash_storage::ListenerRegistration;
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

/// Boxed update handler.
pub(crate) type UpdateHandler<U> = Box<dyn FnMut(Result<U>) + Send + 'static>;

struct HandlerCell<U> {
    handler: Option<UpdateHandler<U>>,
    running: bool,
    pending: VecDeque<Result<U>>,
}

pub(crate) struct Delivery<U> {
    closed: AtomicBool,
    cell: ReentrantMutex<RefCell<HandlerCell<U>>>,
}

impl<U> Delivery<U> {
    pub(crate) fn new(handler: UpdateHandler<U>) -> Self {
        Self {
            closed: AtomicBool::new(false),
            cell: ReentrantMutex::new(RefCell::new(HandlerCell {
                handler: Some(handler),
                running: false,
                pending: VecDeque::new(),
            })),
        }
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Invokes the handler unless the delivery is closed. Returns true if the
    /// update was handed to the handler.
    ///
    /// An update delivered from inside the handler is queued and handed over
    /// once the outer invocation returns.
    pub(crate) fn deliver(&self, update: Result<U>) -> bool {
        let guard = self.cell.lock();
        if self.is_closed() {
            return false;
        }
        let mut handler = {
            let mut cell = guard.borrow_mut();
            if cell.running {
                trace!(queued = cell.pending.len() + 1, "queueing nested delivery");
                cell.pending.push_back(update);
                return true;
            }
            let Some(handler) = cell.handler.take() else {
                return false;
            };
            cell.running = true;
            handler
        };

        handler(update);
        while !self.is_closed() {
            // Bind first so the borrow ends before the handler runs again.
            let next = guard.borrow_mut().pending.pop_front();
            match next {
                Some(update) => handler(update),
                None => break,
            }
        }

        let mut cell = guard.borrow_mut();
        cell.running = false;
        if self.is_closed() {
            // The handler closed us.
            cell.pending.clear();
        } else {
            cell.handler = Some(handler);
        }
        true
    }

    /// Closes the delivery and drops the handler. Blocks while another
    /// thread is inside the handler. Returns false if already closed.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let guard = self.cell.lock();
        let mut cell = guard.borrow_mut();
        // While running, the handler is owned by `deliver`, which drops it.
        cell.handler.take();
        cell.pending.clear();
        true
    }
}

impl<U> fmt::Debug for Delivery<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery").field("closed", &self.is_closed()).finish()
    }
}

enum ListenerState {
    Inactive,
    /// The store is registering the listener. A store may deliver the first
    /// snapshot before registration returns.
    Activating,
    Active(Box<dyn ListenerRegistration>),
    Released,
}

pub(crate) struct ListenerSlot {
    state: Mutex<ListenerState>,
}

impl ListenerSlot {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ListenerState::Inactive),
        }
    }

    /// Registers a listener through `register` if the slot is still inactive.
    /// Returns true if the slot holds the new listener.
    ///
    /// `register` runs without the slot locked, so the listener may call
    /// `is_active()` or `release()` while it is being registered. A release
    /// during registration removes the new listener before this returns.
    pub(crate) fn activate<F>(&self, register: F) -> bool
    where
        F: FnOnce() -> Box<dyn ListenerRegistration>,
    {
        {
            let mut state = self.state.lock();
            if !matches!(*state, ListenerState::Inactive) {
                return false;
            }
            *state = ListenerState::Activating;
        }

        let registration = register();

        let mut state = self.state.lock();
        if matches!(*state, ListenerState::Activating) {
            *state = ListenerState::Active(registration);
            return true;
        }
        drop(state);
        trace!("released during registration");
        registration.remove();
        false
    }

    /// Removes the listener, if any. The slot can not be activated again.
    /// Returns true if a listener was removed.
    pub(crate) fn release(&self) -> bool {
        let previous = mem::replace(&mut *self.state.lock(), ListenerState::Released);
        match previous {
            ListenerState::Active(registration) => {
                registration.remove();
                true
            }
            ListenerState::Inactive | ListenerState::Activating | ListenerState::Released => false,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        matches!(*self.state.lock(), ListenerState::Activating | ListenerState::Active(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_core::StoreError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct CountingRegistration {
        removed: Arc<AtomicUsize>,
    }

    impl ListenerRegistration for CountingRegistration {
        fn remove(&self) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_delivery_invokes_until_closed() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let delivery: Delivery<u32> = Delivery::new(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(delivery.deliver(Ok(1)));
        assert!(delivery.close());
        assert!(!delivery.deliver(Ok(2)));
        assert!(!delivery.close());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delivery_handler_closes_itself() {
        let delivery: Arc<Delivery<u32>> = Arc::new_cyclic(|weak: &std::sync::Weak<Delivery<u32>>| {
            let weak = weak.clone();
            Delivery::new(Box::new(move |_| {
                if let Some(delivery) = weak.upgrade() {
                    delivery.close();
                }
            }))
        });

        assert!(delivery.deliver(Ok(1)));
        assert!(delivery.is_closed());
        assert!(!delivery.deliver(Ok(2)));
    }

    #[test]
    fn test_listener_slot_activates_once() {
        let removed = Arc::new(AtomicUsize::new(0));
        let slot = ListenerSlot::new();
        let registrations = AtomicUsize::new(0);

        for _ in 0..3 {
            slot.activate(|| {
                registrations.fetch_add(1, Ordering::SeqCst);
                Box::new(CountingRegistration {
                    removed: Arc::clone(&removed),
                })
            });
        }
        assert_eq!(registrations.load(Ordering::SeqCst), 1);
        assert!(slot.is_active());

        assert!(slot.release());
        assert!(!slot.release());
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_slot_activate_after_release() {
        let slot = ListenerSlot::new();
        assert!(!slot.release());
        let registered = slot.activate(|| {
            Box::new(CountingRegistration {
                removed: Arc::new(AtomicUsize::new(0)),
            })
        });
        assert!(!registered);
        assert!(!slot.is_active());
    }

    #[test]
    fn test_delivery_queues_nested_updates() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let delivery: Arc<Delivery<u32>> = Arc::new_cyclic(|weak: &std::sync::Weak<Delivery<u32>>| {
            let weak = weak.clone();
            Delivery::new(Box::new(move |update: Result<u32>| {
                log.lock().push(update.clone());
                if let (Ok(1), Some(delivery)) = (update, weak.upgrade()) {
                    assert!(delivery.deliver(Ok(2)));
                    assert!(delivery.deliver(Err(StoreError::unavailable("offline"))));
                }
            }))
        });

        assert!(delivery.deliver(Ok(1)));
        assert_eq!(
            *seen.lock(),
            vec![Ok(1), Ok(2), Err(StoreError::unavailable("offline"))]
        );
        assert!(delivery.deliver(Ok(3)));
        assert_eq!(seen.lock().len(), 4);
    }

    #[test]
    fn test_delivery_close_discards_queued_updates() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let delivery: Arc<Delivery<u32>> = Arc::new_cyclic(|weak: &std::sync::Weak<Delivery<u32>>| {
            let weak = weak.clone();
            Delivery::new(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(delivery) = weak.upgrade() {
                    delivery.deliver(Ok(2));
                    delivery.close();
                }
            }))
        });

        assert!(delivery.deliver(Ok(1)));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(!delivery.deliver(Ok(3)));
    }

    #[test]
    fn test_listener_slot_register_may_inspect_and_release() {
        let removed = Arc::new(AtomicUsize::new(0));
        let slot = ListenerSlot::new();

        let registered = slot.activate(|| {
            // A store delivering synchronously runs the handler here.
            assert!(slot.is_active());
            assert!(!slot.release());
            assert!(!slot.is_active());
            Box::new(CountingRegistration {
                removed: Arc::clone(&removed),
            })
        });

        assert!(!registered);
        assert!(!slot.is_active());
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }
}
