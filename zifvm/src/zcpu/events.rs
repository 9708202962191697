//! The observer set the debugger hooks into.
use std::{cell::RefCell, rc::Rc};

use crate::zcpu::ZValue;

/// Everything the processor announces while running.
///
/// Events fire synchronously on the thread driving `step()`, in observer
/// registration order; listeners must not call back into the processor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ZCpuEvent {
    /// An instruction is about to execute.
    Stepping { pc: u32 },
    /// An instruction finished executing.
    Stepped { old_pc: u32, new_pc: u32 },
    /// A routine call pushed a frame.
    EnterFrame {
        old_routine: u32,
        new_routine: u32,
    },
    /// A return popped a frame.
    ExitFrame {
        old_routine: u32,
        new_routine: u32,
    },
    LocalVariableChanged {
        index: u8,
        old_value: ZValue,
        new_value: ZValue,
    },
    Quit,
}

pub trait Observer<E> {
    fn on_notify(&mut self, event: &E);
}

/// A multicast dispatcher over registered observers.
pub struct EventSystem<E> {
    observers: Vec<(usize, Rc<RefCell<dyn Observer<E>>>)>,
    counter: usize,
}

impl<E> EventSystem<E> {
    pub fn new() -> Self {
        EventSystem {
            observers: Vec::new(),
            counter: 0,
        }
    }

    pub fn register_observer(&mut self, observer: Rc<RefCell<dyn Observer<E>>>) -> usize {
        self.counter += 1;
        self.observers.push((self.counter, observer));
        self.counter
    }

    pub fn remove_observer(&mut self, index: usize) -> Option<Rc<RefCell<dyn Observer<E>>>> {
        let position = self.observers.iter().position(|(id, _)| *id == index)?;
        Some(self.observers.remove(position).1)
    }

    pub fn handle_event(&mut self, event: &E) {
        for (_, observer) in self.observers.iter_mut() {
            observer.borrow_mut().on_notify(event);
        }
    }
}

impl<E> Default for EventSystem<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        tag: u32,
        seen: Vec<(u32, u32)>,
    }

    struct SharedRecorder {
        tag: u32,
        log: Rc<RefCell<Vec<u32>>>,
    }

    impl Observer<u32> for Recorder {
        fn on_notify(&mut self, event: &u32) {
            self.seen.push((self.tag, *event));
        }
    }

    impl Observer<u32> for SharedRecorder {
        fn on_notify(&mut self, _event: &u32) {
            self.log.borrow_mut().push(self.tag);
        }
    }

    #[test]
    fn observers_receive_events() {
        let mut events: EventSystem<u32> = EventSystem::new();
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        events.register_observer(recorder.clone());
        events.handle_event(&17);
        events.handle_event(&23);
        assert_eq!(recorder.borrow().seen, vec![(0, 17), (0, 23)]);
    }

    #[test]
    fn observers_fire_in_registration_order() {
        let mut events: EventSystem<u32> = EventSystem::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in 1..=3 {
            events.register_observer(Rc::new(RefCell::new(SharedRecorder {
                tag,
                log: log.clone(),
            })));
        }
        events.handle_event(&0);
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn removed_observers_stop_receiving() {
        let mut events: EventSystem<u32> = EventSystem::new();
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let id = events.register_observer(recorder.clone());
        events.handle_event(&1);
        assert!(events.remove_observer(id).is_some());
        events.handle_event(&2);
        assert_eq!(recorder.borrow().seen.len(), 1);
        assert!(events.remove_observer(id).is_none());
    }
}
