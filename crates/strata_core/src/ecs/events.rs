//! # Event Channels
//!
//! Double-buffered queues, one per event type. Each record remembers the
//! execution position of the system that wrote it. A reader at position
//! `i` sees:
//! - last step's records written at positions `> i` (downstream of it)
//! - this step's records written at positions `<= i` (upstream of it)
//!
//! so every record is observed exactly once by every reader, whatever its
//! place in the system order.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use parking_lot::Mutex;

use super::component::Component;
use super::entity::Entity;

/// Marker for event payloads. Implemented for every `Clone + Send + 'static` type.
pub trait Event: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> Event for T {}

/// An event payload tagged with its writer's execution position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord<E> {
    /// The event.
    pub payload: E,
    /// Position of the writer in the system order; `0` outside systems.
    pub origin: usize,
}

/// Emitted when a component of type `T` is added to an entity.
pub struct ComponentAdded<T: Component> {
    /// The entity that gained the component.
    pub entity: Entity,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> ComponentAdded<T> {
    /// Creates the event for `entity`.
    #[must_use]
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            _marker: PhantomData,
        }
    }
}

impl<T: Component> Clone for ComponentAdded<T> {
    fn clone(&self) -> Self {
        Self::new(self.entity)
    }
}

impl<T: Component> fmt::Debug for ComponentAdded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentAdded")
            .field("component", &T::UUID)
            .field("entity", &self.entity)
            .finish()
    }
}

/// Emitted when a component of type `T` is removed, carrying its last value.
#[derive(Clone)]
pub struct ComponentRemoved<T: Component> {
    /// The entity that lost the component.
    pub entity: Entity,
    /// The removed value.
    pub data: T,
}

impl<T: Component + fmt::Debug> fmt::Debug for ComponentRemoved<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRemoved")
            .field("entity", &self.entity)
            .field("data", &self.data)
            .finish()
    }
}

struct EventChannel<E> {
    previous: Vec<EventRecord<E>>,
    current: Vec<EventRecord<E>>,
}

impl<E: Event> EventChannel<E> {
    fn new() -> Self {
        Self {
            previous: Vec::new(),
            current: Vec::new(),
        }
    }

    fn visible(&self, reader: usize) -> impl Iterator<Item = &EventRecord<E>> {
        self.previous
            .iter()
            .filter(move |r| r.origin > reader)
            .chain(self.current.iter().filter(move |r| r.origin <= reader))
    }
}

trait AnyChannel: Send {
    fn advance(&mut self);
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<E: Event> AnyChannel for EventChannel<E> {
    fn advance(&mut self) {
        self.previous = std::mem::take(&mut self.current);
    }

    fn len(&self) -> usize {
        self.previous.len() + self.current.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// All event channels of one world.
#[derive(Default)]
pub struct EventBus {
    channels: Mutex<HashMap<TypeId, Box<dyn AnyChannel>>>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event` to the current buffer of its channel.
    pub fn send<E: Event>(&self, event: E, origin: usize) {
        let mut channels = self.channels.lock();
        let channel = channels
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(EventChannel::<E>::new()));
        if let Some(channel) = channel.as_any_mut().downcast_mut::<EventChannel<E>>() {
            channel.current.push(EventRecord {
                payload: event,
                origin,
            });
        }
    }

    /// Copies of the events visible to a reader at position `reader`.
    #[must_use]
    pub fn read<E: Event>(&self, reader: usize) -> Vec<E> {
        self.with_visible::<E, _>(reader, |r| r.payload.clone())
    }

    /// Like [`read`](Self::read), keeping each record's origin.
    #[must_use]
    pub fn read_records<E: Event>(&self, reader: usize) -> Vec<EventRecord<E>> {
        self.with_visible::<E, _>(reader, EventRecord::clone)
    }

    /// Records of type `E` held in either buffer.
    #[must_use]
    pub fn buffered<E: Event>(&self) -> usize {
        self.channels
            .lock()
            .get(&TypeId::of::<E>())
            .map_or(0, |channel| channel.len())
    }

    /// Step boundary: the current buffer becomes the previous one.
    pub fn advance(&self) {
        for channel in self.channels.lock().values_mut() {
            channel.advance();
        }
    }

    fn with_visible<E: Event, R>(&self, reader: usize, f: impl Fn(&EventRecord<E>) -> R) -> Vec<R> {
        let channels = self.channels.lock();
        channels
            .get(&TypeId::of::<E>())
            .and_then(|channel| channel.as_any().downcast_ref::<EventChannel<E>>())
            .map(|channel| channel.visible(reader).map(&f).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.channels.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Ping(u32);

    #[test]
    fn test_reader_sees_upstream_this_step() {
        let bus = EventBus::new();
        bus.send(Ping(1), 1);
        bus.send(Ping(2), 3);

        assert!(bus.read::<Ping>(0).is_empty());
        assert_eq!(bus.read::<Ping>(1), vec![Ping(1)]);
        assert_eq!(bus.read::<Ping>(3), vec![Ping(1), Ping(2)]);
    }

    #[test]
    fn test_reader_sees_downstream_last_step() {
        let bus = EventBus::new();
        bus.send(Ping(1), 1);
        bus.send(Ping(2), 3);
        bus.advance();
        bus.send(Ping(3), 1);

        // Position 2 already saw Ping(1) last step and now sees Ping(2) and Ping(3).
        assert_eq!(bus.read::<Ping>(2), vec![Ping(2), Ping(3)]);
        // Position 3 saw both last step; only the new upstream event remains.
        assert_eq!(bus.read::<Ping>(3), vec![Ping(3)]);
    }

    #[test]
    fn test_events_expire_after_two_steps() {
        let bus = EventBus::new();
        bus.send(Ping(1), 5);
        bus.advance();
        assert_eq!(bus.buffered::<Ping>(), 1);
        bus.advance();
        assert_eq!(bus.buffered::<Ping>(), 0);
        assert!(bus.read::<Ping>(0).is_empty());
    }

    #[test]
    fn test_records_keep_origin() {
        let bus = EventBus::new();
        bus.send(Ping(7), 2);
        let records = bus.read_records::<Ping>(4);
        assert_eq!(records, vec![EventRecord { payload: Ping(7), origin: 2 }]);
    }

    #[test]
    fn test_channels_are_per_type() {
        let bus = EventBus::new();
        bus.send(Ping(1), 0);
        bus.send("hello", 0);
        assert_eq!(bus.read::<Ping>(0).len(), 1);
        assert_eq!(bus.read::<&str>(0), vec!["hello"]);
        assert!(bus.read::<u64>(0).is_empty());
    }
}
