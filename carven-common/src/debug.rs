//! typed debug event streams, compiled away unless the `debug` feature is on.
//!
//! engine internals call [`send_debug_event`] from wherever something worth
//! watching happens (chunk loads, mesh completions); a debug overlay drains
//! the stream for the event types it cares about. channels are bounded and
//! sends never block: when nobody drains a stream, new events fall on the
//! floor instead of accumulating for the whole session.

/// An event family that can be routed through the debug channels. The name
/// is what configuration files and filters refer to the stream by.
pub trait DebugEvent: Send + Sync + 'static {
    fn name() -> &'static str;
}

/// Implements [`DebugEvent`] for each listed type and emits a
/// `register_debug_events` function that turns the whole group on, honoring
/// an optional by-name filter set.
#[macro_export]
macro_rules! debug_events {
    ($($type:path => $name:expr),* $(,)?) => {
        $(impl $crate::debug::DebugEvent for $type {
            fn name() -> &'static str {
                $name
            }
        })*

        pub fn register_debug_events(enabled: Option<&std::collections::HashSet<String>>) {
            $($crate::debug::register_debug_event::<$type>(enabled);)*
        }
    };
}

pub use debug_events;

#[cfg(feature = "debug")]
mod inner {
    use super::DebugEvent;
    use crossbeam_channel::{Receiver, Sender};
    use std::{
        any::{Any, TypeId},
        collections::HashSet,
    };

    // enough headroom for a busy frame or two between drains; anything past
    // this means the consumer is gone and the events are better lost
    const STREAM_DEPTH: usize = 4096;

    struct EventStream<E> {
        tx: Sender<E>,
        rx: Receiver<E>,
    }

    lazy_static::lazy_static! {
        static ref STREAMS: flurry::HashMap<TypeId, Box<dyn Any + Send + Sync>> =
            Default::default();
    }

    pub fn register_debug_event<E: DebugEvent>(enabled: Option<&HashSet<String>>) {
        enable_debug_event::<E>(enabled.map_or(true, |set| set.contains(E::name())));
    }

    pub fn enable_debug_event<E: DebugEvent>(enable: bool) {
        let id = TypeId::of::<E>();
        if enable {
            let (tx, rx) = crossbeam_channel::bounded(STREAM_DEPTH);
            let stream = Box::new(EventStream::<E> { tx, rx }) as Box<dyn Any + Send + Sync>;
            drop(STREAMS.pin().try_insert(id, stream));
        } else {
            STREAMS.pin().remove(&id);
        }
    }

    pub fn send_debug_event<E: DebugEvent>(event: E) {
        if let Some(stream) = STREAMS.pin().get(&TypeId::of::<E>()) {
            if let Some(stream) = stream.downcast_ref::<EventStream<E>>() {
                let _ = stream.tx.try_send(event);
            }
        }
    }

    pub fn drain_debug_events<E: DebugEvent, F>(func: F)
    where
        F: FnMut(E),
    {
        if let Some(stream) = STREAMS.pin().get(&TypeId::of::<E>()) {
            if let Some(stream) = stream.downcast_ref::<EventStream<E>>() {
                stream.rx.try_iter().for_each(func);
            }
        }
    }
}

// with the feature off the calls stay in place and compile to nothing, so
// call sites don't need their own cfg gates.
#[cfg(not(feature = "debug"))]
mod inner {
    use super::DebugEvent;
    use std::collections::HashSet;

    pub fn register_debug_event<E: DebugEvent>(_enabled: Option<&HashSet<String>>) {}

    pub fn enable_debug_event<E: DebugEvent>(_enable: bool) {}

    pub fn send_debug_event<E: DebugEvent>(_event: E) {}

    pub fn drain_debug_events<E: DebugEvent, F>(_func: F)
    where
        F: FnMut(E),
    {
    }
}

pub use inner::*;

#[cfg(all(test, feature = "debug"))]
mod tests {
    use super::*;

    #[derive(Debug, Eq, PartialEq)]
    struct Ping(u32);

    impl DebugEvent for Ping {
        fn name() -> &'static str {
            "ping"
        }
    }

    #[test]
    fn events_flow_only_while_enabled() {
        send_debug_event(Ping(0));
        let mut seen = Vec::new();
        drain_debug_events::<Ping, _>(|event| seen.push(event));
        assert!(seen.is_empty());

        enable_debug_event::<Ping>(true);
        send_debug_event(Ping(1));
        send_debug_event(Ping(2));
        drain_debug_events::<Ping, _>(|event| seen.push(event));
        assert_eq!(seen, vec![Ping(1), Ping(2)]);

        enable_debug_event::<Ping>(false);
        send_debug_event(Ping(3));
        seen.clear();
        drain_debug_events::<Ping, _>(|event| seen.push(event));
        assert!(seen.is_empty());
    }
}
