//! Log capture for unit tests.
//!
//! [`capture_events`] installs a registry with a recording layer for the
//! duration of a closure, so handshake and lifecycle tests can assert on the
//! level, message and structured fields of what they log.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use tracing::{
    Event,
    Level,
    Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{
    Layer,
    layer::{Context, SubscriberExt},
    registry,
};

/// One event seen while capturing.
#[derive(Debug)]
pub(crate) struct RecordedEvent {
    level: Level,
    message: Option<String>,
    fields: BTreeMap<&'static str, String>,
}

impl RecordedEvent {
    pub(crate) const fn level(&self) -> Level { self.level }

    pub(crate) fn message(&self) -> Option<&str> { self.message.as_deref() }

    /// Value of a structured field, rendered as it would be logged.
    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn from_event(event: &Event<'_>) -> Self {
        let mut recorded = Self {
            level: *event.metadata().level(),
            message: None,
            fields: BTreeMap::new(),
        };
        event.record(&mut recorded);
        recorded
    }

    fn store(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.fields.insert(name, value);
            }
        }
    }
}

impl Visit for RecordedEvent {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.store(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) { self.store(field, value.to_owned()); }
}

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl Recorder {
    fn take(&self) -> Vec<RecordedEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *events)
    }
}

impl<S: Subscriber> Layer<S> for Recorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let recorded = RecordedEvent::from_event(event);
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(recorded);
    }
}

/// Run `f` and return its value with every event it emitted, in order.
pub(crate) fn capture_events<T>(f: impl FnOnce() -> T) -> (T, Vec<RecordedEvent>) {
    let recorder = Recorder::default();
    let subscriber = registry().with(recorder.clone());
    let value = tracing::subscriber::with_default(subscriber, f);
    (value, recorder.take())
}

/// Run `f`, asserting it emitted exactly one event.
pub(crate) fn capture_single_event<T>(f: impl FnOnce() -> T) -> (T, RecordedEvent) {
    let (value, events) = capture_events(f);
    match <[RecordedEvent; 1]>::try_from(events) {
        Ok([event]) => (value, event),
        Err(events) => panic!("expected exactly one tracing event, got {events:?}"),
    }
}
