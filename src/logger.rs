//! Injected structured logger.
//!
//! A [`Logger`] is a cheap handle around a [`LogSink`]. Interceptors receive
//! one at construction.
//!
//! ```rust,ignore
//! let logger = Logger::tracing();
//! logger
//!     .with_fields(LogFields::new().with("grpc.method", "DoThing"))
//!     .info(format_args!("finished client unary call"));
//! ```

use std::{borrow::Cow, error::Error, fmt, sync::Arc};

use tracing::field::{self, DisplayValue};

use crate::{
    fields::{keys, FieldValue, LogFields},
    level::Level,
};

/// `tracing` target used by [`TracingSink`].
pub const LOG_TARGET: &str = "grpc_ctxlog";

/// Destination for finished log records.
///
/// `emit` is called synchronously on the call path; implementations should
/// hand the record off without waiting on I/O.
pub trait LogSink: Send + Sync {
    fn emit(&self, level: Level, message: &str, fields: &LogFields<'_>);
}

/// Forwards records to the `tracing` subscriber installed by the application.
///
/// The well-known call fields (`system`, `span.kind`, `grpc.*`, `ctx_id`,
/// `error`, `panic`) become separate event fields; absent ones are skipped.
/// `error` is recorded as an error value, so the subscriber decides how to
/// render it. Any other fields are rendered together under `fields`.
///
/// `Fatal` and `Panic` are emitted at `ERROR`; the original severity is kept
/// in the `severity` field.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

const STRUCTURED_KEYS: [&str; 9] = [
    keys::SYSTEM,
    keys::SPAN_KIND,
    keys::GRPC_SERVICE,
    keys::GRPC_METHOD,
    keys::GRPC_DURATION,
    keys::GRPC_CODE,
    keys::CTX_ID,
    keys::ERROR,
    keys::PANIC,
];

fn shown<'f>(fields: &'f LogFields<'_>, key: &str) -> Option<DisplayValue<&'f FieldValue<'f>>> {
    fields.get(key).map(field::display)
}

impl LogSink for TracingSink {
    fn emit(&self, level: Level, message: &str, fields: &LogFields<'_>) {
        let system = shown(fields, keys::SYSTEM);
        let span_kind = shown(fields, keys::SPAN_KIND);
        let service = shown(fields, keys::GRPC_SERVICE);
        let method = shown(fields, keys::GRPC_METHOD);
        let duration = shown(fields, keys::GRPC_DURATION);
        let code = shown(fields, keys::GRPC_CODE);
        let ctx_id = shown(fields, keys::CTX_ID);
        let panic_message = shown(fields, keys::PANIC);
        let error = fields
            .get(keys::ERROR)
            .and_then(FieldValue::as_error)
            .map(|e| e as &(dyn Error + 'static));

        // An `error` entry that holds plain text stays with the other fields.
        let rest = fields.filtered(|key, value| {
            let structured = STRUCTURED_KEYS.iter().any(|k| *k == key);
            !structured || (key == keys::ERROR && value.as_error().is_none())
        });
        let rest = (!rest.is_empty()).then(|| field::display(&rest));

        macro_rules! event {
            ($lvl:expr) => {
                tracing::event!(
                    target: LOG_TARGET,
                    $lvl,
                    severity = %level,
                    system = system,
                    span.kind = span_kind,
                    grpc.service = service,
                    grpc.method = method,
                    grpc.duration = duration,
                    grpc.code = code,
                    ctx_id = ctx_id,
                    error = error,
                    panic = panic_message,
                    fields = rest,
                    "{}",
                    message
                )
            };
        }

        match level {
            Level::Debug => event!(tracing::Level::DEBUG),
            Level::Info => event!(tracing::Level::INFO),
            Level::Warning => event!(tracing::Level::WARN),
            Level::Error | Level::Fatal | Level::Panic => event!(tracing::Level::ERROR),
        }
    }
}

/// Drops every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl LogSink for DiscardSink {
    fn emit(&self, _level: Level, _message: &str, _fields: &LogFields<'_>) {}
}

/// Shared handle to a [`LogSink`].
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Logger backed by [`TracingSink`].
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    /// Logger that drops everything.
    pub fn discard() -> Self {
        Self::new(Arc::new(DiscardSink))
    }

    /// Start an entry carrying `fields`.
    pub fn with_fields<'a>(&self, fields: LogFields<'a>) -> Entry<'a> {
        Entry {
            sink: Arc::clone(&self.sink),
            fields,
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

/// A pending log record: a sink plus the fields every message on it carries.
pub struct Entry<'a> {
    sink: Arc<dyn LogSink>,
    fields: LogFields<'a>,
}

impl<'a> Entry<'a> {
    pub fn fields(&self) -> &LogFields<'a> {
        &self.fields
    }

    /// Add more fields; on key collisions the new value wins.
    pub fn with_fields(mut self, fields: LogFields<'a>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn warning(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warning, args);
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    /// Log, then exit the process with status 1.
    pub fn fatal(&self, args: fmt::Arguments<'_>) -> ! {
        self.log(Level::Fatal, args);
        std::process::exit(1)
    }

    /// Log, then panic with the same message.
    pub fn panic(&self, args: fmt::Arguments<'_>) -> ! {
        let message = render(args);
        self.sink.emit(Level::Panic, &message, &self.fields);
        panic!("{message}")
    }

    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        self.sink.emit(level, &render(args), &self.fields);
    }
}

fn render(args: fmt::Arguments<'_>) -> Cow<'static, str> {
    match args.as_str() {
        Some(s) => Cow::Borrowed(s),
        None => Cow::Owned(args.to_string()),
    }
}


#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::Mutex,
        time::{Duration, Instant},
    };

    use tonic::{Code, Status};
    use tracing_subscriber::{layer::Context, prelude::*, Layer};
    use uuid::Uuid;

    use super::{testing::MemorySink, *};
    use crate::{fields::client_logger_fields, ids::CorrelationId};

    /// One event as seen by a subscriber.
    #[derive(Debug, Clone)]
    struct Captured {
        level: tracing::Level,
        target: String,
        fields: BTreeMap<String, String>,
    }

    #[derive(Clone, Default)]
    struct CaptureLayer(Arc<Mutex<Vec<Captured>>>);

    impl<S: tracing::Subscriber> Layer<S> for CaptureLayer {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = FieldVisitor::default();
            event.record(&mut visitor);
            self.0.lock().unwrap().push(Captured {
                level: *event.metadata().level(),
                target: event.metadata().target().to_owned(),
                fields: visitor.0,
            });
        }
    }

    #[derive(Default)]
    struct FieldVisitor(BTreeMap<String, String>);

    impl field::Visit for FieldVisitor {
        fn record_debug(&mut self, field: &field::Field, value: &dyn fmt::Debug) {
            self.0.insert(field.name().to_owned(), format!("{value:?}"));
        }

        fn record_str(&mut self, field: &field::Field, value: &str) {
            self.0.insert(field.name().to_owned(), value.to_owned());
        }

        // Marked so tests can tell an error value from plain text.
        fn record_error(&mut self, field: &field::Field, value: &(dyn Error + 'static)) {
            self.0.insert(field.name().to_owned(), format!("error value: {value}"));
        }
    }

    fn capture(emit: impl FnOnce()) -> Vec<Captured> {
        let layer = CaptureLayer::default();
        let subscriber = tracing_subscriber::registry().with(layer.clone());
        tracing::subscriber::with_default(subscriber, emit);
        let events = layer.0.lock().unwrap().clone();
        events
    }

    struct WithId(CorrelationId);

    impl crate::ids::ContextIdGetter for WithId {
        fn get_context_id(&self) -> &[u8] {
            self.0.as_bytes()
        }
    }

    impl crate::ids::Reply for WithId {
        fn context_id_getter(&self) -> Option<&dyn crate::ids::ContextIdGetter> {
            Some(self)
        }
    }

    #[test]
    fn entry_forwards_level_message_and_fields() {
        let sink = Arc::new(MemorySink::default());
        let logger = Logger::new(sink.clone());

        logger
            .with_fields(LogFields::new().with("grpc.method", "DoThing"))
            .warning(format_args!("slow call after {} retries", 0));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::Warning);
        assert_eq!(records[0].message, "slow call after 0 retries");
        assert_eq!(records[0].fields["grpc.method"], "DoThing");
    }

    #[test]
    fn entry_with_fields_overrides_existing_keys() {
        let sink = Arc::new(MemorySink::default());
        let logger = Logger::new(sink.clone());

        logger
            .with_fields(LogFields::new().with("a", "1").with("b", "1"))
            .with_fields(LogFields::new().with("b", "2"))
            .info(format_args!("done"));

        let records = sink.records();
        let fields = &records[0].fields;
        assert_eq!(fields["a"], "1");
        assert_eq!(fields["b"], "2");
    }

    #[test]
    #[should_panic(expected = "invariant broken")]
    fn panic_method_panics_with_message() {
        Logger::discard()
            .with_fields(LogFields::new())
            .panic(format_args!("invariant broken"));
    }

    #[test]
    fn tracing_sink_accepts_every_level_without_subscriber() {
        let entry = Logger::tracing().with_fields(LogFields::new().with("k", "v"));
        entry.debug(format_args!("d"));
        entry.info(format_args!("i"));
        entry.warning(format_args!("w"));
        entry.error(format_args!("e"));
    }

    // -----------------------------------------------------------------------
    // TracingSink output
    // -----------------------------------------------------------------------

    #[test]
    fn tracing_sink_records_call_fields_separately() {
        let status = Status::not_found("order 42");
        let start = Instant::now() - Duration::from_millis(5);
        let fields = client_logger_fields(
            "/orders.v1.Orders/Create",
            None,
            Some(&status),
            Code::NotFound,
            start,
        );

        let events = capture(|| TracingSink.emit(Level::Warning, "finished client unary call", &fields));

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.level, tracing::Level::WARN);
        assert_eq!(event.target, LOG_TARGET);
        assert_eq!(event.fields["message"], "finished client unary call");
        assert_eq!(event.fields["severity"], "warning");
        assert_eq!(event.fields["system"], "grpc");
        assert_eq!(event.fields["span.kind"], "client");
        assert_eq!(event.fields["grpc.service"], "orders.v1.Orders");
        assert_eq!(event.fields["grpc.method"], "Create");
        assert_eq!(event.fields["grpc.code"], "NotFound");
        assert!(event.fields.contains_key("grpc.duration"));
        assert!(
            event.fields["error"].starts_with("error value: "),
            "error should be recorded as an error: {}",
            event.fields["error"]
        );
        assert!(!event.fields.contains_key("ctx_id"));
        assert!(!event.fields.contains_key("panic"));
        assert!(!event.fields.contains_key("fields"));
    }

    #[test]
    fn tracing_sink_records_ctx_id_when_present() {
        let id = CorrelationId::from(Uuid::new_v4());
        let reply = WithId(id);
        let fields = client_logger_fields("/s/m", Some(&reply), None, Code::Ok, Instant::now());

        let events = capture(|| TracingSink.emit(Level::Info, "done", &fields));

        assert_eq!(events[0].level, tracing::Level::INFO);
        assert_eq!(events[0].fields["ctx_id"], id.to_string());
        assert_eq!(events[0].fields["grpc.code"], "OK");
        assert!(!events[0].fields.contains_key("error"));
    }

    #[test]
    fn tracing_sink_maps_terminal_levels_to_error() {
        let fields = LogFields::new();

        let events = capture(|| {
            TracingSink.emit(Level::Error, "e", &fields);
            TracingSink.emit(Level::Fatal, "f", &fields);
            TracingSink.emit(Level::Panic, "p", &fields);
        });

        let seen: Vec<_> = events
            .iter()
            .map(|e| (e.level, e.fields["severity"].as_str()))
            .collect();
        assert_eq!(
            seen,
            [
                (tracing::Level::ERROR, "error"),
                (tracing::Level::ERROR, "fatal"),
                (tracing::Level::ERROR, "panic"),
            ]
        );
    }

    #[test]
    fn tracing_sink_groups_other_fields() {
        let fields = LogFields::new()
            .with("tenant", "acme")
            .with(keys::ERROR, "plain text")
            .with(keys::PANIC, "boom");

        let events = capture(|| TracingSink.emit(Level::Error, "m", &fields));

        let event = &events[0];
        assert_eq!(event.fields["panic"], "boom");
        assert_eq!(event.fields["fields"], r#"error="plain text" tenant=acme"#);
        assert!(!event.fields.contains_key("error"));
        assert!(!event.fields.contains_key("tenant"));
    }
}
