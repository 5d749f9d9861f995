//! `tracing` layer writing rendered lines into the sink table

use std::fmt::{self, Write as _};
use std::io::Write;

use chrono::Local;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use super::{LogLevel, SharedSinks, lock_sinks};

pub struct SinkLayer {
    sinks: SharedSinks,
    time_format: String,
}

impl SinkLayer {
    pub(crate) fn new(sinks: SharedSinks, time_format: String) -> Self {
        Self { sinks, time_format }
    }

    fn render(&self, level: LogLevel, event: &Event<'_>) -> String {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        format!(
            "{} [{}] {}{}\n",
            Local::now().format(&self.time_format),
            level.initial(),
            visitor.message,
            visitor.fields
        )
    }
}

impl<S: Subscriber> Layer<S> for SinkLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = LogLevel::of(event.metadata());
        let mut table = lock_sinks(&self.sinks);
        if !table.sinks.iter().any(|sink| level >= sink.level) {
            return;
        }

        let line = self.render(level, event);
        for sink in table.sinks.iter_mut().filter(|sink| level >= sink.level) {
            // A broken sink must not take the others down with it
            let _ = sink
                .writer
                .write_all(line.as_bytes())
                .and_then(|()| sink.writer.flush());
        }
    }
}

/// Collects the `message` field and appends every other field as `key=value`.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
