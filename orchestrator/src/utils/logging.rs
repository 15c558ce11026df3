use std::collections::HashMap;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Fields recorded on a span, kept in its extensions so formatters can show the
/// `stage` and `event` a log line happened under.
#[derive(Debug, Clone, Default)]
pub struct SpanFields(HashMap<String, String>);

impl SpanFields {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

impl Visit for SpanFields {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value).trim_matches('"').to_string());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

pub struct FieldCollectorLayer;

impl<S> Layer<S> for FieldCollectorLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &tracing::span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = SpanFields::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &tracing::span::Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        let mut fields = extensions.remove::<SpanFields>().unwrap_or_default();
        values.record(&mut fields);
        extensions.insert(fields);
    }
}

/// `stage` and `event` of a log line: the event's own fields win over the innermost span's.
fn columns<S, N>(ctx: &FmtContext<'_, S, N>, stage: Option<String>, event: Option<String>) -> (Option<String>, Option<String>)
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    let (mut stage, mut event) = (stage, event);
    if let Some(scope) = ctx.event_scope() {
        for span in scope {
            if let Some(fields) = span.extensions().get::<SpanFields>() {
                stage = stage.or_else(|| fields.get("stage").map(str::to_string));
                event = event.or_else(|| fields.get("event").map(str::to_string));
            }
        }
    }
    (stage, event)
}

// Pretty formatter is formatted for console readability
pub struct PrettyFormatter;

impl<S, N> FormatEvent<S, N> for PrettyFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();
        let now = Utc::now().format("%y-%m-%d %H:%M:%S").to_string();

        let ts_color = "\x1b[96m"; // Bright Cyan
        let level_color = match *meta.level() {
            Level::TRACE => "\x1b[90m",
            Level::DEBUG => "\x1b[34m",
            Level::INFO => "\x1b[32m",
            Level::WARN => "\x1b[33m",
            Level::ERROR => "\x1b[31m",
        };
        let msg_color = "\x1b[97m"; // Bright White
        let column_color = "\x1b[92m"; // Bright Green
        let reset = "\x1b[0m";
        let dim_color = "\x1b[90m";

        let mut visitor = FieldExtractor::default();
        event.record(&mut visitor);
        let (stage, job_event) = columns(ctx, visitor.stage.take(), visitor.event.take());
        let stage = stage.unwrap_or_else(|| "-".to_string()).to_uppercase();
        let job_event = job_event.unwrap_or_else(|| "-".to_string());

        // Timestamp (17 chars) | Level (5 chars) | Stage (22 chars) | Event (20 chars) | Service (6 chars) | Message
        write!(writer, "{}{}{} ", ts_color, now, reset)?;
        write!(writer, "{}|{} ", dim_color, reset)?;
        write!(writer, "{}{:<5}{} ", level_color, *meta.level(), reset)?;
        write!(writer, "{}|{} ", dim_color, reset)?;
        write!(writer, "{}{:<22}{} ", column_color, stage, reset)?;
        write!(writer, "{}|{} ", dim_color, reset)?;
        write!(writer, "{}{:<20}{} ", column_color, job_event, reset)?;
        write!(writer, "{}|{} ", dim_color, reset)?;
        write!(writer, "{}{:<6}{} ", column_color, service_name(meta.target()), reset)?;
        write!(writer, "{}|{} ", dim_color, reset)?;

        write!(writer, "{}{}{}", msg_color, visitor.message, reset)?;

        if !visitor.meta.is_empty() || !visitor.fields.is_empty() {
            write!(writer, " (")?;
            if !visitor.meta.is_empty() {
                write!(writer, "{}{}{}", msg_color, visitor.meta, reset)?;
                if !visitor.fields.is_empty() {
                    write!(writer, ", ")?;
                }
            }
            if !visitor.fields.is_empty() {
                write!(writer, "{}{}{}", msg_color, visitor.fields, reset)?;
            }
            write!(writer, ")")?;
        }

        writeln!(writer)
    }
}

#[derive(Default)]
struct FieldExtractor {
    message: String,
    stage: Option<String>,
    event: Option<String>,
    fields: String,
    meta: String,
}

impl Visit for FieldExtractor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let fixed_field_color = "\x1b[90m"; // Dark Grey
        let reset = "\x1b[0m";
        let formatted_value = format!("{:?}", value).trim_matches('"').to_string();

        match field.name() {
            "message" => self.message = formatted_value,
            // Shown in their own columns
            "stage" => self.stage = Some(formatted_value),
            "event" => self.event = Some(formatted_value),
            name => {
                let formatted_field = format!("{}{}={}{}", fixed_field_color, name, formatted_value, reset);
                // Scheduler job names first
                let target = if name == "job" { &mut self.meta } else { &mut self.fields };
                if !target.is_empty() {
                    target.push_str(", ");
                }
                target.push_str(&formatted_field);
            }
        }
    }
}

/// One JSON object per line with `stage` and `event` at the top level, ready for log shippers.
pub struct JsonEventFormatter;

#[derive(Default)]
struct JsonFieldVisitor {
    message: Option<String>,
    stage: Option<String>,
    event: Option<String>,
    fields: Map<String, Value>,
}

impl JsonFieldVisitor {
    fn insert(&mut self, name: &str, value: Value) {
        match (name, value) {
            ("message", Value::String(text)) => self.message = Some(text),
            ("stage", Value::String(text)) => self.stage = Some(text),
            ("event", Value::String(text)) => self.event = Some(text),
            (name, value) => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for JsonFieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field.name(), Value::String(format!("{:?}", value).trim_matches('"').to_string()));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field.name(), Value::String(value.to_string()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field.name(), Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field.name(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field.name(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field.name(), Value::from(value));
    }
}

impl<S, N> FormatEvent<S, N> for JsonEventFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);
        let (stage, job_event) = columns(ctx, visitor.stage.take(), visitor.event.take());

        let mut root = Map::new();
        root.insert("timestamp".to_string(), Value::String(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)));
        root.insert("level".to_string(), Value::String(meta.level().to_string()));
        root.insert("service".to_string(), Value::String(service_name(meta.target()).to_string()));
        root.insert("target".to_string(), Value::String(meta.target().to_string()));
        if let Some(stage) = stage {
            root.insert("stage".to_string(), Value::String(stage));
        }
        if let Some(job_event) = job_event {
            root.insert("event".to_string(), Value::String(job_event));
        }
        root.insert("message".to_string(), Value::String(visitor.message.unwrap_or_default()));
        if !visitor.fields.is_empty() {
            root.insert("fields".to_string(), Value::Object(visitor.fields));
        }

        let line = serde_json::to_string(&Value::Object(root)).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{}", line)
    }
}

/// Initialize the tracing subscriber with
/// - PrettyFormatter for console readability (when LOG_FORMAT != "json")
/// - JsonEventFormatter for json logging (when LOG_FORMAT = "json")
///
/// This will also install color_eyre to handle the panic in the application
pub fn init_logging() -> anyhow::Result<()> {
    color_eyre::install().map_err(|err| anyhow::anyhow!("Unable to install color_eyre: {err}"))?;

    // Read from `RUST_LOG` environment variable, with fallback to default
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::builder()
            .with_default_directive(Level::INFO.into())
            .parse("inversion_orchestrator=info,orchestrator_slurm_client=info")?,
    };

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    if log_format == "json" {
        let subscriber = Registry::default()
            .with(env_filter)
            .with(FieldCollectorLayer)
            .with(fmt::layer().event_format(JsonEventFormatter))
            .with(ErrorLayer::default());
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default()
            .with(env_filter)
            .with(FieldCollectorLayer)
            .with(fmt::layer().event_format(PrettyFormatter))
            .with(ErrorLayer::default());
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Short name of the component a log line comes from, for the service column.
fn service_name(target: &str) -> &'static str {
    if target.starts_with("orchestrator_slurm_client") {
        "SLURM"
    } else if target.starts_with("inversion_orchestrator::core::ledger") {
        "LEDGER"
    } else if target.starts_with("inversion_orchestrator") {
        "-"
    } else {
        "EXT"
    }
}
