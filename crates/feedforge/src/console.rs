//! Console logging for FeedForge operators.
//!
//! Installs a `tracing` subscriber that prints operator events as one
//! compact line each, prefixed with the elapsed time and the stream identity.
//!
//! ## Log Levels
//!
//! - **WARN**: Degraded branches, failed injections, cache failures
//! - **DEBUG**: Retries, refills, cache hits and misses
//! - **TRACE**: Per-call begin/end from [`LoggingTracer`](feedforge_stream::LoggingTracer)

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Instant;

use owo_colors::OwoColorize;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();
static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Initializes console output.
///
/// Safe to call multiple times; only the first call has effect. `RUST_LOG`
/// overrides the default of `info` for the stream operators.
pub fn init() {
    INIT.get_or_init(|| {
        EPOCH.get_or_init(Instant::now);

        let mut filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy();
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
            for directive in ["feedforge_stream=info", "feedforge=info"] {
                if let Ok(directive) = directive.parse() {
                    filter = filter.add_directive(directive);
                }
            }
        }

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(FeedConsoleLayer)
            .try_init();
    });
}

fn elapsed_secs() -> f64 {
    EPOCH
        .get()
        .map_or(0.0, |epoch| epoch.elapsed().as_secs_f64())
}

/// A tracing layer that formats FeedForge events on stderr.
pub struct FeedConsoleLayer;

impl<S: Subscriber> Layer<S> for FeedConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with("feedforge") {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let line = format_event(&visitor, *metadata.level());
        let _ = writeln!(io::stderr().lock(), "{line}");
    }
}

#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    stream: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "stream" => self.stream = Some(value.to_string()),
            name => self.fields.push((name, value.to_string())),
        }
    }
}

fn format_level(level: Level) -> String {
    match level {
        Level::ERROR => "ERROR".bright_red().bold().to_string(),
        Level::WARN => " WARN".bright_yellow().bold().to_string(),
        Level::INFO => " INFO".bright_green().to_string(),
        Level::DEBUG => "DEBUG".bright_blue().to_string(),
        Level::TRACE => "TRACE".bright_black().to_string(),
    }
}

fn format_event(v: &EventVisitor, level: Level) -> String {
    let mut line = format!(
        "{} {}",
        format!("{:>8.3}s", elapsed_secs()).bright_black(),
        format_level(level)
    );
    if let Some(stream) = &v.stream {
        let _ = write!(line, " {}", stream.bright_cyan());
    }
    if let Some(message) = &v.message {
        let _ = write!(line, " {message}");
    }
    for (name, value) in &v.fields {
        let _ = write!(line, " {}={value}", name.bright_black());
    }
    line
}
