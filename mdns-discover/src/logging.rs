use colored::Colorize;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{self, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Renders diagnostics as "<level>: <message>" on stderr
pub struct DiagnosticFormatter {
    color: bool,
}

impl<S, N> FormatEvent<S, N> for DiagnosticFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> format::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let label = match *event.metadata().level() {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };

        if self.color {
            let painted = match *event.metadata().level() {
                Level::TRACE => label.dimmed(),
                Level::DEBUG => label.blue(),
                Level::INFO => label.green(),
                Level::WARN => label.yellow().bold(),
                Level::ERROR => label.red().bold(),
            };
            write!(writer, "{painted}: ")?;
        } else {
            write!(writer, "{label}: ")?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Makes `color` the only input to `colored`, which would otherwise also
/// require stdout to be a terminal. Applies to the summary as well.
fn force_color(color: bool) {
    colored::control::set_override(color);
}

/// Filter used when `RUST_LOG` is unset. Only this crate emits events.
fn default_directives(debug: bool) -> &'static str {
    if debug {
        "mdns_discover=debug"
    } else {
        "mdns_discover=warn"
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `debug`.
pub fn init(debug: bool, color: bool) {
    force_color(color);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(debug))),
        )
        .with_writer(std::io::stderr)
        .event_format(DiagnosticFormatter { color })
        .init();
}
