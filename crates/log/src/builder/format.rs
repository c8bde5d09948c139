//! Format layer creation

use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
use tracing_subscriber::{Layer, Registry};

use crate::config::{Config, Format, WriterConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn make_writer(writer: WriterConfig) -> BoxMakeWriter {
    match writer {
        WriterConfig::Stderr => BoxMakeWriter::new(std::io::stderr),
        WriterConfig::Stdout => BoxMakeWriter::new(std::io::stdout),
    }
}

/// The formatting layer for `config.format`
pub(super) fn fmt_layer(config: &Config) -> BoxedLayer {
    let display = &config.display;
    let base = fmt::layer::<Registry>()
        .with_writer(make_writer(config.writer))
        .with_target(display.target)
        .with_file(display.source)
        .with_line_number(display.source)
        .with_thread_ids(display.thread_ids);

    match config.format {
        Format::Pretty => Box::new(base.pretty().with_ansi(display.colors)),
        Format::Compact => Box::new(base.compact().with_ansi(display.colors)),
        Format::Json => Box::new(
            base.json()
                .with_ansi(false)
                .flatten_event(display.flatten)
                .with_current_span(true),
        ),
    }
}
