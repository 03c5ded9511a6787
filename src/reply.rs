//! Reply sinks: the output-protocol boundary
//!
//! The result-set tree does not own a wire format; it streams itself
//! through a [`ReplySink`]. [`RespReplySink`] is the stock implementation,
//! framing the tree the way a Redis module reply would: one RESP array
//! per partition level, one three-element array (name, labels, samples)
//! per series.

use crate::range::{project, RangeOptions};
use crate::series::Series;
use std::io::{self, Write};

/// Parameters of an emission pass.
///
/// `range` mirrors the projection parameters. When the caller already ran
/// the explicit projection pass the sink's re-projection is a no-op, since
/// projection is idempotent for fixed options; a caller may instead skip
/// the explicit pass and let the sink do the slicing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmitOptions {
    pub with_labels: bool,
    pub range: RangeOptions,
}

/// Streaming consumer of an emitted result tree.
pub trait ReplySink {
    type Error;

    /// Frame the start of a partition level holding `len` members.
    fn array_start(&mut self, len: usize) -> Result<(), Self::Error>;

    /// Write one terminal series.
    fn write_series(&mut self, series: &Series, opts: &EmitOptions) -> Result<(), Self::Error>;
}

/// Reply sink producing RESP wire framing into any [`Write`].
pub struct RespReplySink<W: Write> {
    out: W,
}

impl<W: Write> RespReplySink<W> {
    pub fn new(out: W) -> Self {
        RespReplySink { out }
    }

    /// Unwrap the inner writer, e.g. to inspect a buffered reply.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_bulk(&mut self, data: &str) -> io::Result<()> {
        write!(self.out, "${}\r\n{}\r\n", data.len(), data)
    }
}

/// Values render the way Redis prints floats: integral values without a
/// fractional part.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

impl<W: Write> ReplySink for RespReplySink<W> {
    type Error = io::Error;

    fn array_start(&mut self, len: usize) -> io::Result<()> {
        write!(self.out, "*{}\r\n", len)
    }

    fn write_series(&mut self, series: &Series, opts: &EmitOptions) -> io::Result<()> {
        let view = project(series, &opts.range);

        write!(self.out, "*3\r\n")?;
        self.write_bulk(view.name())?;

        if opts.with_labels {
            write!(self.out, "*{}\r\n", view.labels().len())?;
            for label in view.labels() {
                write!(self.out, "*2\r\n")?;
                self.write_bulk(&label.key)?;
                self.write_bulk(&label.value)?;
            }
        } else {
            write!(self.out, "*0\r\n")?;
        }

        write!(self.out, "*{}\r\n", view.samples().len())?;
        for sample in view.samples() {
            write!(self.out, "*2\r\n:{}\r\n", sample.timestamp)?;
            self.write_bulk(&format_value(sample.value))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_series() -> Series {
        Series::new("s1")
            .with_label("region", "us")
            .with_samples([(1, 100.0), (2, 95.5)])
    }

    #[test]
    fn test_resp_series_framing() {
        let mut sink = RespReplySink::new(Vec::new());
        let opts = EmitOptions {
            with_labels: true,
            range: RangeOptions::all(),
        };
        sink.write_series(&sample_series(), &opts).unwrap();

        let reply = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            reply,
            "*3\r\n\
             $2\r\ns1\r\n\
             *1\r\n*2\r\n$6\r\nregion\r\n$2\r\nus\r\n\
             *2\r\n\
             *2\r\n:1\r\n$3\r\n100\r\n\
             *2\r\n:2\r\n$4\r\n95.5\r\n"
        );
    }

    #[test]
    fn test_resp_without_labels() {
        let mut sink = RespReplySink::new(Vec::new());
        sink.write_series(&sample_series(), &EmitOptions::default())
            .unwrap();

        let reply = String::from_utf8(sink.into_inner()).unwrap();
        assert!(reply.contains("*0\r\n"));
        assert!(!reply.contains("region"));
    }

    #[test]
    fn test_sink_applies_range_when_projection_skipped() {
        let mut sink = RespReplySink::new(Vec::new());
        let opts = EmitOptions {
            with_labels: false,
            range: RangeOptions::between(2, 2),
        };
        sink.write_series(&sample_series(), &opts).unwrap();

        let reply = String::from_utf8(sink.into_inner()).unwrap();
        assert!(reply.contains(":2\r\n"));
        assert!(!reply.contains(":1\r\n"));
    }

    #[test]
    fn test_array_start_framing() {
        let mut sink = RespReplySink::new(Vec::new());
        sink.array_start(2).unwrap();
        assert_eq!(sink.into_inner(), b"*2\r\n");
    }
}
