//! Trace output for the CLI frontend.
//!
//! Writes one CSV row per solved frame to stdout (or any writer).

use std::io::{self, BufWriter, Write};

use crate::error::{CircuitError, Result};

/// CSV header written before the first row.
pub const HEADER: &str = "time,current,voltage,substeps";

/// One frame of a probed element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceRow {
    /// Simulation time at the end of the frame (seconds)
    pub time: f64,
    /// Time-averaged current through the probe (amperes)
    pub current: f64,
    /// Voltage across the probe at the end of the frame (volts)
    pub voltage: f64,
    /// Number of accepted sub-steps in the frame
    pub substeps: usize,
}

/// CSV trace writer.
pub struct TraceWriter<W: Write> {
    out: BufWriter<W>,
    header_written: bool,
}

impl TraceWriter<io::Stdout> {
    /// Create a trace writer on stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TraceWriter<W> {
    /// Create a trace writer over an arbitrary sink.
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
            header_written: false,
        }
    }

    /// Write a row, preceded by the header on first use.
    pub fn write_row(&mut self, row: &TraceRow) -> Result<()> {
        if !self.header_written {
            writeln!(self.out, "{}", HEADER).map_err(output_error)?;
            self.header_written = true;
        }
        writeln!(
            self.out,
            "{:.6},{:.9},{:.9},{}",
            row.time, row.current, row.voltage, row.substeps
        )
        .map_err(output_error)
    }

    /// Flush the output stream.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().map_err(output_error)
    }

    /// Flush and return the underlying sink.
    pub fn into_inner(self) -> Result<W> {
        self.out.into_inner().map_err(|e| output_error(e.into_error()))
    }
}

fn output_error(e: io::Error) -> CircuitError {
    CircuitError::Output {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_follow_header() {
        let mut writer = TraceWriter::new(Vec::new());
        writer
            .write_row(&TraceRow {
                time: 0.5,
                current: -0.25,
                voltage: 9.0,
                substeps: 3,
            })
            .unwrap();
        writer
            .write_row(&TraceRow {
                time: 1.0,
                current: 0.0,
                voltage: 0.0,
                substeps: 1,
            })
            .unwrap();

        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "0.500000,-0.250000000,9.000000000,3");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_empty_trace_has_no_header() {
        let writer = TraceWriter::new(Vec::new());
        assert!(writer.into_inner().unwrap().is_empty());
    }
}
