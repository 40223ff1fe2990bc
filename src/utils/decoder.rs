//! Human readable rendition of bus traffic
//!
//! Every request and received frame is printed to the given writer along with its decoded form.

use std::{fmt, io::Write, time::Instant};

use cec_protocol::{Command, Event, Frame};
use termcolor::{Color, ColorSpec, WriteColor};

use crate::transport::BusRequest;

pub struct Decoder {
    /// Only print decoded values, skipping the raw hex frames
    quiet: bool,
    w: Box<dyn WriteColor + Send + Sync>,
    start_instant: Instant,
}

impl Decoder {
    pub fn new(w: Box<dyn WriteColor + Send + Sync>, quiet: bool) -> Self {
        Decoder {
            quiet,
            w,
            start_instant: Instant::now(),
        }
    }

    /// Feed a request sent to the bus
    pub fn feed_sent(&mut self, request: &BusRequest) {
        match request {
            BusRequest::Frame(frame) => {
                let _ = self.print_frame(true, frame);
                let _ = self.print_decoded(true, Command::from_frame(frame));
            }
            BusRequest::Raw(line) => {
                let _ = self.print_decoded(true, line);
            }
        }
    }

    /// Feed a frame received from the bus
    pub fn feed_recv(&mut self, frame: &Frame) {
        let _ = self.print_frame(false, frame);
        match Event::from_frame(frame.clone()) {
            Ok(event) => {
                let _ = self.print_decoded(false, event);
            }
            Err(err) => {
                let _ = self.print_error(err);
            }
        }
    }

    fn print_frame(&mut self, sent: bool, frame: &Frame) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.print_direction(sent)?;
        let _ = self
            .w
            .set_color(ColorSpec::new().set_fg(Some(Color::White)).set_dimmed(true));
        writeln!(self.w, "{}", frame.to_hex())?;
        let _ = self.w.reset();
        Ok(())
    }

    fn print_decoded<T: fmt::Debug>(&mut self, sent: bool, value: T) -> std::io::Result<()> {
        self.print_direction(sent)?;
        let color = if sent { Color::Cyan } else { Color::Green };
        let _ = self.w.set_color(ColorSpec::new().set_fg(Some(color)));
        writeln!(self.w, "{:?}", value)?;
        let _ = self.w.reset();
        Ok(())
    }

    fn print_direction(&mut self, sent: bool) -> std::io::Result<()> {
        let elapsed = self.start_instant.elapsed().as_secs_f32();
        let direction = if sent {
            let _ = self.w.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)));
            "Sent"
        } else {
            let _ = self.w.set_color(ColorSpec::new().set_fg(Some(Color::Blue)));
            "Recv"
        };
        write!(self.w, "{:>8.3} {}: ", elapsed, direction)
    }

    fn print_error<T: fmt::Display>(&mut self, err: T) -> std::io::Result<()> {
        let _ = self.w.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
        writeln!(self.w, "undecodable frame: {}", err)?;
        let _ = self.w.reset();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use termcolor::{Buffer, BufferWriter, ColorChoice};

    use super::*;

    struct Shared(std::sync::Arc<std::sync::Mutex<Buffer>>);

    impl std::io::Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl WriteColor for Shared {
        fn supports_color(&self) -> bool {
            false
        }

        fn set_color(&mut self, _: &ColorSpec) -> std::io::Result<()> {
            Ok(())
        }

        fn reset(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_print() {
        let buffer = std::sync::Arc::new(std::sync::Mutex::new(
            BufferWriter::stderr(ColorChoice::Never).buffer(),
        ));
        let mut d = Decoder::new(Box::new(Shared(buffer.clone())), false);

        d.feed_sent(&BusRequest::Frame(Frame::from_hex("e5:71").unwrap()));
        d.feed_recv(&Frame::from_hex("50:7a:32").unwrap());
        d.feed_recv(&Frame::from_hex("50:7a").unwrap());

        let out = String::from_utf8_lossy(buffer.lock().unwrap().as_slice()).to_string();
        assert!(out.contains("E5:71"));
        assert!(out.contains("GiveAudioStatus"));
        assert!(out.contains("ReportAudioStatus"));
        assert!(out.contains("undecodable frame"));
    }
}
