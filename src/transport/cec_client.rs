//! Talks to the bus through libcec's `cec-client` running as a child process
//!
//! Frames are sent by writing `tx E5:71` lines to its standard input. Its standard output carries
//! a traffic log, where received frames appear as
//!
//! ```text
//! TRAFFIC: [           12345]	>> 50:7a:32
//! ```
//!
//! and frames we transmitted are echoed with `<<`, which are skipped.

use std::{
    pin::Pin,
    process::Stdio,
    task::{Context, Poll},
};

use cec_protocol::{Frame, ParseError};
use futures::{Sink, Stream};
use futures_util::ready;
use pin_project::pin_project;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

use super::{BusRequest, CecError};

/// Adapter command ending the session
const QUIT: &str = "q";

type Writer = FramedWrite<ChildStdin, LinesCodec>;

#[pin_project]
pub struct CecClientTransport {
    // Dropped once closed, which closes the pipe
    stdin: Option<Writer>,
    #[pin]
    stdout: FramedRead<ChildStdout, LinesCodec>,

    // Killed when dropped
    #[allow(dead_code)]
    child: Child,

    quit_sent: bool,
}

impl CecClientTransport {
    pub fn spawn(program: &str, args: &[String], port: Option<&str>) -> Result<Self, CecError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .args(port)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                return Err(CecError::TransportFailure(
                    "child process has no stdio".to_string(),
                ))
            }
        };

        Ok(Self {
            stdin: Some(FramedWrite::new(stdin, LinesCodec::new())),
            stdout: FramedRead::new(stdout, LinesCodec::new()),
            child,
            quit_sent: false,
        })
    }
}

fn writer(stdin: &mut Option<Writer>) -> Result<Pin<&mut Writer>, CecError> {
    stdin
        .as_mut()
        .map(Pin::new)
        .ok_or(CecError::TransportClosed)
}

fn codec_error(e: LinesCodecError) -> CecError {
    match e {
        LinesCodecError::Io(e) => CecError::IOError(e),
        e => CecError::TransportFailure(e.to_string()),
    }
}

/// Extracts the frame received on a traffic log line. Lines that aren't incoming traffic, and
/// polling frames (header only), yield `None`.
pub fn parse_line(line: &str) -> Option<Result<Frame, ParseError>> {
    let (_, data) = line.split_once(">> ")?;
    match Frame::from_hex(data.trim()) {
        Err(ParseError::MissingOpcode) => None,
        res => Some(res),
    }
}

impl Stream for CecClientTransport {
    type Item = Result<Frame, CecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            let line = match ready!(this.stdout.as_mut().poll_next(cx)) {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Poll::Ready(Some(Err(codec_error(e)))),
                None => return Poll::Ready(None),
            };

            if line.starts_with("ERROR:") {
                log::warn!("cec-client: {}", line);
                continue;
            }

            match parse_line(&line) {
                Some(Ok(frame)) => return Poll::Ready(Some(Ok(frame))),
                Some(Err(e)) => log::warn!("unparseable traffic {:?}: {}", line, e),
                None => log::trace!("cec-client: {}", line),
            }
        }
    }
}

impl Sink<BusRequest> for CecClientTransport {
    type Error = CecError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let stdin = writer(self.project().stdin)?;
        Sink::<String>::poll_ready(stdin, cx).map_err(codec_error)
    }

    fn start_send(self: Pin<&mut Self>, item: BusRequest) -> Result<(), Self::Error> {
        let stdin = writer(self.project().stdin)?;
        Sink::<String>::start_send(stdin, item.to_line()).map_err(codec_error)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let stdin = writer(self.project().stdin)?;
        Sink::<String>::poll_flush(stdin, cx).map_err(codec_error)
    }

    /// Asks cec-client to quit, then closes its standard input
    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        let stdin = match this.stdin.as_mut() {
            Some(stdin) => stdin,
            None => return Poll::Ready(Ok(())),
        };

        if !*this.quit_sent {
            ready!(Sink::<String>::poll_ready(Pin::new(&mut *stdin), cx)).map_err(codec_error)?;
            Sink::<String>::start_send(Pin::new(&mut *stdin), QUIT.to_string())
                .map_err(codec_error)?;
            *this.quit_sent = true;
        }

        let res = ready!(Sink::<String>::poll_close(Pin::new(stdin), cx));
        *this.stdin = None;
        Poll::Ready(res.map_err(codec_error))
    }
}

#[cfg(test)]
mod test {
    use cec_protocol::{LogicalAddress, Opcode};

    use super::*;

    #[test]
    fn test_parse_line() {
        let frame = parse_line("TRAFFIC: [          160717]\t>> 50:7a:32")
            .unwrap()
            .unwrap();
        assert_eq!(frame.initiator, LogicalAddress::AudioSystem);
        assert_eq!(frame.destination, LogicalAddress::Tv);
        assert_eq!(frame.opcode, Opcode::ReportAudioStatus);

        // Our own frames and polls are skipped
        assert!(parse_line("TRAFFIC: [          160700]\t<< e5:71").is_none());
        assert!(parse_line("TRAFFIC: [          160700]\t>> 05").is_none());
        assert!(parse_line("DEBUG:   [          160700]\tcommand 'give audio status'").is_none());

        assert!(matches!(
            parse_line("TRAFFIC: [          160717]\t>> 05:zz"),
            Some(Err(ParseError::InvalidHex(_)))
        ));
    }

    #[test]
    fn test_request_lines() {
        let frame = Frame::from_hex("e5:44:41").unwrap();
        assert_eq!(BusRequest::Frame(frame).to_line(), "tx E5:44:41");
        assert_eq!(BusRequest::Raw("scan".to_string()).to_line(), "scan");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_process() {
        use std::time::Duration;

        use futures::{SinkExt, StreamExt};

        // `cat` writes our requests back to its output, standing in for the adapter's traffic log
        let mut transport = CecClientTransport::spawn("cat", &[], None).unwrap();
        transport
            .send(BusRequest::Raw("TRAFFIC: [1]\t>> 0f:36".to_string()))
            .await
            .unwrap();
        let frame = transport.next().await.unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Standby);
        assert!(frame.is_broadcast());

        // Closing the pipe ends the child's output even if it ignores the quit command
        transport.close().await.unwrap();
        let end = tokio::time::timeout(Duration::from_secs(3), transport.next())
            .await
            .expect("stream did not end after close");
        assert!(end.is_none());

        assert!(matches!(
            transport.send(BusRequest::Raw("scan".to_string())).await,
            Err(CecError::TransportClosed)
        ));
    }
}
