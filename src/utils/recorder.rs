//! Records bus traffic to a text file, one `Sent: tx E5:71` / `Recv: 50:7A:32` line per message

use std::{fmt, str::FromStr};

use cec_protocol::Frame;
use futures::SinkExt;
use tokio::{fs::File, sync::mpsc};
use tokio_util::codec::{FramedWrite, LinesCodec};

use crate::transport::BusRequest;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Sent(String),
    Received(Frame),
}

impl FromStr for Message {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, rest) = s.split_once(": ").ok_or(())?;
        match prefix {
            "Sent" => Ok(Message::Sent(rest.to_string())),
            "Recv" => Ok(Message::Received(Frame::from_hex(rest).map_err(|_| ())?)),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Sent(line) => write!(f, "Sent: {}", line),
            Message::Received(frame) => write!(f, "Recv: {}", frame.to_hex()),
        }
    }
}

pub struct Recorder {
    tx: mpsc::UnboundedSender<Message>,
}

impl Recorder {
    pub fn new(file: File) -> Self {
        let mut framed = FramedWrite::new(file, LinesCodec::new());
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = framed.send(msg.to_string()).await {
                    log::warn!("traffic recorder stopped: {}", e);
                    break;
                }
            }
        });

        Recorder { tx }
    }

    pub fn feed_sent(&mut self, request: &BusRequest) {
        let _ = self.tx.send(Message::Sent(request.to_line()));
    }

    pub fn feed_recv(&mut self, frame: &Frame) {
        let _ = self.tx.send(Message::Received(frame.clone()));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        let msg: Message = "Recv: 50:7A:32".parse().unwrap();
        assert_eq!(msg, Message::Received(Frame::from_hex("50:7a:32").unwrap()));
        assert_eq!(msg.to_string(), "Recv: 50:7A:32");

        let msg: Message = "Sent: tx E5:71".parse().unwrap();
        assert_eq!(msg, Message::Sent("tx E5:71".to_string()));
        assert!("Garbage".parse::<Message>().is_err());
    }
}
