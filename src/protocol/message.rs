//! Message codec.
//!
//! Text travels as raw UTF-8 with no framing, so a read that carries only
//! part of a line (or several lines) is still surfaced as text. Control
//! signals start with a reserved NUL byte followed by a kind byte. A single
//! read may hold text and control frames back to back; [`Message::decode`]
//! splits them at the NUL.
//!
//! NUL never appears in console input, so user text (including text equal
//! to the rejection notice) is never mistaken for a control signal.

use thiserror::Error;

/// Fixed human-readable text carried by a rejection notice.
pub const REJECTION_NOTICE: &str = "Connection rejected: maximum connection limit reached";

const CONTROL_PREFIX: u8 = 0x00;

const CONTROL_REJECTED: u8 = 0x01;
const CONTROL_EXIT: u8 = 0x02;

/// Errors produced while decoding a received chunk.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("control prefix without a kind byte")]
    Truncated,
    #[error("unknown control kind {0:#04x}")]
    UnknownControl(u8),
}

/// Control signals exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// The listener refused the connection.
    Rejected { reason: String },
    /// The dialer is leaving.
    Exit,
}

/// One application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Control(Control),
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Message::Text(text.into())
    }

    /// The rejection notice sent on a pool-full connection.
    pub fn rejection() -> Self {
        Message::Control(Control::Rejected {
            reason: REJECTION_NOTICE.to_string(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Message::Text(text) => text.as_bytes().to_vec(),
            Message::Control(Control::Rejected { reason }) => {
                let mut out = Vec::with_capacity(reason.len() + 2);
                out.extend_from_slice(&[CONTROL_PREFIX, CONTROL_REJECTED]);
                out.extend_from_slice(reason.as_bytes());
                out
            }
            Message::Control(Control::Exit) => vec![CONTROL_PREFIX, CONTROL_EXIT],
        }
    }

    /// Split one read into the messages it carries.
    ///
    /// Invalid UTF-8 is replaced rather than rejected. An unknown control
    /// kind yields an error and decoding resumes at the next control prefix.
    pub fn decode(bytes: &[u8]) -> Frames<'_> {
        Frames { rest: bytes }
    }
}

/// Iterator over the messages in one read, see [`Message::decode`].
#[derive(Debug)]
pub struct Frames<'a> {
    rest: &'a [u8],
}

impl<'a> Frames<'a> {
    /// Take bytes up to (not including) the next control prefix.
    fn take_body(&mut self) -> &'a [u8] {
        let end = self
            .rest
            .iter()
            .position(|&b| b == CONTROL_PREFIX)
            .unwrap_or(self.rest.len());
        let (body, rest) = self.rest.split_at(end);
        self.rest = rest;
        body
    }
}

impl Iterator for Frames<'_> {
    type Item = Result<Message, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&first, after) = self.rest.split_first()?;
        if first != CONTROL_PREFIX {
            let body = self.take_body();
            return Some(Ok(Message::Text(String::from_utf8_lossy(body).into_owned())));
        }

        let Some((&kind, body)) = after.split_first() else {
            self.rest = &[];
            return Some(Err(DecodeError::Truncated));
        };
        self.rest = body;
        Some(match kind {
            CONTROL_REJECTED => Ok(Message::Control(Control::Rejected {
                reason: String::from_utf8_lossy(self.take_body()).into_owned(),
            })),
            CONTROL_EXIT => Ok(Message::Control(Control::Exit)),
            other => {
                self.take_body();
                Err(DecodeError::UnknownControl(other))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_ok(bytes: &[u8]) -> Vec<Message> {
        Message::decode(bytes).collect::<Result<_, _>>().unwrap()
    }

    #[test]
    fn rejection_text_typed_by_a_user_stays_text() {
        let typed = Message::text(REJECTION_NOTICE);
        assert_eq!(typed.encode(), REJECTION_NOTICE.as_bytes());
        assert_eq!(
            decode_ok(&typed.encode()),
            vec![Message::Text(REJECTION_NOTICE.to_string())]
        );
    }

    #[test]
    fn rejection_carries_notice() {
        match decode_ok(&Message::rejection().encode()).as_slice() {
            [Message::Control(Control::Rejected { reason })] => assert_eq!(reason, REJECTION_NOTICE),
            other => panic!("unexpected messages: {:?}", other),
        }
    }

    #[test]
    fn exit_is_two_bytes() {
        assert_eq!(Message::Control(Control::Exit).encode(), vec![0x00, 0x02]);
    }

    #[test]
    fn partial_line_is_still_text() {
        assert_eq!(decode_ok(b"defgh"), vec![Message::text("defgh")]);
    }

    #[test]
    fn text_and_exit_in_one_read_are_split() {
        let mut bytes = Message::text("hi").encode();
        bytes.extend(Message::Control(Control::Exit).encode());
        assert_eq!(
            decode_ok(&bytes),
            vec![Message::text("hi"), Message::Control(Control::Exit)]
        );
    }

    #[test]
    fn text_after_control_is_its_own_message() {
        let mut bytes = Message::rejection().encode();
        bytes.extend(Message::Control(Control::Exit).encode());
        bytes.extend(Message::text("late").encode());
        let messages = decode_ok(&bytes);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], Message::rejection());
        assert_eq!(messages[2], Message::text("late"));
    }

    #[test]
    fn bad_input() {
        assert_eq!(Message::decode(&[]).count(), 0);
        assert_eq!(
            Message::decode(&[0x00]).collect::<Vec<_>>(),
            vec![Err(DecodeError::Truncated)]
        );
        assert_eq!(
            Message::decode(&[0x00, 0x09, b'x', 0x00, 0x02]).collect::<Vec<_>>(),
            vec![
                Err(DecodeError::UnknownControl(0x09)),
                Ok(Message::Control(Control::Exit)),
            ]
        );
    }

    #[test]
    fn lossy_text() {
        assert_eq!(
            decode_ok(&[b'h', 0xff, b'i']),
            vec![Message::Text("h\u{fffd}i".to_string())]
        );
    }
}
