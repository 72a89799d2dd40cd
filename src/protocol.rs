use rand::Rng;
use thiserror::Error;

/// Fixed port the relay server listens on.
pub const PORT: u16 = 5555;

/// Largest message the protocol carries. One socket read yields one logical
/// message; payloads never span the ceiling.
pub const MESSAGE_CEILING: usize = 2048;

pub const START_MESSAGE: &str = "START";
pub const CLIENT_LEFT_MESSAGE: &str = "CLIENT LEFT";
const SPECS_TAG: &str = "SPECS,";
const BOARD_TAG: &str = "BOARD,";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unrecognized message {0:?}")]
    Unrecognized(String),
    #[error("malformed SPECS message: {0}")]
    BadSpecs(String),
    #[error("malformed BOARD message: non-digit cell payload")]
    BadBoard,
}

/// Every message the relay protocol exchanges. Plain text on the wire, one
/// message per read/write, no framing beyond that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Joiner announcing itself to the host.
    Start,
    /// The 4-digit session pin; sent by the server on connect and echoed
    /// back by the joiner to authenticate.
    Pin(String),
    /// Host telling the joiner how to build its board.
    Specs { dim: usize, rows: usize },
    /// Row-major cell codes of a whole board, sent on turn commit.
    Board(String),
    /// Relay-generated sentinel: the other peer disconnected.
    ClientLeft,
    /// The empty message, a forfeit signal.
    Forfeit,
}

impl Message {
    pub fn encode(&self) -> String {
        match self {
            Message::Start => START_MESSAGE.to_string(),
            Message::Pin(pin) => pin.clone(),
            Message::Specs { dim, rows } => format!("{SPECS_TAG}{dim},{rows}"),
            Message::Board(cells) => format!("{BOARD_TAG}{cells}"),
            Message::ClientLeft => CLIENT_LEFT_MESSAGE.to_string(),
            Message::Forfeit => String::new(),
        }
    }

    pub fn parse(raw: &str) -> Result<Message, ProtocolError> {
        if raw.is_empty() {
            return Ok(Message::Forfeit);
        }
        if raw == START_MESSAGE {
            return Ok(Message::Start);
        }
        if raw == CLIENT_LEFT_MESSAGE {
            return Ok(Message::ClientLeft);
        }
        if let Some(rest) = raw.strip_prefix(SPECS_TAG) {
            let mut fields = rest.split(',');
            let dim = fields.next().and_then(|f| f.parse::<usize>().ok());
            let rows = fields.next().and_then(|f| f.parse::<usize>().ok());
            return match (dim, rows, fields.next()) {
                (Some(dim), Some(rows), None) => Ok(Message::Specs { dim, rows }),
                _ => Err(ProtocolError::BadSpecs(rest.to_string())),
            };
        }
        if let Some(cells) = raw.strip_prefix(BOARD_TAG) {
            if cells.is_empty() || !cells.bytes().all(|b| (b'0'..=b'4').contains(&b)) {
                return Err(ProtocolError::BadBoard);
            }
            return Ok(Message::Board(cells.to_string()));
        }
        if raw.len() == 4 && raw.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(Message::Pin(raw.to_string()));
        }
        Err(ProtocolError::Unrecognized(raw.chars().take(32).collect()))
    }
}

/// Host-generated 4-digit session pin.
pub fn generate_pin() -> String {
    rand::thread_rng().gen_range(1000..10000).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_parse_round_trip() {
        let messages = [
            Message::Start,
            Message::Pin("0412".to_string()),
            Message::Specs { dim: 10, rows: 3 },
            Message::Board("0102".repeat(16)),
            Message::ClientLeft,
            Message::Forfeit,
        ];
        for message in messages {
            assert_eq!(Message::parse(&message.encode()).unwrap(), message);
        }
    }

    #[test]
    fn test_empty_message_is_forfeit() {
        assert_eq!(Message::parse("").unwrap(), Message::Forfeit);
    }

    #[test]
    fn test_pin_must_be_four_digits() {
        assert_eq!(Message::parse("1234").unwrap(), Message::Pin("1234".to_string()));
        assert!(matches!(Message::parse("123"), Err(ProtocolError::Unrecognized(_))));
        assert!(matches!(Message::parse("12345"), Err(ProtocolError::Unrecognized(_))));
        assert!(matches!(Message::parse("12a4"), Err(ProtocolError::Unrecognized(_))));
    }

    #[test]
    fn test_specs_requires_two_integers() {
        assert_eq!(Message::parse("SPECS,8,2").unwrap(), Message::Specs { dim: 8, rows: 2 });
        assert!(matches!(Message::parse("SPECS,8"), Err(ProtocolError::BadSpecs(_))));
        assert!(matches!(Message::parse("SPECS,8,x"), Err(ProtocolError::BadSpecs(_))));
        assert!(matches!(Message::parse("SPECS,8,2,9"), Err(ProtocolError::BadSpecs(_))));
    }

    #[test]
    fn test_board_payload_must_be_cell_codes() {
        assert_eq!(Message::parse("BOARD,0142").unwrap(), Message::Board("0142".to_string()));
        assert_eq!(Message::parse("BOARD,0105"), Err(ProtocolError::BadBoard));
        assert_eq!(Message::parse("BOARD,"), Err(ProtocolError::BadBoard));
    }

    #[test]
    fn test_unknown_text_is_rejected() {
        assert!(matches!(Message::parse("HELLO"), Err(ProtocolError::Unrecognized(_))));
    }

    #[test]
    fn test_generated_pin_shape() {
        for _ in 0..50 {
            let pin = generate_pin();
            assert_eq!(pin.len(), 4);
            assert!(pin.bytes().all(|b| b.is_ascii_digit()));
            assert!(pin.parse::<u32>().unwrap() >= 1000);
        }
    }
}
