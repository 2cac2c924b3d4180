//! Newline-delimited JSON message framing
//!
//! Wire format: one JSON envelope per line, UTF-8, terminated by `\n`.
//! Maximum line size: 64 KiB (sanity limit). A line that fails to parse is a
//! recoverable `Error::Protocol`; callers skip it and keep reading.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::protocol::Message;

/// Maximum allowed line length in bytes
const MAX_LINE_BYTES: u64 = 64 * 1024;

/// Read one message line from a stream.
///
/// EOF maps to `ConnectionClosed`; an empty or unparseable line maps to
/// `Protocol`. When a line exceeds the cap the read stops at the cap and the
/// remainder is consumed as garbage by subsequent reads until the next
/// newline resynchronizes the stream.
pub async fn read_message<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Message> {
    let mut line = String::new();
    let n = (&mut *reader)
        .take(MAX_LINE_BYTES)
        .read_line(&mut line)
        .await?;

    if n == 0 {
        return Err(Error::ConnectionClosed);
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(Error::Protocol("Empty line".into()));
    }

    Message::from_line(trimmed).map_err(|e| Error::Protocol(format!("Invalid message: {e}")))
}

/// Write one message line to a stream
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, msg: &Message) -> Result<()> {
    let mut line = msg
        .to_line()
        .map_err(|e| Error::Protocol(format!("Serialization failed: {e}")))?;
    line.push('\n');

    writer.write_all(line.as_bytes()).await?;

    // Flush to ensure delivery
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_line_roundtrip() {
        let msg = Message::JoinAccept;

        let mut buf = Vec::new();
        write_message(&mut buf, &msg).await.unwrap();
        assert!(buf.ends_with(b"\n"));

        let mut reader = BufReader::new(Cursor::new(buf));
        let decoded = read_message(&mut reader).await.unwrap();
        assert_eq!(decoded, Message::JoinAccept);
    }

    #[tokio::test]
    async fn test_eof_is_connection_closed() {
        let mut reader = BufReader::new(Cursor::new(Vec::new()));
        assert!(matches!(
            read_message(&mut reader).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_malformed_line_is_recoverable() {
        let mut buf = b"this is not json\n".to_vec();
        write_message(&mut buf, &Message::JoinAccept).await.unwrap();

        let mut reader = BufReader::new(Cursor::new(buf));

        // First line fails as a protocol error, not a closed connection
        assert!(matches!(
            read_message(&mut reader).await,
            Err(Error::Protocol(_))
        ));

        // The stream stays usable afterwards
        let decoded = read_message(&mut reader).await.unwrap();
        assert_eq!(decoded, Message::JoinAccept);
    }

    #[tokio::test]
    async fn test_blank_line_skipped_as_protocol_error() {
        let mut reader = BufReader::new(Cursor::new(b"\n".to_vec()));
        assert!(matches!(
            read_message(&mut reader).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_line_does_not_wedge_the_stream() {
        let mut buf = vec![b'x'; (MAX_LINE_BYTES as usize) + 100];
        buf.push(b'\n');
        write_message(&mut buf, &Message::JoinAccept).await.unwrap();

        let mut reader = BufReader::new(Cursor::new(buf));

        // The oversized line surfaces as protocol garbage (possibly split
        // across reads), never as a crash
        let mut errors = 0;
        loop {
            match read_message(&mut reader).await {
                Ok(msg) => {
                    assert_eq!(msg, Message::JoinAccept);
                    break;
                }
                Err(Error::Protocol(_)) => errors += 1,
                Err(e) => panic!("Unexpected error: {e}"),
            }
            assert!(errors < 10, "Stream failed to resynchronize");
        }
    }
}
