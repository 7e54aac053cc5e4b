//! Wire framing for the control protocol.
//!
//! Every frame is a big-endian `u32` byte count followed by that many bytes
//! of JSON. A session is a strict alternation of one [`CallFrame`] from the
//! client and one [`ReplyFrame`] from the server.

use crate::{ProcedureError, ProtocolError};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame either side will send or accept
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallFrame {
    pub seq: u64,
    pub procedure: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplyFrame {
    pub seq: u64,
    pub result: Result<serde_json::Value, ProcedureError>,
}

/// Read one frame.
///
/// Returns `Ok(None)` if the stream ends cleanly before the first byte of a
/// frame, which is how a peer says it's done.
pub async fn read_frame<S, T>(stream: &mut S) -> Result<Option<T>, ProtocolError>
where
    S: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;

    while filled < len_buf.len() {
        match stream.read(&mut len_buf[filled..]).await? {
            0 if filled == 0 => return Ok(None),
            0 => return Err(ProtocolError::Truncated),
            n => filled += n,
        }
    }

    let length = u32::from_be_bytes(len_buf) as usize;
    if length > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(length));
    }

    let mut buf = vec![0; length];
    stream.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::Truncated
        } else {
            ProtocolError::Io(e)
        }
    })?;

    tracing::trace!(length, "read frame");

    Ok(Some(serde_json::from_slice(&buf)?))
}

pub async fn write_frame<S, T>(stream: &mut S, frame: &T) -> Result<(), ProtocolError>
where
    S: AsyncWrite + Unpin,
    T: Serialize,
{
    let buf = serde_json::to_vec(frame)?;
    if buf.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(buf.len()));
    }

    // Checked against MAX_FRAME_LEN above
    stream.write_u32(buf.len() as u32).await?;
    stream.write_all(&buf).await?;
    stream.flush().await?;

    tracing::trace!(length = buf.len(), "wrote frame");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn eof_at_frame_boundary_is_clean() {
        let mut input: &[u8] = &[];

        let frame: Option<CallFrame> = read_frame(&mut input).await.unwrap();

        assert_eq!(frame, None);
    }

    #[tokio::test]
    async fn frames_follow_one_another() {
        let mut buf = Vec::new();
        let first = CallFrame {
            seq: 1,
            procedure: "Ping".to_string(),
            args: json!({}),
        };
        let second = CallFrame {
            seq: 2,
            procedure: "DisconnectConnection".to_string(),
            args: json!({ "name": "libera" }),
        };
        write_frame(&mut buf, &first).await.unwrap();
        write_frame(&mut buf, &second).await.unwrap();

        let mut input = buf.as_slice();
        assert_eq!(read_frame(&mut input).await.unwrap(), Some(first));
        assert_eq!(read_frame(&mut input).await.unwrap(), Some(second));
        assert_eq!(read_frame::<_, CallFrame>(&mut input).await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_args_default_to_null() {
        let body = br#"{"seq":7,"procedure":"Ping"}"#;
        let mut buf = (body.len() as u32).to_be_bytes().to_vec();
        buf.extend_from_slice(body);

        let frame: CallFrame = read_frame(&mut buf.as_slice()).await.unwrap().unwrap();

        assert_eq!(frame.seq, 7);
        assert_eq!(frame.args, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn partial_length_prefix_is_truncated() {
        let mut input: &[u8] = &[0, 0];

        let result = read_frame::<_, CallFrame>(&mut input).await;

        assert!(matches!(result, Err(ProtocolError::Truncated)));
    }

    #[tokio::test]
    async fn short_body_is_truncated() {
        let mut buf = 100u32.to_be_bytes().to_vec();
        buf.extend_from_slice(b"{\"seq\"");

        let result = read_frame::<_, CallFrame>(&mut buf.as_slice()).await;

        assert!(matches!(result, Err(ProtocolError::Truncated)));
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_before_reading() {
        let buf = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();

        let result = read_frame::<_, CallFrame>(&mut buf.as_slice()).await;

        assert!(matches!(result, Err(ProtocolError::FrameTooLarge(n)) if n == MAX_FRAME_LEN + 1));
    }

    #[tokio::test]
    async fn garbage_body_is_a_json_error() {
        let mut buf = 3u32.to_be_bytes().to_vec();
        buf.extend_from_slice(b"???");

        let result = read_frame::<_, CallFrame>(&mut buf.as_slice()).await;

        assert!(matches!(result, Err(ProtocolError::Json(_))));
    }

    #[tokio::test]
    async fn reply_errors_survive_the_wire() {
        let mut buf = Vec::new();
        let reply = ReplyFrame {
            seq: 3,
            result: Err(ProcedureError::NoSuchConnection("efnet".to_string())),
        };
        write_frame(&mut buf, &reply).await.unwrap();

        let decoded: ReplyFrame = read_frame(&mut buf.as_slice()).await.unwrap().unwrap();

        assert_eq!(decoded, reply);
    }
}
