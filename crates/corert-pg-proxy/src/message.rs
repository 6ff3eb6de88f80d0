use corert_errors::{Code, Error};

use crate::constants::MAX_MESSAGE_LEN;
use crate::peekable::PeekableStream;

/// The 8-byte header every startup-phase message begins with: total
/// length (including these 8 bytes), then a version/request code
/// (spec.md §4.13 `PEEK_STARTUP`).
pub struct StartupHeader {
    pub len: u32,
    pub code: u32,
}

pub async fn read_startup_header(stream: &mut PeekableStream) -> Result<StartupHeader, Error> {
    let mut buf = [0u8; 8];
    stream.read_exact(&mut buf).await.map_err(io_err)?;
    let len = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    let code = u32::from_be_bytes(buf[4..8].try_into().unwrap());
    check_len(len)?;
    Ok(StartupHeader { len, code })
}

/// A type-tagged protocol message, used everywhere after the startup
/// handshake (auth sub-messages, `BackendKeyData`, `ErrorResponse`, ...).
pub struct Message {
    pub tag: u8,
    pub body: Vec<u8>,
}

pub async fn read_message(stream: &mut PeekableStream) -> Result<Message, Error> {
    let tag = stream.read_u8().await.map_err(io_err)?;
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.map_err(io_err)?;
    let len = u32::from_be_bytes(len_buf);
    check_len(len)?;
    let body_len = (len as usize).saturating_sub(4);
    let mut body = vec![0u8; body_len];
    stream.read_exact(&mut body).await.map_err(io_err)?;
    Ok(Message { tag, body })
}

pub async fn write_message(stream: &mut PeekableStream, tag: u8, body: &[u8]) -> Result<(), Error> {
    let len = (body.len() as u32) + 4;
    stream.write_all(&[tag]).await.map_err(io_err)?;
    stream.write_all(&len.to_be_bytes()).await.map_err(io_err)?;
    stream.write_all(body).await.map_err(io_err)?;
    stream.flush().await.map_err(io_err)
}

/// Writes an untagged message (`StartupMessage`, `SSLRequest`,
/// `CancelRequest`): 4-byte length (including itself) then the body.
pub async fn write_untagged(stream: &mut PeekableStream, body: &[u8]) -> Result<(), Error> {
    let len = (body.len() as u32) + 4;
    stream.write_all(&len.to_be_bytes()).await.map_err(io_err)?;
    stream.write_all(body).await.map_err(io_err)?;
    stream.flush().await.map_err(io_err)
}

/// Parses a startup parameter block: null-terminated `key`/`value` pairs
/// terminated by a final empty-string (a lone `0x00`) (spec.md §4.13
/// `STARTUP`).
pub fn parse_params(body: &[u8]) -> Result<Vec<(String, String)>, Error> {
    let mut params = Vec::new();
    let mut idx = 0;
    loop {
        let key_start = idx;
        let key_end = find_nul(body, idx).ok_or_else(|| truncated_params_err())?;
        if key_end == key_start {
            break;
        }
        idx = key_end + 1;
        let value_start = idx;
        let value_end = find_nul(body, idx).ok_or_else(|| truncated_params_err())?;
        idx = value_end + 1;
        params.push((
            String::from_utf8_lossy(&body[key_start..key_end]).into_owned(),
            String::from_utf8_lossy(&body[value_start..value_end]).into_owned(),
        ));
    }
    Ok(params)
}

fn find_nul(body: &[u8], from: usize) -> Option<usize> {
    body.get(from..)?.iter().position(|&b| b == 0).map(|p| p + from)
}

fn truncated_params_err() -> Error {
    Error::new(Code::InvalidArgument, "startup message parameter list is truncated")
}

/// Serializes a startup parameter block back into the null-terminated
/// wire form (used to forward a possibly-rewritten startup to the
/// backend).
pub fn encode_params(protocol_version: u32, params: &[(String, String)]) -> Vec<u8> {
    let mut body = protocol_version.to_be_bytes().to_vec();
    for (k, v) in params {
        body.extend_from_slice(k.as_bytes());
        body.push(0);
        body.extend_from_slice(v.as_bytes());
        body.push(0);
    }
    body.push(0);
    body
}

fn check_len(len: u32) -> Result<(), Error> {
    if len as usize > MAX_MESSAGE_LEN {
        return Err(Error::new(Code::ResourceExhausted, "postgres protocol message exceeds the 1 MiB limit"));
    }
    Ok(())
}

fn io_err(err: std::io::Error) -> Error {
    Error::new(Code::Unavailable, format!("postgres connection I/O error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_params_reads_pairs_until_terminator() {
        let mut body = Vec::new();
        body.extend_from_slice(b"user\0alice\0database\0mydb\0\0");
        let params = parse_params(&body).unwrap();
        assert_eq!(params, vec![("user".to_string(), "alice".to_string()), ("database".to_string(), "mydb".to_string())]);
    }

    #[test]
    fn encode_params_round_trips_through_parse() {
        let params = vec![("user".to_string(), "bob".to_string()), ("database".to_string(), "app".to_string())];
        let body = encode_params(196608, &params);
        let parsed = parse_params(&body[4..]).unwrap();
        assert_eq!(parsed, params);
    }

    #[test]
    fn dangling_key_without_value_is_an_error() {
        let body = b"user\0".to_vec();
        assert!(parse_params(&body).is_err());
    }
}
