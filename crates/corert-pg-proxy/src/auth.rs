use corert_errors::{Code, Error};
use md5::{Digest, Md5};

use crate::message::{read_message, write_message};
use crate::peekable::PeekableStream;

fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// `"md5" + hex(md5(hex(md5(password+user)) + salt))` (spec.md §4.13
/// `BACKEND_CONNECT`).
pub fn md5_password(user: &str, password: &str, salt: &[u8; 4]) -> String {
    let inner = md5_hex(format!("{password}{user}").as_bytes());
    let mut salted = inner.into_bytes();
    salted.extend_from_slice(salt);
    format!("md5{}", md5_hex(&salted))
}

pub(crate) fn error_response_message(body: &[u8]) -> String {
    let mut idx = 0;
    while idx < body.len() && body[idx] != 0 {
        let field_type = body[idx];
        idx += 1;
        let start = idx;
        while idx < body.len() && body[idx] != 0 {
            idx += 1;
        }
        let value = String::from_utf8_lossy(&body[start..idx]).into_owned();
        idx += 1;
        if field_type == b'M' {
            return value;
        }
    }
    "backend returned an error response with no message field".to_string()
}

/// Drives the backend side of authentication (spec.md §4.13
/// `BACKEND_CONNECT` → `authenticateBackend`): loops on `'R'`
/// authentication sub-messages until `AuthenticationOk`, replying with a
/// cleartext or MD5-hashed `PasswordMessage` as requested.
pub async fn authenticate_backend(stream: &mut PeekableStream, user: &str, password: Option<&str>) -> Result<(), Error> {
    loop {
        let msg = read_message(stream).await?;
        match msg.tag {
            b'R' => {
                if msg.body.len() < 4 {
                    return Err(Error::new(Code::Internal, "truncated authentication message from backend"));
                }
                let subtype = u32::from_be_bytes(msg.body[0..4].try_into().unwrap());
                match subtype {
                    0 => return Ok(()),
                    3 => {
                        let password = password.ok_or_else(|| Error::new(Code::Unauthenticated, "backend requires a cleartext password but none was provided"))?;
                        let mut body = password.as_bytes().to_vec();
                        body.push(0);
                        write_message(stream, b'p', &body).await?;
                    }
                    5 => {
                        if msg.body.len() < 8 {
                            return Err(Error::new(Code::Internal, "truncated MD5 salt from backend"));
                        }
                        let salt: [u8; 4] = msg.body[4..8].try_into().unwrap();
                        let password = password.ok_or_else(|| Error::new(Code::Unauthenticated, "backend requires an MD5 password but none was provided"))?;
                        let hashed = md5_password(user, password, &salt);
                        let mut body = hashed.into_bytes();
                        body.push(0);
                        write_message(stream, b'p', &body).await?;
                    }
                    other => return Err(Error::new(Code::Unimplemented, format!("unsupported backend authentication subtype {other}"))),
                }
            }
            b'E' => return Err(Error::new(Code::Unauthenticated, error_response_message(&msg.body))),
            other => return Err(Error::new(Code::Internal, format!("unexpected message '{}' during backend authentication", other as char))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_password_is_deterministic_and_prefixed() {
        let a = md5_password("alice", "hunter2", &[1, 2, 3, 4]);
        let b = md5_password("alice", "hunter2", &[1, 2, 3, 4]);
        assert_eq!(a, b);
        assert!(a.starts_with("md5"));
        assert_eq!(a.len(), 3 + 32);
    }

    #[test]
    fn md5_password_differs_per_salt() {
        let a = md5_password("alice", "hunter2", &[1, 2, 3, 4]);
        let b = md5_password("alice", "hunter2", &[4, 3, 2, 1]);
        assert_ne!(a, b);
    }

    #[test]
    fn error_response_extracts_message_field() {
        let mut body = Vec::new();
        body.push(b'S');
        body.extend_from_slice(b"FATAL\0");
        body.push(b'M');
        body.extend_from_slice(b"database \"x\" does not exist\0");
        body.push(0);
        assert_eq!(error_response_message(&body), "database \"x\" does not exist");
    }
}
