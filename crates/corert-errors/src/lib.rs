//! Structured error value (spec.md C9).
//!
//! Mirrors the shape of `google.rpc.Code`/gRPC status codes, the idiom the
//! rest of the corpus reaches for when it needs a closed error taxonomy at a
//! service boundary (see `libdd-trace-utils/src/msgpack_decoder/decode/error.rs`
//! for the same enum-with-Display pattern at smaller scale).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock};

use corert_common::bug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod details;
pub use details::{register_detail, Detail, DetailType};
use details::DetailRegistration;

/// The closed set of 17 error codes (spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    Ok,
    Canceled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl Code {
    /// Maps to the HTTP status table in spec.md §4.9.
    pub fn http_status(self) -> u16 {
        match self {
            Code::Ok => 200,
            Code::Canceled => 499,
            Code::InvalidArgument => 400,
            Code::NotFound => 404,
            Code::PermissionDenied => 403,
            Code::Unauthenticated => 401,
            Code::Internal => 500,
            Code::Unavailable => 503,
            Code::DeadlineExceeded => 504,
            Code::Unimplemented => 501,
            Code::ResourceExhausted => 429,
            Code::AlreadyExists | Code::Aborted => 409,
            Code::Unknown
            | Code::FailedPrecondition
            | Code::OutOfRange
            | Code::DataLoss => 500,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self).unwrap_or(Value::Null);
        write!(f, "{}", s.as_str().unwrap_or("unknown"))
    }
}

/// A structured error: closed code, message, optional polymorphic details,
/// internal-only metadata, a captured stack, and a wrapped cause.
#[derive(Debug)]
pub struct Error {
    pub code: Code,
    pub message: String,
    pub details: Option<Box<dyn Detail>>,
    pub meta: HashMap<String, Value>,
    pub stack: Option<corert_stack::CapturedStack>,
    pub cause: Option<Box<Error>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.joined_message())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl Error {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Error {
            code,
            message: message.into(),
            details: None,
            meta: HashMap::new(),
            stack: Some(corert_stack::capture_all(1)),
            cause: None,
        }
    }

    pub fn with_details(mut self, details: Box<dyn Detail>) -> Self {
        self.details = Some(details);
        self
    }

    /// Message joined with every wrapped cause's message, innermost last,
    /// matching the wire format's `"<joined underlying messages>"`.
    pub fn joined_message(&self) -> String {
        let mut parts = vec![self.message.clone()];
        let mut cur = self.cause.as_deref();
        while let Some(c) = cur {
            if !c.message.is_empty() {
                parts.push(c.message.clone());
            }
            cur = c.cause.as_deref();
        }
        parts.retain(|p| !p.is_empty());
        parts.join(": ")
    }

    /// Zips a flat `key, value, key, value, ...` list into the meta map.
    /// An odd-length list is a programming error (spec.md §4.9, §7): it can
    /// only happen from a call-site typo, so it is surfaced immediately.
    fn apply_meta_pairs(&mut self, pairs: &[Value]) {
        if pairs.len() % 2 != 0 {
            bug("metadata pairs must come in an even count");
        }
        for chunk in pairs.chunks_exact(2) {
            let key = chunk[0].as_str().map(str::to_string).unwrap_or_else(|| chunk[0].to_string());
            self.meta.insert(key, chunk[1].clone());
        }
    }
}

/// `Wrap(err, msg, metaPairs...)`: inherits code and details from `err` if
/// it is already a structured [`Error`]; otherwise `code = Unknown`.
/// Captures a stack at the wrap site unless inheriting one. Returns `None`
/// if `err` is `None` (Go's `nil` in, `nil` out). `meta_pairs` is a flat
/// `key, value, key, value, ...` list, mirroring the variadic Go call site.
pub fn wrap(err: Option<Error>, msg: impl Into<String>, meta_pairs: &[Value]) -> Option<Error> {
    let err = err?;
    let msg = msg.into();
    let mut wrapped = Error {
        code: err.code,
        message: msg,
        details: err.details.as_ref().map(|d| d.clone_box()),
        meta: HashMap::new(),
        stack: Some(corert_stack::capture_all(1)),
        cause: Some(Box::new(err)),
    };
    wrapped.apply_meta_pairs(meta_pairs);
    Some(wrapped)
}

/// `WrapCode(err, code, msg, metaPairs...)`: like [`wrap`] but forces the
/// code. Returns `None` if `code == Code::Ok` or `err` is `None`.
pub fn wrap_code(
    err: Option<Error>,
    code: Code,
    msg: impl Into<String>,
    meta_pairs: &[Value],
) -> Option<Error> {
    if code == Code::Ok {
        return None;
    }
    let err = err?;
    let msg = msg.into();
    let mut wrapped = Error {
        code,
        message: msg,
        details: err.details.as_ref().map(|d| d.clone_box()),
        meta: HashMap::new(),
        stack: Some(corert_stack::capture_all(1)),
        cause: Some(Box::new(err)),
    };
    wrapped.apply_meta_pairs(meta_pairs);
    Some(wrapped)
}

/// Coerces an arbitrary error into structured form; `Code::Unknown` if it
/// isn't already one.
pub fn convert(err: &(dyn std::error::Error + 'static)) -> Error {
    Error::new(Code::Unknown, err.to_string())
}

pub fn http_status(err: &Error) -> u16 {
    err.code.http_status()
}

/// `{"code", "message", "details"}` JSON body for the HTTP boundary
/// (spec.md §6, §4.9). `None` maps to the all-defaults `ok` body.
pub fn http_body(err: Option<&Error>) -> Value {
    match err {
        None => serde_json::json!({ "code": "ok", "message": "", "details": Value::Null }),
        Some(e) => serde_json::json!({
            "code": serde_json::to_value(e.code).unwrap_or(Value::String("unknown".into())),
            "message": e.joined_message(),
            "details": e.details.as_ref().map(|d| d.to_json()).unwrap_or(Value::Null),
        }),
    }
}

pub fn http_status_for(err: Option<&Error>) -> u16 {
    err.map(|e| e.code.http_status()).unwrap_or(200)
}

/// Writes the `http_body` JSON for `err` to `w`, with no trailing newline.
/// Status-line/header framing is the caller's responsibility (the core
/// does not perform network I/O, per spec.md §1).
pub fn http_error(w: &mut impl std::io::Write, err: Option<&Error>) -> std::io::Result<()> {
    let body = http_body(err);
    w.write_all(body.to_string().as_bytes())
}

/// Self-describing serialized form used by [`round_trip`]: code, message,
/// meta, and details tagged by their registered type name (dropped if the
/// receiving process has no codec registered for that name).
#[derive(Serialize, Deserialize)]
struct WireError {
    code: Code,
    message: String,
    meta: HashMap<String, Value>,
    details: Option<WireDetails>,
}

#[derive(Serialize, Deserialize)]
struct WireDetails {
    type_name: String,
    value: Value,
}

fn registry() -> &'static Mutex<HashMap<&'static str, DetailRegistration>> {
    static REGISTRY: OnceLock<Mutex<HashMap<&'static str, DetailRegistration>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

pub(crate) fn registry_insert(name: &'static str, reg: DetailRegistration) {
    registry().lock().unwrap().insert(name, reg);
}

fn serialize_for_wire(err: &Error) -> WireError {
    WireError {
        code: err.code,
        message: err.joined_message(),
        meta: err.meta.clone(),
        details: err.details.as_ref().map(|d| WireDetails {
            type_name: d.type_name().to_string(),
            value: d.to_json(),
        }),
    }
}

fn deserialize_from_wire(wire: WireError) -> Error {
    let details = wire.details.and_then(|d| {
        registry()
            .lock()
            .unwrap()
            .get(d.type_name.as_str())
            .and_then(|reg| (reg.from_json)(&d.value))
    });
    Error {
        code: wire.code,
        message: wire.message,
        details,
        meta: wire.meta,
        stack: None,
        cause: None,
    }
}

/// Serializes `err` through the self-describing wire codec and immediately
/// parses it back, as a receiver on the other side of a process boundary
/// would. If no codec is registered for the details' type name, details are
/// dropped but code/message/meta survive (spec.md §4.9).
pub fn round_trip(err: &Error) -> Result<Error, serde_json::Error> {
    let wire = serialize_for_wire(err);
    let bytes = serde_json::to_vec(&wire)?;
    let parsed: WireError = serde_json::from_slice(&bytes)?;
    Ok(deserialize_from_wire(parsed))
}
