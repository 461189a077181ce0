//! Message envelope and wire codec.
//!
//! Every frame on the channel is a JSON object `{ "subject": <name>, "info": ... }`.
//! The `subject` names form a closed set; anything else is a decode error,
//! never a silent default. The `info` shape is determined by the subject, so
//! decoding is subject-directed and unambiguous.
//!
//! JSON has no NaN literal, but `verify-state-equals` must be able to carry
//! one (an unattached resource reports "no state known" as NaN). Numeric
//! payloads therefore encode NaN as the string `"NaN"` and decode it back.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Verifier-independent handle to the observed resource.
///
/// Minted by the producer in its first phase, carried in the
/// `object-handle-ready` message, and retired once the resource becomes
/// interactive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleId(pub Uuid);

impl HandleId {
    /// Mint a fresh handle.
    pub fn mint() -> Self {
        HandleId(Uuid::new_v4())
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message subjects - the closed set of message kinds on the channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subject {
    /// Producer → verifier: a freshly minted resource handle, start attaching.
    ObjectHandleReady,
    /// Producer → verifier: verify the observed state equals the carried number.
    VerifyStateEquals,
    /// Producer → verifier: verify readiness is still at its minimum.
    VerifyQuiescence,
    /// Producer → verifier: ack once the observed state reaches the carried number.
    AwaitStateValue,
    /// Producer → verifier: verify readiness has reached at least metadata-known.
    VerifyMinimumReadiness,
    /// Verifier → producer: acknowledgement echoing the triggering request.
    #[serde(rename = "acknowledgement-of-verification")]
    AckVerified,
    /// Either direction: terminal failure with a human-readable diagnostic.
    ProtocolError,
    /// Producer → verifier: the protocol ran to completion.
    WorkComplete,
}

impl Subject {
    /// The wire name for this subject.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Subject::ObjectHandleReady => "object-handle-ready",
            Subject::VerifyStateEquals => "verify-state-equals",
            Subject::VerifyQuiescence => "verify-quiescence",
            Subject::AwaitStateValue => "await-state-value",
            Subject::VerifyMinimumReadiness => "verify-minimum-readiness",
            Subject::AckVerified => "acknowledgement-of-verification",
            Subject::ProtocolError => "protocol-error",
            Subject::WorkComplete => "work-complete",
        }
    }

    /// Parse a wire name.
    ///
    /// Returns `None` for unknown names; callers turn that into
    /// [`WireError::UnknownSubject`], the malformed-message error class.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "object-handle-ready" => Some(Subject::ObjectHandleReady),
            "verify-state-equals" => Some(Subject::VerifyStateEquals),
            "verify-quiescence" => Some(Subject::VerifyQuiescence),
            "await-state-value" => Some(Subject::AwaitStateValue),
            "verify-minimum-readiness" => Some(Subject::VerifyMinimumReadiness),
            "acknowledgement-of-verification" => Some(Subject::AckVerified),
            "protocol-error" => Some(Subject::ProtocolError),
            "work-complete" => Some(Subject::WorkComplete),
            _ => None,
        }
    }

    /// Whether a message with this subject must carry an `info` payload.
    pub fn requires_info(&self) -> bool {
        matches!(
            self,
            Subject::ObjectHandleReady
                | Subject::VerifyStateEquals
                | Subject::AwaitStateValue
                | Subject::AckVerified
                | Subject::ProtocolError
        )
    }
}

/// The `info` payload of an envelope. Its shape depends on the subject.
#[derive(Clone, Debug, PartialEq)]
pub enum Info {
    /// A numeric state value. May be NaN.
    Number(f64),
    /// A resource handle.
    Handle(HandleId),
    /// A human-readable diagnostic.
    Text(String),
    /// An opaque echo of a prior request (acknowledgements only).
    Echo(Box<Envelope>),
}

/// A single message on the channel: `{ subject, info? }`.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub subject: Subject,
    pub info: Option<Info>,
}

impl Envelope {
    /// An envelope with no payload.
    pub fn new(subject: Subject) -> Self {
        Envelope {
            subject,
            info: None,
        }
    }

    /// An envelope carrying a payload.
    pub fn with_info(subject: Subject, info: Info) -> Self {
        Envelope {
            subject,
            info: Some(info),
        }
    }

    /// An acknowledgement echoing `request`.
    pub fn ack_of(request: Envelope) -> Self {
        Envelope::with_info(Subject::AckVerified, Info::Echo(Box::new(request)))
    }

    /// Encode to a JSON frame.
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(&self.to_value()).unwrap_or_default()
    }

    /// Decode a JSON frame.
    ///
    /// All malformed-message cases (bad JSON, non-object frame, missing or
    /// unknown subject, missing or ill-shaped info) surface as [`WireError`].
    pub fn decode(bytes: &[u8]) -> Result<Envelope, WireError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| WireError::BadJson(e.to_string()))?;
        Self::from_value(&value)
    }

    fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "subject".into(),
            Value::String(self.subject.wire_name().into()),
        );
        if let Some(info) = &self.info {
            let v = match info {
                Info::Number(n) if n.is_nan() => Value::String("NaN".into()),
                Info::Number(n) => serde_json::Number::from_f64(*n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                Info::Handle(h) => Value::String(h.to_string()),
                Info::Text(s) => Value::String(s.clone()),
                Info::Echo(e) => e.to_value(),
            };
            obj.insert("info".into(), v);
        }
        Value::Object(obj)
    }

    fn from_value(value: &Value) -> Result<Envelope, WireError> {
        let obj = value.as_object().ok_or(WireError::NotAnObject)?;
        let name = obj
            .get("subject")
            .and_then(Value::as_str)
            .ok_or(WireError::MissingSubject)?;
        let subject =
            Subject::from_wire(name).ok_or_else(|| WireError::UnknownSubject(name.into()))?;

        let info = match obj.get("info") {
            Some(v) => Some(Self::info_from_value(subject, v)?),
            None => None,
        };

        if info.is_none() && subject.requires_info() {
            return Err(WireError::MissingInfo { subject });
        }

        Ok(Envelope { subject, info })
    }

    /// Decode `info` with the shape the subject demands.
    fn info_from_value(subject: Subject, v: &Value) -> Result<Info, WireError> {
        match subject {
            Subject::VerifyStateEquals | Subject::AwaitStateValue => match v {
                Value::Number(n) => n
                    .as_f64()
                    .map(Info::Number)
                    .ok_or_else(|| WireError::bad_info(subject, "non-f64 number")),
                Value::String(s) if s == "NaN" => Ok(Info::Number(f64::NAN)),
                _ => Err(WireError::bad_info(subject, "expected a number")),
            },
            Subject::ObjectHandleReady => {
                let s = v
                    .as_str()
                    .ok_or_else(|| WireError::bad_info(subject, "expected a handle string"))?;
                let uuid = Uuid::parse_str(s)
                    .map_err(|_| WireError::bad_info(subject, "unparseable handle"))?;
                Ok(Info::Handle(HandleId(uuid)))
            }
            Subject::AckVerified => {
                let echoed = Self::from_value(v)?;
                Ok(Info::Echo(Box::new(echoed)))
            }
            Subject::ProtocolError => {
                let s = v
                    .as_str()
                    .ok_or_else(|| WireError::bad_info(subject, "expected diagnostic text"))?;
                Ok(Info::Text(s.into()))
            }
            // Subjects that carry no payload tolerate only absence.
            Subject::VerifyQuiescence | Subject::VerifyMinimumReadiness | Subject::WorkComplete => {
                Err(WireError::bad_info(subject, "unexpected info payload"))
            }
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.info {
            None => write!(f, "{{subject={}}}", self.subject.wire_name()),
            Some(Info::Number(n)) => {
                write!(f, "{{subject={}, info={}}}", self.subject.wire_name(), n)
            }
            Some(Info::Handle(h)) => {
                write!(f, "{{subject={}, info={}}}", self.subject.wire_name(), h)
            }
            Some(Info::Text(s)) => {
                write!(f, "{{subject={}, info={:?}}}", self.subject.wire_name(), s)
            }
            Some(Info::Echo(e)) => {
                write!(f, "{{subject={}, info={}}}", self.subject.wire_name(), e)
            }
        }
    }
}

/// Errors that can occur while decoding a frame.
#[derive(Clone, Debug, PartialEq)]
pub enum WireError {
    /// Frame is not a JSON object
    NotAnObject,
    /// No `subject` field
    MissingSubject,
    /// `subject` is outside the closed set
    UnknownSubject(String),
    /// Subject requires an `info` payload but none was present
    MissingInfo { subject: Subject },
    /// `info` payload has the wrong shape for the subject
    BadInfo {
        subject: Subject,
        detail: &'static str,
    },
    /// Frame is not valid JSON
    BadJson(String),
}

impl WireError {
    fn bad_info(subject: Subject, detail: &'static str) -> Self {
        WireError::BadInfo { subject, detail }
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::NotAnObject => write!(f, "frame is not a JSON object"),
            WireError::MissingSubject => write!(f, "frame has no subject field"),
            WireError::UnknownSubject(s) => write!(f, "unrecognized subject: {:?}", s),
            WireError::MissingInfo { subject } => {
                write!(f, "subject {} requires an info payload", subject.wire_name())
            }
            WireError::BadInfo { subject, detail } => {
                write!(f, "bad info for subject {}: {}", subject.wire_name(), detail)
            }
            WireError::BadJson(e) => write!(f, "frame is not valid JSON: {}", e),
        }
    }
}
