//! Signed access codes carried in ticket and badge QR payloads.
//!
//! A code has the form `KIND.UUID.SIG`, where `KIND` is `TKT`, `SPK` or
//! `EXH`, and `SIG` is the hex encoding of the first 16 bytes of
//! HMAC-SHA256 over `KIND.UUID`. Scanners only ever see the string; the
//! signature lets the check-in desk reject forged or mistyped codes before
//! touching the event store.

use common::AggregateId;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_LEN: usize = 16;

/// What an access code admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    Ticket,
    Speaker,
    Exhibitor,
}

impl CodeKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            CodeKind::Ticket => "TKT",
            CodeKind::Speaker => "SPK",
            CodeKind::Exhibitor => "EXH",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "TKT" => Some(CodeKind::Ticket),
            "SPK" => Some(CodeKind::Speaker),
            "EXH" => Some(CodeKind::Exhibitor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CodeKind::Ticket => "ticket",
            CodeKind::Speaker => "speaker",
            CodeKind::Exhibitor => "exhibitor",
        }
    }
}

/// A verified access code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessCode {
    pub kind: CodeKind,
    pub id: AggregateId,
}

impl AccessCode {
    pub fn new(kind: CodeKind, id: AggregateId) -> Self {
        Self { kind, id }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodeError {
    #[error("Access code secret must be at least {min} bytes")]
    SecretTooShort { min: usize },

    #[error("Malformed access code")]
    Malformed,

    #[error("Unknown access code kind: {0}")]
    UnknownKind(String),

    #[error("Access code signature is invalid")]
    BadSignature,
}

/// Signs and verifies access codes with a server-side secret.
#[derive(Clone)]
pub struct AccessCodeSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for AccessCodeSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessCodeSigner").finish_non_exhaustive()
    }
}

impl AccessCodeSigner {
    pub const MIN_SECRET_LEN: usize = 16;

    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, CodeError> {
        let secret = secret.as_ref();
        if secret.len() < Self::MIN_SECRET_LEN {
            return Err(CodeError::SecretTooShort {
                min: Self::MIN_SECRET_LEN,
            });
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| CodeError::SecretTooShort {
            min: Self::MIN_SECRET_LEN,
        })?;
        Ok(Self { mac })
    }

    /// Produces the QR payload for `code`.
    pub fn sign(&self, code: AccessCode) -> String {
        let body = format!("{}.{}", code.kind.prefix(), code.id);
        let signature = hex::encode(self.tag(&body));
        format!("{body}.{signature}")
    }

    /// Parses `raw` and checks its signature in constant time.
    pub fn verify(&self, raw: &str) -> Result<AccessCode, CodeError> {
        let raw = raw.trim();
        let (body, signature) = raw.rsplit_once('.').ok_or(CodeError::Malformed)?;
        let (prefix, id) = body.split_once('.').ok_or(CodeError::Malformed)?;

        let kind =
            CodeKind::from_prefix(prefix).ok_or_else(|| CodeError::UnknownKind(prefix.to_string()))?;
        let id = AggregateId::parse(id).map_err(|_| CodeError::Malformed)?;

        let provided = hex::decode(signature).map_err(|_| CodeError::Malformed)?;
        if provided.len() != SIGNATURE_LEN {
            return Err(CodeError::Malformed);
        }

        // Non-canonical spellings of the same uuid are rejected.
        let canonical = format!("{}.{}", kind.prefix(), id);
        if canonical != body {
            return Err(CodeError::BadSignature);
        }

        let expected = self.tag(&canonical);
        if bool::from(expected[..].ct_eq(&provided[..])) {
            Ok(AccessCode { kind, id })
        } else {
            Err(CodeError::BadSignature)
        }
    }

    fn tag(&self, body: &str) -> [u8; SIGNATURE_LEN] {
        let mut mac = self.mac.clone();
        mac.update(body.as_bytes());
        let full = mac.finalize().into_bytes();

        let mut tag = [0u8; SIGNATURE_LEN];
        tag.copy_from_slice(&full[..SIGNATURE_LEN]);
        tag
    }
}
