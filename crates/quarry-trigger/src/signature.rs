//! Build configuration signatures.
//!
//! A repository may carry a detached JWS next to its build configuration.
//! The signature is an HMAC keyed with the repository hash, and its payload
//! must be the configuration itself. Both compact (`header.payload.sig`) and
//! JSON serializations are accepted.

use crate::outcome::AdvisoryFailure;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey};
use quarry_core::build::Build;
use serde::Deserialize;
use tracing::debug;

/// Trust level established for a build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// No signature document, or an empty one.
    Unsigned,
    /// A signature was present but did not verify, or covers other content.
    Unverified,
    /// The signature verified and its payload is the configuration.
    Verified,
}

impl SignatureCheck {
    pub fn signed(self) -> bool {
        !matches!(self, SignatureCheck::Unsigned)
    }

    pub fn verified(self) -> bool {
        matches!(self, SignatureCheck::Verified)
    }

    /// Record the outcome on `build`.
    pub fn apply(self, build: &mut Build) {
        build.signed = self.signed();
        build.verified = self.verified();
    }
}

/// Outcome of a verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub check: SignatureCheck,
    /// Why a present signature was not trusted.
    pub advisory: Option<AdvisoryFailure>,
}

impl Verification {
    fn unsigned() -> Self {
        Self {
            check: SignatureCheck::Unsigned,
            advisory: None,
        }
    }

    fn rejected(check: SignatureCheck, advisory: AdvisoryFailure) -> Self {
        Self {
            check,
            advisory: Some(advisory),
        }
    }
}

/// Verifier for detached configuration signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Verify `document` against the repository `key` and the raw
    /// configuration bytes.
    pub fn verify(&self, document: Option<&[u8]>, key: &str, raw: &[u8]) -> Verification {
        let Some(document) = document.filter(|d| !d.iter().all(u8::is_ascii_whitespace)) else {
            return Verification::unsigned();
        };

        let jws = match Jws::parse(document) {
            Ok(jws) => jws,
            Err(e) => {
                debug!(error = %e, "Cannot parse signature file");
                // Parse failures leave the build unsigned.
                return Verification::rejected(
                    SignatureCheck::Unsigned,
                    AdvisoryFailure::SignatureParse(e),
                );
            }
        };

        let key = DecodingKey::from_secret(key.as_bytes());
        match jsonwebtoken::crypto::verify(&jws.signature, jws.signing_input().as_bytes(), &key, jws.alg)
        {
            Ok(true) => {}
            Ok(false) => {
                debug!("Signature does not verify against repository hash");
                return Verification::rejected(
                    SignatureCheck::Unverified,
                    AdvisoryFailure::SignatureVerify("invalid signature".to_string()),
                );
            }
            Err(e) => {
                debug!(error = %e, "Cannot verify signature");
                return Verification::rejected(
                    SignatureCheck::Unverified,
                    AdvisoryFailure::SignatureVerify(e.to_string()),
                );
            }
        }

        if jws.payload != raw {
            debug!("Signature payload differs from build configuration");
            return Verification::rejected(
                SignatureCheck::Unverified,
                AdvisoryFailure::SignatureMismatch,
            );
        }

        Verification {
            check: SignatureCheck::Verified,
            advisory: None,
        }
    }
}

/// A parsed JWS with a single signature.
struct Jws {
    protected: String,
    encoded_payload: String,
    signature: String,
    alg: Algorithm,
    payload: Vec<u8>,
}

/// JSON serialization, flattened or general.
#[derive(Deserialize)]
struct JsonJws {
    payload: String,
    #[serde(default)]
    protected: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    signatures: Vec<JsonSignature>,
}

#[derive(Deserialize)]
struct JsonSignature {
    protected: String,
    signature: String,
}

impl Jws {
    fn parse(document: &[u8]) -> Result<Self, String> {
        let text = std::str::from_utf8(document)
            .map_err(|e| format!("signature is not UTF-8: {}", e))?
            .trim();

        let (protected, payload, signature) = if text.starts_with('{') {
            let json: JsonJws = serde_json::from_str(text).map_err(|e| e.to_string())?;
            match (json.protected, json.signature) {
                (Some(protected), Some(signature)) => (protected, json.payload, signature),
                _ => {
                    let first = json
                        .signatures
                        .into_iter()
                        .next()
                        .ok_or_else(|| "JSON signature has no signatures".to_string())?;
                    (first.protected, json.payload, first.signature)
                }
            }
        } else {
            let mut parts = text.split('.');
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(p), Some(s), None) => (h.to_string(), p.to_string(), s.to_string()),
                _ => return Err("compact signature must have three segments".to_string()),
            }
        };

        let header = jsonwebtoken::decode_header(&format!("{}..", protected))
            .map_err(|e| format!("invalid protected header: {}", e))?;
        let decoded = URL_SAFE_NO_PAD
            .decode(payload.as_bytes())
            .map_err(|e| format!("invalid payload encoding: {}", e))?;

        Ok(Self {
            protected,
            encoded_payload: payload,
            signature,
            alg: header.alg,
            payload: decoded,
        })
    }

    fn signing_input(&self) -> String {
        format!("{}.{}", self.protected, self.encoded_payload)
    }
}
