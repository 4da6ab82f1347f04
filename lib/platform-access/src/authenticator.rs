//! Authenticator data and credential public key decoding.
//!
//! Layout (WebAuthn §6.1): `rpIdHash[32] | flags[1] | signCount[4] |
//! attestedCredentialData?`, where attested data is
//! `aaguid[16] | credIdLen[2] | credId | COSE_Key`.

use ciborium::value::Value;
use p256::ecdsa::VerifyingKey;

use crate::challenge::COSE_ALG_ES256;
use crate::error::CeremonyError;

const FLAG_USER_PRESENT: u8 = 0x01;
const FLAG_USER_VERIFIED: u8 = 0x04;
const FLAG_ATTESTED_DATA: u8 = 0x40;

const HEADER_LEN: usize = 37;
const AAGUID_LEN: usize = 16;

const COSE_KTY: i128 = 1;
const COSE_ALG: i128 = 3;
const COSE_CRV: i128 = -1;
const COSE_X: i128 = -2;
const COSE_Y: i128 = -3;
const COSE_KTY_EC2: i128 = 2;
const COSE_CRV_P256: i128 = 1;

/// Credential created during registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredential {
    /// Raw credential id.
    pub credential_id: Vec<u8>,
    /// Uncompressed SEC1 P-256 point.
    pub public_key: Vec<u8>,
}

/// Parsed authenticator data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    rp_id_hash: [u8; 32],
    flags: u8,
    sign_count: u32,
    attested: Option<AttestedCredential>,
}

impl AuthenticatorData {
    /// Decodes authenticator data.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAuthenticatorData` when truncated, or `UnsupportedKey`
    /// when the attested key is not ES256 on P-256.
    pub fn parse(bytes: &[u8]) -> Result<Self, CeremonyError> {
        if bytes.len() < HEADER_LEN {
            return Err(truncated("header"));
        }

        let mut rp_id_hash = [0u8; 32];
        rp_id_hash.copy_from_slice(&bytes[..32]);
        let flags = bytes[32];
        let sign_count = u32::from_be_bytes([bytes[33], bytes[34], bytes[35], bytes[36]]);

        let attested = if flags & FLAG_ATTESTED_DATA != 0 {
            Some(parse_attested(&bytes[HEADER_LEN..])?)
        } else {
            None
        };

        Ok(Self {
            rp_id_hash,
            flags,
            sign_count,
            attested,
        })
    }

    /// Returns the SHA-256 of the relying party id the authenticator signed for.
    #[must_use]
    pub fn rp_id_hash(&self) -> &[u8; 32] {
        &self.rp_id_hash
    }

    /// Returns true if the user-present flag is set.
    #[must_use]
    pub fn user_present(&self) -> bool {
        self.flags & FLAG_USER_PRESENT != 0
    }

    /// Returns true if the user-verified flag is set.
    #[must_use]
    pub fn user_verified(&self) -> bool {
        self.flags & FLAG_USER_VERIFIED != 0
    }

    /// Returns the signature counter.
    #[must_use]
    pub fn sign_count(&self) -> u32 {
        self.sign_count
    }

    /// Returns the attested credential, present only during registration.
    #[must_use]
    pub fn attested_credential(&self) -> Option<&AttestedCredential> {
        self.attested.as_ref()
    }
}

fn truncated(part: &str) -> CeremonyError {
    CeremonyError::InvalidAuthenticatorData {
        reason: format!("truncated {part}"),
    }
}

fn parse_attested(bytes: &[u8]) -> Result<AttestedCredential, CeremonyError> {
    if bytes.len() < AAGUID_LEN + 2 {
        return Err(truncated("attested credential data"));
    }
    let id_len = usize::from(u16::from_be_bytes([bytes[AAGUID_LEN], bytes[AAGUID_LEN + 1]]));
    let id_start = AAGUID_LEN + 2;
    let key_start = id_start + id_len;
    if bytes.len() <= key_start {
        return Err(truncated("credential id"));
    }

    let credential_id = bytes[id_start..key_start].to_vec();
    let mut key_bytes = &bytes[key_start..];
    let cose: Value =
        ciborium::de::from_reader(&mut key_bytes).map_err(|e| CeremonyError::UnsupportedKey {
            reason: format!("malformed COSE key: {e}"),
        })?;

    Ok(AttestedCredential {
        credential_id,
        public_key: es256_public_key(&cose)?,
    })
}

/// Converts a COSE EC2 key into an uncompressed SEC1 point.
fn es256_public_key(cose: &Value) -> Result<Vec<u8>, CeremonyError> {
    let Value::Map(entries) = cose else {
        return Err(unsupported("COSE key is not a map"));
    };

    let mut kty = None;
    let mut alg = None;
    let mut crv = None;
    let mut x = None;
    let mut y = None;
    for (label, value) in entries {
        let Value::Integer(label) = label else {
            continue;
        };
        match i128::from(*label) {
            COSE_KTY => kty = as_int(value),
            COSE_ALG => alg = as_int(value),
            COSE_CRV => crv = as_int(value),
            COSE_X => x = value.as_bytes(),
            COSE_Y => y = value.as_bytes(),
            _ => {}
        }
    }

    if kty != Some(COSE_KTY_EC2) {
        return Err(unsupported("key type is not EC2"));
    }
    if alg != Some(i128::from(COSE_ALG_ES256)) {
        return Err(unsupported("algorithm is not ES256"));
    }
    if crv != Some(COSE_CRV_P256) {
        return Err(unsupported("curve is not P-256"));
    }
    let (Some(x), Some(y)) = (x, y) else {
        return Err(unsupported("missing coordinates"));
    };
    if x.len() != 32 || y.len() != 32 {
        return Err(unsupported("coordinates are not 32 bytes"));
    }

    let mut point = Vec::with_capacity(65);
    point.push(0x04);
    point.extend_from_slice(x);
    point.extend_from_slice(y);

    VerifyingKey::from_sec1_bytes(&point).map_err(|_| unsupported("point is not on the curve"))?;
    Ok(point)
}

fn as_int(value: &Value) -> Option<i128> {
    match value {
        Value::Integer(i) => Some(i128::from(*i)),
        _ => None,
    }
}

fn unsupported(reason: &str) -> CeremonyError {
    CeremonyError::UnsupportedKey {
        reason: reason.to_string(),
    }
}

/// Extracts `authData` from a CBOR attestation object.
///
/// The attestation statement is not inspected: registration requests
/// `attestation: "none"`, so no attestation trust path is relied upon.
pub(crate) fn attestation_auth_data(attestation_object: &[u8]) -> Result<Vec<u8>, CeremonyError> {
    let value: Value = ciborium::de::from_reader(attestation_object).map_err(|e| {
        CeremonyError::InvalidAttestation {
            reason: e.to_string(),
        }
    })?;
    let Value::Map(entries) = value else {
        return Err(CeremonyError::InvalidAttestation {
            reason: "attestation object is not a map".to_string(),
        });
    };

    let mut format = None;
    let mut auth_data = None;
    for (key, value) in entries {
        match (key.as_text(), value) {
            (Some("fmt"), Value::Text(fmt)) => format = Some(fmt),
            (Some("authData"), Value::Bytes(bytes)) => auth_data = Some(bytes),
            _ => {}
        }
    }

    tracing::debug!(format = format.as_deref().unwrap_or("<missing>"), "decoded attestation object");
    auth_data.ok_or_else(|| CeremonyError::InvalidAttestation {
        reason: "missing authData".to_string(),
    })
}
