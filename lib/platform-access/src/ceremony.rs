//! Verification of WebAuthn registration and authentication responses.
//!
//! The expected challenge is the one redeemed from the `webauthn-challenge`
//! cookie by [`ChallengeCoordinator::redeem`](crate::ChallengeCoordinator::redeem);
//! the caller clears that cookie after a single verification attempt
//! regardless of the outcome. Registered credentials are handed back to the client for
//! storage and carry a seal (an HMAC under the admin secret over the id and
//! public key), so a client cannot present a key pair it generated itself.

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use p256::ecdsa::{Signature, VerifyingKey, signature::Verifier};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::authenticator::{AuthenticatorData, attestation_auth_data};
use crate::challenge::{Challenge, ChallengePurpose, RelyingParty};
use crate::error::CeremonyError;
use crate::mac;
use crate::session::AdminSecret;

/// Browser response to `navigator.credentials.create()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: String,
    #[serde(default)]
    pub raw_id: Option<String>,
    pub response: AttestationResponse,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Attestation payload of a registration response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub attestation_object: String,
}

/// Browser response to `navigator.credentials.get()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    pub id: String,
    #[serde(default)]
    pub raw_id: Option<String>,
    pub response: AssertionResponse,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Assertion payload of an authentication response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
    #[serde(default)]
    pub user_handle: Option<String>,
}

/// A passkey registered for the admin account, stored by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredCredential {
    /// Credential id, base64url.
    pub id: String,
    /// Uncompressed SEC1 P-256 public key, base64.
    pub public_key: String,
    /// Signature counter at registration or last authentication.
    ///
    /// Stored by the client and not covered by the seal, so it only catches
    /// cloned authenticators when the client reports it honestly. Replay is
    /// prevented by single-use challenges instead.
    pub counter: u32,
    /// HMAC binding `id` and `public_key` to the server secret.
    pub seal: String,
}

#[derive(Debug, Deserialize)]
struct ClientData {
    #[serde(rename = "type")]
    kind: String,
    challenge: String,
    origin: String,
}

/// Checks signed WebAuthn responses against an issued challenge.
#[derive(Debug, Clone)]
pub struct CeremonyVerifier {
    rp: RelyingParty,
    secret: AdminSecret,
}

impl CeremonyVerifier {
    /// Creates a verifier for `rp`, sealing credentials with `secret`.
    #[must_use]
    pub fn new(rp: RelyingParty, secret: AdminSecret) -> Self {
        Self { rp, secret }
    }

    /// Verifies a registration response and returns the sealed credential.
    ///
    /// # Errors
    ///
    /// Returns the first check that failed.
    pub fn verify_registration(
        &self,
        response: &RegistrationResponse,
        expected_challenge: &Challenge,
    ) -> Result<RegisteredCredential, CeremonyError> {
        self.check_client_data(
            &response.response.client_data_json,
            ChallengePurpose::Registration,
            expected_challenge,
        )?;

        let attestation = decode_b64url(&response.response.attestation_object, "attestationObject")?;
        let auth_data = AuthenticatorData::parse(&attestation_auth_data(&attestation)?)?;
        self.check_authenticator(&auth_data)?;

        let attested = auth_data
            .attested_credential()
            .ok_or_else(|| CeremonyError::InvalidAuthenticatorData {
                reason: "no attested credential data".to_string(),
            })?;

        if decode_b64url(&response.id, "id")? != attested.credential_id {
            return Err(CeremonyError::CredentialMismatch);
        }

        let id = URL_SAFE_NO_PAD.encode(&attested.credential_id);
        let public_key = STANDARD.encode(&attested.public_key);
        let seal = self.seal(&id, &public_key)?;

        tracing::info!(credential_id = %id, "passkey registration verified");
        Ok(RegisteredCredential {
            id,
            public_key,
            counter: auth_data.sign_count(),
            seal,
        })
    }

    /// Verifies an authentication assertion and returns the new counter.
    ///
    /// # Errors
    ///
    /// Returns the first check that failed.
    pub fn verify_authentication(
        &self,
        response: &AuthenticationResponse,
        credential: &RegisteredCredential,
        expected_challenge: &Challenge,
    ) -> Result<u32, CeremonyError> {
        if !self.seal_matches(credential) {
            return Err(CeremonyError::InvalidSeal);
        }
        if decode_b64url(&response.id, "id")? != decode_b64url(&credential.id, "credential.id")? {
            return Err(CeremonyError::CredentialMismatch);
        }

        let client_data = self.check_client_data(
            &response.response.client_data_json,
            ChallengePurpose::Authentication,
            expected_challenge,
        )?;

        let auth_data_bytes =
            decode_b64url(&response.response.authenticator_data, "authenticatorData")?;
        let auth_data = AuthenticatorData::parse(&auth_data_bytes)?;
        self.check_authenticator(&auth_data)?;

        let public_key = STANDARD
            .decode(&credential.public_key)
            .map_err(|_| CeremonyError::InvalidEncoding {
                field: "credential.publicKey",
            })?;
        let key = VerifyingKey::from_sec1_bytes(&public_key).map_err(|_| {
            CeremonyError::UnsupportedKey {
                reason: "stored key is not a P-256 point".to_string(),
            }
        })?;
        let signature = Signature::from_der(&decode_b64url(&response.response.signature, "signature")?)
            .map_err(|_| CeremonyError::InvalidSignature)?;

        let mut signed = auth_data_bytes;
        signed.extend_from_slice(&Sha256::digest(&client_data));
        key.verify(&signed, &signature)
            .map_err(|_| CeremonyError::InvalidSignature)?;

        let received = auth_data.sign_count();
        if (credential.counter > 0 || received > 0) && received <= credential.counter {
            return Err(CeremonyError::CounterRegression {
                stored: credential.counter,
                received,
            });
        }

        tracing::info!(credential_id = %credential.id, "passkey authentication verified");
        Ok(received)
    }

    /// Computes the seal for a credential id and public key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSeal` when no admin secret is configured.
    pub fn seal(&self, id: &str, public_key: &str) -> Result<String, CeremonyError> {
        if !self.secret.is_configured() {
            return Err(CeremonyError::InvalidSeal);
        }
        mac::sign(self.secret.key(), seal_payload(id, public_key).as_bytes())
            .map(|tag| URL_SAFE_NO_PAD.encode(tag))
            .ok_or(CeremonyError::InvalidSeal)
    }

    fn seal_matches(&self, credential: &RegisteredCredential) -> bool {
        let Ok(tag) = URL_SAFE_NO_PAD.decode(credential.seal.trim_end_matches('=')) else {
            return false;
        };
        self.secret.is_configured()
            && mac::verify(
                self.secret.key(),
                seal_payload(&credential.id, &credential.public_key).as_bytes(),
                &tag,
            )
    }

    /// Checks client data and returns its raw bytes.
    fn check_client_data(
        &self,
        encoded: &str,
        purpose: ChallengePurpose,
        expected_challenge: &Challenge,
    ) -> Result<Vec<u8>, CeremonyError> {
        let raw = decode_b64url(encoded, "clientDataJSON")?;
        let client_data: ClientData =
            serde_json::from_slice(&raw).map_err(|e| CeremonyError::InvalidClientData {
                reason: e.to_string(),
            })?;

        let expected_type = purpose.client_data_type();
        if client_data.kind != expected_type {
            return Err(CeremonyError::CeremonyTypeMismatch {
                expected: expected_type,
                actual: client_data.kind,
            });
        }
        if expected_challenge.purpose() != purpose
            || client_data.challenge.trim_end_matches('=') != expected_challenge.value()
        {
            return Err(CeremonyError::ChallengeMismatch);
        }
        if client_data.origin != self.rp.origin() {
            return Err(CeremonyError::OriginMismatch {
                actual: client_data.origin,
            });
        }
        Ok(raw)
    }

    fn check_authenticator(&self, data: &AuthenticatorData) -> Result<(), CeremonyError> {
        if data.rp_id_hash() != &self.rp.id_hash() {
            return Err(CeremonyError::RelyingPartyMismatch);
        }
        if !data.user_present() {
            return Err(CeremonyError::MissingFlag {
                flag: "user present",
            });
        }
        if !data.user_verified() {
            return Err(CeremonyError::MissingFlag {
                flag: "user verified",
            });
        }
        Ok(())
    }
}

fn seal_payload(id: &str, public_key: &str) -> String {
    format!("credential:{id}:{public_key}")
}

fn decode_b64url(value: &str, field: &'static str) -> Result<Vec<u8>, CeremonyError> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|_| CeremonyError::InvalidEncoding { field })
}
