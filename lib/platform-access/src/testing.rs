//! Software authenticator for exercising the WebAuthn ceremony in tests.

#![allow(clippy::expect_used)]

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ciborium::value::Value;
use p256::ecdsa::{Signature, SigningKey, signature::Signer};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use crate::ceremony::{
    AssertionResponse, AttestationResponse, AuthenticationResponse, RegistrationResponse,
};

const FLAGS_UP_UV: u8 = 0x01 | 0x04;
const FLAG_AT: u8 = 0x40;

/// A P-256 platform authenticator held in memory.
pub struct TestAuthenticator {
    rp_id: String,
    key: SigningKey,
    credential_id: Vec<u8>,
    flags: u8,
}

impl TestAuthenticator {
    /// Creates an authenticator with a fresh key pair and credential id.
    #[must_use]
    pub fn new(rp_id: &str) -> Self {
        let mut credential_id = vec![0u8; 16];
        OsRng.fill_bytes(&mut credential_id);
        Self {
            rp_id: rp_id.to_string(),
            key: SigningKey::random(&mut OsRng),
            credential_id,
            flags: FLAGS_UP_UV,
        }
    }

    /// Clears the user-verified flag in everything this authenticator signs.
    #[must_use]
    pub fn without_user_verification(mut self) -> Self {
        self.flags &= !0x04;
        self
    }

    /// Replaces the credential id.
    #[must_use]
    pub fn with_credential_id(mut self, id: &[u8]) -> Self {
        self.credential_id = id.to_vec();
        self
    }

    /// Returns the raw credential id.
    #[must_use]
    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    /// Returns the public key as an uncompressed SEC1 point.
    #[must_use]
    pub fn public_key_sec1(&self) -> Vec<u8> {
        self.key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Builds authenticator data carrying the attested credential.
    #[must_use]
    pub fn registration_auth_data(&self) -> Vec<u8> {
        let point = self.key.verifying_key().to_encoded_point(false);
        let cose = Value::Map(vec![
            (Value::Integer(1.into()), Value::Integer(2.into())),
            (Value::Integer(3.into()), Value::Integer((-7).into())),
            (Value::Integer((-1).into()), Value::Integer(1.into())),
            (
                Value::Integer((-2).into()),
                Value::Bytes(point.x().map(|x| x.to_vec()).unwrap_or_default()),
            ),
            (
                Value::Integer((-3).into()),
                Value::Bytes(point.y().map(|y| y.to_vec()).unwrap_or_default()),
            ),
        ]);

        let mut data = self.header(self.flags | FLAG_AT, 0);
        data.extend_from_slice(&[0u8; 16]);
        let id_len = u16::try_from(self.credential_id.len()).unwrap_or(u16::MAX);
        data.extend_from_slice(&id_len.to_be_bytes());
        data.extend_from_slice(&self.credential_id);
        ciborium::ser::into_writer(&cose, &mut data).expect("encode COSE key");
        data
    }

    /// Builds a registration response answering `challenge` from `origin`.
    #[must_use]
    pub fn registration_response(&self, challenge: &str, origin: &str) -> RegistrationResponse {
        let attestation = Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text("none".into())),
            (Value::Text("attStmt".into()), Value::Map(Vec::new())),
            (
                Value::Text("authData".into()),
                Value::Bytes(self.registration_auth_data()),
            ),
        ]);
        let mut attestation_object = Vec::new();
        ciborium::ser::into_writer(&attestation, &mut attestation_object)
            .expect("encode attestation object");

        let id = URL_SAFE_NO_PAD.encode(&self.credential_id);
        RegistrationResponse {
            id: id.clone(),
            raw_id: Some(id),
            response: AttestationResponse {
                client_data_json: client_data("webauthn.create", challenge, origin),
                attestation_object: URL_SAFE_NO_PAD.encode(attestation_object),
            },
            kind: Some("public-key".to_string()),
        }
    }

    /// Builds an assertion answering `challenge` with signature counter `counter`.
    #[must_use]
    pub fn authentication_response(
        &self,
        challenge: &str,
        origin: &str,
        counter: u32,
    ) -> AuthenticationResponse {
        let client_data_json = client_data("webauthn.get", challenge, origin);
        let auth_data = self.header(self.flags, counter);

        let mut signed = auth_data.clone();
        let raw_client_data = URL_SAFE_NO_PAD
            .decode(&client_data_json)
            .expect("client data is base64url");
        signed.extend_from_slice(&Sha256::digest(&raw_client_data));
        let signature: Signature = self.key.sign(&signed);

        let id = URL_SAFE_NO_PAD.encode(&self.credential_id);
        AuthenticationResponse {
            id: id.clone(),
            raw_id: Some(id),
            response: AssertionResponse {
                client_data_json,
                authenticator_data: URL_SAFE_NO_PAD.encode(auth_data),
                signature: URL_SAFE_NO_PAD.encode(signature.to_der().as_bytes()),
                user_handle: None,
            },
            kind: Some("public-key".to_string()),
        }
    }

    fn header(&self, flags: u8, counter: u32) -> Vec<u8> {
        let mut data = Sha256::digest(self.rp_id.as_bytes()).to_vec();
        data.push(flags);
        data.extend_from_slice(&counter.to_be_bytes());
        data
    }
}

fn client_data(kind: &str, challenge: &str, origin: &str) -> String {
    let json = serde_json::json!({
        "type": kind,
        "challenge": challenge,
        "origin": origin,
        "crossOrigin": false,
    });
    URL_SAFE_NO_PAD.encode(json.to_string())
}
