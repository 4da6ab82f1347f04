//! WebAuthn challenge generation for admin passkey login.
//!
//! Issued challenges are not stored on the server. Each one travels to the
//! browser in an HTTP-only cookie (`webauthn-challenge`) alongside the public
//! options payload, and the verification step reads it back from there. A new
//! challenge overwrites the cookie, so only the latest one can be answered.
//!
//! The cookie value is authenticated and timestamped, so verification rejects
//! values the server never issued and values older than the TTL. Redeemed
//! challenges are remembered until they expire, so each one verifies at most
//! once even if the client replays the cookie.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, PoisonError};

use crate::error::CeremonyError;
use crate::mac;
use crate::session::AdminSecret;

/// Cookie carrying the issued challenge.
pub const CHALLENGE_COOKIE: &str = "webauthn-challenge";

/// Lifetime of a challenge and of its cookie.
pub const CHALLENGE_TTL_SECONDS: i64 = 300;

/// Relying party display name.
pub const RP_NAME: &str = "Scensei Admin";

/// Synthetic admin account presented to the authenticator.
const ADMIN_USER_NAME: &str = "admin";
const ADMIN_DISPLAY_NAME: &str = "Admin User";

/// COSE algorithm identifier for ECDSA P-256 with SHA-256.
pub const COSE_ALG_ES256: i64 = -7;

const CEREMONY_TIMEOUT_MS: u32 = 60_000;
const STAMP_LEN: usize = 8;
const NONCE_LEN: usize = 32;
const TAG_LEN: usize = 32;
const TOKEN_LEN: usize = STAMP_LEN + NONCE_LEN + TAG_LEN;
const PUBLIC_KEY_TYPE: &str = "public-key";

/// The relying party the admin passkeys are scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingParty {
    id: String,
    origin: String,
}

impl RelyingParty {
    /// Creates a relying party for `id` (e.g. `localhost`) served from `origin`.
    #[must_use]
    pub fn new(id: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            origin: origin.into(),
        }
    }

    /// Returns the relying party id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the expected browser origin.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns SHA-256 of the relying party id, as found in authenticator data.
    #[must_use]
    pub fn id_hash(&self) -> [u8; 32] {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&Sha256::digest(self.id.as_bytes()));
        hash
    }

    fn user_handle(&self) -> String {
        let digest = Sha256::digest(format!("{}:{ADMIN_USER_NAME}", self.id).as_bytes());
        URL_SAFE_NO_PAD.encode(&digest[..16])
    }
}

/// What a challenge will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengePurpose {
    /// Creating a new passkey.
    Registration,
    /// Signing in with an existing passkey.
    Authentication,
}

impl ChallengePurpose {
    /// Returns the `type` the browser writes into client data for this ceremony.
    #[must_use]
    pub fn client_data_type(self) -> &'static str {
        match self {
            Self::Registration => "webauthn.create",
            Self::Authentication => "webauthn.get",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Authentication => "authentication",
        }
    }
}

/// A challenge issued by this server.
///
/// The encoded value is `base64url(issued_at || nonce || tag)`: an 8-byte
/// big-endian Unix timestamp, 32 random bytes, and an HMAC-SHA256 tag under the
/// admin secret that also covers the purpose. The server can therefore tell its
/// own unexpired challenges apart from client-made ones without storing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    value: String,
    issued_at: DateTime<Utc>,
    purpose: ChallengePurpose,
}

impl Challenge {
    /// Issues a challenge for `purpose` stamped with `issued_at`.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeGeneration` if no admin secret is configured or the
    /// OS random source fails.
    pub fn issue(
        purpose: ChallengePurpose,
        secret: &AdminSecret,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, CeremonyError> {
        if !secret.is_configured() {
            return Err(CeremonyError::ChallengeGeneration {
                reason: "admin secret is not configured".to_string(),
            });
        }

        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| CeremonyError::ChallengeGeneration {
                reason: e.to_string(),
            })?;

        let issued_at = truncate_to_seconds(issued_at);
        let mut token = Vec::with_capacity(TOKEN_LEN);
        token.extend_from_slice(&issued_at.timestamp().to_be_bytes());
        token.extend_from_slice(&nonce);
        let tag = mac::sign(secret.key(), &tag_message(purpose, &token)).ok_or_else(|| {
            CeremonyError::ChallengeGeneration {
                reason: "challenge key rejected".to_string(),
            }
        })?;
        token.extend_from_slice(&tag);

        Ok(Self {
            value: URL_SAFE_NO_PAD.encode(token),
            issued_at,
            purpose,
        })
    }

    /// Checks that `value` was issued for `purpose` under `secret` and has not
    /// expired at `now`.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeNotIssued` for anything this server did not issue for
    /// `purpose`, and `ChallengeExpired` once the TTL has passed.
    pub fn open(
        value: &str,
        purpose: ChallengePurpose,
        secret: &AdminSecret,
        now: DateTime<Utc>,
    ) -> Result<Self, CeremonyError> {
        let token = URL_SAFE_NO_PAD
            .decode(value.trim_end_matches('='))
            .map_err(|_| CeremonyError::ChallengeNotIssued)?;
        if token.len() != TOKEN_LEN || !secret.is_configured() {
            return Err(CeremonyError::ChallengeNotIssued);
        }

        let (body, tag) = token.split_at(STAMP_LEN + NONCE_LEN);
        if !mac::verify(secret.key(), &tag_message(purpose, body), tag) {
            return Err(CeremonyError::ChallengeNotIssued);
        }

        let stamp = body
            .first_chunk::<STAMP_LEN>()
            .ok_or(CeremonyError::ChallengeNotIssued)?;
        let issued_at = DateTime::from_timestamp(i64::from_be_bytes(*stamp), 0)
            .ok_or(CeremonyError::ChallengeNotIssued)?;

        let challenge = Self {
            value: value.trim_end_matches('=').to_string(),
            issued_at,
            purpose,
        };
        if challenge.is_expired_at(now) {
            return Err(CeremonyError::ChallengeExpired);
        }
        Ok(challenge)
    }

    /// Returns the encoded challenge.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns when the challenge was issued, to the second.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns the ceremony this challenge belongs to.
    #[must_use]
    pub fn purpose(&self) -> ChallengePurpose {
        self.purpose
    }

    /// Returns the challenge lifetime.
    #[must_use]
    pub fn ttl() -> Duration {
        Duration::seconds(CHALLENGE_TTL_SECONDS)
    }

    /// Returns when the challenge stops being accepted.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at
            .checked_add_signed(Self::ttl())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Returns true once the challenge is older than its TTL.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}

fn tag_message(purpose: ChallengePurpose, body: &[u8]) -> Vec<u8> {
    let mut message = format!("webauthn-challenge:{}:", purpose.label()).into_bytes();
    message.extend_from_slice(body);
    message
}

/// Challenges that have already been presented for verification.
///
/// Entries are dropped once the challenge would have expired anyway, so the
/// set never outgrows the challenges issued within one TTL.
#[derive(Debug, Default)]
pub struct RedeemedChallenges {
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl RedeemedChallenges {
    /// Records `challenge` as used. Returns false if it was used before.
    pub fn redeem(&self, challenge: &Challenge, now: DateTime<Utc>) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.retain(|_, expires_at| *expires_at > now);
        match seen.entry(challenge.value().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(challenge.expires_at());
                true
            }
        }
    }

    /// Returns how many redeemed challenges are still remembered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Relying party entity in creation options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpEntity {
    pub name: String,
    pub id: String,
}

/// User entity in creation options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    pub id: String,
    pub name: String,
    pub display_name: String,
}

/// Acceptable credential algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKeyCredParam {
    pub alg: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Reference to an existing credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Authenticator requirements for registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub authenticator_attachment: String,
    pub user_verification: String,
    pub resident_key: String,
    pub require_resident_key: bool,
}

/// Public options for `navigator.credentials.create()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub rp: RpEntity,
    pub user: UserEntity,
    pub challenge: String,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    pub timeout: u32,
    pub attestation: String,
    pub exclude_credentials: Vec<CredentialDescriptor>,
    pub authenticator_selection: AuthenticatorSelection,
}

/// Public options for `navigator.credentials.get()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub rp_id: String,
    pub challenge: String,
    pub allow_credentials: Vec<CredentialDescriptor>,
    pub timeout: u32,
    pub user_verification: String,
}

/// Issues registration and authentication challenges for the admin account
/// and redeems them on verification.
#[derive(Debug)]
pub struct ChallengeCoordinator {
    rp: RelyingParty,
    secret: AdminSecret,
    redeemed: RedeemedChallenges,
}

impl ChallengeCoordinator {
    /// Creates a coordinator for `rp` that tags challenges with `secret`.
    #[must_use]
    pub fn new(rp: RelyingParty, secret: AdminSecret) -> Self {
        Self {
            rp,
            secret,
            redeemed: RedeemedChallenges::default(),
        }
    }

    /// Returns the relying party.
    #[must_use]
    pub fn relying_party(&self) -> &RelyingParty {
        &self.rp
    }

    /// Issues a challenge for `purpose` stamped with `issued_at`.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeGeneration` if no challenge could be produced.
    pub fn issue_at(
        &self,
        purpose: ChallengePurpose,
        issued_at: DateTime<Utc>,
    ) -> Result<Challenge, CeremonyError> {
        Challenge::issue(purpose, &self.secret, issued_at)
    }

    /// Redeems a challenge presented for verification.
    ///
    /// # Errors
    ///
    /// See [`Self::redeem_at`].
    pub fn redeem(
        &self,
        value: &str,
        purpose: ChallengePurpose,
    ) -> Result<Challenge, CeremonyError> {
        self.redeem_at(value, purpose, Utc::now())
    }

    /// Redeems a challenge at `now`. Each challenge redeems at most once.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeNotIssued`, `ChallengeExpired` or `ChallengeReplayed`.
    pub fn redeem_at(
        &self,
        value: &str,
        purpose: ChallengePurpose,
        now: DateTime<Utc>,
    ) -> Result<Challenge, CeremonyError> {
        let challenge = Challenge::open(value, purpose, &self.secret, now)?;
        if !self.redeemed.redeem(&challenge, now) {
            return Err(CeremonyError::ChallengeReplayed);
        }
        Ok(challenge)
    }

    /// Generates a registration challenge for a platform authenticator.
    ///
    /// The caller is responsible for checking the admin session first.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeGeneration` if no challenge could be produced.
    pub fn registration_challenge(
        &self,
    ) -> Result<(RegistrationOptions, Challenge), CeremonyError> {
        let challenge = self.issue_at(ChallengePurpose::Registration, Utc::now())?;

        let options = RegistrationOptions {
            rp: RpEntity {
                name: RP_NAME.to_string(),
                id: self.rp.id.clone(),
            },
            user: UserEntity {
                id: self.rp.user_handle(),
                name: ADMIN_USER_NAME.to_string(),
                display_name: ADMIN_DISPLAY_NAME.to_string(),
            },
            challenge: challenge.value().to_string(),
            pub_key_cred_params: vec![PubKeyCredParam {
                alg: COSE_ALG_ES256,
                kind: PUBLIC_KEY_TYPE.to_string(),
            }],
            timeout: CEREMONY_TIMEOUT_MS,
            attestation: "none".to_string(),
            exclude_credentials: Vec::new(),
            authenticator_selection: AuthenticatorSelection {
                authenticator_attachment: "platform".to_string(),
                user_verification: "required".to_string(),
                resident_key: "preferred".to_string(),
                require_resident_key: false,
            },
        };

        tracing::debug!(rp_id = %self.rp.id, "generated registration challenge");
        Ok((options, challenge))
    }

    /// Generates an authentication challenge restricted to `credential_id`.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeGeneration` if no challenge could be produced.
    pub fn authentication_challenge(
        &self,
        credential_id: &str,
    ) -> Result<(AuthenticationOptions, Challenge), CeremonyError> {
        let challenge = self.issue_at(ChallengePurpose::Authentication, Utc::now())?;

        let options = AuthenticationOptions {
            rp_id: self.rp.id.clone(),
            challenge: challenge.value().to_string(),
            allow_credentials: vec![CredentialDescriptor {
                id: credential_id.to_string(),
                kind: PUBLIC_KEY_TYPE.to_string(),
            }],
            timeout: CEREMONY_TIMEOUT_MS,
            user_verification: "required".to_string(),
        };

        tracing::debug!(rp_id = %self.rp.id, "generated authentication challenge");
        Ok((options, challenge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> AdminSecret {
        AdminSecret::new("s3cret")
    }

    fn coordinator() -> ChallengeCoordinator {
        ChallengeCoordinator::new(
            RelyingParty::new("localhost", "http://localhost:3000"),
            secret(),
        )
    }

    fn issue(purpose: ChallengePurpose) -> Challenge {
        Challenge::issue(purpose, &secret(), Utc::now()).expect("challenge")
    }

    #[test]
    fn challenge_carries_256_bit_nonce_base64url() {
        let challenge = issue(ChallengePurpose::Registration);
        let decoded = URL_SAFE_NO_PAD.decode(challenge.value()).expect("base64url");
        assert_eq!(decoded.len(), TOKEN_LEN);
        assert_eq!(decoded[STAMP_LEN..STAMP_LEN + NONCE_LEN].len(), 32);
        assert!(!challenge.value().contains('='));
    }

    #[test]
    fn challenges_are_unique() {
        let a = issue(ChallengePurpose::Authentication);
        let b = issue(ChallengePurpose::Authentication);
        assert_ne!(a.value(), b.value());
    }

    #[test]
    fn challenge_expires_after_ttl() {
        let challenge = issue(ChallengePurpose::Registration);
        let issued = challenge.issued_at();
        assert!(!challenge.is_expired_at(issued + Duration::seconds(299)));
        assert!(challenge.is_expired_at(issued + Duration::seconds(300)));
    }

    #[test]
    fn issuing_requires_secret() {
        let err = Challenge::issue(ChallengePurpose::Registration, &AdminSecret::new(""), Utc::now());
        assert!(matches!(err, Err(CeremonyError::ChallengeGeneration { .. })));
    }

    #[test]
    fn open_accepts_issued_challenge() {
        let issued = issue(ChallengePurpose::Authentication);
        let opened = Challenge::open(
            issued.value(),
            ChallengePurpose::Authentication,
            &secret(),
            issued.issued_at() + Duration::seconds(10),
        )
        .expect("opens");
        assert_eq!(opened, issued);
    }

    #[test]
    fn open_rejects_values_not_issued_here() {
        let now = Utc::now();
        let random = URL_SAFE_NO_PAD.encode([7u8; TOKEN_LEN]);
        for value in ["", "never-issued-by-server", random.as_str()] {
            assert_eq!(
                Challenge::open(value, ChallengePurpose::Authentication, &secret(), now),
                Err(CeremonyError::ChallengeNotIssued),
                "{value}"
            );
        }
    }

    #[test]
    fn open_rejects_other_secret() {
        let issued = issue(ChallengePurpose::Authentication);
        assert_eq!(
            Challenge::open(
                issued.value(),
                ChallengePurpose::Authentication,
                &AdminSecret::new("rotated"),
                Utc::now()
            ),
            Err(CeremonyError::ChallengeNotIssued)
        );
    }

    #[test]
    fn open_rejects_other_purpose() {
        let issued = issue(ChallengePurpose::Registration);
        assert_eq!(
            Challenge::open(
                issued.value(),
                ChallengePurpose::Authentication,
                &secret(),
                Utc::now()
            ),
            Err(CeremonyError::ChallengeNotIssued)
        );
    }

    #[test]
    fn open_rejects_tampered_timestamp() {
        let issued = issue(ChallengePurpose::Authentication);
        let mut token = URL_SAFE_NO_PAD.decode(issued.value()).expect("base64url");
        token[STAMP_LEN - 1] ^= 1;
        assert_eq!(
            Challenge::open(
                &URL_SAFE_NO_PAD.encode(token),
                ChallengePurpose::Authentication,
                &secret(),
                Utc::now()
            ),
            Err(CeremonyError::ChallengeNotIssued)
        );
    }

    #[test]
    fn open_rejects_expired_challenge() {
        let issued_at = Utc::now() - Duration::seconds(CHALLENGE_TTL_SECONDS + 1);
        let stale = Challenge::issue(ChallengePurpose::Authentication, &secret(), issued_at)
            .expect("challenge");
        assert_eq!(
            Challenge::open(
                stale.value(),
                ChallengePurpose::Authentication,
                &secret(),
                Utc::now()
            ),
            Err(CeremonyError::ChallengeExpired)
        );
    }

    #[test]
    fn redeem_is_single_use() {
        let coordinator = coordinator();
        let (_, challenge) = coordinator
            .authentication_challenge("cred-123")
            .expect("options");

        let redeemed = coordinator
            .redeem(challenge.value(), ChallengePurpose::Authentication)
            .expect("first redemption");
        assert_eq!(redeemed.value(), challenge.value());
        assert_eq!(
            coordinator.redeem(challenge.value(), ChallengePurpose::Authentication),
            Err(CeremonyError::ChallengeReplayed)
        );
    }

    #[test]
    fn redeemed_set_forgets_expired_challenges() {
        let coordinator = coordinator();
        let issued_at = Utc::now();
        let first = coordinator
            .issue_at(ChallengePurpose::Registration, issued_at)
            .expect("first");
        coordinator
            .redeem_at(first.value(), ChallengePurpose::Registration, issued_at)
            .expect("redeems");
        assert_eq!(coordinator.redeemed.len(), 1);

        let later = issued_at + Duration::seconds(CHALLENGE_TTL_SECONDS + 1);
        let second = coordinator
            .issue_at(ChallengePurpose::Registration, later)
            .expect("second");
        coordinator
            .redeem_at(second.value(), ChallengePurpose::Registration, later)
            .expect("redeems");
        assert_eq!(coordinator.redeemed.len(), 1);
    }

    #[test]
    fn registration_options_shape() {
        let (options, challenge) = coordinator().registration_challenge().expect("options");
        assert_eq!(challenge.purpose(), ChallengePurpose::Registration);
        assert_eq!(options.challenge, challenge.value());

        let json = serde_json::to_value(&options).expect("serialize");
        assert_eq!(json["rp"]["name"], "Scensei Admin");
        assert_eq!(json["rp"]["id"], "localhost");
        assert_eq!(json["user"]["name"], "admin");
        assert_eq!(json["user"]["displayName"], "Admin User");
        assert_eq!(json["attestation"], "none");
        assert_eq!(json["pubKeyCredParams"][0]["alg"], -7);
        assert_eq!(json["pubKeyCredParams"][0]["type"], "public-key");
        assert_eq!(
            json["authenticatorSelection"]["authenticatorAttachment"],
            "platform"
        );
        assert_eq!(json["authenticatorSelection"]["userVerification"], "required");
        assert_eq!(json["authenticatorSelection"]["residentKey"], "preferred");
    }

    #[test]
    fn user_handle_is_stable() {
        let (first, _) = coordinator().registration_challenge().expect("first");
        let (second, _) = coordinator().registration_challenge().expect("second");
        assert_eq!(first.user.id, second.user.id);
        assert_ne!(first.challenge, second.challenge);
    }

    #[test]
    fn authentication_options_restrict_to_credential() {
        let (options, challenge) = coordinator()
            .authentication_challenge("cred-123")
            .expect("options");
        assert_eq!(challenge.purpose(), ChallengePurpose::Authentication);

        let json = serde_json::to_value(&options).expect("serialize");
        assert_eq!(json["rpId"], "localhost");
        assert_eq!(json["allowCredentials"][0]["id"], "cred-123");
        assert_eq!(json["allowCredentials"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["userVerification"], "required");
        assert_eq!(json["challenge"], challenge.value());
    }

    #[test]
    fn ceremony_types() {
        assert_eq!(
            ChallengePurpose::Registration.client_data_type(),
            "webauthn.create"
        );
        assert_eq!(
            ChallengePurpose::Authentication.client_data_type(),
            "webauthn.get"
        );
    }
}
