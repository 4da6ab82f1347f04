//! OAuth 2.0 client-credentials exchange against the identity provider.

use async_trait::async_trait;
use chrono::Utc;
use oauth2::{ClientId, ClientSecret, Scope, TokenResponse, TokenUrl, basic::BasicClient};
use rootcause::Report;

use crate::credential::{ServiceToken, TokenExchange};
use crate::error::CredentialError;

/// Client-credentials grant using HTTP Basic client authentication.
///
/// Sends `grant_type=client_credentials` and the configured scope as a form
/// body. The endpoint must return a bearer token; a missing `expires_in` is
/// treated as one hour.
#[derive(Clone)]
pub struct ClientCredentialsExchange {
    client_id: String,
    client_secret: String,
    token_url: TokenUrl,
    scope: String,
    http: reqwest::Client,
}

impl ClientCredentialsExchange {
    /// Creates an exchange for the given endpoint and client.
    ///
    /// # Errors
    ///
    /// Returns an error if any setting is empty or the endpoint is not a URL.
    pub fn new(
        token_endpoint: &str,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Result<Self, CredentialError> {
        for (setting, value) in [
            ("cognito.token_endpoint", token_endpoint),
            ("cognito.client_id", client_id),
            ("cognito_client_secret", client_secret),
            ("cognito.scope", scope),
        ] {
            if value.trim().is_empty() {
                return Err(CredentialError::NotConfigured {
                    setting: setting.to_string(),
                });
            }
        }

        let token_url =
            TokenUrl::new(token_endpoint.to_string()).map_err(|e| CredentialError::NotConfigured {
                setting: format!("cognito.token_endpoint ({e})"),
            })?;

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| CredentialError::ExchangeFailed {
                endpoint: token_endpoint.to_string(),
                reason: format!("HTTP client error: {e}"),
            })?;

        Ok(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token_url,
            scope: scope.to_string(),
            http,
        })
    }

    /// Returns the token endpoint URL.
    #[must_use]
    pub fn token_endpoint(&self) -> &str {
        self.token_url.as_str()
    }
}

#[async_trait]
impl TokenExchange for ClientCredentialsExchange {
    async fn exchange(&self) -> Result<ServiceToken, Report<CredentialError>> {
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_token_uri(self.token_url.clone());

        let response = client
            .exchange_client_credentials()
            .add_scope(Scope::new(self.scope.clone()))
            .request_async(&self.http)
            .await
            .map_err(|e| CredentialError::ExchangeFailed {
                endpoint: self.token_endpoint().to_string(),
                reason: e.to_string(),
            })?;

        Ok(ServiceToken::from_expires_in(
            response.access_token().secret().clone(),
            response.expires_in().map(|d| d.as_secs()),
            Utc::now(),
            self.token_endpoint(),
            self.scope.clone(),
        ))
    }
}
