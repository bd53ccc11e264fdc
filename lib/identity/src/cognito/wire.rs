//! Request and response bodies of the user pool JSON RPC.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::provider::UserAttribute;

pub(crate) const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
pub(crate) const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";

pub(crate) const USER_PASSWORD_AUTH: &str = "USER_PASSWORD_AUTH";
pub(crate) const REFRESH_TOKEN_AUTH: &str = "REFRESH_TOKEN_AUTH";
pub(crate) const NEW_PASSWORD_REQUIRED: &str = "NEW_PASSWORD_REQUIRED";

/// RPC actions used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    InitiateAuth,
    GetUser,
    GlobalSignOut,
}

impl Action {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InitiateAuth => "InitiateAuth",
            Self::GetUser => "GetUser",
            Self::GlobalSignOut => "GlobalSignOut",
        }
    }

    /// Value of the `X-Amz-Target` header.
    pub(crate) fn target(self) -> String {
        format!("{TARGET_PREFIX}.{}", self.as_str())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InitiateAuthRequest<'a> {
    pub auth_flow: &'a str,
    pub client_id: &'a str,
    pub auth_parameters: BTreeMap<&'a str, &'a str>,
}

impl<'a> InitiateAuthRequest<'a> {
    pub(crate) fn password(client_id: &'a str, username: &'a str, password: &'a str) -> Self {
        Self {
            auth_flow: USER_PASSWORD_AUTH,
            client_id,
            auth_parameters: BTreeMap::from([("USERNAME", username), ("PASSWORD", password)]),
        }
    }

    pub(crate) fn refresh(client_id: &'a str, refresh_token: &'a str) -> Self {
        Self {
            auth_flow: REFRESH_TOKEN_AUTH,
            client_id,
            auth_parameters: BTreeMap::from([("REFRESH_TOKEN", refresh_token)]),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InitiateAuthResponse {
    #[serde(default)]
    pub authentication_result: Option<AuthenticationResult>,
    #[serde(default)]
    pub challenge_name: Option<String>,
    #[serde(default)]
    pub challenge_parameters: BTreeMap<String, String>,
}

impl InitiateAuthResponse {
    /// Decodes the `userAttributes` challenge parameter, which the provider
    /// sends as a JSON-encoded object. Every attribute is kept, verification
    /// flags included; non-string values are rendered as JSON text.
    pub(crate) fn challenge_attributes(&self) -> Vec<UserAttribute> {
        let Some(raw) = self.challenge_parameters.get("userAttributes") else {
            return Vec::new();
        };
        let Ok(serde_json::Value::Object(map)) = serde_json::from_str(raw) else {
            return Vec::new();
        };
        map.into_iter()
            .map(|(name, value)| match value {
                serde_json::Value::String(value) => UserAttribute::new(name, value),
                other => UserAttribute::new(name, other.to_string()),
            })
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AuthenticationResult {
    pub id_token: String,
    pub access_token: String,
    /// Absent on refresh responses.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for AuthenticationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationResult").finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AccessTokenRequest<'a> {
    pub access_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetUserResponse {
    #[serde(default)]
    pub user_attributes: Vec<UserAttribute>,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(rename = "__type", default)]
    pub error_type: String,
    #[serde(alias = "Message", default)]
    pub message: String,
}

impl ErrorBody {
    /// Returns the error code without its namespace prefix.
    pub(crate) fn code(&self) -> &str {
        self.error_type
            .rsplit_once('#')
            .map_or(self.error_type.as_str(), |(_, code)| code)
    }
}
