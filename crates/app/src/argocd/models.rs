//! Argo CD API request and response bodies.

use argocd_tokens::project::{IssuedTokenRecord, ProjectRole, RemoteProject};
use serde::{Deserialize, Deserializer, Serialize, de};

/// Body of a token issuance request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostRequest<'a> {
    pub(crate) expires_in: i64,
    pub(crate) project: &'a str,
    pub(crate) role: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub(crate) token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppProject {
    #[serde(default)]
    metadata: ObjectMeta,

    #[serde(default)]
    spec: AppProjectSpec,
}

#[derive(Debug, Default, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct AppProjectSpec {
    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    roles: Vec<AppProjectRole>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppProjectRole {
    name: String,

    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    policies: Vec<String>,

    #[serde(default)]
    groups: Vec<String>,

    #[serde(default)]
    jwt_tokens: Vec<JwtToken>,
}

#[derive(Debug, Deserialize)]
struct JwtToken {
    #[serde(deserialize_with = "unix_seconds")]
    iat: i64,

    #[serde(default, deserialize_with = "optional_unix_seconds")]
    exp: Option<i64>,
}

/// Seconds arrive as JSON numbers, or as strings from gateways that quote
/// 64-bit integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(i64),
    Text(String),
}

impl Seconds {
    fn into_i64<E: de::Error>(self) -> Result<i64, E> {
        match self {
            Self::Number(seconds) => Ok(seconds),
            Self::Text(text) => text.trim().parse().map_err(E::custom),
        }
    }
}

fn unix_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Seconds::deserialize(deserializer)?.into_i64()
}

fn optional_unix_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Seconds>::deserialize(deserializer)?
        .map(Seconds::into_i64)
        .transpose()
        // Zero is how the API spells "never expires".
        .map(|exp| exp.filter(|seconds| *seconds != 0))
}

impl From<AppProject> for RemoteProject {
    fn from(project: AppProject) -> Self {
        Self {
            name: project.metadata.name,
            description: project.spec.description.filter(|text| !text.is_empty()),
            roles: project.spec.roles.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<AppProjectRole> for ProjectRole {
    fn from(role: AppProjectRole) -> Self {
        Self {
            name: role.name,
            description: role.description.filter(|text| !text.is_empty()),
            policies: role.policies,
            groups: role.groups,
            tokens: role
                .jwt_tokens
                .into_iter()
                .map(|token| IssuedTokenRecord {
                    issued_at: token.iat,
                    expires_at: token.exp,
                })
                .collect(),
        }
    }
}
