//! JWT claim sets and exporter token validation
//!
//! Tokens handed to cluster members and the metrics exporter are HS256 JWTs
//! signed with the deployment's primary authentication token. The exporter
//! token is bound to a fixed set of claims; when the stored token no longer
//! carries exactly those claims (or no longer verifies against the current
//! signing key) it must be recreated.
//!
//! Claims are compared structurally: a [`ClaimSet`] is a list of typed
//! [`Claim`]s kept sorted by claim name, so two sets are equal regardless of
//! the field order in the serialized token.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::store::{get_token_secret, SecretStore, TOKEN_FIELD};

/// Issuer expected by cluster members
pub const JWT_ISSUER: &str = "dbcluster";
/// Server id the operator identifies itself with
pub const OPERATOR_SERVER_ID: &str = "dbcluster-operator";
/// Server id of the metrics exporter
pub const EXPORTER_SERVER_ID: &str = "exporter";
/// Paths the exporter token may access
pub const EXPORTER_ALLOWED_PATHS: [&str; 3] = [
    "/_admin/statistics",
    "/_admin/statistics-description",
    "/_admin/metrics",
];

/// A single claim assertion
#[derive(Clone, Debug, PartialEq)]
pub enum Claim {
    /// `iss`
    Issuer(String),
    /// `server_id`
    ServerId(String),
    /// `allowed_paths`, order significant
    AllowedPaths(Vec<String>),
    /// Any claim not interpreted by the operator
    Other { name: String, value: Value },
}

impl Claim {
    pub fn name(&self) -> &str {
        match self {
            Claim::Issuer(_) => "iss",
            Claim::ServerId(_) => "server_id",
            Claim::AllowedPaths(_) => "allowed_paths",
            Claim::Other { name, .. } => name,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Claim::Issuer(s) | Claim::ServerId(s) => Value::String(s.clone()),
            Claim::AllowedPaths(paths) => {
                Value::Array(paths.iter().cloned().map(Value::String).collect())
            }
            Claim::Other { value, .. } => value.clone(),
        }
    }

    fn from_entry(name: String, value: Value) -> Self {
        match (name.as_str(), &value) {
            ("iss", Value::String(s)) => return Claim::Issuer(s.clone()),
            ("server_id", Value::String(s)) => return Claim::ServerId(s.clone()),
            ("allowed_paths", Value::Array(items)) if items.iter().all(Value::is_string) => {
                return Claim::AllowedPaths(
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                )
            }
            _ => {}
        }
        Claim::Other { name, value }
    }
}

/// Ordered set of claims. Invariant: sorted by name, names unique.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClaimSet {
    claims: Vec<Claim>,
}

impl ClaimSet {
    /// Build a set; a later claim with the same name replaces an earlier one.
    pub fn new(claims: impl IntoIterator<Item = Claim>) -> Self {
        let mut out: Vec<Claim> = Vec::new();
        for claim in claims {
            match out.iter_mut().find(|c| c.name() == claim.name()) {
                Some(existing) => *existing = claim,
                None => out.push(claim),
            }
        }
        out.sort_by(|a, b| a.name().cmp(b.name()));
        Self { claims: out }
    }

    /// Claims of the token the operator authenticates with
    pub fn operator() -> Self {
        Self::new([
            Claim::Issuer(JWT_ISSUER.to_string()),
            Claim::ServerId(OPERATOR_SERVER_ID.to_string()),
        ])
    }

    /// Claims the exporter token must carry
    pub fn exporter() -> Self {
        Self::new([
            Claim::Issuer(JWT_ISSUER.to_string()),
            Claim::ServerId(EXPORTER_SERVER_ID.to_string()),
            Claim::AllowedPaths(EXPORTER_ALLOWED_PATHS.iter().map(|p| p.to_string()).collect()),
        ])
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn get(&self, name: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.name() == name)
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self::new(map.into_iter().map(|(k, v)| Claim::from_entry(k, v)))
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.claims
            .iter()
            .map(|c| (c.name().to_string(), c.to_value()))
            .collect()
    }

    /// Sign the claims with HS256 using `secret` as key
    pub fn sign(&self, secret: &str) -> Result<String> {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &self.to_map(),
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Verify an HS256 token against `secret` and return its claims.
    ///
    /// Tokens minted by the operator carry no expiry, so no registered claim
    /// is required.
    pub fn verify(token: &str, secret: &str) -> Result<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_aud = false;
        let data = decode::<Map<String, Value>>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )?;
        Ok(Self::from_map(data.claims))
    }
}

/// Outcome of inspecting a claims-bound token secret
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenValidation {
    /// Secret does not exist
    Missing,
    /// Secret exists without a token field
    MissingToken,
    /// Token does not verify against the current signing key
    InvalidSignature,
    /// Token verifies but carries different claims
    ClaimsDrift,
    /// Token verifies and carries the desired claims
    Valid,
}

impl TokenValidation {
    pub fn requires_create(&self) -> bool {
        !matches!(self, TokenValidation::Valid)
    }

    /// Whether a secret is present that has to be removed before creating
    pub fn secret_exists(&self) -> bool {
        !matches!(self, TokenValidation::Missing)
    }
}

/// Decide whether the token in `token_secret_name` must be (re)created.
///
/// The signing key is the `token` field of `signing_secret_name`. Failure to
/// read it is an error: without the key the token cannot be judged.
pub async fn validate_token_secret(
    store: &dyn SecretStore,
    token_secret_name: &str,
    signing_secret_name: &str,
    desired: &ClaimSet,
) -> Result<TokenValidation> {
    let secret = match store.get(token_secret_name).await? {
        Some(secret) => secret,
        None => return Ok(TokenValidation::Missing),
    };
    let token = match secret.field(TOKEN_FIELD) {
        Some(token) => String::from_utf8_lossy(token).into_owned(),
        None => return Ok(TokenValidation::MissingToken),
    };

    let signing_key = get_token_secret(store, signing_secret_name).await?;

    match ClaimSet::verify(&token, &signing_key) {
        Err(_) => Ok(TokenValidation::InvalidSignature),
        Ok(claims) if &claims != desired => Ok(TokenValidation::ClaimsDrift),
        Ok(_) => Ok(TokenValidation::Valid),
    }
}
