//! Certificate authority generation
//!
//! Creates the self-signed CAs a deployment needs: one for server TLS, one
//! for the sync processes and one for verifying sync client certificates.
//! Leaf certificates are issued elsewhere from the stored CA material.

use chrono::{DateTime, Datelike, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose,
};
use time::{Date, Month, OffsetDateTime};

use crate::crd::{ca_expiry, MAX_CERTIFICATE_YEAR};
use crate::error::{Error, Result};
use crate::store::{CredentialSecret, CA_CERT_FIELD, CA_KEY_FIELD};

const ORGANIZATION: &str = "DBCluster Operator";

/// PEM encoded CA certificate and private key
pub struct CaMaterial {
    pub certificate_pem: String,
    pub private_key_pem: String,
}

impl CaMaterial {
    pub fn into_secret(self, name: &str, owner: Option<OwnerReference>) -> CredentialSecret {
        CredentialSecret::new(name, owner)
            .with_field(CA_CERT_FIELD, self.certificate_pem.into_bytes())
            .with_field(CA_KEY_FIELD, self.private_key_pem.into_bytes())
    }
}

/// Generate a self-signed CA valid from today for `ttl_days`.
///
/// Fails with [`Error::ValidationError`] when the expiry cannot be encoded.
pub fn create_ca_certificate(common_name: &str, ttl_days: u32) -> Result<CaMaterial> {
    let now = Utc::now();
    let until = ca_expiry(now, ttl_days).ok_or_else(|| {
        Error::ValidationError(format!(
            "CA TTL of {ttl_days} days expires after {MAX_CERTIFICATE_YEAR}-12-31"
        ))
    })?;

    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params
        .distinguished_name
        .push(DnType::OrganizationName, ORGANIZATION);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
    ];

    params.not_before = start_of_day(now)?;
    params.not_after = start_of_day(until)?;

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    Ok(CaMaterial {
        certificate_pem: cert.pem(),
        private_key_pem: key_pair.serialize_pem(),
    })
}

/// Midnight UTC of the day `t` falls on
fn start_of_day(t: DateTime<Utc>) -> Result<OffsetDateTime> {
    let out_of_range =
        |e: time::error::ComponentRange| Error::ValidationError(format!("invalid CA date {t}: {e}"));
    let month = Month::try_from(t.month() as u8).map_err(out_of_range)?;
    let date = Date::from_calendar_date(t.year(), month, t.day() as u8).map_err(out_of_range)?;
    Ok(date.midnight().assume_utc())
}
