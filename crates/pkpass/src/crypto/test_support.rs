//! Self-signed key material for unit tests.

use super::SigningAssets;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509Builder, X509NameBuilder, X509};

pub(crate) fn generate_ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let ec_key = EcKey::generate(&group).unwrap();
    PKey::from_ec_key(ec_key).unwrap()
}

pub(crate) fn generate_rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

/// Self-signed certificate for `key`, with `team_id` as the subject OU.
pub(crate) fn self_signed_cert(key: &PKey<Private>, team_id: Option<&str>) -> X509 {
    let mut name_builder = X509NameBuilder::new().unwrap();
    name_builder
        .append_entry_by_text("CN", "Pass Type ID: pass.com.example.test")
        .unwrap();
    if let Some(team_id) = team_id {
        name_builder.append_entry_by_text("OU", team_id).unwrap();
    }
    let name = name_builder.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();

    let serial = BigNum::from_u32(1).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();

    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();

    let not_before = Asn1Time::days_from_now(0).unwrap();
    let not_after = Asn1Time::days_from_now(365).unwrap();
    builder.set_not_before(&not_before).unwrap();
    builder.set_not_after(&not_after).unwrap();

    builder.sign(key, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// EC P-256 signing assets with team ID `T1TEAMID00`.
pub(crate) fn test_signing_assets() -> SigningAssets {
    let key = generate_ec_key();
    let cert = self_signed_cert(&key, Some("T1TEAMID00"));
    SigningAssets::from_parts(cert, key).unwrap()
}
