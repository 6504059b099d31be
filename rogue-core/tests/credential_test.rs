use chrono::{Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use rogue_core::{Claims, CredentialError, CredentialManager, CredentialPolicy, CredentialRecord, ManualClock};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;

const ISSUER: &str = "ledger-writer@rogue-test.iam.gserviceaccount.com";
const AUDIENCE: &str = "ledger-writer.roguedb.dev";
const KEY_ID: &str = "3f1c0a9e6b2d4e8f9a7c5b1d0e2f4a6c8b9d0e1f";

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn record() -> CredentialRecord {
    let text = std::fs::read_to_string(fixture("service_account.json")).unwrap();
    CredentialRecord::from_json(&text).unwrap()
}

fn write_record(record: &CredentialRecord) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(record).unwrap().as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn verify(token: &str) -> Claims {
    let public = std::fs::read(fixture("service_account_public.pem")).unwrap();
    let key = DecodingKey::from_rsa_pem(&public).unwrap();
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[AUDIENCE]);
    validation.set_issuer(&[ISSUER]);
    jsonwebtoken::decode::<Claims>(token, &key, &validation).unwrap().claims
}

/// Minted token verifies against the public key and carries the expected claims
#[test]
fn test_mint_from_file() {
    let manager = CredentialManager::new();
    let path = fixture("service_account.json");
    let credential = manager.mint(&path).unwrap();

    assert_eq!(credential.issuer(), ISSUER);
    assert_eq!(credential.subject(), ISSUER);
    assert_eq!(credential.audience(), AUDIENCE);
    assert_eq!(credential.key_id(), KEY_ID);
    assert_eq!(credential.source(), Some(path.as_path()));

    let claims = verify(credential.token().as_str());
    assert_eq!(claims, credential.claims());
    assert_eq!(claims.sub, ISSUER);
    assert_eq!(claims.exp - claims.iat, 3600);

    let header = jsonwebtoken::decode_header(credential.token().as_str()).unwrap();
    assert_eq!(header.alg, Algorithm::RS256);
    assert_eq!(header.kid.as_deref(), Some(KEY_ID));
    assert_eq!(header.typ.as_deref(), Some("JWT"));
}

/// Same key and same clock reading give the same credential window
#[test]
fn test_minting_is_deterministic_under_a_fixed_clock() {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let manager = CredentialManager::new().with_clock(clock);

    let first = manager.mint_from_record(&record()).unwrap();
    let second = manager.mint_from_record(&record()).unwrap();

    assert_eq!(first.issued_at(), start);
    assert_eq!(first.expires_at(), start + Duration::seconds(3600));
    assert_eq!(first.expires_at() - first.issued_at(), Duration::seconds(3600));
    assert_eq!(first.claims(), second.claims());
    assert_eq!(first.token(), second.token());
}

#[test]
fn test_expiry_boundary() {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let manager = CredentialManager::new().with_clock(clock);
    let credential = manager.mint_from_record(&record()).unwrap();

    assert!(!manager.is_expired(&credential, start + Duration::seconds(3599)));
    assert!(manager.is_expired(&credential, start + Duration::seconds(3600)));
    assert!(manager.is_expired(&credential, start + Duration::seconds(7200)));
}

#[test]
fn test_renewal_waits_for_the_margin() {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let manager = CredentialManager::new().with_clock(clock.clone());
    let credential = manager.mint_from_record(&record()).unwrap();

    clock.advance(Duration::seconds(3000));
    assert!(!manager.needs_renewal(&credential));
    let same = manager.renew_if_needed(&credential).unwrap();
    assert_eq!(same.issued_at(), credential.issued_at());

    clock.advance(Duration::seconds(560));
    assert!(manager.needs_renewal(&credential));
    let renewed = manager.renew_if_needed(&credential).unwrap();
    assert_eq!(renewed.issued_at(), start + Duration::seconds(3560));
    assert!(!manager.is_expired(&renewed, manager.now()));

    // the old token keeps its own window
    assert_eq!(credential.expires_at(), start + Duration::seconds(3600));
}

/// Renewing a file-backed credential picks up a rotated key id
#[test]
fn test_renewal_rereads_the_source_file() {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let manager = CredentialManager::new().with_clock(clock.clone());

    let mut rotated = record();
    let file = write_record(&rotated);
    let credential = manager.mint(file.path()).unwrap();
    assert_eq!(credential.key_id(), KEY_ID);

    rotated.private_key_id = Some("rotated-key".to_string());
    std::fs::write(file.path(), serde_json::to_string(&rotated).unwrap()).unwrap();

    clock.advance(Duration::hours(2));
    let renewed = manager.renew_if_needed(&credential).unwrap();
    assert_eq!(renewed.key_id(), "rotated-key");
    assert_eq!(renewed.source(), Some(file.path()));

    let header = jsonwebtoken::decode_header(renewed.token().as_str()).unwrap();
    assert_eq!(header.kid.as_deref(), Some("rotated-key"));
}

#[test]
fn test_missing_file_is_io_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let err = CredentialManager::new().mint(&path).unwrap_err();

    assert_eq!(err.code(), "CREDENTIAL_IO_FAILURE");
    match err {
        CredentialError::IoFailure { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected IoFailure, got {:?}", other),
    }
}

#[test]
fn test_missing_key_id_in_file() {
    let mut partial = record();
    partial.private_key_id = None;
    let file = write_record(&partial);

    let err = CredentialManager::new().mint(file.path()).unwrap_err();
    assert!(matches!(err, CredentialError::MissingField("private_key_id")));
}

#[test]
fn test_truncated_key_is_malformed() {
    let mut broken = record();
    let pem = broken.private_key.take().unwrap();
    broken.private_key = Some(pem[..pem.len() / 2].to_string());

    let err = CredentialManager::new().mint_from_record(&broken).unwrap_err();
    assert!(matches!(err, CredentialError::MalformedKey(_)));
}

#[test]
fn test_custom_policy() {
    let policy = CredentialPolicy::new()
        .with_validity(std::time::Duration::from_secs(600))
        .with_audience_domain("staging.roguedb.dev");
    let manager = CredentialManager::new().with_policy(policy);
    let credential = manager.mint_from_record(&record()).unwrap();

    assert_eq!(credential.audience(), "ledger-writer.staging.roguedb.dev");
    assert_eq!(credential.claims().exp - credential.claims().iat, 600);
}

#[test]
fn test_invalid_policy_is_refused() {
    let policy = CredentialPolicy::new().with_validity(std::time::Duration::from_secs(0));
    let err = CredentialManager::new()
        .with_policy(policy)
        .mint_from_record(&record())
        .unwrap_err();
    assert!(matches!(err, CredentialError::InvalidPolicy(_)));
}
