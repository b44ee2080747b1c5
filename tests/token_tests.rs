use chrono::{Duration, TimeZone, Utc};
use task_portal::auth::{AuthError, TokenService, hash_password, verify_password};
use task_portal::errors::ApiError;
use task_portal::policy::Role;

const SECRET: &str = "test-secret-key-for-token-tests";
const TTL_MINUTES: i64 = 30;

fn service() -> TokenService {
    TokenService::new(SECRET, TTL_MINUTES)
}

// --- Issue / verify round trip ---

#[test]
fn test_issue_and_verify_round_trip() {
    let tokens = service();
    let token = tokens.issue("ali", Role::Student).expect("issue");
    let claims = tokens.verify(&token).expect("verify");

    assert_eq!(claims.sub, "ali");
    assert_eq!(claims.role, "student");
    assert_eq!(claims.exp, claims.iat + (TTL_MINUTES * 60) as usize);
}

#[test]
fn test_claims_carry_role_string() {
    let tokens = service();
    for role in Role::ALL {
        let token = tokens.issue("someone", role).expect("issue");
        let claims = tokens.verify(&token).expect("verify");
        assert_eq!(claims.role, role.as_str());
    }
}

// --- Expiry against an injected clock ---

#[test]
fn test_token_valid_within_window() {
    let tokens = service();
    let issued = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let token = tokens.issue_at(issued, "ali", Role::Student).expect("issue");

    // One second before expiry is still good.
    let almost = issued + Duration::minutes(TTL_MINUTES) - Duration::seconds(1);
    assert!(tokens.verify_at(&token, almost).is_ok());
}

#[test]
fn test_token_expired_at_boundary() {
    let tokens = service();
    let issued = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let token = tokens.issue_at(issued, "ali", Role::Student).expect("issue");

    // Exactly at exp the token is no longer accepted.
    let boundary = issued + Duration::minutes(TTL_MINUTES);
    assert_eq!(tokens.verify_at(&token, boundary), Err(AuthError::Expired));

    let later = issued + Duration::hours(2);
    assert_eq!(tokens.verify_at(&token, later), Err(AuthError::Expired));
}

// --- Tampering ---

#[test]
fn test_wrong_secret_is_invalid() {
    let tokens = service();
    let other = TokenService::new("a-different-secret", TTL_MINUTES);

    let token = tokens.issue("ali", Role::Student).expect("issue");
    assert_eq!(other.verify(&token), Err(AuthError::InvalidToken));
}

#[test]
fn test_garbage_is_invalid() {
    let tokens = service();
    assert_eq!(tokens.verify(""), Err(AuthError::InvalidToken));
    assert_eq!(tokens.verify("not.a.token"), Err(AuthError::InvalidToken));
    assert_eq!(
        tokens.verify("eyJhbGciOiJIUzI1NiJ9.e30."),
        Err(AuthError::InvalidToken)
    );
}

#[test]
fn test_tampered_payload_is_invalid() {
    let tokens = service();
    let token = tokens.issue("ali", Role::Student).expect("issue");

    // Flip a character in the payload segment; the signature no longer matches.
    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    assert_eq!(parts.len(), 3);
    let payload = &mut parts[1];
    let flipped = if payload.ends_with('A') { "B" } else { "A" };
    payload.truncate(payload.len() - 1);
    payload.push_str(flipped);
    let tampered = parts.join(".");

    assert_eq!(tokens.verify(&tampered), Err(AuthError::InvalidToken));
}

// --- Refresh ---

#[test]
fn test_refresh_extends_expiry_and_keeps_subject() {
    let tokens = service();
    let issued = Utc::now() - Duration::minutes(10);
    let token = tokens
        .issue_at(issued, "ali", Role::Teacher)
        .expect("issue");

    let (renewed, old_claims) = tokens.refresh(&token).expect("refresh");
    assert_eq!(old_claims.sub, "ali");

    let new_claims = tokens.verify(&renewed).expect("verify renewed");
    assert_eq!(new_claims.sub, "ali");
    assert_eq!(new_claims.role, "teacher");
    // The renewed token's window starts now, so it must outlive the original.
    assert!(new_claims.exp > old_claims.exp);
}

#[test]
fn test_refresh_of_expired_token_fails() {
    let tokens = service();
    let issued = Utc::now() - Duration::hours(2);
    let token = tokens
        .issue_at(issued, "ali", Role::Student)
        .expect("issue");

    assert!(matches!(tokens.refresh(&token), Err(ApiError::Expired)));
}

#[test]
fn test_refresh_of_garbage_fails() {
    let tokens = service();
    assert!(matches!(
        tokens.refresh("junk"),
        Err(ApiError::InvalidToken)
    ));
}

// --- Password hashing ---

#[test]
fn test_password_hash_round_trip() {
    let hash = hash_password("correct horse").expect("hash");
    assert!(verify_password("correct horse", &hash));
    assert!(!verify_password("wrong horse", &hash));
}

#[test]
fn test_password_hashes_are_salted() {
    let a = hash_password("same input").expect("hash");
    let b = hash_password("same input").expect("hash");
    assert_ne!(a, b);
    assert!(verify_password("same input", &a));
    assert!(verify_password("same input", &b));
}

#[test]
fn test_unparseable_stored_hash_verifies_false() {
    assert!(!verify_password("anything", "not-a-phc-string"));
    assert!(!verify_password("anything", ""));
}
