use chrono::Utc;
use task_portal::models::{
    CreateTaskRequest, TITLE_MAX_LEN, TaskStatus, TokenValidationResponse, UpdateTaskRequest,
    User, UserResponse,
};

// --- Task status catalog ---

#[test]
fn test_task_status_round_trip() {
    for status in [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Completed] {
        assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(TaskStatus::parse("done"), None);
    assert_eq!(TaskStatus::parse("PENDING"), None);
    assert_eq!(TaskStatus::parse(""), None);
}

// --- Create payload ---

#[test]
fn test_create_task_defaults_status_to_pending() {
    let payload = CreateTaskRequest {
        title: "Read chapter 4".to_string(),
        description: None,
        status: None,
    };
    assert_eq!(payload.validate(), Ok(TaskStatus::Pending));
}

#[test]
fn test_create_task_title_bounds() {
    let empty = CreateTaskRequest {
        title: String::new(),
        ..Default::default()
    };
    assert!(empty.validate().is_err());

    let at_limit = CreateTaskRequest {
        title: "x".repeat(TITLE_MAX_LEN),
        ..Default::default()
    };
    assert!(at_limit.validate().is_ok());

    let over_limit = CreateTaskRequest {
        title: "x".repeat(TITLE_MAX_LEN + 1),
        ..Default::default()
    };
    assert!(over_limit.validate().is_err());
}

#[test]
fn test_create_task_description_bound() {
    let at_limit = CreateTaskRequest {
        title: "ok".to_string(),
        description: Some("d".repeat(1000)),
        status: None,
    };
    assert!(at_limit.validate().is_ok());

    let over_limit = CreateTaskRequest {
        title: "ok".to_string(),
        description: Some("d".repeat(1001)),
        status: None,
    };
    assert!(over_limit.validate().is_err());
}

#[test]
fn test_create_task_rejects_unknown_status() {
    let payload = CreateTaskRequest {
        title: "ok".to_string(),
        description: None,
        status: Some("archived".to_string()),
    };
    assert!(payload.validate().is_err());

    let payload = CreateTaskRequest {
        title: "ok".to_string(),
        description: None,
        status: Some("in_progress".to_string()),
    };
    assert_eq!(payload.validate(), Ok(TaskStatus::InProgress));
}

#[test]
fn test_title_limit_counts_characters_not_bytes() {
    // 200 multibyte characters are within bounds even though the byte length
    // exceeds 200.
    let payload = CreateTaskRequest {
        title: "ü".repeat(TITLE_MAX_LEN),
        ..Default::default()
    };
    assert!(payload.validate().is_ok());
}

// --- Update payload ---

#[test]
fn test_update_task_all_fields_optional() {
    assert_eq!(UpdateTaskRequest::default().validate(), Ok(None));
}

#[test]
fn test_update_task_validates_provided_fields_only() {
    let bad_title = UpdateTaskRequest {
        title: Some(String::new()),
        ..Default::default()
    };
    assert!(bad_title.validate().is_err());

    let bad_status = UpdateTaskRequest {
        status: Some("bogus".to_string()),
        ..Default::default()
    };
    assert!(bad_status.validate().is_err());

    let good = UpdateTaskRequest {
        status: Some("completed".to_string()),
        ..Default::default()
    };
    assert_eq!(good.validate(), Ok(Some(TaskStatus::Completed)));
}

// --- Output projections ---

#[test]
fn test_user_response_never_carries_password_hash() {
    let now = Utc::now();
    let user = User {
        id: 1,
        username: "ali".to_string(),
        email: "ali@example.com".to_string(),
        password_hash: "$argon2id$v=19$secret".to_string(),
        role: "student".to_string(),
        is_active: true,
        last_login: None,
        created_at: now,
        updated_at: now,
    };

    let response: UserResponse = user.into();
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["username"], "ali");
    assert!(json.get("password_hash").is_none());
    assert!(!json.to_string().contains("argon2"));
}

#[test]
fn test_invalid_validation_response_omits_user_fields() {
    let json = serde_json::to_value(TokenValidationResponse::invalid()).unwrap();
    assert_eq!(json["valid"], false);
    assert!(json.get("username").is_none());
    assert!(json.get("role").is_none());
    assert!(json.get("is_active").is_none());
}

#[test]
fn test_task_status_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&TaskStatus::InProgress).unwrap(),
        "\"in_progress\""
    );
    let parsed: TaskStatus = serde_json::from_str("\"completed\"").unwrap();
    assert_eq!(parsed, TaskStatus::Completed);
}
