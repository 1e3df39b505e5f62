use super::*;

fn contact(email: &str, phone: &str) -> CustomerContact {
    CustomerContact {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: email.into(),
        phone: phone.into(),
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn created_record_is_listed_once_with_empty_issue() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = storage
        .create_record(&contact("ada@example.com", "5550000001"))
        .await
        .expect("create");

    let records = storage.list_records().await.expect("list");
    let matching: Vec<_> = records.iter().filter(|r| r.id == id).collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].email, "ada@example.com");
    assert_eq!(matching[0].issue, None);
    assert!(matching[0].updated_at >= matching[0].created_at);
}

#[tokio::test]
async fn list_is_ordered_by_identifier() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage
        .create_record(&contact("a@example.com", "5550000001"))
        .await
        .expect("first");
    let second = storage
        .create_record(&contact("b@example.com", "5550000002"))
        .await
        .expect("second");

    let ids: Vec<_> = storage
        .list_records()
        .await
        .expect("list")
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![first, second]);
}

#[tokio::test]
async fn duplicate_email_or_phone_is_a_unique_violation() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .create_record(&contact("ada@example.com", "5550000001"))
        .await
        .expect("create");

    let same_email = storage
        .create_record(&contact("ada@example.com", "5550000002"))
        .await
        .expect_err("duplicate email");
    assert!(is_unique_violation(&same_email));

    let same_phone = storage
        .create_record(&contact("other@example.com", "5550000001"))
        .await
        .expect_err("duplicate phone");
    assert!(is_unique_violation(&same_phone));

    assert_eq!(storage.list_records().await.expect("list").len(), 1);
}

#[test]
fn other_errors_are_not_unique_violations() {
    let err = anyhow::anyhow!("connection reset");
    assert!(!is_unique_violation(&err));
}

#[tokio::test]
async fn set_issue_text_is_visible_through_phone_lookup() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert_eq!(storage.find_by_phone("5550000001").await.expect("lookup"), None);

    let id = storage
        .create_record(&contact("ada@example.com", "5550000001"))
        .await
        .expect("create");
    let before = storage.find_by_phone("5550000001").await.expect("lookup");
    assert_eq!(
        before,
        Some(PhoneLookup {
            customer_id: id,
            issue: None
        })
    );

    let affected = storage.set_issue_text(id, "X").await.expect("set issue");
    assert_eq!(affected, 1);
    let after = storage
        .find_by_phone("5550000001")
        .await
        .expect("lookup")
        .expect("match");
    assert_eq!(after.issue.as_deref(), Some("X"));
}

#[tokio::test]
async fn update_overwrites_all_fields_and_keeps_timestamps_ordered() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = storage
        .create_record(&contact("ada@example.com", "5550000001"))
        .await
        .expect("create");
    let original = storage.get_record(id).await.expect("get").expect("record");

    let mut changed = contact("countess@example.com", "5550000009");
    changed.first_name = "Augusta".into();
    let affected = storage
        .update_record(id, &changed, Some("printer on fire"))
        .await
        .expect("update");
    assert_eq!(affected, 1);

    let updated = storage.get_record(id).await.expect("get").expect("record");
    assert_eq!(updated.first_name, "Augusta");
    assert_eq!(updated.email, "countess@example.com");
    assert_eq!(updated.phone, "5550000009");
    assert_eq!(updated.issue.as_deref(), Some("printer on fire"));
    assert_eq!(updated.created_at, original.created_at);
    assert!(updated.updated_at >= original.updated_at);
}

#[tokio::test]
async fn update_into_existing_email_is_a_unique_violation() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .create_record(&contact("a@example.com", "5550000001"))
        .await
        .expect("first");
    let second = storage
        .create_record(&contact("b@example.com", "5550000002"))
        .await
        .expect("second");

    let err = storage
        .update_record(second, &contact("a@example.com", "5550000002"), None)
        .await
        .expect_err("conflict");
    assert!(is_unique_violation(&err));
}

#[tokio::test]
async fn mutations_on_missing_identifier_affect_zero_rows() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let missing = CustomerId(404);

    let updated = storage
        .update_record(missing, &contact("a@example.com", "5550000001"), None)
        .await
        .expect("update");
    assert_eq!(updated, 0);
    assert_eq!(storage.set_issue_text(missing, "x").await.expect("set"), 0);
    assert_eq!(storage.delete_record(missing).await.expect("delete"), 0);
    assert!(storage.list_records().await.expect("list").is_empty());
}

#[tokio::test]
async fn delete_removes_the_row() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = storage
        .create_record(&contact("ada@example.com", "5550000001"))
        .await
        .expect("create");

    assert_eq!(storage.delete_record(id).await.expect("delete"), 1);
    assert_eq!(storage.get_record(id).await.expect("get"), None);
    assert_eq!(storage.find_by_phone("5550000001").await.expect("lookup"), None);
}

#[test]
fn memory_url_has_no_parent_directory() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/app.db?mode=rwc"),
        Some(PathBuf::from("./data/app.db"))
    );
}
