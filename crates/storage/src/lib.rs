use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::{CustomerContact, CustomerId, CustomerIssue};

const RECORD_COLUMNS: &str =
    "id, first_name, last_name, email, phone, issue, created_at, updated_at";

/// Gateway over the `customer_issues` table.
///
/// Every operation is a single statement; nothing spans a transaction with another call, so
/// concurrent operators race with last-write-wins semantics.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Outcome of `find_by_phone`: the matching record and whatever issue text it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneLookup {
    pub customer_id: CustomerId,
    pub issue: Option<String>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// All records ordered by identifier ascending.
    pub async fn list_records(&self) -> Result<Vec<CustomerIssue>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM customer_issues ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .context("failed to list customer issues")?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    pub async fn get_record(&self, id: CustomerId) -> Result<Option<CustomerIssue>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM customer_issues WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load customer issue {id}"))?;
        Ok(row.as_ref().map(record_from_row))
    }

    /// Inserts a record with no issue text. Duplicate email or phone surfaces as an error
    /// recognised by [`is_unique_violation`].
    pub async fn create_record(&self, contact: &CustomerContact) -> Result<CustomerId> {
        let now = now_millis();
        let rec = sqlx::query(
            "INSERT INTO customer_issues (first_name, last_name, email, phone, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("failed to create customer issue")?;
        let id = CustomerId(rec.get::<i64, _>(0));
        debug!(customer_id = id.0, "customer issue created");
        Ok(id)
    }

    /// Overwrites every field. Returns rows affected; an unknown id is 0, not an error.
    pub async fn update_record(
        &self,
        id: CustomerId,
        contact: &CustomerContact,
        issue: Option<&str>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE customer_issues
             SET first_name = ?, last_name = ?, email = ?, phone = ?, issue = ?,
                 updated_at = MAX(updated_at, ?)
             WHERE id = ?",
        )
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(issue)
        .bind(now_millis())
        .bind(id.0)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update customer issue {id}"))?;
        Ok(result.rows_affected())
    }

    /// Overwrites only the issue text; used for manual entry and escalation summaries.
    pub async fn set_issue_text(&self, id: CustomerId, text: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE customer_issues SET issue = ?, updated_at = MAX(updated_at, ?) WHERE id = ?",
        )
        .bind(text)
        .bind(now_millis())
        .bind(id.0)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to set issue text for {id}"))?;
        Ok(result.rows_affected())
    }

    pub async fn delete_record(&self, id: CustomerId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM customer_issues WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete customer issue {id}"))?;
        Ok(result.rows_affected())
    }

    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<PhoneLookup>> {
        let row = sqlx::query("SELECT id, issue FROM customer_issues WHERE phone = ?")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await
            .context("failed to look up issue by phone")?;
        Ok(row.map(|r| PhoneLookup {
            customer_id: CustomerId(r.get::<i64, _>(0)),
            issue: r.get::<Option<String>, _>(1),
        }))
    }
}

/// True when the error chain carries the driver's unique-constraint failure.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

fn record_from_row(r: &SqliteRow) -> CustomerIssue {
    CustomerIssue {
        id: CustomerId(r.get::<i64, _>(0)),
        first_name: r.get::<String, _>(1),
        last_name: r.get::<String, _>(2),
        email: r.get::<String, _>(3),
        phone: r.get::<String, _>(4),
        issue: r.get::<Option<String>, _>(5),
        created_at: from_millis(r.get::<i64, _>(6)),
        updated_at: from_millis(r.get::<i64, _>(7)),
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
