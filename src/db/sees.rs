//! SEES record queries.

use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;

use super::{NewSees, NsRecord, Sees, SeesChanges, SeesRow};

async fn ns_records_for(pool: &SqlitePool, sees_id: i64) -> Result<Vec<NsRecord>, sqlx::Error> {
    sqlx::query_as::<_, NsRecord>("SELECT * FROM ns_records WHERE sees_id = ? ORDER BY id")
        .bind(sees_id)
        .fetch_all(pool)
        .await
}

/// All records with their name servers, newest first
pub async fn list(pool: &SqlitePool) -> Result<Vec<Sees>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SeesRow>("SELECT * FROM sees ORDER BY created_at DESC, id DESC")
        .fetch_all(pool)
        .await?;

    let ns_records = sqlx::query_as::<_, NsRecord>("SELECT * FROM ns_records ORDER BY id")
        .fetch_all(pool)
        .await?;
    let mut by_sees: HashMap<i64, Vec<NsRecord>> = HashMap::new();
    for record in ns_records {
        by_sees.entry(record.sees_id).or_default().push(record);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let records = by_sees.remove(&row.id).unwrap_or_default();
            Sees::from_row(row, records)
        })
        .collect())
}

pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<Sees>, sqlx::Error> {
    let row = sqlx::query_as::<_, SeesRow>("SELECT * FROM sees WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let records = ns_records_for(pool, row.id).await?;
            Ok(Some(Sees::from_row(row, records)))
        }
        None => Ok(None),
    }
}

/// Insert a record and its name servers in one transaction.
/// A duplicate target domain surfaces as a unique violation.
pub async fn create(pool: &SqlitePool, new_sees: NewSees) -> Result<Sees, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let variables = serde_json::Value::Object(new_sees.template_variables).to_string();

    let mut tx = pool.begin().await?;

    let id = sqlx::query(
        r#"
        INSERT INTO sees (title, target_domain, redirect_url, note, preview_url, template_variables, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new_sees.title)
    .bind(&new_sees.target_domain)
    .bind(&new_sees.redirect_url)
    .bind(&new_sees.note)
    .bind(&new_sees.preview_url)
    .bind(&variables)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for name_server in &new_sees.ns_records {
        sqlx::query("INSERT INTO ns_records (sees_id, name_server, created_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(name_server)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    find(pool, id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn update(
    pool: &SqlitePool,
    id: i64,
    changes: SeesChanges,
) -> Result<Option<Sees>, sqlx::Error> {
    let variables = serde_json::Value::Object(changes.template_variables).to_string();

    let result = sqlx::query(
        r#"
        UPDATE sees
        SET redirect_url = ?, note = ?, preview_url = ?, template_variables = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&changes.redirect_url)
    .bind(&changes.note)
    .bind(&changes.preview_url)
    .bind(&variables)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    find(pool, id).await
}

/// Record the cloud resources created for a record and replace its name servers
pub async fn attach_resources(
    pool: &SqlitePool,
    id: i64,
    static_app_name: &str,
    dns_zone_name: &str,
    preview_url: &str,
    name_servers: &[String],
) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE sees
        SET static_app_name = ?, dns_zone_name = ?, preview_url = COALESCE(preview_url, ?), updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(static_app_name)
    .bind(dns_zone_name)
    .bind(preview_url)
    .bind(&now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if !name_servers.is_empty() {
        sqlx::query("DELETE FROM ns_records WHERE sees_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for name_server in name_servers {
            sqlx::query(
                "INSERT INTO ns_records (sees_id, name_server, created_at) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(name_server)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await
}

/// Delete a record; its name servers go with it. Returns false if it did not exist.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sees WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
