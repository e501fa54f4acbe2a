//! User queries.

use chrono::Utc;
use sqlx::SqlitePool;

use super::{NewUser, User};
use crate::auth::Role;

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// All users, newest first
pub async fn list(pool: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC, rowid DESC")
        .fetch_all(pool)
        .await
}

/// Insert a user. A duplicate email surfaces as a unique violation.
pub async fn create(pool: &SqlitePool, new_user: NewUser) -> Result<User, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new_user.name)
    .bind(&new_user.email)
    .bind(&new_user.password_hash)
    .bind(new_user.role)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(User {
        id,
        name: new_user.name,
        email: new_user.email,
        password_hash: new_user.password_hash,
        role: new_user.role,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Returns false when no such user exists
pub async fn update_password(
    pool: &SqlitePool,
    id: &str,
    password_hash: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_role(
    pool: &SqlitePool,
    id: &str,
    role: Role,
) -> Result<Option<User>, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    find_by_id(pool, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{is_unique_violation, test_pool};

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            name: "Staff".to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let pool = test_pool().await;
        let user = create(&pool, new_user("a@example.jp", Role::Editor))
            .await
            .unwrap();

        let by_email = find_by_email(&pool, "a@example.jp").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert_eq!(by_email.role, Role::Editor);

        let by_id = find_by_id(&pool, &user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "a@example.jp");
        assert!(find_by_email(&pool, "b@example.jp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let pool = test_pool().await;
        create(&pool, new_user("dup@example.jp", Role::Viewer))
            .await
            .unwrap();
        let err = create(&pool, new_user("dup@example.jp", Role::Admin))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert_eq!(list(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_role_and_password() {
        let pool = test_pool().await;
        let user = create(&pool, new_user("r@example.jp", Role::Viewer))
            .await
            .unwrap();

        let updated = update_role(&pool, &user.id, Role::Admin)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert!(update_role(&pool, "missing", Role::Admin)
            .await
            .unwrap()
            .is_none());

        assert!(update_password(&pool, &user.id, "new-hash").await.unwrap());
        assert!(!update_password(&pool, "missing", "new-hash").await.unwrap());
        let reloaded = find_by_id(&pool, &user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "new-hash");
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let pool = test_pool().await;
        let first = create(&pool, new_user("1@example.jp", Role::Viewer))
            .await
            .unwrap();
        let second = create(&pool, new_user("2@example.jp", Role::Viewer))
            .await
            .unwrap();

        let users = list(&pool).await.unwrap();
        let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    }
}
