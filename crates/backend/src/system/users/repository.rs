use anyhow::{Context, Result};
use chrono::Utc;
use contracts::system::users::User;
use serde_json::{json, Value};

use crate::shared::data::db::get_store;
use crate::shared::data::store::{Query, SortDirection};

const USERS_COLLECTION: &str = "sys_users";

/// Create user with password hash
pub async fn create_with_password(user: &User, password_hash: &str) -> Result<()> {
    let mut doc = serde_json::to_value(user).context("Failed to serialize user")?;
    if let Some(obj) = doc.as_object_mut() {
        obj.insert(
            "password_hash".to_string(),
            Value::String(password_hash.to_string()),
        );
    }

    get_store()
        .set(USERS_COLLECTION, &user.id, doc)
        .await
        .context("Failed to insert user")?;

    Ok(())
}

/// Get user by ID
pub async fn get_by_id(id: &str) -> Result<Option<User>> {
    let doc = get_store().get(USERS_COLLECTION, id).await?;
    match doc {
        Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        None => Ok(None),
    }
}

/// Get user by username
pub async fn get_by_username(username: &str) -> Result<Option<User>> {
    let docs = get_store()
        .query(
            Query::new(USERS_COLLECTION)
                .where_eq("username", username)
                .limit(1),
        )
        .await?;

    match docs.into_iter().next() {
        Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        None => Ok(None),
    }
}

/// List all users
pub async fn list_all() -> Result<Vec<User>> {
    let docs = get_store()
        .query(Query::new(USERS_COLLECTION).order_by("username", SortDirection::Asc))
        .await?;

    let mut users = Vec::with_capacity(docs.len());
    for doc in docs {
        users.push(serde_json::from_value(doc)?);
    }
    Ok(users)
}

/// Count registered users
pub async fn count_users() -> Result<usize> {
    let docs = get_store().query(Query::new(USERS_COLLECTION)).await?;
    Ok(docs.len())
}

/// Update user fields (password hash is kept by the merge)
pub async fn update(user: &User) -> Result<()> {
    let patch = serde_json::to_value(user)?;
    get_store()
        .update(USERS_COLLECTION, &user.id, patch)
        .await
        .context("Failed to update user")?;
    Ok(())
}

/// Delete user
pub async fn delete(id: &str) -> Result<bool> {
    let exists = get_store().get(USERS_COLLECTION, id).await?.is_some();
    if !exists {
        return Ok(false);
    }

    get_store().delete(USERS_COLLECTION, id).await?;
    Ok(true)
}

/// Get password hash for a user
pub async fn get_password_hash(id: &str) -> Result<Option<String>> {
    let doc = get_store().get(USERS_COLLECTION, id).await?;
    Ok(doc
        .as_ref()
        .and_then(|d| d.get("password_hash"))
        .and_then(|v| v.as_str())
        .map(str::to_string))
}

/// Update password hash
pub async fn update_password(id: &str, password_hash: &str) -> Result<()> {
    get_store()
        .update(
            USERS_COLLECTION,
            id,
            json!({
                "password_hash": password_hash,
                "updated_at": Utc::now().to_rfc3339(),
            }),
        )
        .await
        .context("Failed to update password")?;
    Ok(())
}

/// Update last login timestamp
pub async fn update_last_login(id: &str) -> Result<()> {
    get_store()
        .update(
            USERS_COLLECTION,
            id,
            json!({ "last_login_at": Utc::now().to_rfc3339() }),
        )
        .await?;
    Ok(())
}
