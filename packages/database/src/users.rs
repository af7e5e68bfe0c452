//! User accounts and emergency contacts.

use chrono::Utc;
use moosicbox_json_utils::database::ToValue as _;
use safe_route_database_models::{EmergencyContact, NewUser, ProfileUpdate, User, normalize_email};
use switchy_database::{Database, DatabaseValue};

use crate::{
    DbError, format_timestamp, parse_timestamp, password, read_i64, read_string, returning_id,
    unique_violation,
};

const USER_COLUMNS: &str = "id, name, email, emergency_contacts, created_at";

const EMAIL_TAKEN: &str = "User already exists";

fn row_to_user(row: &switchy_database::Row) -> Result<User, DbError> {
    let contacts_json = read_string(row, "emergency_contacts")?;
    let created_at = read_string(row, "created_at")?;

    Ok(User {
        id: read_i64(row, "id")?,
        name: read_string(row, "name")?,
        email: read_string(row, "email")?,
        emergency_contacts: serde_json::from_str(&contacts_json)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Registers a new user.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for missing fields,
/// [`DbError::Conflict`] if the email is already registered,
/// [`DbError::PasswordHash`] if hashing fails, or [`DbError::Database`] if
/// the insert fails.
pub async fn register_user(db: &dyn Database, new_user: &NewUser) -> Result<User, DbError> {
    new_user.validate()?;

    let email = normalize_email(&new_user.email);
    if find_id_by_email(db, &email).await?.is_some() {
        return Err(DbError::Conflict(EMAIL_TAKEN.to_string()));
    }
    let password_hash = password::hash_password(&new_user.password)?;

    let rows = db
        .query_raw_params(
            "INSERT INTO users (name, email, password_hash, emergency_contacts, created_at)
             VALUES ($1, $2, $3, '[]', $4)
             RETURNING id",
            &[
                DatabaseValue::String(new_user.name.trim().to_string()),
                DatabaseValue::String(email),
                DatabaseValue::String(password_hash),
                DatabaseValue::String(format_timestamp(Utc::now())),
            ],
        )
        .await
        .map_err(|e| unique_violation(e, EMAIL_TAKEN))?;

    let id = returning_id(&rows)?;
    log::info!("Registered user {id}");

    get_user(db, id)
        .await?
        .ok_or(DbError::NotFound { entity: "user", id })
}

/// Checks an email/password pair.
///
/// Returns `None` when the email is unknown or the password does not match,
/// without distinguishing the two.
///
/// # Errors
///
/// Returns [`DbError`] if the lookup fails.
pub async fn authenticate(
    db: &dyn Database,
    email: &str,
    password: &str,
) -> Result<Option<User>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, password_hash FROM users WHERE email = $1",
            &[DatabaseValue::String(normalize_email(email))],
        )
        .await?;

    let Some(row) = rows.first() else {
        return Ok(None);
    };

    let stored = read_string(row, "password_hash")?;
    if !password::verify_password(password, &stored) {
        log::debug!("Rejected login for {email}");
        return Ok(None);
    }

    get_user(db, read_i64(row, "id")?).await
}

/// Loads a user without credentials.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value is malformed.
pub async fn get_user(db: &dyn Database, id: i64) -> Result<Option<User>, DbError> {
    let rows = db
        .query_raw_params(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"),
            &[DatabaseValue::Int64(id)],
        )
        .await?;

    rows.first().map(row_to_user).transpose()
}

/// Whether a user with `id` exists.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn user_exists(db: &dyn Database, id: i64) -> Result<bool, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT COUNT(*) AS cnt FROM users WHERE id = $1",
            &[DatabaseValue::Int64(id)],
        )
        .await?;

    let count: i64 = rows.first().map_or(0, |r| r.to_value("cnt").unwrap_or(0));
    Ok(count > 0)
}

async fn find_id_by_email(db: &dyn Database, email: &str) -> Result<Option<i64>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id FROM users WHERE email = $1",
            &[DatabaseValue::String(email.to_string())],
        )
        .await?;

    rows.first().map(|row| read_i64(row, "id")).transpose()
}

/// Updates the user's name and/or email.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown user, [`DbError::Conflict`]
/// if the new email belongs to someone else, or [`DbError::Validation`] for
/// invalid fields.
pub async fn update_profile(
    db: &dyn Database,
    id: i64,
    update: &ProfileUpdate,
) -> Result<User, DbError> {
    update.validate()?;

    let email = update.email.as_deref().map(normalize_email);
    if let Some(email) = &email
        && let Some(owner) = find_id_by_email(db, email).await?
        && owner != id
    {
        return Err(DbError::Conflict(EMAIL_TAKEN.to_string()));
    }

    let updated = db
        .exec_raw_params(
            "UPDATE users
             SET name = COALESCE($1, name),
                 email = COALESCE($2, email)
             WHERE id = $3",
            &[
                update
                    .name
                    .as_deref()
                    .map_or(DatabaseValue::Null, |n| DatabaseValue::String(n.trim().to_string())),
                email.map_or(DatabaseValue::Null, DatabaseValue::String),
                DatabaseValue::Int64(id),
            ],
        )
        .await
        .map_err(|e| unique_violation(e, EMAIL_TAKEN))?;

    if updated == 0 {
        return Err(DbError::NotFound { entity: "user", id });
    }

    get_user(db, id)
        .await?
        .ok_or(DbError::NotFound { entity: "user", id })
}

/// Replaces the user's emergency contact list, preserving the given order.
///
/// # Errors
///
/// Returns [`DbError::Validation`] if any contact is invalid or
/// [`DbError::NotFound`] for an unknown user.
pub async fn replace_emergency_contacts(
    db: &dyn Database,
    id: i64,
    contacts: &[EmergencyContact],
) -> Result<User, DbError> {
    for (index, contact) in contacts.iter().enumerate() {
        contact
            .validate()
            .map_err(|e| DbError::Validation(format!("emergencyContacts[{index}]: {e}")))?;
    }

    let updated = db
        .exec_raw_params(
            "UPDATE users SET emergency_contacts = $1 WHERE id = $2",
            &[
                DatabaseValue::String(serde_json::to_string(contacts)?),
                DatabaseValue::Int64(id),
            ],
        )
        .await?;

    if updated == 0 {
        return Err(DbError::NotFound { entity: "user", id });
    }

    log::info!("User {id} now has {} emergency contacts", contacts.len());

    get_user(db, id)
        .await?
        .ok_or(DbError::NotFound { entity: "user", id })
}
