use chrono::Utc;
use tracing::info;

use swopp_db::queries;
use swopp_types::api::UpdateUserRequest;
use swopp_types::models::{Role, User};

use crate::guard::{self, Actor};
use crate::rows::{self, format_timestamp};
use crate::{Cleanup, ImageUpload, Result, Swopp, SwoppError};

pub const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 64;

/// Trim and lowercase an email, rejecting anything without a local part and
/// a domain.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(SwoppError::validation("email must look like name@domain")),
    }
}

pub fn validate_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(SwoppError::Validation(format!(
            "name must be 1-{} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(SwoppError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

impl Swopp {
    /// Create a regular account. `password_hash` is stored as given.
    pub async fn register_user(
        &self,
        email: &str,
        name: &str,
        password_hash: String,
        is_driver: bool,
    ) -> Result<User> {
        self.insert_user(email, name, password_hash, is_driver, Role::User)
            .await
    }

    /// Create the bootstrap admin account unless the email is already taken.
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, email: &str, name: &str, password_hash: String) -> Result<bool> {
        let email = normalize_email(email)?;
        let lookup = email.clone();
        if self
            .blocking(move |db| Ok(db.get_user(&lookup)?))
            .await?
            .is_some()
        {
            return Ok(false);
        }
        match self
            .insert_user(&email, name, password_hash, false, Role::Admin)
            .await
        {
            Ok(_) => Ok(true),
            // lost a race with another seeder
            Err(SwoppError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn insert_user(
        &self,
        email: &str,
        name: &str,
        password_hash: String,
        is_driver: bool,
        role: Role,
    ) -> Result<User> {
        let email = normalize_email(email)?;
        let name = validate_name(name)?;
        let created_at = format_timestamp(Utc::now());

        let row = self
            .blocking(move |db| {
                db.create_user(&email, &name, &password_hash, is_driver, role.as_str(), &created_at)
                    .map_err(|e| {
                        if swopp_db::is_unique_violation(&e) {
                            SwoppError::Conflict("email already registered".into())
                        } else {
                            SwoppError::from(e)
                        }
                    })?;
                db.get_user(&email)?.ok_or(SwoppError::NotFound("user"))
            })
            .await?;

        info!("User registered: {} ({})", row.email, row.role);
        rows::user_from_row(row)
    }

    /// The stored account and password hash for `email`, for login.
    pub async fn credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        let email = email.trim().to_lowercase();
        let row = self.blocking(move |db| Ok(db.get_user(&email)?)).await?;
        match row {
            Some(mut row) => {
                let hash = std::mem::take(&mut row.password);
                Ok(Some((rows::user_from_row(row)?, hash)))
            }
            None => Ok(None),
        }
    }

    pub async fn get_user(&self, email: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        let row = self
            .blocking(move |db| db.get_user(&email)?.ok_or(SwoppError::NotFound("user")))
            .await?;
        rows::user_from_row(row)
    }

    /// Every account. Admin only.
    pub async fn list_users(&self, actor: &Actor) -> Result<Vec<User>> {
        guard::require_admin(actor)?;
        let found = self.blocking(|db| Ok(db.list_users()?)).await?;
        rows::collect(found, rows::user_from_row)
    }

    /// Change display name or driver flag. Owner or admin.
    pub async fn update_user(
        &self,
        email: &str,
        actor: &Actor,
        update: UpdateUserRequest,
    ) -> Result<User> {
        let target = self.get_user(email).await?;
        guard::authorize(actor, &target)?;
        let name = update.name.as_deref().map(validate_name).transpose()?;
        let is_driver = update.is_driver;

        let email = target.email;
        let row = self
            .blocking(move |db| {
                if !db.update_user(&email, name.as_deref(), is_driver)? {
                    return Err(SwoppError::NotFound("user"));
                }
                db.get_user(&email)?.ok_or(SwoppError::NotFound("user"))
            })
            .await?;

        info!("User {} updated by {}", row.email, actor.email);
        rows::user_from_row(row)
    }

    /// Replace the profile picture. The old file is removed after the new
    /// key has committed.
    pub async fn set_picture(&self, email: &str, actor: &Actor, image: ImageUpload) -> Result<User> {
        let target = self.get_user(email).await?;
        guard::authorize(actor, &target)?;

        let key = self.store_image(&image).await?;
        let new_key = key.clone();
        let email = target.email;
        let result = self
            .blocking(move |db| {
                db.with_tx(|tx| {
                    let current = queries::query_user(tx, &email)?.ok_or(SwoppError::NotFound("user"))?;
                    queries::set_user_picture(tx, &email, Some(&new_key))?;
                    let updated = queries::query_user(tx, &email)?.ok_or(SwoppError::NotFound("user"))?;
                    Ok((updated, current.picture))
                })
            })
            .await;

        match result {
            Ok((row, replaced)) => {
                info!("Picture of {} set to {} by {}", row.email, key, actor.email);
                Cleanup::remove(self.images.as_ref(), replaced).await;
                rows::user_from_row(row)
            }
            Err(e) => {
                self.discard_image(Some(&key)).await;
                Err(e)
            }
        }
    }

    /// Remove an account with every request it sent. Requests it was driving
    /// stay, with the driver cleared. Admin only, and not on oneself.
    pub async fn delete_user(&self, email: &str, actor: &Actor) -> Result<Cleanup> {
        guard::require_admin(actor)?;
        let email = email.trim().to_lowercase();
        if actor.is(&email) {
            return Err(SwoppError::validation("admins cannot delete their own account"));
        }

        let target = email.clone();
        let images = self
            .blocking(move |db| {
                db.with_tx(|tx| {
                    let user = queries::query_user(tx, &target)?.ok_or(SwoppError::NotFound("user"))?;
                    let mut images = queries::item_images_for_sender(tx, &target)?;
                    images.extend(user.picture);
                    queries::delete_user(tx, &target)?;
                    Ok(images)
                })
            })
            .await?;

        info!("User {} deleted by {}", email, actor.email);
        Ok(Cleanup::remove(self.images.as_ref(), images).await)
    }
}
