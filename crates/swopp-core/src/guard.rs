//! Ownership and role checks shared by every mutating operation.

use swopp_db::models::{RequestRow, UserRow};
use swopp_types::api::Claims;
use swopp_types::models::{Request, Role, User};

use crate::error::{Result, SwoppError};

/// An already-authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn user(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            role: Role::User,
        }
    }

    pub fn admin(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is(&self, email: &str) -> bool {
        self.email == email
    }
}

impl From<Claims> for Actor {
    fn from(claims: Claims) -> Self {
        Self {
            email: claims.sub,
            role: claims.role,
        }
    }
}

/// A resource with a single owning account.
pub trait Owned {
    fn owner_email(&self) -> &str;
}

impl Owned for Request {
    fn owner_email(&self) -> &str {
        &self.sender_email
    }
}

impl Owned for RequestRow {
    fn owner_email(&self) -> &str {
        &self.sender_email
    }
}

impl Owned for User {
    fn owner_email(&self) -> &str {
        &self.email
    }
}

impl Owned for UserRow {
    fn owner_email(&self) -> &str {
        &self.email
    }
}

pub fn owns<R: Owned + ?Sized>(actor: &Actor, resource: &R) -> bool {
    actor.is(resource.owner_email())
}

/// Passes if the actor owns the resource or is an admin.
pub fn authorize<R: Owned + ?Sized>(actor: &Actor, resource: &R) -> Result<()> {
    if actor.is_admin() || owns(actor, resource) {
        Ok(())
    } else {
        Err(SwoppError::Forbidden("not the owner of this resource"))
    }
}

pub fn require_admin(actor: &Actor) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(SwoppError::Forbidden("admin role required"))
    }
}
