use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::profile::UserRole;

/// Identity handed over by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub role: UserRole,
}

impl Caller {
    pub fn talent(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: UserRole::Talent,
        }
    }

    pub fn recruiter(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: UserRole::Recruiter,
        }
    }

    /// Talent acting on their own profile.
    pub fn ensure_owner(&self, profile_id: &str) -> Result<()> {
        if self.role != UserRole::Talent {
            return Err(Error::Forbidden("Only talent users can do this".to_string()));
        }
        if self.user_id != profile_id {
            return Err(Error::Forbidden(
                "Profile belongs to another user".to_string(),
            ));
        }
        Ok(())
    }

    /// Owner, or any recruiter.
    pub fn ensure_can_view(&self, profile_id: &str) -> Result<()> {
        match self.role {
            UserRole::Recruiter => Ok(()),
            UserRole::Talent if self.user_id == profile_id => Ok(()),
            UserRole::Talent => Err(Error::Forbidden(
                "Profile belongs to another user".to_string(),
            )),
        }
    }

    pub fn ensure_recruiter(&self) -> Result<()> {
        match self.role {
            UserRole::Recruiter => Ok(()),
            UserRole::Talent => Err(Error::Forbidden(
                "Only recruiters can browse talent".to_string(),
            )),
        }
    }
}
