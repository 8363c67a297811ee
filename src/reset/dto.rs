use serde::Deserialize;

use crate::{
    auth::dto::MIN_PASSWORD_LEN,
    validation::{normalize_email, Violations},
};

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

impl ResetRequest {
    pub fn normalize(&mut self) {
        self.email = normalize_email(&self.email);
    }

    pub fn validate(&self) -> Result<(), Violations> {
        let mut v = Violations::new();
        v.check_email("email", &self.email);
        v.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirmRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

impl ResetConfirmRequest {
    pub fn normalize(&mut self) {
        self.email = normalize_email(&self.email);
        self.code = self.code.trim().to_string();
    }

    pub fn validate(&self) -> Result<(), Violations> {
        let mut v = Violations::new();
        v.check_email("email", &self.email);
        if self.code.is_empty() {
            v.push("code", "is required");
        }
        v.check_min_length("new_password", &self.new_password, MIN_PASSWORD_LEN);
        v.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<(), Violations> {
        let mut v = Violations::new();
        if self.old_password.is_empty() {
            v.push("old_password", "is required");
        }
        v.check_min_length("new_password", &self.new_password, MIN_PASSWORD_LEN);
        v.into_result()
    }
}
