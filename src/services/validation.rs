use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::errors::{CoreError, CoreResult};

const MAX_NAME_LEN: usize = 200;
const MAX_PATH_LEN: usize = 1024;

/// Request field checks shared by the services
pub struct ValidationService;

impl ValidationService {
    /// Trimmed, non-empty, at most 200 characters
    pub fn validate_name(field: &str, name: &str) -> CoreResult<String> {
        let trimmed = name.trim();

        if trimmed.is_empty() {
            return Err(CoreError::invalid_field(field, "Name cannot be empty"));
        }

        if trimmed.chars().count() > MAX_NAME_LEN {
            return Err(CoreError::invalid_field(
                field,
                format!("Name is too long (max {} characters)", MAX_NAME_LEN),
            ));
        }

        Ok(trimmed.to_string())
    }

    /// Blank strings become `None`
    pub fn optional_text(value: Option<String>) -> Option<String> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn validate_email(email: &str) -> CoreResult<String> {
        let email = email.trim().to_lowercase();

        let (local, domain) = email
            .split_once('@')
            .ok_or_else(|| CoreError::invalid_field("email", "Invalid email format"))?;

        if local.is_empty()
            || domain.is_empty()
            || domain.contains('@')
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
        {
            return Err(CoreError::invalid_field("email", "Invalid email format"));
        }

        if email.len() > 254 {
            return Err(CoreError::invalid_field("email", "Email is too long"));
        }

        Ok(email)
    }

    pub fn validate_password(password: &str) -> CoreResult<()> {
        if password.len() < 8 {
            return Err(CoreError::invalid_field(
                "password",
                "Password must be at least 8 characters long",
            ));
        }
        Ok(())
    }

    /// Parse a `YYYY-MM-DD` date
    pub fn parse_date(field: &str, value: &str) -> CoreResult<NaiveDate> {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
            CoreError::invalid_field(field, "Date must use the YYYY-MM-DD format")
        })
    }

    pub fn parse_optional_date(field: &str, value: Option<&str>) -> CoreResult<Option<NaiveDate>> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => Self::parse_date(field, v).map(Some),
            None => Ok(None),
        }
    }

    /// Reduce an uploaded object reference to a storage path.
    ///
    /// Absolute URLs keep only their path; the result always starts with `/`
    /// and never contains a `..` segment.
    pub fn normalize_file_url(raw: &str) -> CoreResult<String> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(CoreError::invalid_field("fileUrl", "File URL cannot be empty"));
        }

        let path = match Url::parse(trimmed) {
            Ok(url) if url.has_host() => url.path().to_string(),
            _ => trimmed
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        if path.split('/').any(|segment| segment == "..") {
            return Err(CoreError::invalid_field(
                "fileUrl",
                "File URL cannot contain '..' segments",
            ));
        }

        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };

        if path == "/" {
            return Err(CoreError::invalid_field("fileUrl", "File URL has no path"));
        }

        if path.len() > MAX_PATH_LEN {
            return Err(CoreError::invalid_field("fileUrl", "File URL is too long"));
        }

        Ok(path)
    }

    /// Lower-cased extension of a file name
    pub fn file_extension(file_name: &str) -> Option<String> {
        let (stem, ext) = file_name.trim().rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Distinguishes an explicit `null` from an absent field in PATCH bodies.
///
/// Use with `#[serde(default, deserialize_with = "patch_field")]` on an
/// `Option<Option<T>>`: absent stays `None`, `null` becomes `Some(None)`.
pub fn patch_field<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
