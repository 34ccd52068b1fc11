use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Helper function to format the date
///
/// Formats a `NaiveDate` as "dd-mm-yyyy".
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// Trims `value` and fails with "`field` is required" when nothing is left.
pub fn required(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Like [`required`], but only for fields that are present.
pub fn required_if_present(value: Option<String>, field: &str) -> Result<Option<String>, AppError> {
    value.map(|v| required(&v, field)).transpose()
}

/// Lowercases and sanity-checks an e-mail address.
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = required(email, "email")?.to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        });
    if !valid || email.contains(char::is_whitespace) {
        return Err(AppError::Validation(format!("Invalid email address: {email}")));
    }
    Ok(email)
}

/// Accepts only absolute http(s) URLs, as produced by the image host.
pub fn validate_url(url: &str, field: &str) -> Result<String, AppError> {
    let url = required(url, field)?;
    let has_host = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .is_some_and(|rest| !rest.is_empty() && !rest.starts_with('/'));
    if !has_host {
        return Err(AppError::Validation(format!(
            "{field} must be an http(s) URL"
        )));
    }
    Ok(url)
}

#[derive(Deserialize, Debug, Clone, Copy, Default)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    /// Returns `(limit, offset)` with 1-based pages and a capped page size.
    pub fn limit_offset(&self) -> Result<(i64, i64), AppError> {
        let page = self.page.unwrap_or(1);
        let per_page = self.per_page.unwrap_or(DEFAULT_PAGE_SIZE);
        if page < 1 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&per_page) {
            return Err(AppError::Validation(format!(
                "per_page must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let offset = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| AppError::Validation("page is out of range".to_string()))?;
        Ok((per_page, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_day_first() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(format_date(date), "07-03-2025");
    }

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("  Aspirin ", "name").unwrap(), "Aspirin");
        assert!(required("   ", "name").is_err());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(
            normalize_email(" Ada@Example.COM ").unwrap(),
            "ada@example.com"
        );
        assert!(normalize_email("ada@localhost").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ada example@x.com").is_err());
    }

    #[test]
    fn urls_need_a_scheme_and_host() {
        assert!(validate_url("https://img.example.com/rx.png", "image_url").is_ok());
        assert!(validate_url("ftp://img.example.com/rx.png", "image_url").is_err());
        assert!(validate_url("https://", "image_url").is_err());
    }

    #[test]
    fn pagination_defaults_and_bounds() {
        assert_eq!(Pagination::default().limit_offset().unwrap(), (20, 0));
        let third = Pagination {
            page: Some(3),
            per_page: Some(10),
        };
        assert_eq!(third.limit_offset().unwrap(), (10, 20));
        let huge = Pagination {
            page: Some(1),
            per_page: Some(500),
        };
        assert!(huge.limit_offset().is_err());
    }

    #[test]
    fn far_pages_are_refused_instead_of_overflowing() {
        let far = Pagination {
            page: Some(i64::MAX),
            per_page: Some(MAX_PAGE_SIZE),
        };
        assert!(matches!(far.limit_offset(), Err(AppError::Validation(_))));

        let last = Pagination {
            page: Some(i64::MAX / MAX_PAGE_SIZE),
            per_page: Some(MAX_PAGE_SIZE),
        };
        assert!(last.limit_offset().is_ok());
    }
}
