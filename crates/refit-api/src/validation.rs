use crate::error::ApiError;

pub const TITLE_MAX_CHARS: usize = 200;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Title and content of a result, checked in order; the first violated rule
/// is reported. Returns the trimmed title.
pub fn validate_result_fields<'a>(title: &'a str, content: &str) -> Result<&'a str, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("Title is required".into()));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(ApiError::Validation(format!(
            "Title must be at most {} characters",
            TITLE_MAX_CHARS
        )));
    }
    if content.trim().is_empty() {
        return Err(ApiError::Validation("Content is required".into()));
    }
    Ok(title)
}

/// `page` is 1-based. Oversized limits are capped rather than rejected.
pub fn validate_window(page: u32, limit: u32) -> Result<(u32, u32), ApiError> {
    if page == 0 {
        return Err(ApiError::Validation("page must be at least 1".into()));
    }
    if limit == 0 {
        return Err(ApiError::Validation("limit must be at least 1".into()));
    }
    Ok((page, limit.min(MAX_PAGE_SIZE)))
}
