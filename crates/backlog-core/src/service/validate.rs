//! Input rules shared by the services. Text is trimmed before length checks;
//! lengths count characters, not bytes.

use crate::error::{BacklogError, Result};
use crate::model::item::{ItemStatus, ItemType, Priority};

pub const TITLE_MAX: usize = 200;
pub const DESCRIPTION_MAX: usize = 5_000;
pub const STORY_POINTS_MAX: u32 = 100;
pub const LABEL_MAX: usize = 50;
pub const COMMENT_MAX: usize = 2_000;
pub const SPRINT_NAME_MAX: usize = 100;
pub const GOAL_MAX: usize = 500;
pub const PROJECT_NAME_MAX: usize = 100;
pub const PROJECT_DESCRIPTION_MAX: usize = 500;

/// Required text: trimmed, non-empty, at most `max` characters.
pub fn required(field: &'static str, raw: &str, max: usize) -> Result<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(BacklogError::invalid_field(field, "must not be empty"));
    }
    if value.chars().count() > max {
        return Err(BacklogError::invalid_field(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(value.to_string())
}

/// Optional text: trimmed; empty becomes `None`.
pub fn optional(field: &'static str, raw: Option<&str>, max: usize) -> Result<Option<String>> {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max {
        return Err(BacklogError::invalid_field(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(Some(value.to_string()))
}

pub fn story_points(points: Option<u32>) -> Result<Option<u32>> {
    match points {
        Some(p) if p > STORY_POINTS_MAX => Err(BacklogError::invalid_field(
            "story_points",
            format!("must be between 0 and {STORY_POINTS_MAX}"),
        )),
        other => Ok(other),
    }
}

pub fn label(raw: &str) -> Result<String> {
    required("label", raw, LABEL_MAX)
}

/// Validate a label list, dropping duplicates while keeping first-seen order.
pub fn labels(raw: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for l in raw {
        let l = label(l)?;
        if !out.contains(&l) {
            out.push(l);
        }
    }
    Ok(out)
}

pub fn item_type(raw: &str) -> Result<ItemType> {
    raw.parse()
        .map_err(|_| BacklogError::InvalidItemType(raw.to_string()))
}

pub fn priority(raw: &str) -> Result<Priority> {
    raw.parse()
        .map_err(|_| BacklogError::InvalidPriority(raw.to_string()))
}

pub fn status(raw: &str) -> Result<ItemStatus> {
    raw.parse()
        .map_err(|_| BacklogError::InvalidStatus(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_bounds() {
        assert_eq!(required("title", "  hi  ", 10).expect("valid"), "hi");
        assert!(matches!(
            required("title", "   ", 10),
            Err(BacklogError::InvalidField { field: "title", .. })
        ));
        assert!(required("title", &"x".repeat(11), 10).is_err());
        assert!(required("title", &"é".repeat(10), 10).is_ok());
    }

    #[test]
    fn optional_empty_is_none() {
        assert_eq!(optional("goal", Some("  "), 5).expect("valid"), None);
        assert_eq!(optional("goal", None, 5).expect("valid"), None);
        assert!(optional("goal", Some("too long"), 5).is_err());
    }

    #[test]
    fn story_points_upper_bound() {
        assert_eq!(story_points(Some(100)).expect("valid"), Some(100));
        assert!(story_points(Some(101)).is_err());
    }

    #[test]
    fn labels_dedupe_in_order() {
        let raw = vec!["b".to_string(), " a ".to_string(), "b".to_string()];
        assert_eq!(labels(&raw).expect("valid"), vec!["b", "a"]);
        assert!(labels(&[String::new()]).is_err());
    }

    #[test]
    fn enum_errors_keep_raw_input() {
        assert!(matches!(item_type("Feature"), Err(BacklogError::InvalidItemType(s)) if s == "Feature"));
        assert!(matches!(priority("urgent"), Err(BacklogError::InvalidPriority(_))));
        assert!(matches!(status("Started"), Err(BacklogError::InvalidStatus(_))));
    }
}
