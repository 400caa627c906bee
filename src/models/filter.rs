//! Post filter
//!
//! A conjunction of optional criteria. An absent criterion matches every post.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{Post, PostKind};

/// Escape character used in LIKE patterns built by [`PostFilter::title_pattern`]
pub const LIKE_ESCAPE: char = '!';

/// Case-folded title stored in `posts.title_search` and matched by title filters
pub fn fold_title(title: &str) -> String {
    title.to_lowercase()
}

/// Criteria for narrowing the post list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFilter {
    /// Case-insensitive substring of the title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "category", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<PostKind>,
    #[serde(rename = "author", skip_serializing_if = "Option::is_none")]
    pub author_id: Option<i64>,
    /// First day included (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    /// Last day included (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
}

impl PostFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blank titles impose no constraint
    pub fn with_title(mut self, title: impl AsRef<str>) -> Self {
        let title = title.as_ref().trim();
        self.title = (!title.is_empty()).then(|| title.to_string());
        self
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_kind(mut self, kind: PostKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn with_date_from(mut self, date: NaiveDate) -> Self {
        self.date_from = Some(date);
        self
    }

    pub fn with_date_to(mut self, date: NaiveDate) -> Self {
        self.date_to = Some(date);
        self
    }

    /// True when no criterion is set
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category_id.is_none()
            && self.kind.is_none()
            && self.author_id.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
    }

    /// Inclusive lower bound on `created_at`
    pub fn created_from(&self) -> Option<DateTime<Utc>> {
        self.date_from.map(start_of_day)
    }

    /// Exclusive upper bound on `created_at`: midnight after `date_to`
    pub fn created_until(&self) -> Option<DateTime<Utc>> {
        self.date_to.and_then(|d| d.succ_opt()).map(start_of_day)
    }

    /// LIKE pattern for the title criterion, wildcards escaped with [`LIKE_ESCAPE`]
    pub fn title_pattern(&self) -> Option<String> {
        self.title.as_ref().map(|title| {
            let mut pattern = String::with_capacity(title.len() + 2);
            pattern.push('%');
            for c in fold_title(title).chars() {
                if c == '%' || c == '_' || c == LIKE_ESCAPE {
                    pattern.push(LIKE_ESCAPE);
                }
                pattern.push(c);
            }
            pattern.push('%');
            pattern
        })
    }

    /// Whether a post satisfies every set criterion
    pub fn matches(&self, post: &Post) -> bool {
        if let Some(ref title) = self.title {
            if !fold_title(&post.title).contains(&fold_title(title)) {
                return false;
            }
        }
        if self.category_id.is_some_and(|id| id != post.category_id) {
            return false;
        }
        if self.kind.is_some_and(|kind| kind != post.kind) {
            return false;
        }
        if self.author_id.is_some_and(|id| id != post.author_id) {
            return false;
        }
        if self.created_from().is_some_and(|from| post.created_at < from) {
            return false;
        }
        if self.created_until().is_some_and(|until| post.created_at >= until) {
            return false;
        }
        true
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, category_id: i64, kind: PostKind, created_at: DateTime<Utc>) -> Post {
        Post {
            id: 1,
            title: title.to_string(),
            text: "body".to_string(),
            kind,
            category_id,
            author_id: 1,
            created_at,
            updated_at: created_at,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = PostFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&post("Anything", 4, PostKind::Article, Utc::now())));
    }

    #[test]
    fn test_blank_title_is_absent() {
        assert!(PostFilter::new().with_title("   ").is_empty());
        assert_eq!(PostFilter::new().with_title(" Rust ").title.as_deref(), Some("Rust"));
    }

    #[test]
    fn test_title_match_is_case_insensitive() {
        let filter = PostFilter::new().with_title("ELECTION");
        let at = Utc::now();
        assert!(filter.matches(&post("Local election results", 1, PostKind::News, at)));
        assert!(!filter.matches(&post("Weather", 1, PostKind::News, at)));
    }

    #[test]
    fn test_date_range_is_inclusive_of_both_days() {
        let filter = PostFilter::new()
            .with_date_from(day(2024, 3, 1))
            .with_date_to(day(2024, 3, 31));

        let inside_start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let inside_end = Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap();
        let before = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();

        assert!(filter.matches(&post("t", 1, PostKind::News, inside_start)));
        assert!(filter.matches(&post("t", 1, PostKind::News, inside_end)));
        assert!(!filter.matches(&post("t", 1, PostKind::News, before)));
        assert!(!filter.matches(&post("t", 1, PostKind::News, after)));
    }

    #[test]
    fn test_title_pattern_escapes_wildcards() {
        let filter = PostFilter::new().with_title("100%_Sure!");
        assert_eq!(filter.title_pattern().as_deref(), Some("%100!%!_sure!!%"));
        assert_eq!(PostFilter::new().title_pattern(), None);
    }

    #[test]
    fn test_serializes_with_query_names() {
        let filter = PostFilter::new().with_category(2).with_kind(PostKind::Article);
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json, serde_json::json!({"category": 2, "type": "article"}));
    }
}
