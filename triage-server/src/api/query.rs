//! View query parameters shared by the dashboard, the review API and export
//!
//! Parameters are read from raw key/value pairs so that the dashboard's
//! checkbox form (`rating=1&rating=2`) and the API's comma list
//! (`ratings=1,2`) map to the same [`ViewParams`].

use triage_common::review::Rating;
use triage_common::view::{RatingSet, SortKey, TimeWindow, ViewParams, MAX_PAGE_SIZE};

use crate::{ApiError, ApiResult};

/// Marker sent by the dashboard filter form; with it, no checked box means no ratings
pub const FORM_MARKER: &str = "filter";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub params: ViewParams,
    /// Admin token passed in the query, carried into generated links
    pub token: Option<String>,
}

fn last<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn parse_flag(value: &str) -> ApiResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "" | "0" | "false" | "off" | "no" => Ok(false),
        other => Err(ApiError::BadRequest(format!("Invalid critical flag: {}", other))),
    }
}

fn parse_ratings(pairs: &[(String, String)]) -> ApiResult<RatingSet> {
    if let Some(list) = last(pairs, "ratings") {
        return Ok(list.parse::<RatingSet>()?);
    }

    let checked: Vec<&str> = pairs
        .iter()
        .filter(|(k, _)| k == "rating")
        .map(|(_, v)| v.as_str())
        .collect();
    if checked.is_empty() && last(pairs, FORM_MARKER).is_none() {
        return Ok(RatingSet::all());
    }

    checked
        .into_iter()
        .map(|v| {
            v.trim()
                .parse::<i64>()
                .ok()
                .and_then(|n| Rating::new(n).ok())
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid rating in filter: {}", v)))
        })
        .collect()
}

impl ViewQuery {
    pub fn from_pairs(pairs: &[(String, String)]) -> ApiResult<ViewQuery> {
        let mut params = ViewParams::default();

        if let Some(window) = last(pairs, "window").filter(|v| !v.is_empty()) {
            params.window = window.parse::<TimeWindow>()?;
        }
        params.ratings = parse_ratings(pairs)?;
        if let Some(flag) = last(pairs, "critical") {
            params.critical_only = parse_flag(flag)?;
        }
        if let Some(sort) = last(pairs, "sort").filter(|v| !v.is_empty()) {
            params.sort = sort.parse::<SortKey>()?;
        }
        if let Some(size) = last(pairs, "per_page").filter(|v| !v.is_empty()) {
            params.page_size = size
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=MAX_PAGE_SIZE).contains(n))
                .ok_or_else(|| {
                    ApiError::BadRequest(format!("per_page must be between 1 and {}", MAX_PAGE_SIZE))
                })?;
        }
        if let Some(page) = last(pairs, "page").filter(|v| !v.is_empty()) {
            let page = page
                .trim()
                .parse::<usize>()
                .map_err(|_| ApiError::BadRequest(format!("Invalid page: {}", page)))?;
            params.page = page.max(1);
        }

        let token = last(pairs, "token").filter(|t| !t.is_empty()).map(str::to_string);
        Ok(ViewQuery { params, token })
    }

    /// Canonical query string for these parameters at `page`
    pub fn query_string(&self, page: usize) -> String {
        let p = &self.params;
        let mut parts = vec![
            format!("window={}", p.window.as_str()),
            format!("ratings={}", urlencoding::encode(&p.ratings.to_string())),
            format!("critical={}", p.critical_only),
            format!("sort={}", p.sort.as_str()),
            format!("per_page={}", p.page_size),
            format!("page={}", page),
        ];
        if let Some(token) = &self.token {
            parts.push(format!("token={}", urlencoding::encode(token)));
        }
        parts.join("&")
    }

    /// `?token=...` suffix for form actions, or empty
    pub fn token_suffix(&self) -> String {
        match &self.token {
            Some(token) => format!("?token={}", urlencoding::encode(token)),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let q = ViewQuery::from_pairs(&[]).unwrap();
        assert_eq!(q.params, ViewParams::default());
        assert_eq!(q.token, None);
    }

    #[test]
    fn test_comma_list_and_checkboxes_agree() {
        let list = ViewQuery::from_pairs(&pairs(&[("ratings", "1,2")])).unwrap();
        let boxes = ViewQuery::from_pairs(&pairs(&[("rating", "1"), ("rating", "2")])).unwrap();
        assert_eq!(list.params.ratings, boxes.params.ratings);
        assert_eq!(list.params.ratings.to_string(), "1,2");
    }

    #[test]
    fn test_empty_rating_selection() {
        let list = ViewQuery::from_pairs(&pairs(&[("ratings", "")])).unwrap();
        assert!(list.params.ratings.is_empty());

        let form = ViewQuery::from_pairs(&pairs(&[("filter", "1"), ("window", "7d")])).unwrap();
        assert!(form.params.ratings.is_empty());
    }

    #[test]
    fn test_page_zero_is_first_page() {
        let q = ViewQuery::from_pairs(&pairs(&[("page", "0")])).unwrap();
        assert_eq!(q.params.page, 1);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for bad in [
            ("window", "week"),
            ("ratings", "0"),
            ("rating", "6"),
            ("critical", "maybe"),
            ("sort", "random"),
            ("per_page", "0"),
            ("per_page", "501"),
            ("page", "-1"),
        ] {
            let result = ViewQuery::from_pairs(&pairs(&[bad]));
            assert!(matches!(result, Err(ApiError::BadRequest(_))), "{:?}", bad);
        }
    }

    #[test]
    fn test_query_string_reparses() {
        let q = ViewQuery::from_pairs(&pairs(&[
            ("window", "30d"),
            ("ratings", "1,5"),
            ("critical", "on"),
            ("sort", "pending_first"),
            ("per_page", "25"),
            ("token", "a b&c"),
        ]))
        .unwrap();
        let qs = q.query_string(3);
        assert_eq!(
            qs,
            "window=30d&ratings=1%2C5&critical=true&sort=pending_first&per_page=25&page=3&token=a%20b%26c"
        );
        assert_eq!(q.token_suffix(), "?token=a%20b%26c");
    }

    #[test]
    fn test_token_with_reserved_and_non_ascii_characters() {
        let q = ViewQuery::from_pairs(&pairs(&[("token", "clé/?=#")])).unwrap();
        assert_eq!(q.token_suffix(), "?token=cl%C3%A9%2F%3F%3D%23");
        assert!(q.query_string(1).ends_with("&token=cl%C3%A9%2F%3F%3D%23"));
    }
}
