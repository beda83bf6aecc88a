use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category shown when no real categorization is available.
pub const FALLBACK_CATEGORY: &str = "Security Policy Violation";

/// Body of one URL lookup request.
#[derive(Debug, Serialize)]
pub struct LookupRequest {
    pub query: LookupQuery,
}

#[derive(Debug, Serialize)]
pub struct LookupQuery {
    pub disable_dns_lookup: bool,
    pub category: &'static str,
    pub urls: Vec<String>,
}

impl LookupRequest {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            query: LookupQuery {
                disable_dns_lookup: true,
                category: "swg",
                urls: vec![url.into()],
            },
        }
    }

    /// Lookup for a validated hostname, recast as an https URL.
    pub fn for_hostname(hostname: &str) -> Self {
        Self::for_url(format!("https://{hostname}"))
    }
}

/// Lookup response. The API owner does not pin the shape down, so only the
/// top level is typed; `result[0].categories[*].name` is read by hand and
/// anything else in the payload is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub result: Option<Value>,
}

impl LookupResponse {
    /// String names of the first result's categories, in API order.
    /// Entries without a string `name` are skipped.
    pub fn category_names(&self) -> Vec<String> {
        self.result
            .as_ref()
            .and_then(Value::as_array)
            .and_then(|results| results.first())
            .and_then(|first| first.get("categories"))
            .and_then(Value::as_array)
            .map(|categories| {
                categories
                    .iter()
                    .filter_map(|category| category.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorizationResult {
    Categories(Vec<String>),
    NoCategory,
    QueryFailed(String),
}

impl CategorizationResult {
    pub fn from_response(response: &LookupResponse) -> Self {
        let names = response.category_names();
        if names.is_empty() {
            Self::NoCategory
        } else {
            Self::Categories(names)
        }
    }

    /// Text for the block page: a single name verbatim, several joined with
    /// `"; "`, otherwise the fallback.
    pub fn label(&self) -> Cow<'_, str> {
        match self {
            Self::Categories(names) => match names.as_slice() {
                [] => Cow::Borrowed(FALLBACK_CATEGORY),
                [single] => Cow::Borrowed(single.as_str()),
                many => Cow::Owned(many.join("; ")),
            },
            Self::NoCategory | Self::QueryFailed(_) => Cow::Borrowed(FALLBACK_CATEGORY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_for(body: &str) -> String {
        let response: LookupResponse = serde_json::from_str(body).unwrap();
        CategorizationResult::from_response(&response)
            .label()
            .into_owned()
    }

    #[test]
    fn request_body_matches_wire_format() {
        let body = serde_json::to_string(&LookupRequest::for_hostname("evil.example")).unwrap();
        assert_eq!(
            body,
            r#"{"query":{"disable_dns_lookup":true,"category":"swg","urls":["https://evil.example"]}}"#
        );
    }

    #[test]
    fn single_category_is_verbatim() {
        assert_eq!(
            label_for(r#"{"result":[{"categories":[{"name":"Malware"}]}]}"#),
            "Malware"
        );
    }

    #[test]
    fn multiple_categories_are_joined_in_order() {
        assert_eq!(
            label_for(r#"{"result":[{"categories":[{"name":"Malware"},{"name":"Phishing"}]}]}"#),
            "Malware; Phishing"
        );
    }

    #[test]
    fn missing_shapes_fall_back() {
        for body in [
            "{}",
            r#"{"result":[]}"#,
            r#"{"result":null}"#,
            r#"{"result":[{}]}"#,
            r#"{"result":[{"categories":[]}]}"#,
            r#"{"result":[{"categories":[{"id":7}]}]}"#,
        ] {
            assert_eq!(label_for(body), FALLBACK_CATEGORY, "body: {body}");
        }
    }

    #[test]
    fn only_first_result_is_used() {
        assert_eq!(
            label_for(
                r#"{"result":[{"categories":[{"name":"News"}]},{"categories":[{"name":"Malware"}]}]}"#
            ),
            "News"
        );
    }

    #[test]
    fn unnamed_categories_are_skipped() {
        assert_eq!(
            label_for(r#"{"result":[{"categories":[{"id":1},{"name":"Phishing","id":2}]}]}"#),
            "Phishing"
        );
    }

    #[test]
    fn extra_fields_are_ignored() {
        assert_eq!(
            label_for(
                r#"{"status":"success","result":[{"url":"https://x","categories":[{"id":3,"name":"Gambling"}],"confidence":90}]}"#
            ),
            "Gambling"
        );
    }

    #[test]
    fn trailing_results_of_any_shape_are_ignored() {
        assert_eq!(
            label_for(r#"{"result":[{"categories":[{"name":"Malware"}]},null]}"#),
            "Malware"
        );
        assert_eq!(
            label_for(r#"{"result":[{"categories":[{"name":"Malware"}]},"oops",7]}"#),
            "Malware"
        );
    }

    #[test]
    fn non_string_names_are_skipped() {
        assert_eq!(
            label_for(r#"{"result":[{"categories":[{"name":"Malware"},{"name":42}]}]}"#),
            "Malware"
        );
        assert_eq!(
            label_for(r#"{"result":[{"categories":[{"name":null},{"name":["x"]}]}]}"#),
            FALLBACK_CATEGORY
        );
    }

    #[test]
    fn bare_string_category_entries_are_skipped() {
        assert_eq!(
            label_for(r#"{"result":[{"categories":[{"name":"Malware"},"Phishing"]}]}"#),
            "Malware"
        );
    }

    #[test]
    fn unexpected_container_types_fall_back() {
        for body in [
            r#"{"result":"none"}"#,
            r#"{"result":{"categories":[{"name":"Malware"}]}}"#,
            r#"{"result":[null]}"#,
            r#"{"result":[{"categories":"Malware"}]}"#,
        ] {
            assert_eq!(label_for(body), FALLBACK_CATEGORY, "body: {body}");
        }
    }

    #[test]
    fn query_failure_falls_back() {
        let result = CategorizationResult::QueryFailed("connection refused".to_string());
        assert_eq!(result.label(), FALLBACK_CATEGORY);
        assert_eq!(CategorizationResult::NoCategory.label(), FALLBACK_CATEGORY);
    }
}
