use crate::api::router::Route;
use crate::auth;
use crate::error::{AppError, AppResult};
use crate::models::BookFilter;
use hyper::body::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::str::FromStr;

/// Largest request body the API will buffer
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// A routed request with its body fully buffered
#[derive(Debug)]
pub struct ApiRequest {
    pub route: Route,
    query: HashMap<String, String>,
    authorization: Option<String>,
    body: Bytes,
}

impl ApiRequest {
    pub fn new(route: Route, query: Option<&str>, authorization: Option<String>, body: Bytes) -> Self {
        let query = query
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self {
            route,
            query,
            authorization,
            body,
        }
    }

    pub fn bearer_token(&self) -> AppResult<&str> {
        auth::bearer_token(self.authorization.as_deref())
    }

    /// Deserialize the JSON body; an empty body is an error
    pub fn json<T: DeserializeOwned>(&self) -> AppResult<T> {
        if self.body.is_empty() {
            return Err(AppError::Validation("Request body is required".to_string()));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))
    }

    /// Like `json`, but an empty body yields `T::default()`
    pub fn json_or_default<T: DeserializeOwned + Default>(&self) -> AppResult<T> {
        if self.body.is_empty() {
            return Ok(T::default());
        }
        self.json()
    }

    /// A query parameter, trimmed; blank counts as absent
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn query_parsed<T: FromStr>(&self, key: &str) -> AppResult<Option<T>> {
        self.query(key)
            .map(|v| {
                v.parse::<T>()
                    .map_err(|_| AppError::Validation(format!("Invalid value for '{}': {}", key, v)))
            })
            .transpose()
    }

    /// `true`/`1`/`yes` or `false`/`0`/`no`; absent is false
    pub fn query_flag(&self, key: &str) -> AppResult<bool> {
        match self.query(key).map(str::to_ascii_lowercase).as_deref() {
            None | Some("false") | Some("0") | Some("no") => Ok(false),
            Some("true") | Some("1") | Some("yes") => Ok(true),
            Some(other) => Err(AppError::Validation(format!(
                "Invalid value for '{}': {}",
                key, other
            ))),
        }
    }

    pub fn required_query(&self, key: &str) -> AppResult<&str> {
        self.query(key)
            .ok_or_else(|| AppError::Validation(format!("Missing query parameter '{}'", key)))
    }

    pub fn book_filter(&self) -> AppResult<BookFilter> {
        Ok(BookFilter {
            search: self.query("search").map(str::to_string),
            genre: self.query("genre").map(str::to_string),
            available_only: self.query_flag("available")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    struct Body {
        #[serde(default)]
        note: Option<String>,
    }

    fn request(query: Option<&str>, body: &'static str) -> ApiRequest {
        ApiRequest::new(Route::Health, query, None, Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn test_query_parsing() {
        let req = request(Some("search=dune%20messiah&genre=+&limit=20&available=true"), "");
        assert_eq!(req.query("search"), Some("dune messiah"));
        assert_eq!(req.query("genre"), None);
        assert_eq!(req.query_parsed::<i64>("limit").unwrap(), Some(20));
        assert!(req.query_flag("available").unwrap());
        assert!(!req.query_flag("unread").unwrap());

        let filter = req.book_filter().unwrap();
        assert_eq!(filter.search.as_deref(), Some("dune messiah"));
        assert!(filter.genre.is_none());
        assert!(filter.available_only);
    }

    #[test]
    fn test_bad_query_values() {
        let req = request(Some("limit=lots&available=maybe"), "");
        assert!(matches!(req.query_parsed::<i64>("limit"), Err(AppError::Validation(_))));
        assert!(matches!(req.query_flag("available"), Err(AppError::Validation(_))));
        assert!(req.required_query("code").is_err());
    }

    #[test]
    fn test_json_body() {
        let req = request(None, "");
        assert!(req.json::<Body>().is_err());
        assert!(req.json_or_default::<Body>().unwrap().note.is_none());

        let req = request(None, r#"{"note":"hi"}"#);
        assert_eq!(req.json::<Body>().unwrap().note.as_deref(), Some("hi"));

        let req = request(None, "{not json");
        assert!(matches!(req.json::<Body>(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_bearer_token() {
        let req = ApiRequest::new(Route::Me, None, Some("Bearer abc123".to_string()), Bytes::new());
        assert_eq!(req.bearer_token().unwrap(), "abc123");

        let req = ApiRequest::new(Route::Me, None, None, Bytes::new());
        assert!(matches!(req.bearer_token(), Err(AppError::Unauthorized(_))));
    }
}
