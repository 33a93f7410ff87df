//! # Supabase
//!
//! Managed Postgres, auth and storage. We only speak HTTP to it:
//!
//! - PostgREST (`/rest/v1/{table}`) for rows, using the service-role key so
//!   row-level security is bypassed. Every caller is therefore responsible
//!   for scoping queries to the authenticated user.
//! - GoTrue (`/auth/v1`) for validating customer access tokens and for the
//!   admin calls behind force logout.
//!
//! ## Filters
//!
//! PostgREST filters are plain query parameters, e.g. `id=eq.4` or
//! `status=in.(pending,confirmed)`. [`Query`] collects them in order.
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;

use crate::error::AppError;

const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

#[derive(Debug, Default, Clone)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".into(), columns.into()));
        self
    }

    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn filter(mut self, column: &str, operator: &str, value: impl ToString) -> Self {
        self.params
            .push((column.into(), format!("{operator}.{}", value.to_string())));
        self
    }

    pub fn is_in<T: ToString>(self, column: &str, values: &[T]) -> Self {
        let list = values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        self.filter(column, "in", format!("({list})"))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".into(), format!("{column}.{direction}")));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.params.push(("limit".into(), limit.to_string()));
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.params.push(("offset".into(), offset.to_string()));
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// The subset of a GoTrue user object we care about.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUserRecord {
    pub id: String,
    pub email: Option<String>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUserRecord {
    pub id: String,
    pub email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
    pub banned_until: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct AdminUserPage {
    users: Vec<AdminUserRecord>,
}

#[derive(Clone)]
pub struct Supabase {
    http: Client,
    rest_url: String,
    auth_url: String,
    service_key: String,
}

impl Supabase {
    pub fn new(base_url: &str, service_key: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim_end_matches('/');

        Ok(Self {
            http: Client::builder().user_agent("donut-server").build()?,
            rest_url: format!("{base_url}/rest/v1"),
            auth_url: format!("{base_url}/auth/v1"),
            service_key: service_key.to_string(),
        })
    }

    fn table(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, AppError> {
        let request = self.http.get(self.table(table)).query(query.params());
        let response = check(self.authorized(request).send().await?).await?;

        Ok(response.json().await?)
    }

    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: Query,
    ) -> Result<Option<T>, AppError> {
        let mut rows = self.select(table, &query.limit(1)).await?;

        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    pub async fn insert<B, T>(&self, table: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .http
            .post(self.table(table))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(body);
        let response = check(self.authorized(request).send().await?).await?;

        first_row(response.json().await?)
    }

    pub async fn upsert<B, T>(&self, table: &str, on_conflict: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .http
            .post(self.table(table))
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", MERGE_DUPLICATES)
            .json(body);
        let response = check(self.authorized(request).send().await?).await?;

        first_row(response.json().await?)
    }

    /// Patches every row matching `filters` and returns the updated rows.
    pub async fn update<B, T>(&self, table: &str, filters: &Query, body: &B) -> Result<Vec<T>, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .http
            .patch(self.table(table))
            .query(filters.params())
            .header("Prefer", RETURN_REPRESENTATION)
            .json(body);
        let response = check(self.authorized(request).send().await?).await?;

        Ok(response.json().await?)
    }

    /// Deletes every row matching `filters` and returns how many went away.
    pub async fn delete(&self, table: &str, filters: &Query) -> Result<usize, AppError> {
        let request = self
            .http
            .delete(self.table(table))
            .query(filters.params())
            .header("Prefer", RETURN_REPRESENTATION);
        let response = check(self.authorized(request).send().await?).await?;

        let rows: Vec<serde_json::Value> = response.json().await?;
        Ok(rows.len())
    }

    /// Resolves a customer access token to its user.
    pub async fn get_user(&self, access_token: &str) -> Result<AuthUserRecord, AppError> {
        let response = self
            .http
            .get(format!("{}/user", self.auth_url))
            .header("apikey", &self.service_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::Unauthorized),
            _ => Ok(check(response).await?.json().await?),
        }
    }

    pub async fn admin_list_users(
        &self,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<AdminUserRecord>, AppError> {
        let request = self
            .http
            .get(format!("{}/admin/users", self.auth_url))
            .query(&[("page", page), ("per_page", per_page)]);
        let response = check(self.authorized(request).send().await?).await?;

        let page: AdminUserPage = response.json().await?;
        Ok(page.users)
    }

    /// Revokes every session of a user.
    pub async fn admin_sign_out(&self, user_id: &str) -> Result<(), AppError> {
        let request = self
            .http
            .post(format!("{}/admin/users/{user_id}/logout", self.auth_url))
            .json(&json!({ "scope": "global" }));
        check(self.authorized(request).send().await?).await?;

        Ok(())
    }

    /// Bans a user for a GoTrue duration such as `"1m"` or `"24h"`.
    /// Banning also revokes the user's refresh tokens.
    pub async fn admin_ban(&self, user_id: &str, duration: &str) -> Result<(), AppError> {
        let request = self
            .http
            .put(format!("{}/admin/users/{user_id}", self.auth_url))
            .json(&json!({ "ban_duration": duration }));
        check(self.authorized(request).send().await?).await?;

        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(upstream_error(status, body))
}

/// Unique violations (`23505`) come back from PostgREST as 409.
fn upstream_error(status: StatusCode, body: String) -> AppError {
    if status != StatusCode::CONFLICT {
        return AppError::Upstream {
            status: status.as_u16(),
            body,
        };
    }

    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|error| error.get("message")?.as_str().map(str::to_string))
        .unwrap_or(body);

    AppError::Conflict(message)
}

fn first_row<T>(mut rows: Vec<T>) -> Result<T, AppError> {
    if rows.is_empty() {
        return Err(AppError::Upstream {
            status: 200,
            body: "empty representation".into(),
        });
    }

    Ok(rows.swap_remove(0))
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{Query, upstream_error};
    use crate::error::AppError;

    #[test]
    fn test_query_params_in_order() {
        let query = Query::new()
            .select("*")
            .eq("is_active", true)
            .order("sort_order", true)
            .limit(20);

        let params: Vec<(&str, &str)> = query
            .params()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        assert_eq!(
            params,
            vec![
                ("select", "*"),
                ("is_active", "eq.true"),
                ("order", "sort_order.asc"),
                ("limit", "20"),
            ]
        );
    }

    #[test]
    fn test_in_filter() {
        let query = Query::new().is_in("id", &[3, 1, 2]);
        assert_eq!(query.params()[0], ("id".to_string(), "in.(3,1,2)".to_string()));
    }

    #[test]
    fn test_unique_violation_is_conflict() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint \"products_slug_key\""}"#;
        let error = upstream_error(StatusCode::CONFLICT, body.to_string());

        assert_eq!(error.status(), axum::http::StatusCode::CONFLICT);
        assert!(matches!(&error, AppError::Conflict(message) if message.contains("products_slug_key")));

        let error = upstream_error(StatusCode::CONFLICT, "not json".to_string());
        assert!(matches!(error, AppError::Conflict(message) if message == "not json"));
    }

    #[test]
    fn test_other_failures_stay_upstream() {
        let error = upstream_error(StatusCode::SERVICE_UNAVAILABLE, String::new());

        assert!(matches!(error, AppError::Upstream { status: 503, .. }));
        assert_eq!(error.status(), axum::http::StatusCode::BAD_GATEWAY);
    }
}
