//! HTTP routes.
//!
//! Every JSON body carries `success` and a `message` translated into the
//! caller's locale.

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::Utc;
use jobsara_core::{AccountId, Locale, Role};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::accounts::Registration;
use crate::auth::{AuthError, RequestLocale, RequireAdmin, RequireAuth};
use crate::directory::TeacherQuery;
use crate::model::ProfileUpdate;
use crate::server::GatewayState;

const DEFAULT_PAGE_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 100;

type ApiResult = Result<Response, Response>;

/// All API routes.
pub fn routes() -> Router<GatewayState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/logout-all", post(logout_all))
        .route("/api/profile/{id}", get(get_profile).put(update_profile))
        .route("/api/users", get(list_users))
        .route("/api/users/{id}", get(get_user).delete(delete_user))
        .route("/api/users/{id}/role", put(update_role))
        .route("/api/teachers", get(list_teachers).post(add_teacher))
        .route("/api/teachers/{id}", get(teacher_details).delete(delete_teacher))
        .route("/api/teachers/{id}/courses", post(add_course))
        .route("/api/landing/teachers", get(landing_teachers))
        .route("/api/summary", get(summary))
        .route("/api/set-language", post(set_language))
        .fallback(not_found)
}

/// Renders responses in one locale.
struct Responder<'a> {
    state: &'a GatewayState,
    locale: Locale,
}

impl<'a> Responder<'a> {
    const fn new(state: &'a GatewayState, locale: Locale) -> Self {
        Self { state, locale }
    }

    fn ok(&self, status: StatusCode, message: &str, data: Value) -> Response {
        let mut body = json!({
            "success": true,
            "message": self.state.auth.localize(message, self.locale),
        });
        if let (Some(body), Value::Object(data)) = (body.as_object_mut(), data) {
            body.extend(data);
        }
        (status, Json(body)).into_response()
    }

    fn err(&self, e: &AuthError) -> Response {
        self.state.auth.render_error(e, self.locale)
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    body.map(|Json(value)| value).map_err(|e| {
        tracing::debug!(error = %e, "Rejected request body");
        AuthError::InvalidInput("Invalid request body".to_string())
    })
}

fn query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AuthError> {
    query.map(|Query(value)| value).map_err(|e| {
        tracing::debug!(error = %e, "Rejected query string");
        AuthError::InvalidInput("Invalid query parameters".to_string())
    })
}

fn account_id(raw: &str) -> Result<AccountId, AuthError> {
    raw.parse()
        .map_err(|_| AuthError::InvalidInput("Invalid user id".to_string()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Pagination {
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RoleChange {
    new_role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CourseRequest {
    title: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LandingQuery {
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LanguageRequest {
    language: Option<String>,
}

async fn root(State(state): State<GatewayState>, RequestLocale(locale): RequestLocale) -> Response {
    Responder::new(&state, locale).ok(
        StatusCode::OK,
        "Server is running",
        json!({
            "service": "jobsara",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "auth": ["/api/register", "/api/login", "/api/logout", "/api/logout-all"],
                "profile": ["/api/profile/{id}"],
                "admin": ["/api/users", "/api/users/{id}", "/api/users/{id}/role"],
                "teachers": ["/api/teachers", "/api/teachers/{id}", "/api/teachers/{id}/courses"],
                "public": ["/health", "/api/landing/teachers", "/api/summary"],
                "settings": ["/api/set-language"],
            },
        }),
    )
}

async fn health(State(state): State<GatewayState>, RequestLocale(locale): RequestLocale) -> Response {
    Responder::new(&state, locale).ok(
        StatusCode::OK,
        "Server is running",
        json!({
            "status": "OK",
            "timestamp": Utc::now(),
            "uptimeSecs": (Utc::now() - state.started_at).num_seconds(),
        }),
    )
}

async fn register(
    State(state): State<GatewayState>,
    RequestLocale(locale): RequestLocale,
    body: Result<Json<Registration>, JsonRejection>,
) -> ApiResult {
    let r = Responder::new(&state, locale);
    let registration = json_body(body).map_err(|e| r.err(&e))?;

    let (account, session) = state
        .auth
        .accounts
        .register(registration)
        .await
        .map_err(|e| r.err(&e))?;

    Ok(r.ok(
        StatusCode::CREATED,
        "User registered successfully",
        json!({
            "token": session.token,
            "expiresAt": session.expires_at,
            "user": account.to_public(),
        }),
    ))
}

async fn login(
    State(state): State<GatewayState>,
    RequestLocale(locale): RequestLocale,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult {
    let r = Responder::new(&state, locale);
    let request = json_body(body).map_err(|e| r.err(&e))?;
    let (Some(email), Some(password)) = (request.email, request.password) else {
        return Err(r.err(&AuthError::InvalidInput(
            "Missing required fields".to_string(),
        )));
    };

    let (account, session) = state
        .auth
        .accounts
        .login(&email, &password)
        .await
        .map_err(|e| r.err(&e))?;

    Ok(Responder::new(&state, account.locale.unwrap_or(locale)).ok(
        StatusCode::OK,
        "Login successful",
        json!({
            "token": session.token,
            "expiresAt": session.expires_at,
            "user": account.to_public(),
        }),
    ))
}

async fn logout(State(state): State<GatewayState>, auth: RequireAuth) -> ApiResult {
    let r = Responder::new(&state, auth.locale());
    state
        .auth
        .sessions
        .revoke(&auth.token)
        .await
        .map_err(|e| r.err(&e))?;

    Ok(r.ok(StatusCode::OK, "Logout successful", json!({})))
}

async fn logout_all(State(state): State<GatewayState>, auth: RequireAuth) -> ApiResult {
    let r = Responder::new(&state, auth.locale());
    let revoked = state
        .auth
        .sessions
        .revoke_all(auth.account_id())
        .await
        .map_err(|e| r.err(&e))?;

    Ok(r.ok(
        StatusCode::OK,
        "Logout successful",
        json!({ "revokedSessions": revoked }),
    ))
}

async fn get_profile(
    State(state): State<GatewayState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult {
    let r = Responder::new(&state, auth.locale());
    let id = account_id(&id).map_err(|e| r.err(&e))?;
    auth.require_owner_or_admin(id).map_err(|e| r.err(&e))?;

    let account = state.auth.accounts.get(id).await.map_err(|e| r.err(&e))?;
    Ok(r.ok(
        StatusCode::OK,
        "User profile retrieved successfully",
        json!({ "user": account.to_public() }),
    ))
}

async fn update_profile(
    State(state): State<GatewayState>,
    auth: RequireAuth,
    Path(id): Path<String>,
    body: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult {
    let r = Responder::new(&state, auth.locale());
    let id = account_id(&id).map_err(|e| r.err(&e))?;
    auth.require_owner_or_admin(id).map_err(|e| r.err(&e))?;
    let update = json_body(body).map_err(|e| r.err(&e))?;

    let account = state
        .auth
        .accounts
        .update_profile(id, update)
        .await
        .map_err(|e| r.err(&e))?;

    Ok(r.ok(
        StatusCode::OK,
        "User profile updated successfully",
        json!({ "user": account.to_public() }),
    ))
}

async fn list_users(
    State(state): State<GatewayState>,
    RequireAdmin(auth): RequireAdmin,
    page: Result<Query<Pagination>, QueryRejection>,
) -> ApiResult {
    let r = Responder::new(&state, auth.locale());
    let page = query(page).map_err(|e| r.err(&e))?;
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = page.offset.unwrap_or(0);

    let users: Vec<_> = state
        .auth
        .accounts
        .list(limit, offset)
        .await
        .map_err(|e| r.err(&e))?
        .iter()
        .map(crate::model::Account::to_public)
        .collect();

    Ok(r.ok(
        StatusCode::OK,
        "Users retrieved successfully",
        json!({
            "users": users,
            "pagination": { "limit": limit, "offset": offset, "count": users.len() },
        }),
    ))
}

async fn get_user(
    State(state): State<GatewayState>,
    RequireAdmin(auth): RequireAdmin,
    Path(id): Path<String>,
) -> ApiResult {
    let r = Responder::new(&state, auth.locale());
    let id = account_id(&id).map_err(|e| r.err(&e))?;
    let account = state.auth.accounts.get(id).await.map_err(|e| r.err(&e))?;

    Ok(r.ok(
        StatusCode::OK,
        "User retrieved successfully",
        json!({ "user": account.to_public() }),
    ))
}

async fn update_role(
    State(state): State<GatewayState>,
    RequireAdmin(auth): RequireAdmin,
    Path(id): Path<String>,
    body: Result<Json<RoleChange>, JsonRejection>,
) -> ApiResult {
    let r = Responder::new(&state, auth.locale());
    let id = account_id(&id).map_err(|e| r.err(&e))?;
    let role: Role = json_body(body)
        .and_then(|change| {
            change
                .new_role
                .ok_or_else(|| AuthError::InvalidInput("Missing required fields".to_string()))
        })
        .and_then(|name| {
            name.parse().map_err(|_| {
                AuthError::InvalidInput(format!(
                    "Invalid user type. Must be one of: {}",
                    Role::valid_names()
                ))
            })
        })
        .map_err(|e| r.err(&e))?;

    let account = state
        .auth
        .accounts
        .set_role(id, role)
        .await
        .map_err(|e| r.err(&e))?;

    Ok(r.ok(
        StatusCode::OK,
        "User role updated successfully",
        json!({ "user": account.to_public() }),
    ))
}

async fn delete_user(
    State(state): State<GatewayState>,
    RequireAdmin(auth): RequireAdmin,
    Path(id): Path<String>,
) -> ApiResult {
    let r = Responder::new(&state, auth.locale());
    let id = account_id(&id).map_err(|e| r.err(&e))?;
    if id == auth.account_id() {
        return Err(r.err(&AuthError::InvalidInput(
            "Cannot delete your own account".to_string(),
        )));
    }

    state.auth.accounts.delete(id).await.map_err(|e| r.err(&e))?;
    Ok(r.ok(StatusCode::OK, "User deleted successfully", json!({})))
}

async fn list_teachers(
    State(state): State<GatewayState>,
    auth: RequireAuth,
    params: Result<Query<TeacherQuery>, QueryRejection>,
) -> ApiResult {
    let r = Responder::new(&state, auth.locale());
    let mut params = query(params).map_err(|e| r.err(&e))?;
    params.limit = Some(params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE));

    let teachers = state
        .directory
        .list(&params, auth.is_admin())
        .await
        .map_err(|e| r.err(&e))?;

    Ok(r.ok(
        StatusCode::OK,
        "Teachers retrieved successfully",
        json!({ "count": teachers.len(), "teachers": teachers }),
    ))
}

async fn add_teacher(
    State(state): State<GatewayState>,
    RequireAdmin(auth): RequireAdmin,
    body: Result<Json<Registration>, JsonRejection>,
) -> ApiResult {
    let r = Responder::new(&state, auth.locale());
    let registration = json_body(body).map_err(|e| r.err(&e))?;
    let teacher = state
        .directory
        .add(registration)
        .await
        .map_err(|e| r.err(&e))?;

    Ok(r.ok(
        StatusCode::CREATED,
        "Teacher added successfully",
        json!({ "teacher": teacher.to_public() }),
    ))
}

async fn teacher_details(
    State(state): State<GatewayState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult {
    let r = Responder::new(&state, auth.locale());
    let id = account_id(&id).map_err(|e| r.err(&e))?;
    let teacher = state.directory.details(id).await.map_err(|e| r.err(&e))?;

    Ok(r.ok(
        StatusCode::OK,
        "Teacher retrieved successfully",
        json!({ "teacher": teacher }),
    ))
}

async fn delete_teacher(
    State(state): State<GatewayState>,
    RequireAdmin(auth): RequireAdmin,
    Path(id): Path<String>,
) -> ApiResult {
    let r = Responder::new(&state, auth.locale());
    let id = account_id(&id).map_err(|e| r.err(&e))?;
    state.directory.remove(id).await.map_err(|e| r.err(&e))?;

    Ok(r.ok(StatusCode::OK, "Teacher deleted successfully", json!({})))
}

async fn add_course(
    State(state): State<GatewayState>,
    RequireAdmin(auth): RequireAdmin,
    Path(id): Path<String>,
    body: Result<Json<CourseRequest>, JsonRejection>,
) -> ApiResult {
    let r = Responder::new(&state, auth.locale());
    let id = account_id(&id).map_err(|e| r.err(&e))?;
    let request = json_body(body).map_err(|e| r.err(&e))?;

    let course = state
        .directory
        .add_course(
            id,
            request.title.as_deref().unwrap_or_default(),
            request.description,
        )
        .await
        .map_err(|e| r.err(&e))?;

    Ok(r.ok(
        StatusCode::CREATED,
        "Course added successfully",
        json!({ "course": course }),
    ))
}

async fn landing_teachers(
    State(state): State<GatewayState>,
    RequestLocale(locale): RequestLocale,
    params: Result<Query<LandingQuery>, QueryRejection>,
) -> ApiResult {
    let r = Responder::new(&state, locale);
    let params = query(params).map_err(|e| r.err(&e))?;
    let limit = params.limit.map(|l| l.clamp(1, MAX_PAGE_SIZE));

    let teachers = state
        .directory
        .landing(limit)
        .await
        .map_err(|e| r.err(&e))?;

    Ok(r.ok(
        StatusCode::OK,
        "Teachers retrieved successfully",
        json!({ "teachers": teachers }),
    ))
}

async fn summary(
    State(state): State<GatewayState>,
    RequestLocale(locale): RequestLocale,
) -> ApiResult {
    let r = Responder::new(&state, locale);
    let counts = state
        .auth
        .accounts
        .role_counts()
        .await
        .map_err(|e| r.err(&e))?;

    Ok(r.ok(
        StatusCode::OK,
        "Site summary retrieved successfully",
        json!({ "summary": counts }),
    ))
}

async fn set_language(
    State(state): State<GatewayState>,
    auth: RequireAuth,
    body: Result<Json<LanguageRequest>, JsonRejection>,
) -> ApiResult {
    let r = Responder::new(&state, auth.locale());
    let locale: Locale = json_body(body)
        .and_then(|request| {
            request
                .language
                .and_then(|language| language.parse::<Locale>().ok())
                .ok_or_else(|| AuthError::InvalidInput("Invalid language".to_string()))
        })
        .map_err(|e| r.err(&e))?;

    state
        .auth
        .accounts
        .set_locale(auth.account_id(), locale)
        .await
        .map_err(|e| r.err(&e))?;

    Ok(Responder::new(&state, locale).ok(
        StatusCode::OK,
        "Language updated successfully",
        json!({ "language": locale }),
    ))
}

async fn not_found(
    State(state): State<GatewayState>,
    RequestLocale(locale): RequestLocale,
) -> Response {
    state
        .auth
        .render_error(&AuthError::NotFound("Endpoint"), locale)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, header};
    use jobsara_core::{AuthConfig, Config};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::TokenCodec;
    use crate::server::GatewayBuilder;
    use crate::store::{CredentialStore, MemoryStore};

    struct TestApp {
        router: Router,
        store: Arc<MemoryStore>,
    }

    fn app() -> TestApp {
        let mut config = Config::default();
        config.auth = AuthConfig::builder()
            .jwt_secret(TokenCodec::generate_hex_secret())
            .hash_cost(1)
            .build();
        let store = Arc::new(MemoryStore::new());
        let gateway = GatewayBuilder::new(config)
            .with_store(store.clone())
            .build()
            .unwrap();
        TestApp {
            router: gateway.router(),
            store,
        }
    }

    impl TestApp {
        async fn call(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            self.call_with(method, uri, token, body, None).await
        }

        async fn call_with(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
            language: Option<&str>,
        ) -> (StatusCode, Value) {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            if let Some(language) = language {
                request = request.header(header::ACCEPT_LANGUAGE, language);
            }
            let request = match body {
                Some(body) => request
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string())),
                None => request.body(Body::empty()),
            }
            .unwrap();

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, json)
        }

        async fn register(&self, username: &str, role: &str) -> (AccountId, String) {
            let (status, body) = self
                .call(
                    Method::POST,
                    "/api/register",
                    None,
                    Some(json!({
                        "username": username,
                        "email": format!("{username}@x.io"),
                        "password": "secret123",
                        "firstName": "Ada",
                        "lastName": "Lovelace",
                        "userType": role,
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            let id = AccountId(body["user"]["id"].as_u64().unwrap());
            (id, body["token"].as_str().unwrap().to_string())
        }

        async fn admin(&self) -> (AccountId, String) {
            let (id, _) = self.register("root", "job_seeker").await;
            let mut account = self.store.find_account_by_id(id).await.unwrap().unwrap();
            account.role = Role::Admin;
            self.store.update_account(&account).await.unwrap();
            let (_, body) = self
                .call(
                    Method::POST,
                    "/api/login",
                    None,
                    Some(json!({ "email": "root@x.io", "password": "secret123" })),
                )
                .await;
            (id, body["token"].as_str().unwrap().to_string())
        }
    }

    #[tokio::test]
    async fn test_health_and_root() {
        let app = app();
        let (status, body) = app.call(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert_eq!(body["success"], true);

        let (status, body) = app.call(Method::GET, "/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "jobsara");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = app();
        let (status, body) = app.call(Method::GET, "/api/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Endpoint not found");

        let (_, body) = app
            .call_with(Method::GET, "/api/nope", None, None, Some("fa"))
            .await;
        assert_eq!(body["message"], "مسیر پیدا نشد");
    }

    #[tokio::test]
    async fn test_register_login_logout_flow() {
        let app = app();
        let (id, token) = app.register("ada", "job_seeker").await;

        let (status, body) = app
            .call(Method::GET, &format!("/api/profile/{id}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["userType"], "job_seeker");
        assert!(body["user"].get("passwordHash").is_none());

        let (status, _) = app.call(Method::POST, "/api/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .call(Method::GET, &format!("/api/profile/{id}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_session");

        let (status, body) = app
            .call(
                Method::POST,
                "/api/login",
                None,
                Some(json!({ "email": "ada@x.io", "password": "secret123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());
    }

    #[tokio::test]
    async fn test_register_validation() {
        let app = app();
        let (status, body) = app
            .call(
                Method::POST,
                "/api/register",
                None,
                Some(json!({ "username": "ada" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Missing required fields");

        app.register("ada", "intern").await;
        let (status, body) = app
            .call(
                Method::POST,
                "/api/register",
                None,
                Some(json!({
                    "username": "ada2",
                    "email": "ada@x.io",
                    "password": "pw",
                    "firstName": "A",
                    "lastName": "B",
                    "userType": "intern",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "email_taken");
    }

    #[tokio::test]
    async fn test_login_errors_do_not_enumerate() {
        let app = app();
        app.register("ada", "intern").await;

        let (s1, b1) = app
            .call(
                Method::POST,
                "/api/login",
                None,
                Some(json!({ "email": "ghost@x.io", "password": "secret123" })),
            )
            .await;
        let (s2, b2) = app
            .call(
                Method::POST,
                "/api/login",
                None,
                Some(json!({ "email": "ada@x.io", "password": "nope" })),
            )
            .await;
        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!((s1, &b1), (s2, &b2));
    }

    #[tokio::test]
    async fn test_token_errors() {
        let app = app();
        let (status, body) = app.call(Method::POST, "/api/logout", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "missing_token");

        let (status, body) = app
            .call(Method::POST, "/api/logout", Some("not-a-token"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_token");
    }

    #[tokio::test]
    async fn test_profile_owner_or_admin() {
        let app = app();
        let (ada, ada_token) = app.register("ada", "intern").await;
        let (bob, _) = app.register("bob", "intern").await;
        let (_, admin_token) = app.admin().await;

        let (status, _) = app
            .call(Method::GET, &format!("/api/profile/{bob}"), Some(&ada_token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .call(
                Method::PUT,
                &format!("/api/profile/{ada}"),
                Some(&admin_token),
                Some(json!({ "skills": "rust, sql" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["skills"], "rust, sql");
    }

    #[tokio::test]
    async fn test_admin_routes() {
        let app = app();
        let (ada, ada_token) = app.register("ada", "intern").await;
        let (admin, admin_token) = app.admin().await;

        let (status, _) = app.call(Method::GET, "/api/users", Some(&ada_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .call(Method::GET, "/api/users?limit=1&offset=1", Some(&admin_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"].as_array().unwrap().len(), 1);

        let (status, _) = app
            .call(
                Method::PUT,
                &format!("/api/users/{ada}/role"),
                Some(&admin_token),
                Some(json!({ "newRole": "employer" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        // Old token carried the old role.
        let (status, _) = app.call(Method::POST, "/api/logout", Some(&ada_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .call(Method::DELETE, &format!("/api/users/{admin}"), Some(&admin_token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .call(Method::DELETE, &format!("/api/users/{ada}"), Some(&admin_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app
            .call(Method::GET, &format!("/api/users/{ada}"), Some(&admin_token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_teacher_directory_routes() {
        let app = app();
        let (_, admin_token) = app.admin().await;
        let (_, ada_token) = app.register("ada", "intern").await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/teachers",
                Some(&admin_token),
                Some(json!({
                    "username": "tara",
                    "email": "tara@x.io",
                    "password": "pw",
                    "firstName": "Tara",
                    "lastName": "T",
                    "bio": "Persian literature",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let teacher = body["teacher"]["id"].as_u64().unwrap();

        // No courses yet: hidden from non-admins and the landing page.
        let (_, body) = app.call(Method::GET, "/api/teachers", Some(&ada_token), None).await;
        assert_eq!(body["count"], 0);
        let (_, body) = app.call(Method::GET, "/api/teachers", Some(&admin_token), None).await;
        assert_eq!(body["count"], 1);

        let (status, _) = app
            .call(
                Method::POST,
                &format!("/api/teachers/{teacher}/courses"),
                Some(&admin_token),
                Some(json!({ "title": "Hafez 101" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = app.call(Method::GET, "/api/landing/teachers", None, None).await;
        assert_eq!(body["teachers"][0]["courseCount"], 1);

        let (status, body) = app
            .call(Method::GET, &format!("/api/teachers/{teacher}"), Some(&ada_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["teacher"]["bio"], "Persian literature");

        let (status, _) = app
            .call(Method::DELETE, &format!("/api/teachers/{teacher}"), Some(&admin_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_summary() {
        let app = app();
        app.register("a", "intern").await;
        app.register("b", "employer").await;

        let (status, body) = app.call(Method::GET, "/api/summary", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["total"], 2);
        assert_eq!(body["summary"]["byRole"]["employer"], 1);
    }

    #[tokio::test]
    async fn test_set_language_localizes_messages() {
        let app = app();
        let (_, token) = app.register("ada", "intern").await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/set-language",
                Some(&token),
                Some(json!({ "language": "fa" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "زبان با موفقیت تغییر کرد");

        let (_, body) = app.call(Method::POST, "/api/logout", Some(&token), None).await;
        assert_eq!(body["message"], "خروج موفقیت‌آمیز بود");

        let (_, token) = app.register("bob", "intern").await;
        let (status, _) = app
            .call(
                Method::POST,
                "/api/set-language",
                Some(&token),
                Some(json!({ "language": "de" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_outage_is_503() {
        let app = app();
        let (_, token) = app.register("ada", "intern").await;

        app.store.set_failing(Some("*"));
        let (status, body) = app.call(Method::POST, "/api/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "Service temporarily unavailable");
    }
}
