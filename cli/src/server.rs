use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use mealplan_core::error::MealPlanError;
use mealplan_core::importer::{ImportSummary, RecipeExtractor};
use mealplan_core::models::{Ingredient, Meal, MealType, NewIngredient, Plan, UserContext};
use mealplan_core::pagination::{CollectionKind, Entity, Page};
use mealplan_core::planner::PlanView;
use mealplan_core::service::{MealDraft, MealPlanService};
use mealplan_core::units;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

const USER_ID_HEADER: &str = "x-user-id";
const USER_NAME_HEADER: &str = "x-user-name";

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<MealPlanService>>,
    extractor: Option<Arc<dyn RecipeExtractor>>,
    api_key: Option<String>,
}

impl AppState {
    fn svc(&self) -> MutexGuard<'_, MealPlanService> {
        self.svc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct PageQuery {
    limit: Option<u32>,
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct CreateIngredientRequest {
    name: String,
    #[serde(default = "default_unit")]
    unit: String,
    amount: Option<f64>,
    servings: Option<f64>,
}

fn default_unit() -> String {
    units::DEFAULT_UNIT.to_string()
}

#[derive(Deserialize)]
struct ImportMealRequest {
    #[serde(default)]
    url: String,
    meal_type: String,
}

#[derive(Deserialize)]
struct GeneratePlanRequest {
    start_date: String,
    num_days: u32,
}

#[derive(Serialize)]
struct CollectionPage {
    collection: CollectionKind,
    sort_field: &'static str,
    #[serde(flatten)]
    page: Page<Entity>,
}

#[derive(Serialize)]
struct PlanDetail {
    plan: Plan,
    view: PlanView,
}

#[derive(Deserialize)]
struct ConvertQuery {
    quantity: f64,
    from: String,
    to: String,
}

#[derive(Serialize)]
struct ConvertResponse {
    quantity: f64,
    from: String,
    to: String,
    result: f64,
    converted: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Upstream(String),
    Unavailable(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Internal(err) => {
                tracing::error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<MealPlanError> for ApiError {
    fn from(err: MealPlanError) -> Self {
        match err {
            MealPlanError::Validation(msg) => Self::BadRequest(msg),
            MealPlanError::NotFound(msg) => Self::NotFound(msg),
            MealPlanError::Extraction(msg) => Self::Upstream(msg),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<MealPlanError>() {
            Ok(domain) => domain.into(),
            Err(err) => Self::Internal(err),
        }
    }
}

// --- Caller identity ---

/// The user a request acts for, taken from `X-User-Id` (and optionally
/// `X-User-Name`).
struct CurrentUser(UserContext);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_str = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let user_id = header_str(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing X-User-Id header".to_string()))?;
        let display_name = header_str(USER_NAME_HEADER).unwrap_or(user_id);
        Ok(Self(UserContext::new(user_id, display_name)))
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

fn deleted_or_not_found(deleted: bool, what: &str, id: &str) -> Result<StatusCode, ApiError> {
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("{what} {id} not found")))
    }
}

// --- Collections ---

async fn list_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(kind): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<CollectionPage>, ApiError> {
    let kind: CollectionKind = kind.parse()?;
    let page = state
        .svc()
        .fetch_page(kind, &user, page.limit, page.cursor.as_deref())?;
    Ok(Json(CollectionPage {
        collection: kind,
        sort_field: kind.sort_field(),
        page,
    }))
}

// --- Ingredients ---

async fn list_ingredients(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Ingredient>>, ApiError> {
    let page = state
        .svc()
        .list_ingredients_page(&user, page.limit, page.cursor.as_deref())?;
    Ok(Json(page))
}

async fn create_ingredient(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateIngredientRequest>,
) -> Result<(StatusCode, Json<Ingredient>), ApiError> {
    let ingredient = state.svc().add_ingredient(
        &user,
        &NewIngredient {
            name: req.name,
            unit: req.unit,
            amount: req.amount,
            servings: req.servings,
        },
    )?;
    Ok((StatusCode::CREATED, Json(ingredient)))
}

async fn delete_ingredient(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.svc().delete_ingredient(&user, &id)?;
    deleted_or_not_found(deleted, "Ingredient", &id)
}

// --- Meals ---

async fn list_meals(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Meal>>, ApiError> {
    let page = state
        .svc()
        .list_meals_page(&user, page.limit, page.cursor.as_deref())?;
    Ok(Json(page))
}

async fn create_meal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(draft): Json<MealDraft>,
) -> Result<(StatusCode, Json<Meal>), ApiError> {
    let meal = state.svc().add_meal(&user, &draft)?;
    Ok((StatusCode::CREATED, Json(meal)))
}

async fn import_meal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ImportMealRequest>,
) -> Result<(StatusCode, Json<ImportSummary>), ApiError> {
    let meal_type: MealType = req.meal_type.parse()?;
    let url = mealplan_core::importer::validate_recipe_url(&req.url)?.to_string();
    let extractor = state.extractor.clone().ok_or_else(|| {
        ApiError::Unavailable("Recipe import is not configured (missing Spoonacular API key)".to_string())
    })?;

    // The store lock is not held while the extraction request is in flight.
    let extract_url = url.clone();
    let recipe = tokio::task::spawn_blocking(move || extractor.extract(&extract_url))
        .await
        .context("recipe extraction task failed")??;

    let summary = state
        .svc()
        .persist_extracted_recipe(&user, &url, meal_type, &recipe)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn get_meal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Meal>, ApiError> {
    let meal = state.svc().get_meal(&user, &id)?;
    Ok(Json(meal))
}

async fn delete_meal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.svc().delete_meal(&user, &id)?;
    deleted_or_not_found(deleted, "Meal", &id)
}

// --- Plans ---

async fn list_plans(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Plan>>, ApiError> {
    let page = state
        .svc()
        .list_plans_page(&user, page.limit, page.cursor.as_deref())?;
    Ok(Json(page))
}

async fn generate_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<GeneratePlanRequest>,
) -> Result<(StatusCode, Json<Plan>), ApiError> {
    let plan = {
        let mut rng = rand::rng();
        state
            .svc()
            .generate_and_save_plan(&user, &req.start_date, req.num_days, &mut rng)?
    };
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn get_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PlanDetail>, ApiError> {
    let svc = state.svc();
    let plan = svc.get_plan(&user, &id)?;
    let view = svc.plan_view(&user, &id)?;
    Ok(Json(PlanDetail { plan, view }))
}

async fn delete_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.svc().delete_plan(&user, &id)?;
    deleted_or_not_found(deleted, "Plan", &id)
}

// --- Units ---

async fn convert_units(Query(q): Query<ConvertQuery>) -> Json<ConvertResponse> {
    let converted = units::try_convert(q.quantity, &q.from, &q.to);
    Json(ConvertResponse {
        quantity: q.quantity,
        result: converted.unwrap_or(q.quantity),
        converted: converted.is_some(),
        from: q.from,
        to: q.to,
    })
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/ingredients",
            get(list_ingredients).post(create_ingredient),
        )
        .route(
            "/api/ingredients/{id}",
            axum::routing::delete(delete_ingredient),
        )
        .route("/api/meals", get(list_meals).post(create_meal))
        .route("/api/meals/import", post(import_meal))
        .route("/api/meals/{id}", get(get_meal).delete(delete_meal))
        .route("/api/plans", get(list_plans))
        .route("/api/plans/generate", post(generate_plan))
        .route("/api/plans/{id}", get(get_plan).delete(delete_plan))
        .route("/api/collections/{kind}", get(list_collection))
        .route("/api/units/convert", get(convert_units))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// First and last four characters of the key, or nothing for short keys.
fn key_hint(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 8 {
        return "(hidden)".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

pub async fn start_server(
    svc: MealPlanService,
    port: u16,
    bind: &str,
    api_key: Option<String>,
    extractor: Option<Arc<dyn RecipeExtractor>>,
) -> anyhow::Result<()> {
    if extractor.is_none() {
        eprintln!("Warning: No Spoonacular API key configured. /api/meals/import is disabled.");
    }

    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        extractor,
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {} (see api_key file in data directory)",
            key_hint(key)
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    eprintln!("Listening on http://{bind}:{port}");
    tracing::info!(%bind, port, "server started");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use mealplan_core::importer::ExtractedRecipe;
    use tower::ServiceExt;

    const USER: &str = "user-1";

    struct MockExtractor {
        json: Option<&'static str>,
    }

    impl RecipeExtractor for MockExtractor {
        fn extract(&self, _url: &str) -> anyhow::Result<ExtractedRecipe> {
            match self.json {
                Some(json) => Ok(serde_json::from_str(json)?),
                None => Err(MealPlanError::extraction("Recipe API error: 402").into()),
            }
        }
    }

    fn test_state(api_key: Option<String>, extractor: Option<Arc<dyn RecipeExtractor>>) -> AppState {
        AppState {
            svc: Arc::new(Mutex::new(MealPlanService::new_in_memory().unwrap())),
            extractor,
            api_key,
        }
    }

    fn test_app(api_key: Option<String>) -> Router {
        build_router(test_state(api_key, None))
    }

    fn get_req(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri)
            .header(USER_ID_HEADER, USER)
            .body(Body::empty())
            .unwrap()
    }

    fn json_req(method: &str, uri: &str, body: &serde_json::Value) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_ID_HEADER, USER)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn delete_req(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::delete(uri)
            .header(USER_ID_HEADER, USER)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn auth_missing_key_returns_401() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app.oneshot(get_req("/api/meals")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid or missing API key");
    }

    #[tokio::test]
    async fn auth_correct_key_succeeds() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/meals")
                    .header("Authorization", "Bearer test-key-abc123")
                    .header(USER_ID_HEADER, USER)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_user_header_returns_401() {
        let app = test_app(None);

        let response = app
            .oneshot(
                axum::http::Request::get("/api/meals")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Missing X-User-Id header");
    }

    #[tokio::test]
    async fn security_headers_present() {
        let app = test_app(None);

        let response = app.oneshot(get_req("/api/plans")).await.unwrap();

        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    }

    #[tokio::test]
    async fn ingredient_create_list_delete() {
        let app = test_app(None);

        let response = app
            .clone()
            .oneshot(json_req(
                "POST",
                "/api/ingredients",
                &serde_json::json!({"name": "Basil"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["unit"], "pc");
        let id = created["id"].as_str().unwrap().to_string();

        // Duplicate name, different case
        let response = app
            .clone()
            .oneshot(json_req(
                "POST",
                "/api/ingredients",
                &serde_json::json!({"name": "BASIL"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.clone().oneshot(get_req("/api/ingredients")).await.unwrap();
        let page = body_json(response).await;
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
        assert!(page["next_cursor"].is_null());

        let response = app
            .clone()
            .oneshot(delete_req(&format!("/api/ingredients/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(delete_req(&format!("/api/ingredients/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn meals_page_with_cursor() {
        let app = test_app(None);
        for name in ["A", "B", "C"] {
            let response = app
                .clone()
                .oneshot(json_req(
                    "POST",
                    "/api/meals",
                    &serde_json::json!({"name": name, "meal_type": "snack"}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app.clone().oneshot(get_req("/api/meals?limit=2")).await.unwrap();
        let first = body_json(response).await;
        assert_eq!(first["items"].as_array().unwrap().len(), 2);
        let cursor = first["next_cursor"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(get_req(&format!("/api/meals?limit=2&cursor={cursor}")))
            .await
            .unwrap();
        let second = body_json(response).await;
        assert_eq!(second["items"][0]["name"], "C");
        assert!(second["next_cursor"].is_null());

        let response = app.oneshot(get_req("/api/meals?limit=0")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn meals_are_scoped_to_user() {
        let app = test_app(None);
        let response = app
            .clone()
            .oneshot(json_req(
                "POST",
                "/api/meals",
                &serde_json::json!({"name": "Mine", "meal_type": "breakfast"}),
            ))
            .await
            .unwrap();
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                axum::http::Request::get(format!("/api/meals/{id}"))
                    .header(USER_ID_HEADER, "someone-else")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn import_requires_url() {
        let app = build_router(test_state(
            None,
            Some(Arc::new(MockExtractor { json: Some("{}") })),
        ));
        let response = app
            .oneshot(json_req(
                "POST",
                "/api/meals/import",
                &serde_json::json!({"url": "  ", "meal_type": "snack"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Recipe URL is required");
    }

    #[tokio::test]
    async fn import_without_extractor_is_unavailable() {
        let app = test_app(None);
        let response = app
            .oneshot(json_req(
                "POST",
                "/api/meals/import",
                &serde_json::json!({"url": "https://x.test/r", "meal_type": "snack"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn import_creates_meal() {
        let app = build_router(test_state(
            None,
            Some(Arc::new(MockExtractor {
                json: Some(
                    r#"{"title": "Soup", "servings": 2,
                        "extendedIngredients": [{"name": "leek", "amount": 1, "unit": "PC"}]}"#,
                ),
            })),
        ));
        let response = app
            .clone()
            .oneshot(json_req(
                "POST",
                "/api/meals/import",
                &serde_json::json!({"url": "https://x.test/soup", "meal_type": "dinner"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let summary = body_json(response).await;
        assert_eq!(summary["meal"]["name"], "Soup");
        assert_eq!(summary["meal"]["meal_type"], "lunch_dinner");
        assert_eq!(summary["ingredients_created"], 1);

        let response = app.oneshot(get_req("/api/ingredients")).await.unwrap();
        let page = body_json(response).await;
        assert_eq!(page["items"][0]["name"], "leek");
    }

    #[tokio::test]
    async fn import_extraction_failure_returns_502() {
        let app = build_router(test_state(None, Some(Arc::new(MockExtractor { json: None }))));
        let response = app
            .clone()
            .oneshot(json_req(
                "POST",
                "/api/meals/import",
                &serde_json::json!({"url": "https://x.test/r", "meal_type": "snack"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Recipe API error: 402");

        let response = app.oneshot(get_req("/api/meals")).await.unwrap();
        let page = body_json(response).await;
        assert!(page["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generate_and_show_plan() {
        let app = test_app(None);
        let response = app
            .clone()
            .oneshot(json_req(
                "POST",
                "/api/meals",
                &serde_json::json!({"name": "Oats", "meal_type": "breakfast", "default_servings": 2}),
            ))
            .await
            .unwrap();
        let meal_id = body_json(response).await["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_req(
                "POST",
                "/api/plans/generate",
                &serde_json::json!({"start_date": "2024-02-28", "num_days": 3}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let plan = body_json(response).await;
        let entries = plan["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1]["date"], "2024-02-29");
        assert_eq!(entries[2]["date"], "2024-03-01");
        let plan_id = plan["id"].as_str().unwrap().to_string();

        // Deleting the meal leaves the plan showing the raw id
        let response = app
            .clone()
            .oneshot(delete_req(&format!("/api/meals/{meal_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(get_req(&format!("/api/plans/{plan_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let detail = body_json(response).await;
        assert_eq!(detail["view"]["days"][0]["cells"][0]["meal_name"], meal_id.as_str());
    }

    #[tokio::test]
    async fn generate_plan_rejects_bad_days() {
        let app = test_app(None);
        let response = app
            .oneshot(json_req(
                "POST",
                "/api/plans/generate",
                &serde_json::json!({"start_date": "2024-03-01", "num_days": 29}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_plan_returns_404() {
        let app = test_app(None);
        let response = app.oneshot(get_req("/api/plans/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ingredient_unit_is_normalized() {
        let app = test_app(None);
        let response = app
            .oneshot(json_req(
                "POST",
                "/api/ingredients",
                &serde_json::json!({"name": "Flour", "unit": " CUP "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["unit"], "cup");
    }

    #[tokio::test]
    async fn create_meal_with_bad_servings_returns_400() {
        let app = test_app(None);
        for servings in [0.0, -3.0] {
            let response = app
                .clone()
                .oneshot(json_req(
                    "POST",
                    "/api/meals",
                    &serde_json::json!({
                        "name": "Toast",
                        "meal_type": "breakfast",
                        "default_servings": servings,
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let json = body_json(response).await;
            assert_eq!(json["error"], "Servings must be greater than 0");
        }

        let response = app.oneshot(get_req("/api/meals")).await.unwrap();
        let page = body_json(response).await;
        assert!(page["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn collection_pages_by_kind() {
        let app = test_app(None);
        for name in ["Salt", "Basil", "Leek"] {
            app.clone()
                .oneshot(json_req(
                    "POST",
                    "/api/ingredients",
                    &serde_json::json!({"name": name}),
                ))
                .await
                .unwrap();
        }

        let response = app
            .clone()
            .oneshot(get_req("/api/collections/ingredients?limit=2"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let first = body_json(response).await;
        assert_eq!(first["collection"], "ingredients");
        assert_eq!(first["sort_field"], "name");
        let items = first["items"].as_array().unwrap();
        assert_eq!(items[0]["name"], "Basil");
        assert_eq!(items[1]["name"], "Leek");
        let cursor = first["next_cursor"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(get_req(&format!(
                "/api/collections/ingredients?limit=2&cursor={cursor}"
            )))
            .await
            .unwrap();
        let second = body_json(response).await;
        assert_eq!(second["items"][0]["name"], "Salt");
        assert!(second["next_cursor"].is_null());

        let response = app
            .clone()
            .oneshot(get_req("/api/collections/plans"))
            .await
            .unwrap();
        let plans = body_json(response).await;
        assert_eq!(plans["sort_field"], "start_date");
        assert!(plans["items"].as_array().unwrap().is_empty());

        let response = app
            .oneshot(get_req("/api/collections/recipes"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn key_hint_handles_short_and_non_ascii_keys() {
        assert_eq!(key_hint("0123456789abcdef"), "0123...cdef");
        assert_eq!(key_hint("abc"), "(hidden)");
        assert_eq!(key_hint(""), "(hidden)");
        assert_eq!(key_hint("ключ-ключ"), "ключ...ключ");
    }

    #[tokio::test]
    async fn convert_endpoint() {
        let app = test_app(None);
        let response = app
            .clone()
            .oneshot(get_req("/api/units/convert?quantity=2&from=cup&to=tbsp"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["result"], 32.0);
        assert_eq!(json["converted"], true);

        let response = app
            .oneshot(get_req("/api/units/convert?quantity=4&from=pc&to=kg"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["result"], 4.0);
        assert_eq!(json["converted"], false);
    }
}
