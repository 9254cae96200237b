use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::{self, AuthSession};
use crate::error::{AppError, AppResult};
use crate::models::{
    ForumMessage, NewForumMessage, NewProfessor, NewRating, Professor, Rating, SignInRequest,
    SignUpRequest,
};
use crate::stats;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/setup", post(setup))
        .route("/api/auth/signup", post(sign_up))
        .route("/api/auth/signin", post(sign_in))
        .route(
            "/api/professors",
            get(list_professors).post(create_professor),
        )
        .route(
            "/api/professors/department/{department}",
            get(professors_by_department),
        )
        .route("/api/professors/search", get(search_professors))
        .route(
            "/api/professors/{id}/ratings",
            get(professor_ratings).post(create_rating),
        )
        .route("/api/users/ratings", get(user_ratings))
        .route(
            "/api/forum/messages",
            get(forum_messages).post(post_forum_message),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "database": if state.config.database.url.is_empty() { "not configured" } else { "configured" },
        "anonKey": if state.config.auth.anon_key.is_empty() { "not configured" } else { "configured" },
    }))
}

async fn setup(State(state): State<AppState>) -> AppResult<Json<Value>> {
    info!("Running schema setup");
    state.db.init().await?;
    Ok(Json(json!({
        "success": true,
        "message": "Database schema is in place",
    })))
}

async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<SignUpRequest>,
) -> AppResult<Json<AuthSession>> {
    let session = auth::sign_up(&state, request).await?;
    Ok(Json(session))
}

async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> AppResult<Json<AuthSession>> {
    let session = auth::sign_in(&state, request).await?;
    Ok(Json(session))
}

async fn list_professors(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let professors = state.db.list_professors().await?;
    Ok(Json(json!({ "professors": professors })))
}

async fn create_professor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<NewProfessor>,
) -> AppResult<Json<Value>> {
    let user = auth::require_user(&state, &headers).await?;
    request.validate()?;

    let professor = Professor {
        id: Uuid::new_v4().to_string(),
        first_name: request.first_name.unwrap_or_default().trim().to_string(),
        last_name: request.last_name.unwrap_or_default().trim().to_string(),
        title: request.title.unwrap_or_default().trim().to_string(),
        department: request.department.unwrap_or_default().trim().to_string(),
        email: request.email.filter(|e| !e.trim().is_empty()),
        office_location: request.office_location.filter(|o| !o.trim().is_empty()),
        courses: request.courses.filter(|c| !c.trim().is_empty()),
        bio: request.bio.filter(|b| !b.trim().is_empty()),
        created_by: user.id,
        created_at: Utc::now().timestamp(),
    };
    state.db.insert_professor(&professor).await?;
    info!(
        "Created professor {} {} ({})",
        professor.first_name, professor.last_name, professor.id
    );

    Ok(Json(json!({ "professor": professor })))
}

async fn professors_by_department(
    State(state): State<AppState>,
    Path(department): Path<String>,
) -> AppResult<Json<Value>> {
    let professors = state.db.professors_by_department(&department).await?;
    Ok(Json(json!({ "professors": professors })))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

async fn search_professors(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Value>> {
    let query = params.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Ok(Json(json!({ "professors": [] })));
    }
    let professors = state.db.search_professors(query.trim()).await?;
    Ok(Json(json!({ "professors": professors })))
}

async fn create_rating(
    State(state): State<AppState>,
    Path(professor_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<NewRating>,
) -> AppResult<Json<Value>> {
    let user = auth::require_user(&state, &headers).await?;
    request.validate()?;

    if state.db.get_professor(&professor_id).await?.is_none() {
        return Err(AppError::NotFound("Professor not found".to_string()));
    }

    // Read-before-write duplicate check; the unique index backstops the
    // race between concurrent submissions from the same user.
    if state.db.find_rating(&professor_id, &user.id).await?.is_some() {
        return Err(AppError::Validation(
            "You have already rated this professor".to_string(),
        ));
    }

    let rating = Rating {
        id: Uuid::new_v4().to_string(),
        professor_id,
        user_id: user.id,
        course_code: request.course_code.unwrap_or_default().trim().to_string(),
        is_online: request.is_online_course,
        rating: request.overall_rating.unwrap_or_default(),
        difficulty: request.difficulty.unwrap_or_default(),
        would_take_again: request.would_take_again.unwrap_or_default(),
        for_credit: request.taken_for_credit,
        used_textbooks: request.used_textbooks,
        attendance_mandatory: request.attendance_mandatory,
        grade: request.grade_received.filter(|g| !g.trim().is_empty()),
        tags: request.selected_tags,
        review: request.review.unwrap_or_default().trim().to_string(),
        created_at: Utc::now().timestamp(),
    };
    state.db.insert_rating(&rating).await?;
    info!(
        "User {} rated professor {}",
        rating.user_id, rating.professor_id
    );

    Ok(Json(json!({
        "rating": rating,
        "message": "Rating submitted successfully",
    })))
}

async fn professor_ratings(
    State(state): State<AppState>,
    Path(professor_id): Path<String>,
) -> AppResult<Json<Value>> {
    let ratings = state.db.ratings_for_professor(&professor_id).await?;
    let stats = stats::aggregate(&ratings);
    Ok(Json(json!({ "ratings": ratings, "stats": stats })))
}

async fn user_ratings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = auth::require_user(&state, &headers).await?;
    let ratings = state.db.ratings_for_user(&user.id).await?;
    Ok(Json(json!({ "ratings": ratings })))
}

async fn forum_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    auth::require_reader(&state, &headers).await?;

    let cutoff = forum_cutoff(&state);
    // Expired rows are purged on read rather than by a background job.
    state.db.purge_forum_messages_before(cutoff).await?;
    let messages = state.db.forum_messages_since(cutoff).await?;
    Ok(Json(json!({ "messages": messages })))
}

async fn post_forum_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<NewForumMessage>,
) -> AppResult<Json<Value>> {
    let user = auth::require_user(&state, &headers).await?;
    let content = request.validate()?;

    let message = ForumMessage {
        id: Uuid::new_v4().to_string(),
        user_id: user.id,
        username: format!("{} {}", user.first_name, user.last_name),
        content,
        created_at: Utc::now().timestamp(),
    };
    state.db.insert_forum_message(&message).await?;

    Ok(Json(json!({ "message": message })))
}

fn forum_cutoff(state: &AppState) -> i64 {
    Utc::now().timestamp() - state.config.forum.retention_minutes * 60
}
