use crate::{auth::AuthenticatedUserId, error::AppError, models::User};
use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;

async fn fetch_user(pool: &PgPool, user_id: i32) -> Result<User, AppError> {
    let user =
        sqlx::query_as::<_, User>("SELECT id, username, email, created_at FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    // A token can outlive its subject only if the row vanished underneath
    // it; treat that the same as any other failed authentication.
    user.ok_or_else(|| AppError::Unauthorized("token subject no longer exists".into()))
}

/// Confirms that the presented bearer token is valid and its subject still
/// exists, returning the subject's identity.
#[get("/auth/validate")]
pub async fn validate(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let user = fetch_user(pool.get_ref(), user_id.0).await?;

    Ok(HttpResponse::Ok().json(json!({
        "id": user.id,
        "username": user.username,
        "email": user.email
    })))
}

/// Returns the authenticated user's profile.
#[get("/profile")]
pub async fn profile(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let user = fetch_user(pool.get_ref(), user_id.0).await?;

    Ok(HttpResponse::Ok().json(user))
}

/// Lists all registered users (without password hashes).
#[get("/users")]
pub async fn list_users(
    pool: web::Data<PgPool>,
    _user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let users =
        sqlx::query_as::<_, User>("SELECT id, username, email, created_at FROM users ORDER BY id")
            .fetch_all(&**pool)
            .await?;

    Ok(HttpResponse::Ok().json(users))
}
