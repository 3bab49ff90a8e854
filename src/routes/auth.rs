use crate::{
    auth::{hash_password, verify_password, AuthResponse, LoginRequest, RegisterRequest, TokenIssuer},
    error::AppError,
};
use actix_web::{post, web, HttpResponse, Responder};
use sqlx::PgPool;
use validator::Validate;

/// Register a new user
///
/// Creates a new user account and returns a bearer token whose subject is
/// the new user's id. A duplicate username or email is a 409; the unique
/// constraints catch the insert race the pre-check cannot.
#[post("/register")]
pub async fn register(
    pool: web::Data<PgPool>,
    issuer: web::Data<TokenIssuer>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    // Validate input
    register_data.validate()?;

    // Check if the username or email is already taken
    let existing_user =
        sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE email = $1 OR username = $2")
            .bind(&register_data.email)
            .bind(&register_data.username)
            .fetch_optional(&**pool)
            .await?;

    if existing_user.is_some() {
        return Err(AppError::Conflict(
            "username or email already registered".into(),
        ));
    }

    // Hash password
    let password_hash = hash_password(&register_data.password)?;

    // Insert new user; a concurrent duplicate surfaces as 23505 -> Conflict
    let user_id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&register_data.username)
    .bind(&register_data.email)
    .bind(&password_hash)
    .fetch_one(&**pool)
    .await?;

    // Generate token
    let token = issuer.issue(user_id)?;

    Ok(HttpResponse::Created().json(AuthResponse { token, user_id }))
}

/// Login user
///
/// Authenticates a user by email and password and returns a bearer token.
/// An unknown email and a wrong password produce the same 401.
#[post("/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    issuer: web::Data<TokenIssuer>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    // Validate input
    login_data.validate()?;

    // Get user from database
    let user =
        sqlx::query_as::<_, (i32, String)>("SELECT id, password_hash FROM users WHERE email = $1")
            .bind(&login_data.email)
            .fetch_optional(&**pool)
            .await?;

    match user {
        Some((user_id, password_hash)) => {
            // Verify password
            if verify_password(&login_data.password, &password_hash)? {
                let token = issuer.issue(user_id)?;
                Ok(HttpResponse::Ok().json(AuthResponse { token, user_id }))
            } else {
                Err(AppError::Unauthorized("invalid credentials".into()))
            }
        }
        None => Err(AppError::Unauthorized("invalid credentials".into())),
    }
}
