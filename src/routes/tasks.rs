use crate::{
    cache::TaskCache,
    error::AppError,
    models::{
        task::{TaskRow, TaskStatus},
        Task, TaskInput,
    },
    notify::Notifier,
    session::SessionUser,
};
use actix_web::{delete, get, patch, post, web, HttpRequest, HttpResponse, Responder};
use sqlx::PgPool;
use validator::Validate;

fn rows_to_tasks(rows: Vec<TaskRow>) -> Result<Vec<Task>, AppError> {
    rows.into_iter().map(Task::try_from).collect()
}

/// The task service never reads the users table, so it cannot look up the
/// caller's address itself; clients that want notifications pass it along.
fn recipient(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("X-User-Email")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

/// Flips a task's lifecycle state, scoped by `id AND user_id` in a single
/// statement so a foreign task id matches zero rows and leaks nothing.
async fn set_status(
    pool: &PgPool,
    task_id: i32,
    user_id: i32,
    status: TaskStatus,
) -> Result<Option<Task>, AppError> {
    let row = sqlx::query_as::<_, TaskRow>(
        "UPDATE tasks SET status = $1, updated_at = NOW()
         WHERE id = $2 AND user_id = $3
         RETURNING id, user_id, title, status, created_at, updated_at",
    )
    .bind(status.as_str())
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(Task::try_from).transpose()
}

/// Retrieves the authenticated user's tasks, newest first.
///
/// Served cache-aside: a cached listing is returned verbatim; on a miss
/// the task store is queried and the result cached for the fixed TTL.
///
/// ## Responses:
/// - `200 OK`: a JSON array of `Task` objects.
/// - `401 Unauthorized`: missing, unknown, or expired session.
/// - `503 Service Unavailable`: the task store or cache is unreachable.
#[get("")]
pub async fn list_tasks(
    pool: web::Data<PgPool>,
    cache: web::Data<TaskCache>,
    session_user: SessionUser,
) -> Result<impl Responder, AppError> {
    let user_id = session_user.0;

    if let Some(tasks) = cache.get(user_id).await? {
        return Ok(HttpResponse::Ok().json(tasks));
    }

    let rows = sqlx::query_as::<_, TaskRow>(
        "SELECT id, user_id, title, status, created_at, updated_at
         FROM tasks WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&**pool)
    .await?;

    let tasks = rows_to_tasks(rows)?;
    cache.put(user_id, &tasks).await?;

    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a new task for the authenticated user.
///
/// The task starts in status `open` and is owned by the session's user.
/// The user's cached listing is invalidated before the response is
/// returned, and a best-effort notification goes out afterwards.
///
/// ## Request Body:
/// A JSON object with a single `title` field (1 to 200 characters).
///
/// ## Responses:
/// - `201 Created`: the newly created `Task`.
/// - `401 Unauthorized`: missing, unknown, or expired session.
/// - `422 Unprocessable Entity`: title fails validation.
#[post("")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    cache: web::Data<TaskCache>,
    notifier: web::Data<Notifier>,
    task_data: web::Json<TaskInput>,
    session_user: SessionUser,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    // Validate input
    task_data.validate()?;
    let user_id = session_user.0;

    let row = sqlx::query_as::<_, TaskRow>(
        "INSERT INTO tasks (user_id, title, status) VALUES ($1, $2, 'open')
         RETURNING id, user_id, title, status, created_at, updated_at",
    )
    .bind(user_id)
    .bind(&task_data.title)
    .fetch_one(&**pool)
    .await?;
    let task = Task::try_from(row)?;

    cache.invalidate(user_id).await?;

    notifier.notify(
        recipient(&req).as_deref(),
        "Task created",
        &format!("<p>Your task '<b>{}</b>' was created.</p>", task.title),
    );

    Ok(HttpResponse::Created().json(task))
}

/// Retrieves a single task by id.
///
/// The lookup is scoped to the authenticated user; a task owned by someone
/// else is indistinguishable from one that does not exist.
#[get("/{id}")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<i32>,
    session_user: SessionUser,
) -> Result<impl Responder, AppError> {
    let row = sqlx::query_as::<_, TaskRow>(
        "SELECT id, user_id, title, status, created_at, updated_at
         FROM tasks WHERE id = $1 AND user_id = $2",
    )
    .bind(task_id.into_inner())
    .bind(session_user.0)
    .fetch_optional(&**pool)
    .await?;

    match row {
        Some(row) => Ok(HttpResponse::Ok().json(Task::try_from(row)?)),
        None => Err(AppError::NotFound("Task not found".into())),
    }
}

/// Marks a task as done.
///
/// Idempotent: marking an already-done task done again succeeds and leaves
/// the status `done`. Zero matched rows (absent or foreign task) is a 404
/// and the cache is left untouched.
#[patch("/{id}/done")]
pub async fn mark_done(
    pool: web::Data<PgPool>,
    cache: web::Data<TaskCache>,
    notifier: web::Data<Notifier>,
    task_id: web::Path<i32>,
    session_user: SessionUser,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let user_id = session_user.0;

    let task = set_status(pool.get_ref(), task_id.into_inner(), user_id, TaskStatus::Done)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    cache.invalidate(user_id).await?;

    notifier.notify(
        recipient(&req).as_deref(),
        "Task completed",
        &format!("<p>Your task '<b>{}</b>' was marked done.</p>", task.title),
    );

    Ok(HttpResponse::Ok().json(task))
}

/// Reopens a completed task.
#[patch("/{id}/reactivate")]
pub async fn reactivate_task(
    pool: web::Data<PgPool>,
    cache: web::Data<TaskCache>,
    notifier: web::Data<Notifier>,
    task_id: web::Path<i32>,
    session_user: SessionUser,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let user_id = session_user.0;

    let task = set_status(pool.get_ref(), task_id.into_inner(), user_id, TaskStatus::Open)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    cache.invalidate(user_id).await?;

    notifier.notify(
        recipient(&req).as_deref(),
        "Task reactivated",
        &format!("<p>Your task '<b>{}</b>' was reactivated.</p>", task.title),
    );

    Ok(HttpResponse::Ok().json(task))
}

/// Deletes a task.
///
/// ## Responses:
/// - `204 No Content`: on successful deletion.
/// - `404 Not Found`: the task does not exist or belongs to another user;
///   nothing is invalidated in that case.
#[delete("/{id}")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    cache: web::Data<TaskCache>,
    task_id: web::Path<i32>,
    session_user: SessionUser,
) -> Result<impl Responder, AppError> {
    let user_id = session_user.0;

    let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
        .bind(task_id.into_inner())
        .bind(user_id)
        .execute(&**pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Task not found".into()));
    }

    cache.invalidate(user_id).await?;

    Ok(HttpResponse::NoContent().finish())
}
