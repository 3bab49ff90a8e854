pub mod auth;
pub mod health;
pub mod tasks;
pub mod users;

use actix_web::web;

/// Routes mounted under `/api` by the user service binary.
/// `register` and `login` are public; the rest sit behind `TokenAuth`.
pub fn user_service_config(cfg: &mut web::ServiceConfig) {
    cfg.service(auth::register)
        .service(auth::login)
        .service(users::validate)
        .service(users::profile)
        .service(users::list_users);
}

/// Routes mounted under `/api` by the task service binary. Every handler
/// authenticates through the `SessionUser` extractor.
pub fn task_service_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tasks")
            .service(tasks::list_tasks)
            .service(tasks::create_task)
            .service(tasks::get_task)
            .service(tasks::mark_done)
            .service(tasks::reactivate_task)
            .service(tasks::delete_task),
    );
}
