use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;

use tasktrack::{
    cache::{RedisCacheStore, TaskCache, TASK_CACHE_TTL_SECS},
    config::Config,
    db,
    notify::Notifier,
    routes,
    session::{RedisSessionResolver, SessionResolver},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    db::ensure_tasks_table(&pool)
        .await
        .expect("Failed to initialize tasks table");

    let redis_client =
        Arc::new(redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client"));

    // The explicit trust boundary: identity comes solely from the shared
    // session store, written by the user service's login flow.
    let resolver: Arc<dyn SessionResolver> =
        Arc::new(RedisSessionResolver::new(Arc::clone(&redis_client)));
    let resolver_data = web::Data::from(resolver);

    let cache = web::Data::new(TaskCache::new(
        Arc::new(RedisCacheStore::new(Arc::clone(&redis_client))),
        TASK_CACHE_TTL_SECS,
    ));
    let notifier = web::Data::new(Notifier::new(config.smtp.clone()));

    log::info!("Starting task service at {}", config.server_url());

    let bind_addr = (config.server_host.clone(), config.server_port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(resolver_data.clone())
            .app_data(cache.clone())
            .app_data(notifier.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(routes::health::healthz)
            .service(web::scope("/api").configure(routes::task_service_config))
    })
    .bind(bind_addr)?
    .run()
    .await
}
