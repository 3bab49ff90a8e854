use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;

use tasktrack::{
    auth::{TokenAuth, TokenIssuer},
    config::Config,
    db, routes,
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

    db::ensure_users_table(&pool)
        .await
        .expect("Failed to initialize users table");

    let issuer = TokenIssuer::new(&config.jwt_secret, config.token_ttl_minutes);

    log::info!("Starting user service at {}", config.server_url());

    let bind_addr = (config.server_host.clone(), config.server_port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(issuer.clone()))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(routes::health::health)
            .service(
                web::scope("/api")
                    .wrap(TokenAuth::new(issuer.clone()))
                    .configure(routes::user_service_config),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
