use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing::info;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use docgpt::llm::OpenAiChatModel;
use docgpt::routes::{self, ApiDoc};
use docgpt::{db, logger, AppConfig, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    logger::init(&config.log_level)?;

    let pool = db::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;

    let llm = Arc::new(OpenAiChatModel::new(
        &config.openai_api_key,
        config.openai_api_base.as_deref(),
    ));

    let bind_address = config.bind_address.clone();
    let cors_origin = config.cors_origin.clone();
    let state = Arc::new(AppState::build(config, pool, llm)?);

    info!("Listening on {}", bind_address);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&cors_origin)
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
            .service(Scalar::with_url("/docs", ApiDoc::openapi()))
    })
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {bind_address}"))?
    .run()
    .await?;

    Ok(())
}
