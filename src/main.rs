use std::{error::Error as _, future::IntoFuture, process, sync::Arc};

use quire::{
    application::{
        archive,
        comments::CommentService,
        error::AppError,
        listing::ListingService,
        render::{RenderService, render_service},
        repos::{CommentsRepo, PostsRepo, TaxonomyRepo},
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        memory::InMemoryRepositories,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        chain.push_str(": ");
        chain.push_str(&inner.to_string());
        source = inner.source();
    }

    if dispatcher::has_been_set() {
        error!(error = %chain, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Import(args) => run_import(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let renderer: Arc<dyn RenderService> = render_service();

    let state = match settings.database.url.as_deref() {
        Some(url) => {
            let repositories = connect_postgres(url, &settings).await?;
            info!(
                target = "quire::serve",
                store = "postgres",
                "repositories ready"
            );
            let store = Arc::new(repositories.clone());
            build_state(store.clone(), store.clone(), store, renderer, &settings)
                .with_database(repositories)
        }
        None => {
            let repositories = InMemoryRepositories::new();
            if let Some(seed) = settings.content.seed_file.as_deref() {
                archive::import_file(&repositories, renderer.as_ref(), seed).await?;
            } else {
                warn!(
                    target = "quire::serve",
                    "no database configured and no seed file given; serving an empty store"
                );
            }
            info!(target = "quire::serve", store = "memory", "repositories ready");
            let store = Arc::new(repositories);
            build_state(store.clone(), store.clone(), store, renderer, &settings)
        }
    };

    serve_http(&settings, http::build_router(state)).await
}

async fn run_import(settings: config::Settings, args: config::ImportArgs) -> Result<(), AppError> {
    let url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;
    let repositories = connect_postgres(url, &settings).await?;
    let renderer = render_service();

    let summary = archive::import_file(&repositories, renderer.as_ref(), &args.file).await?;
    info!(
        target = "quire::import",
        posts = summary.posts,
        comments = summary.comments,
        "import finished"
    );
    Ok(())
}

async fn connect_postgres(
    url: &str,
    settings: &config::Settings,
) -> Result<PostgresRepositories, AppError> {
    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::Connect)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(PostgresRepositories::new(pool))
}

fn build_state(
    posts: Arc<dyn PostsRepo>,
    taxonomy: Arc<dyn TaxonomyRepo>,
    comments: Arc<dyn CommentsRepo>,
    renderer: Arc<dyn RenderService>,
    settings: &config::Settings,
) -> HttpState {
    let listing = ListingService::new(
        posts.clone(),
        taxonomy,
        comments.clone(),
        renderer,
        settings.listing,
    );
    let comment_service = CommentService::new(posts, comments);
    HttpState::new(listing, comment_service)
}

async fn serve_http(settings: &config::Settings, router: axum::Router) -> Result<(), AppError> {
    let addr = settings.server.addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| InfraError::Bind { addr, source })?;
    info!(
        target = "quire::serve",
        addr = %addr,
        "listening"
    );

    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| InfraError::from(err).into());
        }
        Ok(()) = signalled_rx => {}
    }

    let grace = settings.server.graceful_shutdown;
    info!(
        target = "quire::serve",
        grace_seconds = grace.as_secs(),
        "shutdown requested; draining connections"
    );
    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.map_err(|err| InfraError::from(err).into()),
        Err(_) => {
            warn!(
                target = "quire::serve",
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
