use std::{io::BufRead, process, sync::Arc};

use quillpress::{
    application::{
        auth::{AccountDirectory, AuthService, hash_password},
        comments::CommentService,
        content::ContentResolver,
        error::AppError,
        posts::PostService,
        repos::{CommentsRepo, FileCatalog, PostsRepo, PostsWriteRepo, UsersRepo},
        seo::SeoBuilder,
        session::SessionAuthority,
        site::SiteIdentity,
        sitemap::SitemapService,
        slugs::SlugResolver,
    },
    config,
    infra::{
        cache::PostCache,
        db::PostgresRepositories,
        error::InfraError,
        files::LocalFileCatalog,
        http::{self, HttpState},
        memory::MemoryRepositories,
        telemetry,
    },
};
use tokio::{net::TcpListener, sync::Notify};
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
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    match cli_args.command {
        Some(config::Command::HashPassword(args)) => run_hash_password(args),
        Some(config::Command::Serve(_)) | None => {
            telemetry::init(&settings.logging)?;
            run_serve(settings).await
        }
    }
}

fn run_hash_password(args: config::HashPasswordArgs) -> Result<(), AppError> {
    let password = match args.password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(InfraError::from)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        return Err(AppError::validation("password must not be empty"));
    }

    let hash = hash_password(&password).map_err(|err| AppError::unexpected(err.to_string()))?;
    println!("{hash}");
    Ok(())
}

/// Repository handles shared by every service.
struct Storage {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    users: Option<Arc<dyn UsersRepo>>,
}

async fn init_storage(settings: &config::Settings) -> Result<Storage, AppError> {
    let Some(url) = settings.database.url.as_deref() else {
        warn!(
            target = "quillpress::startup",
            "no database configured; content lives in memory and is lost on exit"
        );
        let memory = Arc::new(MemoryRepositories::new());
        return Ok(Storage {
            posts: memory.clone(),
            writer: memory.clone(),
            comments: memory,
            users: None,
        });
    };

    let pool = PostgresRepositories::connect(
        url,
        settings.database.max_connections.get(),
        settings.database.statement_timeout,
    )
    .await
    .map_err(InfraError::from)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;
    info!(target = "quillpress::startup", "database migrations applied");

    let repositories = Arc::new(PostgresRepositories::new(pool));
    Ok(Storage {
        posts: repositories.clone(),
        writer: repositories.clone(),
        comments: repositories.clone(),
        users: Some(repositories),
    })
}

fn build_state(settings: &config::Settings, storage: Storage) -> Result<HttpState, AppError> {
    let timeout = settings.database.statement_timeout;
    let site = Arc::new(SiteIdentity::new(
        &settings.site.url,
        settings.site.name.clone(),
        settings.site.author.clone(),
        settings.site.description.clone(),
    ));

    let cache = settings
        .cache
        .enabled
        .then(|| Arc::new(PostCache::new(settings.cache.capacity)));
    let content = Arc::new(ContentResolver::new(
        storage.posts.clone(),
        cache,
        site.clone(),
        timeout,
    ));
    let slugs = Arc::new(SlugResolver::new(storage.posts.clone(), timeout));
    let posts = Arc::new(PostService::new(
        storage.posts.clone(),
        storage.writer.clone(),
        slugs,
        content.clone(),
        timeout,
    ));
    let comments = Arc::new(CommentService::new(
        storage.posts.clone(),
        storage.comments.clone(),
        timeout,
    ));

    let sessions = Arc::new(SessionAuthority::new(settings.auth.session_ttl));
    let directory = Arc::new(AccountDirectory::new(
        settings.auth.accounts.clone(),
        storage.users.clone(),
    ));
    let auth = Arc::new(
        AuthService::new(directory, sessions, timeout)
            .map_err(|err| AppError::unexpected(err.to_string()))?,
    );

    let uploads = Arc::new(LocalFileCatalog::new(
        settings.uploads.directory.clone(),
        &settings.uploads.public_prefix,
        site.clone(),
    ));
    let files: Arc<dyn FileCatalog> = uploads.clone();
    let seo = Arc::new(SeoBuilder::new(site.clone(), files.clone()));
    let sitemap = Arc::new(SitemapService::new(
        storage.posts.clone(),
        site.clone(),
        timeout,
    ));

    Ok(HttpState {
        site,
        content,
        seo,
        files,
        uploads,
        sitemap,
        posts,
        comments,
        auth,
        health: storage.posts,
        storage_timeout: timeout,
        secure_cookie: settings.auth.secure_cookie,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let storage = init_storage(&settings).await?;
    let state = build_state(&settings, storage)?;
    let router = http::build_router(state);

    let addr = settings.server.addr;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| InfraError::Bind { addr, source })?;
    info!(
        target = "quillpress::startup",
        addr = %addr,
        uploads = %settings.uploads.directory.display(),
        "listening"
    );

    let shutdown = Arc::new(Notify::new());
    let trigger = shutdown.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { trigger.notified().await });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => return finish(joined),
        () = shutdown_signal() => {}
    }

    info!(
        target = "quillpress::startup",
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "shutdown requested; draining connections"
    );
    shutdown.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => finish(joined),
        Err(_) => {
            warn!(
                target = "quillpress::startup",
                "graceful shutdown window elapsed; aborting open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

fn finish(joined: Result<std::io::Result<()>, tokio::task::JoinError>) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => {
            info!(target = "quillpress::startup", "server stopped");
            Ok(())
        }
        Ok(Err(err)) => Err(InfraError::from(err).into()),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "quillpress::startup", error = %err, "ctrl-c handler failed");
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
                error!(target = "quillpress::startup", error = %err, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
