use std::{path::Path, process, sync::Arc};

use agora::{
    application::{
        error::AppError,
        listings::{ListingService, ListingServiceSettings},
        repos::{BlobStore, CacheStore, ListingsRepo, ListingsWriteRepo, OwnersRepo},
    },
    cache::{MemoryCache, RedisCache},
    config,
    domain::{
        entities::Requester,
        filter::ListingFilter,
        listings::{AttachmentMeta, ListingDraft},
    },
    infra::{db::PostgresRepositories, error::InfraError, telemetry, uploads::FilesystemBlobStore},
};
use futures::StreamExt;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{Dispatch, Level, dispatcher, error, info};
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

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Migrate(_) => run_migrate(&settings).await,
        config::Command::Create(args) => run_create(&settings, *args).await,
        config::Command::List(args) => run_list(&settings, args).await,
        config::Command::Delete(args) => run_delete(&settings, args).await,
    }
}

async fn run_migrate(settings: &config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    info!(target = "agora::migrate", "database migrations applied");
    Ok(())
}

async fn run_create(settings: &config::Settings, args: config::CreateArgs) -> Result<(), AppError> {
    let repositories = init_repositories(settings).await?;
    let requester = find_requester(&repositories, args.owner).await?;
    let service = build_listing_service(settings, repositories).await?;

    let name = args.name.clone().unwrap_or_else(|| file_name(&args.file));
    let mime = args.mime.clone().unwrap_or_else(|| {
        mime_guess::from_path(&args.file)
            .first_or_octet_stream()
            .to_string()
    });
    let file = tokio::fs::File::open(&args.file)
        .await
        .map_err(|err| AppError::from(InfraError::Io(err)))?;

    let draft = ListingDraft {
        title: args.title,
        body: args.body,
        price: args.price,
        attachment: AttachmentMeta::new(name, mime),
    };

    let listing = service
        .create_listing(&requester, draft, ReaderStream::new(file).boxed())
        .await?;
    print_json(&listing)
}

async fn run_list(settings: &config::Settings, args: config::ListArgs) -> Result<(), AppError> {
    let repositories = init_repositories(settings).await?;
    let requester = match args.owner {
        Some(id) => Some(find_requester(&repositories, id).await?),
        None => None,
    };
    let service = build_listing_service(settings, repositories).await?;

    let filter = ListingFilter {
        min_price: args.min_price,
        max_price: args.max_price,
        sort_by: args.sort_by,
        sort_order: args.sort_order,
    };

    let listings = service
        .filtered_listings(args.limit, args.offset, &filter, requester.as_ref())
        .await?;
    print_json(&listings)
}

async fn run_delete(settings: &config::Settings, args: config::DeleteArgs) -> Result<(), AppError> {
    let repositories = init_repositories(settings).await?;
    let service = build_listing_service(settings, repositories).await?;
    service.delete_listing(args.id).await?;
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let repositories = PostgresRepositories::new(pool);
    repositories
        .health_check()
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(repositories))
}

async fn find_requester(
    repositories: &Arc<PostgresRepositories>,
    id: uuid::Uuid,
) -> Result<Requester, AppError> {
    let owners: Arc<dyn OwnersRepo> = repositories.clone();
    owners
        .find_owner(id)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?
        .ok_or_else(|| AppError::not_found(format!("user {id}")))
}

async fn build_listing_service(
    settings: &config::Settings,
    repositories: Arc<PostgresRepositories>,
) -> Result<ListingService, AppError> {
    let reader: Arc<dyn ListingsRepo> = repositories.clone();
    let writer: Arc<dyn ListingsWriteRepo> = repositories;

    let blobs: Arc<dyn BlobStore> = Arc::new(
        FilesystemBlobStore::new(
            settings.uploads.directory.clone(),
            settings.uploads.max_file_bytes.get(),
        )
        .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    let cache: Arc<dyn CacheStore> = match settings.cache.redis_url.as_deref() {
        Some(url) => Arc::new(
            RedisCache::connect(url)
                .await
                .map_err(|err| AppError::from(InfraError::cache(err.to_string())))?,
        ),
        None => Arc::new(MemoryCache::new(settings.cache.memory_capacity)),
    };

    Ok(ListingService::new(
        reader,
        writer,
        blobs,
        cache,
        ListingServiceSettings {
            cache_ttl: settings.cache.listings_ttl,
            compensation_timeout: settings.listings.compensation_timeout,
        },
    ))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
