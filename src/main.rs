//! Roomkey CLI entry point

mod cli;

use crate::cli::{Cli, Commands};
use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use roomkey::builders::now_secs;
use roomkey::config::{Credentials, ScheduleConfig, ServerConfig, TokenSchemes};
use roomkey::roles::AppRole;
use roomkey::scheduling::{generate_form_token, FormToken, Scheduler};
use roomkey::server::{run_server, ApiKey, AppState};
use roomkey::service::TokenService;
use roomkey::storage::{FileObjectStore, FormTokenStore, MemoryStore, PostgresStore, SessionStore};
use roomkey::token::{access_token, access_token2, token_version, ServiceScope};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let credentials = || -> Result<Credentials> {
        let app_id = cli.app_id.clone().context("ROOMKEY_APP_ID or --app-id is required")?;
        let app_certificate = cli
            .app_certificate
            .clone()
            .context("ROOMKEY_APP_CERTIFICATE or --app-certificate is required")?;
        Credentials::new(app_id, app_certificate).context("Invalid credentials")
    };

    match &cli.command {
        Commands::Serve {
            bind,
            api_key,
            upload_dir,
            timezone,
            cover_prefix,
            session_prefix,
        } => {
            let config = ServerConfig {
                bind_addr: bind.parse().context("Invalid bind address")?,
                credentials: credentials()?,
                schemes: cli.schemes(),
                api_key: api_key.clone().filter(|k| !k.is_empty()),
                database_url: cli.database_url.clone(),
                upload_dir: PathBuf::from(upload_dir),
                schedule: ScheduleConfig {
                    timezone: timezone.clone(),
                    cover_prefix: cover_prefix.clone(),
                    session_prefix: session_prefix.clone(),
                },
            };
            serve(config).await
        }
        Commands::Rtc {
            channel,
            uid,
            role,
            expire_seconds,
        } => rtc(credentials()?, cli.schemes(), channel, *uid, *role, *expire_seconds),
        Commands::Rtm {
            account,
            uid,
            expire_seconds,
        } => rtm(credentials()?, cli.schemes(), account.as_deref(), *uid, *expire_seconds),
        Commands::Verify { token, channel, uid } => {
            let certificate = cli
                .app_certificate
                .as_deref()
                .context("ROOMKEY_APP_CERTIFICATE or --app-certificate is required")?;
            verify(certificate, token, channel.as_deref(), uid)
        }
        Commands::FormToken {
            subject,
            date,
            time,
            sender_email,
            expire_hours,
        } => {
            let url = cli
                .database_url
                .as_deref()
                .context("DATABASE_URL is required to store form tokens")?;
            let form = FormToken {
                expire_at: Some(Utc::now() + Duration::hours(*expire_hours)),
                pref_subject: subject.clone(),
                pref_date: date.clone(),
                pref_time: time.clone(),
                sender_email: sender_email.clone(),
                ..Default::default()
            };
            form_token(url, form).await
        }
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    let tokens = TokenService::new(config.credentials.clone(), config.schemes)
        .context("Failed to initialize token builders")?;

    let (form_tokens, sessions): (Arc<dyn FormTokenStore>, Arc<dyn SessionStore>) =
        match &config.database_url {
            Some(url) => {
                let store = Arc::new(
                    PostgresStore::connect(url)
                        .await
                        .context("Failed to connect to database")?,
                );
                (store.clone() as Arc<dyn FormTokenStore>, store as Arc<dyn SessionStore>)
            }
            None => {
                warn!(
                    "DATABASE_URL not set, form tokens and sessions are kept in memory; \
                     form-token cannot seed this store, so the scheduling form will reject every token"
                );
                let store = Arc::new(MemoryStore::new());
                (store.clone() as Arc<dyn FormTokenStore>, store as Arc<dyn SessionStore>)
            }
        };
    let objects = Arc::new(FileObjectStore::new(&config.upload_dir));

    let state = AppState {
        tokens: Arc::new(tokens),
        scheduler: Scheduler::new(form_tokens, sessions, objects, config.schedule.clone()),
        api_key: config.api_key.clone().map(ApiKey::new),
    };

    info!(
        app_id = %config.credentials.app_id(),
        schemes = %config.schemes,
        api_key = config.api_key.is_some(),
        upload_dir = %config.upload_dir.display(),
        "Starting Roomkey server..."
    );
    run_server(config.bind_addr, state, shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}

fn rtc(
    credentials: Credentials,
    schemes: TokenSchemes,
    channel: &str,
    uid: i64,
    role: AppRole,
    expire_seconds: i64,
) -> Result<()> {
    let service = TokenService::new(credentials, schemes)?;
    let issued = service
        .issue_media(channel, uid, role, expire_seconds, now_secs())
        .context("Failed to build media token")?;

    println!("{}", issued.token);
    println!();
    println!("Channel: {}", issued.channel);
    println!("Uid: {}", issued.uid);
    println!("Role: {}", issued.role);
    println!("Expires at: {}", issued.expire_at);
    Ok(())
}

fn rtm(
    credentials: Credentials,
    schemes: TokenSchemes,
    account: Option<&str>,
    uid: i64,
    expire_seconds: i64,
) -> Result<()> {
    let service = TokenService::new(credentials, schemes)?;
    let issued = service
        .issue_signaling(account, uid, expire_seconds, now_secs())
        .context("Failed to build signaling token")?;

    println!("{}", issued.token);
    println!();
    println!("Account: {}", issued.account);
    println!("Expires at: {}", issued.expire_at);
    Ok(())
}

fn verify(certificate: &str, token: &str, channel: Option<&str>, uid: &str) -> Result<()> {
    let now = now_secs();

    match token_version(token) {
        Some(access_token::VERSION) => {
            let channel = channel.context("--channel is required for 006 tokens")?;
            let verified = access_token::verify(token, certificate, channel, uid, now)
                .context("Verification failed")?;

            println!("Valid 006 token");
            println!("App id: {}", verified.app_id);
            println!("Salt: {}", verified.message.salt());
            println!("Envelope expires at: {}", verified.message.ts());
            println!("Privileges:");
            for (privilege, expire_at) in verified.message.privileges().iter() {
                println!("  {} until {}", privilege, expire_at);
            }
        }
        Some(access_token2::VERSION) => {
            let decoded = access_token2::verify(token, certificate, now).context("Verification failed")?;

            println!("Valid 007 token");
            println!("App id: {}", decoded.app_id);
            println!("Issued at: {}", decoded.issue_ts);
            match decoded.expires_at() {
                Some(at) => println!("Expires at: {}", at),
                None => println!("Expires at: never"),
            }
            for service in &decoded.services {
                match service.scope() {
                    ServiceScope::Rtc { channel, uid } => {
                        println!("Media service: channel={} uid={:?}", channel, uid)
                    }
                    ServiceScope::Rtm { user_id } => println!("Signaling service: user={}", user_id),
                }
                for (privilege, rel) in service.privileges().iter() {
                    println!("  {} +{}s", privilege, rel);
                }
            }
        }
        _ => bail!("Unrecognized token version"),
    }

    Ok(())
}

async fn form_token(database_url: &str, form: FormToken) -> Result<()> {
    let store = PostgresStore::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    let token = generate_form_token();
    store.put_form_token(&token, &form).await?;

    println!("{}", token);
    if let Some(expire_at) = form.expire_at {
        println!("Expires at: {}", expire_at.to_rfc3339());
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}
