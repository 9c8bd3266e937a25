//! `yandisk` command-line client for Yandex Disk authorization.

use std::{io::Write, path::PathBuf};

use {
    anyhow::{Context, Result, bail},
    clap::{Parser, Subcommand},
    secrecy::ExposeSecret,
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt},
    yandisk_config::YanDiskConfig,
    yandisk_oauth::{
        AuthHandler, AuthHandlerBuilder, AuthScheme, OAuthFlow, StoredToken, TokenStore,
        mask_token, types::now_unix,
    },
};

/// Refresh a stored token this long before it expires.
const EXPIRY_SKEW_SECS: u64 = 60;

#[derive(Parser)]
#[command(name = "yandisk", version, about = "Authorize applications against Yandex Disk")]
struct Cli {
    /// Config file (default: yandisk.{toml,yaml,yml,json} in the working
    /// directory, then the platform config directory)
    #[arg(long, global = true, env = "YANDISK_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print recorded metrics in Prometheus format on exit
    #[cfg(feature = "prometheus")]
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the authorization URL
    Url {
        /// code, screen_code or local_code (default: from config)
        #[arg(long)]
        scheme: Option<AuthScheme>,
    },

    /// Authorize and save the token
    Login {
        #[arg(long)]
        scheme: Option<AuthScheme>,

        /// Print the URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Exchange an authorization code obtained elsewhere and save the token
    Exchange {
        code: String,

        #[arg(long)]
        scheme: Option<AuthScheme>,
    },

    /// Refresh the stored token
    Refresh {
        /// Refresh even if the access token is still valid
        #[arg(long)]
        force: bool,
    },

    /// Inspect or remove the stored token
    Token {
        #[command(subcommand)]
        action: TokenCommand,
    },
}

#[derive(Subcommand)]
enum TokenCommand {
    /// Print the stored token with secrets masked
    Show {
        /// Print the raw access token only
        #[arg(long)]
        raw: bool,
    },
    /// Delete the stored token
    Clear,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    #[cfg(feature = "metrics")]
    let metrics = yandisk_metrics::init_metrics(yandisk_metrics::MetricsRecorderConfig {
        enabled: true,
        global_labels: Vec::new(),
    })?;

    let config = yandisk_config::discover_and_load(cli.config.as_deref())
        .context("failed to load configuration")?;
    let store = TokenStore::from_config(&config)?;
    debug!(path = %store.path().display(), "token store");

    match cli.command {
        Commands::Url { scheme } => cmd_url(&config, scheme)?,
        Commands::Login { scheme, no_browser } => {
            cmd_login(&config, &store, scheme, no_browser).await?
        },
        Commands::Exchange { code, scheme } => cmd_exchange(&config, &store, scheme, &code).await?,
        Commands::Refresh { force } => cmd_refresh(&config, &store, force).await?,
        Commands::Token { action } => match action {
            TokenCommand::Show { raw } => cmd_token_show(&store, raw)?,
            TokenCommand::Clear => cmd_token_clear(&store)?,
        },
    }

    #[cfg(feature = "prometheus")]
    if cli.metrics
        && let Some(text) = metrics.render()
    {
        print!("{text}");
    }
    #[cfg(all(feature = "metrics", not(feature = "prometheus")))]
    let _ = metrics;

    Ok(())
}

/// Handler builder from config, with the scheme optionally overridden.
fn builder(config: &YanDiskConfig, scheme: Option<AuthScheme>) -> Result<AuthHandlerBuilder> {
    let builder = match scheme {
        Some(scheme) => {
            let mut config = config.clone();
            config.oauth.scheme = scheme.to_string();
            AuthHandlerBuilder::from_config(&config)?
        },
        None => AuthHandlerBuilder::from_config(config)?,
    };
    Ok(builder)
}

fn cmd_url(config: &YanDiskConfig, scheme: Option<AuthScheme>) -> Result<()> {
    let handler = builder(config, scheme)?.build()?;
    println!("{}", handler.url());
    Ok(())
}

async fn cmd_login(
    config: &YanDiskConfig,
    store: &TokenStore,
    scheme: Option<AuthScheme>,
    no_browser: bool,
) -> Result<()> {
    let handler = builder(config, scheme)?.random_state().build()?;
    let scheme = handler.scheme();
    let flow = OAuthFlow::new(handler).open_browser(config.callback.open_browser && !no_browser);

    let tokens = match scheme {
        AuthScheme::LocalCode => flow.run().await?,
        AuthScheme::Code | AuthScheme::ScreenCode => {
            let url = flow.present_url();
            println!("Open this URL and authorize the application:\n\n  {url}\n");
            let code = prompt("Enter the code: ").await?;
            flow.run_with_code(&code).await?
        },
    };

    let stored = store.save(&tokens)?;
    println!(
        "Token saved to {} (expires in {}s)",
        store.path().display(),
        stored.response.expires_in
    );
    Ok(())
}

async fn cmd_exchange(
    config: &YanDiskConfig,
    store: &TokenStore,
    scheme: Option<AuthScheme>,
    code: &str,
) -> Result<()> {
    let handler = builder(config, scheme)?.build()?;
    let tokens = OAuthFlow::new(handler).run_with_code(code).await?;
    store.save(&tokens)?;
    println!("Token saved to {}", store.path().display());
    Ok(())
}

async fn cmd_refresh(config: &YanDiskConfig, store: &TokenStore, force: bool) -> Result<()> {
    let Some(current) = store.load()? else {
        bail!("no stored token, run `yandisk login` first");
    };
    if !force && !current.is_expired(now_unix(), EXPIRY_SKEW_SECS) {
        info!(expires_at = current.expires_at(), "access token still valid");
        println!("Token is still valid, pass --force to refresh anyway");
        return Ok(());
    }

    let handler: AuthHandler = builder(config, None)?.build()?;
    let tokens = handler
        .refresh(&current.response.refresh_token)
        .await
        .context("token refresh failed")?;
    let stored = store.save(&tokens)?;
    println!(
        "Token refreshed (expires in {}s)",
        stored.response.expires_in
    );
    Ok(())
}

fn cmd_token_show(store: &TokenStore, raw: bool) -> Result<()> {
    let Some(token) = store.load()? else {
        bail!("no stored token at {}", store.path().display());
    };
    if raw {
        println!("{}", token.response.access_token.expose_secret());
    } else {
        let summary = token_summary(&token, now_unix());
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn cmd_token_clear(store: &TokenStore) -> Result<()> {
    if store.clear()? {
        println!("Removed {}", store.path().display());
    } else {
        println!("No stored token at {}", store.path().display());
    }
    Ok(())
}

fn token_summary(token: &StoredToken, now: u64) -> serde_json::Value {
    serde_json::json!({
        "token_type": token.response.token_type(),
        "access_token": mask_token(token.response.access_token.expose_secret()),
        "refresh_token": mask_token(token.response.refresh_token.expose_secret()),
        "scope": token.response.scope,
        "obtained_at": token.obtained_at,
        "expires_at": token.expires_at(),
        "expired": token.is_expired(now, 0),
    })
}

/// Read one line from stdin without blocking the runtime.
async fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    std::io::stdout().flush()?;
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .context("stdin reader panicked")?
    .context("failed to read the code")?;
    Ok(line.trim().to_owned())
}
