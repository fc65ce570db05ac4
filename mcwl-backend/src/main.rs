mod discord_commands;

use mcwl_backend::assets::{self, AssetCache, AssetKind};
use mcwl_backend::config::Config;
use mcwl_backend::fetch::{Fetcher, RetryPolicy};
use mcwl_backend::status::StatusClient;
use mcwl_backend::sync::Coordinator;
use poise::{Framework, FrameworkOptions, PrefixFrameworkOptions, serenity_prelude as serenity};
use tokio::sync::Mutex;

type Context<'a> = poise::Context<'a, crate::Data, crate::discord_commands::Error>;

pub(crate) struct Data {
    pub(crate) coordinator: Coordinator,
    pub(crate) status: StatusClient,
    pub(crate) fetcher: Fetcher,
    pub(crate) avatars: Mutex<AssetCache>,
    pub(crate) skins: Mutex<AssetCache>,
    pub(crate) config: Config,
}

#[tokio::main]
async fn main() {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting mcwl backend...");
    // Load configuration from environment variables or use defaults
    let config = Config::from_env();
    tracing::info!(
        "Configuration: api={}, data_dir={}, max_bind={}, timeout={}s, retries={}",
        config.api_base_url,
        config.data_dir.display(),
        config.max_bind,
        config.request_timeout.as_secs(),
        config.retries
    );
    tracing::info!(
        "Stagger delay: {}..{}ms, avatar size: {}px, render service: {}",
        config.stagger_delay_min.as_millis(),
        config.stagger_delay_max.as_millis(),
        config.avatar_size,
        config.render_base_url
    );

    let fetcher =
        Fetcher::new(RetryPolicy::from_config(&config)).expect("failed to build HTTP client");
    let coordinator = Coordinator::open(config.clone(), fetcher.clone());
    let status = StatusClient::new(config.clone(), fetcher.clone());
    let avatars = Mutex::new(AssetCache::open(AssetKind::Avatar, &config));
    let skins = Mutex::new(AssetCache::open(AssetKind::Skin, &config));

    let background_fetcher = fetcher.clone();
    let background_url = config.background_url.clone();
    let background_path = config.background_path();
    let background_period = config.background_refresh;

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let prefix = config.discord_command_prefix.clone();
    let token = config
        .discord_token
        .clone()
        .expect("DISCORD_TOKEN environment variable is required");
    let data = Data {
        coordinator,
        status,
        fetcher,
        avatars,
        skins,
        config,
    };

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![
                discord_commands::bind(),
                discord_commands::unbind(),
                discord_commands::mylist(),
                discord_commands::whois(),
                discord_commands::status(),
                discord_commands::stats(),
                discord_commands::help(),
            ],
            prefix_options: PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        "Executing command '{}' by user '{}'",
                        ctx.command().name,
                        ctx.author().name
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        "Finished command '{}' by user '{}'",
                        ctx.command().name,
                        ctx.author().name
                    );
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .expect("Error creating Discord client");

    // Periodic best-effort refresh of the decorative background image.
    let background = async move {
        let mut ticker = tokio::time::interval(background_period);
        loop {
            ticker.tick().await;
            assets::refresh_background(&background_fetcher, &background_url, &background_path)
                .await;
        }
    };

    tokio::select! {
        _ = background => {}
        result = client.start() => {
            if let Err(e) = result {
                tracing::error!("Discord client error: {:?}", e);
            }
        }
    }
}
