use clap::Parser;
use client::app::{App, FeedStatus, FrameInput, Screen};
use client::config::{BackendConfig, SyncSettings};
use client::database::PlayerTable;
use client::input::InputManager;
use client::login::LoginForm;
use client::rendering::{Renderer, WINDOW_HEIGHT, WINDOW_WIDTH};
use log::{error, info};
use macroquad::prelude::*;
use shared::{PLAYERS_TABLE, TICK_INTERVAL_MS, WRITE_INTERVAL_MS};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Project URL of the hosted backend
    #[arg(short = 'u', long, env = "SUPABASE_URL")]
    url: String,

    /// Public anon key of the hosted backend
    #[arg(short = 'k', long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    anon_key: String,

    /// Table holding one row per player
    #[arg(short = 't', long, env = "FIELD_TABLE", default_value = PLAYERS_TABLE)]
    table: String,

    /// Pre-fill the name prompt
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Movement tick in milliseconds
    #[arg(long, default_value_t = TICK_INTERVAL_MS)]
    tick_ms: u64,

    /// Minimum delay between position writes in milliseconds
    #[arg(long, default_value_t = WRITE_INTERVAL_MS)]
    write_interval_ms: u64,
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Realtime Multiplayer Game".to_string(),
        window_width: WINDOW_WIDTH as i32,
        window_height: WINDOW_HEIGHT as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    if let Err(e) = run().await {
        error!("Client stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let backend = BackendConfig::new(args.url, args.anon_key).with_table(args.table);
    let settings = SyncSettings {
        tick: Duration::from_millis(args.tick_ms),
        write_interval: Duration::from_millis(args.write_interval_ms),
        ..SyncSettings::default()
    };

    info!("Starting client...");
    info!("Backend: {}", backend.url);
    info!("Controls: W/A/S/D to move, Esc to leave");

    let runtime = tokio::runtime::Runtime::new()?;
    let store = Arc::new(PlayerTable::new(&backend)?);

    let login = args
        .name
        .as_deref()
        .map(LoginForm::with_name)
        .unwrap_or_default();

    let mut app = App::new(runtime.handle().clone(), store, settings)
        .with_login(login)
        .with_backend(backend);
    let mut input = InputManager::new();
    let mut renderer = Renderer::new();

    prevent_quit();

    while !is_quit_requested() {
        let (keys, controls) = input.update();

        let join_name = match app.screen() {
            Screen::Login => app.login_mut().update(),
            Screen::Playing => None,
        };

        app.update(
            Instant::now(),
            FrameInput {
                keys,
                controls,
                join_name,
            },
        );

        match (app.screen(), app.feed_status()) {
            (Screen::Login, _) => renderer.render_login(app.login()),
            (Screen::Playing, FeedStatus::Loading) => renderer.render_loading(),
            (Screen::Playing, FeedStatus::Failed(message)) => renderer.render_error(message),
            (Screen::Playing, FeedStatus::Ready) => renderer.render_field(app.roster()),
        }

        next_frame().await;
    }

    info!("Window closed, leaving the field");
    if let Err(e) = runtime.block_on(app.close()) {
        error!("Failed to remove player on exit: {}", e);
    }

    Ok(())
}
