//! Seedream - chat image generation add-on, console host.

use std::path::Path;
use std::process;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use seedream::cli::{parse_shell_line, Cli};
use seedream::config::{self, Config, Settings};
use seedream::context::{RecordingSession, ServiceContext};
use seedream::{BotError, Reply, SeedreamPlugin};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "seedream=debug" } else { "seedream=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Returns whether a single-shot command produced an image.
async fn run(cli: Cli) -> Result<bool, BotError> {
    let config_path = config::discover_config_path(cli.config.as_deref());
    let config = Config::load(&config_path).map_err(BotError::Config)?;
    let (mut settings, warnings) = Settings::from_config(&config);
    for warning in &warnings {
        warn!("{warning}");
    }
    if cli.keep_images {
        settings.purge_on_shutdown = false;
    }
    info!(
        model = %settings.model,
        size = %settings.size,
        dir = %settings.image_dir().display(),
        "settings resolved"
    );

    let replay_path = std::env::var("SEEDREAM_REPLAY").ok();
    let is_recording = std::env::var("SEEDREAM_REC").is_ok_and(|v| v == "true" || v == "1");

    let (ctx, recording_session): (ServiceContext, Option<RecordingSession>) =
        if let Some(ref cassette_path) = replay_path {
            info!(cassette = %cassette_path, "replaying");
            (ServiceContext::replaying(Path::new(cassette_path))?, None)
        } else if is_recording {
            info!("recording mode enabled");
            let (ctx, session) = ServiceContext::recording(&settings, Path::new(".seedream/cassettes"));
            (ctx, Some(session))
        } else {
            (ServiceContext::live(&settings), None)
        };

    let plugin = SeedreamPlugin::new(settings, ctx);
    let all_ok = if cli.shell {
        run_shell(&plugin).await;
        true
    } else {
        let reply = plugin.handle(&cli.command()).await;
        print_reply(&reply)
    };

    plugin.shutdown().await;
    drop(plugin);

    if let Some(session) = recording_session {
        match session.finish() {
            Ok(path) => eprintln!("Cassette saved: {}", path.display()),
            Err(e) => eprintln!("Warning: failed to save cassette: {e}"),
        }
    }

    Ok(all_ok)
}

async fn run_shell(plugin: &SeedreamPlugin) {
    let trigger = plugin.settings().trigger.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        };
        line_no += 1;
        let Some(command) = parse_shell_line(&line, line_no, &trigger) else { continue };
        let reply = plugin.handle(&command).await;
        print!("[{}] ", command.user_id);
        print_reply(&reply);
    }
}

fn print_reply(reply: &Reply) -> bool {
    match reply {
        Reply::Image(delivery) => {
            println!("Saved: {}", delivery.path.display());
            println!("{}", delivery.caption);
            true
        }
        Reply::Text(text) => {
            println!("{text}");
            false
        }
    }
}
