//! Call Panel - terminal front-end for a call/session controller
//!
//! Places, accepts and hangs up calls and keeps video renderers in step
//! with the streams the calling backend publishes.

mod auth;
mod calling;
mod config;
mod panel;
mod session;
mod tui;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::{HttpTokenProvider, TokenProvider};
use config::Config;
use session::PageType;

#[derive(Parser)]
#[command(name = "call-panel")]
#[command(about = "Terminal control panel for placing and receiving calls", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the call panel
    Panel {
        /// Page type: "Device" for the camera endpoint, anything else for Cloud
        #[arg(long, conflicts_with = "url")]
        page_type: Option<String>,

        /// Launch URL; its PageType query parameter selects the mode
        #[arg(long)]
        url: Option<String>,

        /// Accept incoming calls automatically
        #[arg(long)]
        auto_accept: bool,

        /// Simulate an incoming call from this caller after start-up
        #[arg(long)]
        ring_from: Option<String>,

        /// Token service endpoint
        #[arg(long)]
        token_url: Option<String>,

        /// Directory scanned for video* camera devices
        #[arg(long)]
        camera_root: Option<std::path::PathBuf>,
    },

    /// Fetch a token and show the identity it was issued for
    Token {
        /// Token service endpoint
        #[arg(long)]
        token_url: Option<String>,
    },

    /// Show the effective configuration
    Config {
        /// Write a default config file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let config = Config::load()?;

    match cli.command {
        Commands::Panel {
            page_type,
            url,
            auto_accept,
            ring_from,
            token_url,
            camera_root,
        } => {
            // Logs go to the panel's log pane; stderr would corrupt the screen.
            let logs = tui::LogBuffer::new();
            tracing_subscriber::registry()
                .with(env_filter())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(logs.clone()),
                )
                .init();

            let page_type = resolve_page_type(page_type, url, &config)?;
            let options = tui::LaunchOptions {
                page_type,
                token_url: token_url.unwrap_or_else(|| config.token_url.clone()),
                auto_accept: auto_accept || config.auto_accept,
                ring_from,
                camera_root: camera_root.unwrap_or_else(|| config.camera_root.clone()),
                echo_destination: config.echo_destination.clone(),
            };
            tui::run(options, logs).await?;
        }
        Commands::Token { token_url } => {
            init_stderr_logging(env_filter());
            let url = token_url.unwrap_or_else(|| config.token_url.clone());
            let credentials = HttpTokenProvider::new(url).fetch().await?;
            println!("Identity: {}", credentials.user_id);
            println!("Expires:  {}", credentials.expiry_display());
        }
        Commands::Config { init } => {
            init_stderr_logging(env_filter());
            if init {
                let path = Config::config_path()?;
                if path.exists() {
                    bail!("{} already exists", path.display());
                }
                let path = Config::default().save()?;
                tracing::info!("Wrote default config to {}", path.display());
            } else {
                print!("{}", config.to_toml()?);
            }
        }
    }

    Ok(())
}

fn init_stderr_logging(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// `--url` wins over `--page-type`, which wins over the config file.
fn resolve_page_type(
    page_type: Option<String>,
    url: Option<String>,
    config: &Config,
) -> Result<PageType> {
    if let Some(url) = url {
        return PageType::from_launch_url(&url)
            .with_context(|| format!("Invalid launch URL: {}", url));
    }
    Ok(PageType::new(page_type.or_else(|| config.page_type.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use session::Mode;

    #[test]
    fn test_resolve_page_type_precedence() {
        let config = Config {
            page_type: Some("Device".into()),
            ..Config::default()
        };
        let resolved = resolve_page_type(None, None, &config).unwrap();
        assert_eq!(resolved.mode(), Mode::Device);

        let resolved = resolve_page_type(Some("Viewer".into()), None, &config).unwrap();
        assert_eq!(resolved.mode(), Mode::Cloud);
        assert_eq!(resolved.label(), "Viewer");

        let resolved = resolve_page_type(
            None,
            Some("https://panel.example.net/index.html?PageType=Device".into()),
            &Config::default(),
        )
        .unwrap();
        assert_eq!(resolved.mode(), Mode::Device);

        assert!(resolve_page_type(None, Some("not a url".into()), &config).is_err());
    }

    #[test]
    fn test_cli_parses_panel_flags() {
        let cli = Cli::try_parse_from([
            "call-panel",
            "-v",
            "panel",
            "--page-type",
            "Device",
            "--ring-from",
            "8:acs:caller",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Panel {
                page_type,
                ring_from,
                ..
            } => {
                assert_eq!(page_type.as_deref(), Some("Device"));
                assert_eq!(ring_from.as_deref(), Some("8:acs:caller"));
            }
            _ => panic!("expected panel command"),
        }

        assert!(Cli::try_parse_from([
            "call-panel",
            "panel",
            "--page-type",
            "Device",
            "--url",
            "https://x.example/?PageType=Cloud"
        ])
        .is_err());
    }
}
