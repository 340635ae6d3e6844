/*
    on-repeat-rs | Rust CLI tool to archive Spotify's On Repeat into monthly playlists.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use log::{debug, warn};
use on_repeat_core::{
    monthly_playlist_name, AuthFlow, AuthState, FileSessionStore, SpotifyClient, SyncConfig,
    SyncReport, Synchronizer,
};
use std::fs::File;
use std::io::Write;
use std::process;
use url::Url;

#[derive(Parser)]
#[command(name = "on-repeat")]
#[command(about = "Archives your Spotify 'On Repeat' playlist into a monthly playlist", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts authorization: stores a PKCE verifier and opens the Spotify consent page
    Authorize,
    /// Copies new 'On Repeat' tracks into this month's playlist. Without a code, starts authorization.
    Sync {
        /// Authorization code from the callback URL
        #[arg(long, conflicts_with = "redirect_url")]
        code: Option<String>,
        /// The full URL Spotify redirected to (the code is read from it)
        #[arg(long)]
        redirect_url: Option<String>,
        /// Output the sync report to a JSON file (e.g., --json=report.json)
        #[arg(long)]
        json: Option<String>,
    },
    /// Prints the name of the monthly destination playlist
    Name {
        /// Date to compute the name for (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if dotenv().is_err() {
        debug!("No .env file loaded");
    }

    let cli = Cli::parse();

    match &cli.command {
        Commands::Authorize => {
            handle_authorize().await;
        }
        Commands::Sync {
            code,
            redirect_url,
            json,
        } => {
            handle_sync(code.clone(), redirect_url.as_deref(), json.as_deref()).await;
        }
        Commands::Name { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            println!("{}", monthly_playlist_name(date));
        }
    }
}

fn load_config() -> SyncConfig {
    match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            eprintln!("Set it in your environment or in a .env file.");
            process::exit(1);
        }
    }
}

fn auth_flow(config: &SyncConfig) -> AuthFlow<FileSessionStore> {
    AuthFlow::new(
        SpotifyClient::with_reqwest(config.endpoints.clone()),
        config,
        FileSessionStore::new(&config.session_file),
    )
}

async fn handle_authorize() {
    let config = load_config();
    let mut flow = auth_flow(&config);

    match flow.advance(AuthState::NoAuthorization).await {
        Ok(AuthState::RedirectedToProvider { authorize_url }) => {
            open_authorize_url(&authorize_url, &config);
        }
        Ok(other) => {
            eprintln!("[ERROR] Unexpected authorization state: {:?}", other);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("[ERROR] Could not start authorization: {}", e);
            process::exit(1);
        }
    }
}

fn open_authorize_url(url: &Url, config: &SyncConfig) {
    println!("Opening the Spotify authorization page...");
    if let Err(e) = webbrowser::open(url.as_str()) {
        warn!("Could not open a browser: {}", e);
    }
    println!();
    println!("If nothing opened, visit this URL:");
    println!("   {}", url);
    println!();
    println!(
        "After approving, copy the address you land on ({}?code=...) and run:",
        config.redirect_uri
    );
    println!("   on-repeat sync --redirect-url '<that address>'");
    println!();
    println!("[SAVED] Verifier stored in: {}", config.session_file.display());
}

async fn handle_sync(code: Option<String>, redirect_url: Option<&str>, json_path: Option<&str>) {
    let config = load_config();

    let state = match redirect_url {
        Some(url) => match AuthState::from_redirect_url(url) {
            Ok(state) => state,
            Err(e) => {
                eprintln!("[ERROR] {}", e);
                process::exit(1);
            }
        },
        None => AuthState::from_code(code),
    };

    let mut flow = auth_flow(&config);
    let token = match flow.advance(state).await {
        Ok(AuthState::TokenAcquired(token)) => token,
        Ok(AuthState::RedirectedToProvider { authorize_url }) => {
            open_authorize_url(&authorize_url, &config);
            return;
        }
        Ok(other) => {
            eprintln!("[ERROR] Unexpected authorization state: {:?}", other);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("[ERROR] Authorization failed: {}", e);
            process::exit(1);
        }
    };

    println!("Syncing 'On Repeat' into this month's playlist...");

    let synchronizer = Synchronizer::new(SpotifyClient::with_reqwest(config.endpoints.clone()));
    match synchronizer.run(&token, Local::now().date_naive()).await {
        Ok(report) => {
            println!();
            println!("---------------------------------------------------");
            println!("SYNC COMPLETE");
            println!("---------------------------------------------------");
            println!("Source Playlist:      {} ({})", report.source.name, report.source.id);
            println!(
                "Destination Playlist: {} ({})",
                report.destination.name, report.destination.id
            );
            println!("Tracks in Source:     {}", report.source_track_count);
            println!("Tracks Added:         {}", report.added.len());
            println!("---------------------------------------------------");
            for message in &report.messages {
                println!("{}", message);
            }

            if let Some(path) = json_path {
                match write_json_report(path, &report) {
                    Ok(()) => {
                        println!();
                        println!("[SAVED] Report saved to: {}", path);
                    }
                    Err(e) => {
                        eprintln!();
                        eprintln!("[ERROR] {:#}", e);
                    }
                }
            }
        }
        Err(failure) => {
            for message in &failure.messages {
                println!("{}", message);
            }
            eprintln!();
            eprintln!("[ERROR] Sync failed: {}", failure);
            process::exit(1);
        }
    }
}

fn write_json_report(path: &str, report: &SyncReport) -> anyhow::Result<()> {
    let json_content = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    let mut file =
        File::create(path).with_context(|| format!("Failed to create file '{}'", path))?;
    file.write_all(json_content.as_bytes())
        .with_context(|| format!("Failed to write report to '{}'", path))?;
    Ok(())
}
