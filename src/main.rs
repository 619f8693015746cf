use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use podqueue::{
    Episode, Podcast, PlaylistChange, PlaylistListener, PlaylistManager, ReqwestClient,
    load_podcast, read_metadata_file, write_metadata_file,
};

// Emoji with fallback for terminals without Unicode support
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static ADDED: Emoji<'_, '_> = Emoji("➕ ", "[+] ");
static REMOVED: Emoji<'_, '_> = Emoji("➖ ", "[-] ");
static QUEUE: Emoji<'_, '_> = Emoji("📋 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Parse podcast feeds and keep a queue of episodes to listen to
#[derive(Parser, Debug)]
#[command(name = "podqueue")]
#[command(about = "Parse podcast feeds and keep a queue of episodes to listen to")]
#[command(version)]
struct Args {
    /// Episode metadata file holding the playlist
    #[arg(
        short,
        long,
        global = true,
        env = "PODQUEUE_METADATA",
        default_value = "episode-metadata.json"
    )]
    metadata: PathBuf,

    /// Quiet mode - only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More log output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the episodes of a feed, newest first
    Episodes {
        /// RSS feed URL or path to local RSS file
        feed: String,
    },

    /// Append episodes of a feed to the playlist
    Add {
        /// RSS feed URL or path to local RSS file
        feed: String,

        /// Episode number as shown by `episodes`, or its media URL
        #[arg(required = true)]
        episodes: Vec<String>,
    },

    /// Take episodes off the playlist
    Remove {
        /// Playlist position as shown by `list`, or the media URL
        #[arg(required = true)]
        episodes: Vec<String>,
    },

    /// Show the playlist
    List,
}

/// Prints playlist changes as they happen
struct ConsoleListener;

impl PlaylistListener for ConsoleListener {
    fn on_playlist_changed(&self, change: &PlaylistChange) {
        match change {
            PlaylistChange::Appended { url, position } => println!(
                "{ADDED}Queued at #{}: {}",
                (position + 1).to_string().green().bold(),
                url.as_str().cyan()
            ),
            PlaylistChange::Removed { url, position } => println!(
                "{REMOVED}Removed #{}: {}",
                (position + 1).to_string().yellow().bold(),
                url.as_str().dimmed()
            ),
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn load_feed(client: &ReqwestClient, feed: &str, quiet: bool) -> Result<Podcast> {
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {wide_msg}")?);
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    };
    spinner.set_message(format!("{SEARCH}Loading feed: {}", feed.cyan()));

    let result = load_podcast(client, feed).await;
    spinner.finish_and_clear();

    result.with_context(|| format!("Failed to load feed {feed}"))
}

/// Find an episode by 1-based number or by media URL
fn select<'a>(episodes: &'a [Episode], selector: &str) -> Option<&'a Episode> {
    match selector.parse::<usize>() {
        Ok(number) => number.checked_sub(1).and_then(|index| episodes.get(index)),
        Err(_) => episodes
            .iter()
            .find(|episode| episode.media_url().is_some_and(|url| url.as_str() == selector)),
    }
}

fn print_episodes(podcast: &Podcast, manager: &PlaylistManager) {
    let episodes = podcast.sorted_episodes();

    println!(
        "\n{HEADPHONES}{} • {} episodes\n",
        podcast.to_string().bold().green(),
        episodes.len().to_string().cyan()
    );

    for (index, episode) in episodes.iter().enumerate() {
        let date = episode
            .pub_date()
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "undated".to_string());
        let duration = episode.duration_string().unwrap_or_default();
        let queued = manager
            .playlist_position(episode)
            .map(|position| format!(" [#{}]", position + 1).yellow().to_string())
            .unwrap_or_default();

        println!(
            "{:>4}. {:<10} {:>8}  {}{}",
            (index + 1).to_string().cyan(),
            date.dimmed(),
            duration,
            episode,
            queued
        );
    }
}

fn print_playlist(manager: &PlaylistManager) {
    let playlist = manager.playlist();

    if playlist.is_empty() {
        println!("{QUEUE}{}", "The playlist is empty".dimmed());
        return;
    }

    println!(
        "\n{QUEUE}{} ({} episodes)\n",
        "Playlist".bold().green(),
        playlist.len().to_string().cyan()
    );
    for (position, episode) in playlist.iter().enumerate() {
        let podcast = episode.podcast().name.as_deref().unwrap_or_default();
        println!(
            "{:>4}. {} {}",
            (position + 1).to_string().cyan(),
            episode,
            podcast.dimmed()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let metadata = read_metadata_file(&args.metadata)
        .with_context(|| format!("Failed to load {}", args.metadata.display()))?;
    let manager = PlaylistManager::with_metadata(metadata);
    if !args.quiet {
        manager.add_playlist_listener(Arc::new(ConsoleListener));
    }

    let client = ReqwestClient::new();
    let mut unmatched = Vec::new();

    match &args.command {
        Command::Episodes { feed } => {
            let podcast = load_feed(&client, feed, args.quiet).await?;
            if !args.quiet {
                print_episodes(&podcast, &manager);
            }
        }

        Command::Add { feed, episodes } => {
            let podcast = load_feed(&client, feed, args.quiet).await?;
            let sorted = podcast.sorted_episodes();

            for selector in episodes {
                match select(&sorted, selector) {
                    Some(episode) => {
                        manager.append_to_playlist(episode);
                    }
                    None => unmatched.push(selector.clone()),
                }
            }
        }

        Command::Remove { episodes } => {
            // Resolve everything first, positions shift with every removal
            let playlist = manager.playlist();
            let selected: Vec<Episode> = episodes
                .iter()
                .filter_map(|selector| {
                    let found = select(&playlist, selector).cloned();
                    if found.is_none() {
                        unmatched.push(selector.clone());
                    }
                    found
                })
                .collect();

            for episode in &selected {
                manager.remove_from_playlist(episode);
            }
        }

        Command::List => {
            if !args.quiet {
                print_playlist(&manager);
            }
        }
    }

    for selector in &unmatched {
        eprintln!("{CROSS}{} {}", "No such episode:".red().bold(), selector.yellow());
    }

    if let Some(snapshot) = manager.take_dirty_snapshot() {
        write_metadata_file(&snapshot, &args.metadata)
            .with_context(|| format!("Failed to save {}", args.metadata.display()))?;
    }

    if !unmatched.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
