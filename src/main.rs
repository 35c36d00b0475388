use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use wk_vocab::cache::{CacheResult, CacheSource, ResetOutcome, SqliteStorage};
use wk_vocab::config::Config;
use wk_vocab::wanikani::types::{PartOfSpeechGroup, SrsBucket, VocabularyEntry};
use wk_vocab::wanikani::CachedWaniKaniClient;

#[derive(Parser, Debug)]
#[command(name = "wk-vocab")]
#[command(about = "Fetch your WaniKani vocabulary, grouped for sentence generation")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/wk-vocab/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Ignore cached data and refetch from WaniKani
  #[arg(short, long, global = true)]
  refresh: bool,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// All unlocked vocabulary grouped by part of speech (default)
  Summary {
    /// Only print counts
    #[arg(long)]
    stats_only: bool,
    /// Print JSON for a sentence generator instead of text
    #[arg(long)]
    json: bool,
    /// Only include entries in this SRS bucket (e.g. guru, burned)
    #[arg(long)]
    bucket: Option<SrsBucket>,
  },
  /// Unlocked vocabulary of one level
  Level {
    level: u32,
    #[arg(long)]
    json: bool,
  },
  /// Vocabulary counts per SRS stage
  Progress,
  /// Account information
  User,
  /// Manage the local cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Delete every cached entry
  Clear,
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
  total: usize,
  groups: Vec<PartOfSpeechGroup<'a>>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = init_logging()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let command = args.command.unwrap_or(Command::Summary {
    stats_only: false,
    json: false,
    bucket: None,
  });

  // The cache can be managed without an API token
  let client = || CachedWaniKaniClient::new(&config);

  match command {
    Command::Summary {
      stats_only,
      json,
      bucket,
    } => {
      let result = client()?.get_vocabulary_summary(args.refresh).await?;
      report(&result);
      let summary = match bucket {
        Some(bucket) => result.data.by_srs_bucket(bucket),
        None => result.data,
      };
      let groups = summary.by_part_of_speech();

      if json {
        let output = SummaryOutput {
          total: summary.entries.len(),
          groups,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
      } else if stats_only {
        print_stats(summary.entries.len(), &groups);
      } else {
        print_stats(summary.entries.len(), &groups);
        for group in &groups {
          println!("\n{} ({})", group.part_of_speech, group.entries.len());
          for entry in &group.entries {
            print_entry(entry);
          }
        }
      }
    }
    Command::Level { level, json } => {
      let result = client()?.get_vocabulary_by_level(level, args.refresh).await?;
      report(&result);

      if json {
        println!("{}", serde_json::to_string_pretty(&result.data)?);
      } else {
        println!("Level {}: {} vocabulary items", level, result.data.entries.len());
        for entry in &result.data.entries {
          print_entry(entry);
        }
      }
    }
    Command::Progress => {
      let result = client()?.get_vocabulary_progress(args.refresh).await?;
      report(&result);

      println!("Vocabulary progress ({} items):", result.data.total);
      for bucket in SrsBucket::ALL {
        println!("  {:<12} {}", bucket.name(), result.data.count(bucket));
      }
    }
    Command::User => {
      let user = client()?.get_user_information().await?;
      println!("{} (level {})", user.username, user.level);
      if !user.profile_url.is_empty() {
        println!("{}", user.profile_url);
      }
      if let Some(started_at) = user.started_at {
        println!("Started: {}", started_at.format("%Y-%m-%d"));
      }
      println!(
        "Subscription: {}{}",
        user.subscription.kind.as_deref().unwrap_or("unknown"),
        if user.subscription.active { "" } else { " (inactive)" }
      );
    }
    Command::Cache {
      action: CacheAction::Clear,
    } => {
      match SqliteStorage::reset(config.cache.path.as_deref())? {
        ResetOutcome::Cleared(removed) => println!("Removed {} cached entries", removed),
        ResetOutcome::Deleted(path) => {
          println!("Deleted unreadable cache database {}", path.display())
        }
      }
    }
  }

  Ok(())
}

/// Log to a file in the data directory so stdout stays clean for output.
fn init_logging() -> Result<WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("wk-vocab");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::never(&log_dir, "wk-vocab.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wk_vocab=info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

/// Print where the data came from and any soft warnings to stderr.
fn report<T>(result: &CacheResult<T>) {
  if let (CacheSource::Cache, Some(cached_at)) = (result.source, result.cached_at) {
    eprintln!(
      "(cached {}, use --refresh to refetch)",
      cached_at.format("%Y-%m-%d %H:%M UTC")
    );
  }
  for warning in &result.warnings {
    eprintln!("warning: {}", warning);
  }
}

fn print_stats(total: usize, groups: &[PartOfSpeechGroup<'_>]) {
  println!("Total vocabulary items: {}", total);
  println!("\nBreakdown by part of speech:");

  let mut counts: Vec<(&str, usize)> = groups
    .iter()
    .map(|g| (g.part_of_speech, g.entries.len()))
    .collect();
  counts.sort();
  for (part_of_speech, count) in counts {
    println!("  {}: {} words", part_of_speech, count);
  }
}

fn print_entry(entry: &VocabularyEntry) {
  let reading = entry
    .primary_reading
    .as_deref()
    .or_else(|| entry.readings.first().map(String::as_str))
    .unwrap_or("");
  let meaning = entry
    .primary_meaning
    .as_deref()
    .or_else(|| entry.meanings.first().map(String::as_str))
    .unwrap_or("");

  println!(
    "  {} ({}) - {} [{}]",
    entry.characters,
    reading,
    meaning,
    entry.srs_bucket().name()
  );
}
