use cdir::app::{self, App};
use cdir::cache::clear_all;
use cdir::config::Config;
use cdir::directory::{self, ContactFilter, ContactSort, SortField};
use cdir::feed::{FeedItem, FeedPayload, LoadMore};
use cdir::query::{Activation, QueryState};
use cdir::store::SqliteStore;
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "cdir")]
#[command(about = "Offline-first community directory: blog, videos and contacts")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/cdir/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Merged posts and videos, newest first
  Feed {
    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pages: u32,
    /// Ignore cache freshness
    #[arg(long)]
    refresh: bool,
  },
  /// Latest blog posts
  Posts {
    #[arg(long)]
    refresh: bool,
  },
  /// Latest videos
  Videos {
    #[arg(long)]
    refresh: bool,
  },
  /// Member directory (requires a session token)
  Contacts {
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    batch: Option<String>,
    /// Repeat to match any of several values
    #[arg(long)]
    gender: Vec<String>,
    #[arg(long)]
    blood_type: Vec<String>,
    #[arg(long)]
    students: bool,
    #[arg(long)]
    teachers: bool,
    /// List upcoming birthdays, soonest first
    #[arg(long, conflicts_with = "facets")]
    birthdays: bool,
    /// List the batches, genders and blood types present
    #[arg(long)]
    facets: bool,
    #[arg(long, value_enum, default_value_t = SortField::Name)]
    sort: SortField,
    #[arg(long)]
    desc: bool,
    #[arg(long)]
    refresh: bool,
  },
  /// Remove every cached collection
  ClearCache,
  /// Store the session token used for contacts and videos
  SetToken { token: String },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging()?;

  match args.command {
    Command::ClearCache => {
      let store = SqliteStore::open()?;
      clear_all(&store)
        .await
        .map_err(|e| eyre!("Failed to clear cache: {}", e))?;
      println!("Cache cleared");
    }
    Command::SetToken { token } => {
      let store = SqliteStore::open()?;
      app::save_token(&store, &token).await?;
      println!("Token saved");
    }
    command => {
      let config = Config::load(args.config.as_deref())?;
      let app = App::new(&config).await?;
      run(&app, command).await?;
    }
  }

  Ok(())
}

async fn run(app: &App, command: Command) -> Result<()> {
  match command {
    Command::Feed { pages, refresh } => {
      report(activate_or_refresh(refresh, app.feed.activate(), app.feed.refresh()).await)?;
      for _ in 1..pages {
        match app.feed.load_more().await {
          LoadMore::Exhausted => break,
          LoadMore::Failed(e) => eprintln!("warning: could not load more: {}", e),
          LoadMore::Loaded { .. } | LoadMore::Ignored => {}
        }
      }
      let state = app.feed.state();
      if let Some(snapshot) = state.data() {
        snapshot.items.iter().for_each(print_item);
        if !snapshot.has_more {
          println!("-- end of feed --");
        }
      }
      print_source(&state);
    }
    Command::Posts { refresh } => {
      report(activate_or_refresh(refresh, app.posts.activate(), app.posts.refresh()).await)?;
      let state = app.posts.state();
      for post in state.data().into_iter().flatten() {
        println!("{}  {}  ({})", post.date, post.title, post.author.name);
      }
      print_source(&state);
    }
    Command::Videos { refresh } => {
      report(activate_or_refresh(refresh, app.videos.activate(), app.videos.refresh()).await)?;
      let state = app.videos.state();
      for video in state.data().into_iter().flatten() {
        println!("{}  {}", video.published_at, video.title);
      }
      print_source(&state);
    }
    Command::Contacts {
      search,
      batch,
      gender,
      blood_type,
      students,
      teachers,
      birthdays,
      facets,
      sort,
      desc,
      refresh,
    } => {
      if !app.is_signed_in() {
        eprintln!("warning: no valid session token, showing cached contacts only");
      }
      report(activate_or_refresh(refresh, app.contacts.activate(), app.contacts.refresh()).await)?;
      let state = app.contacts.state();
      let all = state.data().cloned().unwrap_or_default();

      if facets {
        let facets = directory::facets(&all);
        println!("batches:     {}", facets.batches.join(", "));
        println!("genders:     {}", facets.genders.join(", "));
        println!("blood types: {}", facets.blood_types.join(", "));
        print_source(&state);
        return Ok(());
      }

      let filter = ContactFilter {
        search: search.unwrap_or_default(),
        students,
        teachers,
        batch,
        genders: gender,
        blood_types: blood_type,
      };
      let sort = ContactSort {
        field: sort,
        descending: desc,
      };
      let shown = directory::apply(&all, &filter, sort);

      if birthdays {
        let today = chrono::Local::now().date_naive();
        for (contact, days) in directory::upcoming_birthdays(&shown, today) {
          let when = match days {
            0 => "today".to_string(),
            1 => "tomorrow".to_string(),
            n => format!("in {} days", n),
          };
          println!("{}  {}", contact.name, when);
        }
      } else {
        if filter.is_active() {
          println!("-- {} of {} contacts match --", shown.len(), all.len());
        }
        for contact in &shown {
          println!(
            "{}  <{}>  {}",
            contact.name,
            contact.email,
            contact.batch.as_deref().unwrap_or("-")
          );
        }
      }
      print_source(&state);
    }
    Command::ClearCache | Command::SetToken { .. } => {}
  }
  Ok(())
}

// Only the chosen future is awaited; the other is dropped unpolled.
async fn activate_or_refresh(
  refresh: bool,
  activate: impl std::future::Future<Output = Activation>,
  force: impl std::future::Future<Output = Activation>,
) -> Activation {
  if refresh {
    force.await
  } else {
    activate.await
  }
}

fn report(activation: Activation) -> Result<()> {
  match activation {
    Activation::Failed(e) if e.is_auth_required() => {
      Err(eyre!("Sign-in required: run `cdir set-token <TOKEN>` first"))
    }
    Activation::Failed(e) => Err(eyre!("Could not load data: {}", e)),
    Activation::Fetched { persisted: false } => {
      eprintln!("warning: fresh data could not be cached");
      Ok(())
    }
    // Reported alongside the data by `print_source`
    Activation::FellBack(_) => Ok(()),
    Activation::Ignored | Activation::CacheHit | Activation::Fetched { .. } => Ok(()),
  }
}

fn print_item(item: &FeedItem) {
  let (kind, date) = match &item.payload {
    FeedPayload::Post(post) => ("post", post.date.as_str()),
    FeedPayload::Video(video) => ("video", video.published_at.as_str()),
  };
  println!("[{:<5}] {}  {}", kind, date, item.title());
}

fn print_source<T>(state: &QueryState<T>) {
  let Some(source) = state.source() else {
    return;
  };
  let stale = matches!(state, QueryState::Ready { stale: true, .. });
  println!(
    "-- from {}{} --",
    source.as_str(),
    if stale { ", stale" } else { "" }
  );
  if let Some(error) = state.error() {
    eprintln!("warning: showing cached data, refresh failed: {}", error);
  }
}

/// Log to a daily file under the data directory so output stays clean.
fn init_logging() -> Result<WorkerGuard> {
  let dir = SqliteStore::default_path()?
    .parent()
    .map(|p| p.join("logs"))
    .ok_or_else(|| eyre!("Could not determine log directory"))?;
  std::fs::create_dir_all(&dir).map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "cdir.log"));
  let env_filter = EnvFilter::try_from_env("CDIR_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}
