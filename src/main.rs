mod config;
mod constants;
mod credentials;
mod error;
mod lock;
mod model;
#[cfg(feature = "notifications")]
mod notification;
mod remote;
mod store;
mod sync;

use anyhow::{Context, Result};
use std::env;
use std::time::Instant;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::lock::InstanceLock;
use crate::model::sort_for_display;
use crate::remote::HttpRemote;
use crate::store::Store;
use crate::sync::{LogObserver, PassOptions};

fn setup_logging(verbose: bool, log_to_file: bool) {
    use std::fs::OpenOptions;

    let default = if verbose {
        "debug,devmirror=debug"
    } else {
        "info,devmirror=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let log_file = if log_to_file {
        Config::config_dir()
            .ok()
            .map(|dir| dir.join("devmirror.log"))
            .and_then(|path| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .ok()
            })
    } else {
        None
    };

    if let Some(file) = log_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_usage() {
    eprintln!(
        r#"devmirror - Mirror deviantART notes and gallery into a local database

Usage: devmirror [options] [command]

Commands:
    (none)          Sync now, then again every interval until Ctrl-C
    list            Print mirrored notes and deviations
    set-password    Store the account password
    help            Show this help message

Options:
    --once          Run a single pass and exit
    -f, --fsck      Run a single forced audit of every note folder and exit
    -v, --verbose   Log every create/delete/rename decision

Configuration file: ~/.config/devmirror/config.toml
"#
    );
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    command: Option<String>,
    once: bool,
    fsck: bool,
    verbose: bool,
}

fn parse_args(raw: &[String]) -> Result<Args> {
    let mut args = Args::default();
    for arg in raw {
        match arg.as_str() {
            "--once" => args.once = true,
            "-f" | "--fsck" => args.fsck = true,
            "-v" | "--verbose" => args.verbose = true,
            "-h" | "--help" => args.command = Some("help".to_string()),
            flag if flag.starts_with('-') => anyhow::bail!("Unknown option: {}", flag),
            cmd => {
                if let Some(previous) = &args.command {
                    anyhow::bail!("Unexpected argument '{}' after '{}'", cmd, previous);
                }
                args.command = Some(cmd.to_string());
            }
        }
    }
    Ok(args)
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

async fn run_list(config: &Config) -> Result<()> {
    let store = Store::open(&config.database_path()?).await?;

    let mut notes = store.get_notes().await?;
    sort_for_display(&mut notes);
    println!("Notes ({}):", notes.len());
    for note in &notes {
        println!(
            "  {:<20} {}  {}",
            note.sender,
            format_timestamp(note.timestamp),
            note.title
        );
    }

    let mut deviations = store.get_deviations().await?;
    sort_for_display(&mut deviations);
    println!("\nDeviations ({}):", deviations.len());
    for deviation in &deviations {
        println!(
            "  {}  {}  {}",
            format_timestamp(deviation.timestamp),
            deviation.title,
            deviation.url
        );
    }

    store.close().await;
    Ok(())
}

fn run_set_password(config: &Config) -> Result<()> {
    use std::io::{self, Write};

    print!("Password for {}: ", config.username);
    io::stdout().flush()?;
    let password = rpassword_read()?;
    println!();

    if password.is_empty() {
        anyhow::bail!("Empty password, nothing stored");
    }

    config.ensure_dirs()?;
    let creds = CredentialStore::new(&config.username);
    creds.set_password(&password)?;
    if creds.get_password()? != password {
        anyhow::bail!("Credential storage failed");
    }
    println!("Password stored.");
    Ok(())
}

fn rpassword_read() -> Result<String> {
    use std::io;

    // Disable echo
    let _guard = DisableEcho::new()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    Ok(password.trim().to_string())
}

struct DisableEcho {
    #[cfg(unix)]
    original: libc::termios,
}

impl DisableEcho {
    #[cfg(unix)]
    fn new() -> Result<Self> {
        use std::mem::MaybeUninit;
        use std::os::unix::io::AsRawFd;

        let fd = std::io::stdin().as_raw_fd();
        let mut termios = MaybeUninit::<libc::termios>::uninit();

        unsafe {
            if libc::tcgetattr(fd, termios.as_mut_ptr()) != 0 {
                anyhow::bail!("Failed to get terminal attributes");
            }
            let original = termios.assume_init();
            let mut new = original;
            new.c_lflag &= !libc::ECHO;
            if libc::tcsetattr(fd, libc::TCSANOW, &new) != 0 {
                anyhow::bail!("Failed to set terminal attributes");
            }
            Ok(Self { original })
        }
    }

    #[cfg(not(unix))]
    fn new() -> Result<Self> {
        Ok(Self {})
    }
}

#[cfg(unix)]
impl Drop for DisableEcho {
    fn drop(&mut self) {
        use std::os::unix::io::AsRawFd;
        let fd = std::io::stdin().as_raw_fd();
        unsafe {
            libc::tcsetattr(fd, libc::TCSANOW, &self.original);
        }
    }
}

#[cfg(feature = "notifications")]
fn notify_report(config: &Config, report: &sync::PassReport) {
    notification::notify_new_items(&config.notifications, report);
}

#[cfg(not(feature = "notifications"))]
fn notify_report(_config: &Config, _report: &sync::PassReport) {}

#[cfg(feature = "notifications")]
fn notify_failure(config: &Config, message: &str) {
    notification::notify_failure(&config.notifications, message);
}

#[cfg(not(feature = "notifications"))]
fn notify_failure(_config: &Config, _message: &str) {}

/// Run passes until interrupted (or once). A pass in progress is never
/// cancelled; Ctrl-C is only honoured between passes.
async fn run_sync(config: &Config, args: &Args) -> Result<()> {
    let database = config.database_path()?;
    let lock = InstanceLock::acquire(&InstanceLock::path_for(&database))?;

    let password = CredentialStore::new(&config.username).get_password()?;
    let remote = HttpRemote::new(&config.remote, &config.username, password)
        .context("Failed to set up remote client")?;

    let store = Store::open(&database)
        .await
        .with_context(|| format!("Failed to open database {}", database.display()))?;
    tracing::info!(
        "Mirroring '{}' into {} (lock {})",
        config.username,
        database.display(),
        lock.path().display()
    );

    let observer = LogObserver::new(args.verbose);
    let options = PassOptions {
        notes: config.sync.notes,
        gallery: config.sync.gallery,
        force_audit: args.fsck,
        ignored_folders: config.ignored_folder_ids()?,
    };
    let single = args.once || args.fsck;
    let interval = config.sync.interval();

    let mut outcome = Ok(());
    loop {
        let started = Instant::now();
        match sync::run_pass(&remote, &store, &observer, &options).await {
            Ok(report) => notify_report(config, &report),
            Err(e) => {
                if e.is_fatal() {
                    tracing::error!("Pass halted: {}", e);
                } else {
                    tracing::warn!("Pass abandoned, retrying next interval: {}", e);
                }
                notify_failure(config, &e.to_string());
                if single {
                    outcome = Err(e.into());
                }
            }
        }

        if single {
            break;
        }

        let wait = interval.saturating_sub(started.elapsed());
        tracing::debug!("Next pass in {:?}", wait);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    store.close().await;
    drop(lock);
    outcome
}

#[tokio::main]
async fn main() -> Result<()> {
    let raw: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    match args.command.as_deref() {
        Some("help") => {
            print_usage();
            Ok(())
        }
        Some("set-password") => {
            let config = Config::load()?;
            run_set_password(&config)
        }
        Some("list") => {
            let config = Config::load()?;
            setup_logging(args.verbose, config.log_to_file);
            run_list(&config).await
        }
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            std::process::exit(1);
        }
        None => {
            let config = Config::load()?;
            config.ensure_dirs()?;
            setup_logging(args.verbose, config.log_to_file);
            run_sync(&config, &args).await
        }
    }
}
