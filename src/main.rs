//! conpty-demo - run a command in a pseudo console and print what comes back
//!
//! Starts a shell in a Windows pseudo console, types a command into it and
//! echoes the raw console output (escape sequences included) to stdout.
//!
//! ```text
//! conpty-demo                         # cmd.exe, types `whoami`
//! conpty-demo -s "powershell.exe -NoProfile" -i "Get-Date" -d 10
//! ```

use std::env;
use std::io::Write;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use conpty::config::Config;
use conpty::{Session, SessionEvent};

/// Command line options
struct Options {
    shell: Option<String>,
    columns: Option<i16>,
    rows: Option<i16>,
    input: String,
    duration: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            shell: None, // from config.toml or cmd.exe
            columns: None,
            rows: None,
            input: "whoami".to_string(),
            duration: Duration::from_secs(5),
        }
    }
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("conpty-demo {}", VERSION);
}

fn print_help() {
    eprintln!("conpty-demo {} - Run a command in a Windows pseudo console", VERSION);
    eprintln!();
    eprintln!("Usage: conpty-demo [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --shell <CMD>     Command to launch (default: config.toml or cmd.exe)");
    eprintln!("      --cols <N>        Console width in columns");
    eprintln!("      --rows <N>        Console height in rows");
    eprintln!("  -i, --input <TEXT>    Line typed into the console (default: whoami)");
    eprintln!("  -d, --duration <SEC>  How long to print output (default: 5)");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.conpty/config.toml");
    eprintln!("Log file:      ~/.conpty/conpty.log (filter with RUST_LOG)");
}

fn parse_number<T: FromStr>(flag: &str, value: Option<&String>) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("Missing value for {}", flag))?;
    value
        .parse()
        .map_err(|_| format!("Invalid value for {}: {}", flag, value))
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-s" | "--shell" => {
                i += 1;
                let shell = args.get(i).ok_or("Missing shell argument")?;
                options.shell = Some(shell.clone());
            }
            "--cols" => {
                i += 1;
                options.columns = Some(parse_number("--cols", args.get(i))?);
            }
            "--rows" => {
                i += 1;
                options.rows = Some(parse_number("--rows", args.get(i))?);
            }
            "-i" | "--input" => {
                i += 1;
                let input = args.get(i).ok_or("Missing input argument")?;
                options.input = input.clone();
            }
            "-d" | "--duration" => {
                i += 1;
                options.duration = Duration::from_secs(parse_number("--duration", args.get(i))?);
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(options)
}

/// Log to ~/.conpty/conpty.log, or stderr when the file cannot be opened
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    let log_path = Config::log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    let result = match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    // Command line options override config.toml
    let config = Config::load();
    init_logging(&config);
    info!("conpty-demo starting...");

    let shell = options.shell.clone().unwrap_or_else(|| config.shell().to_string());
    let size = config.console_size();
    let columns = options.columns.unwrap_or(size.columns);
    let rows = options.rows.unwrap_or(size.rows);

    info!("Shell: {}", shell);
    info!("Console size: {}x{}", columns, rows);

    let session = match Session::spawn(&shell, columns, rows, config.session_options()) {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to start shell: {}", e);
            return Err(e).with_context(|| format!("failed to start `{}`", shell));
        }
    };

    if !options.input.is_empty() {
        session
            .write_all(format!("{}\r\n", options.input).as_bytes())
            .context("failed to write input")?;
    }

    let mut stdout = std::io::stdout();
    let deadline = Instant::now() + options.duration;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match session.recv_timeout(remaining.min(Duration::from_millis(100))) {
            Some(SessionEvent::Output(data)) => {
                stdout.write_all(&data)?;
                stdout.flush()?;
            }
            Some(SessionEvent::Exited(code)) => {
                info!("Child exited with {:?}", code);
                break;
            }
            Some(SessionEvent::Error(e)) => {
                error!("Session ended with error: {}", e);
                break;
            }
            None => {}
        }
    }

    session.close().context("failed to close pseudo console")?;
    info!("Session closed");
    Ok(())
}
