//! sshterm
//!
//! Interactive ssh sessions with styled output, plus a few helpers for
//! stored passwords and decoding captured terminal output.

use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::queue;
use crossterm::style::{
    Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use crossterm::terminal;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use ansi::{strip_ansi, AnsiDecoder, Palette, Rgb, StyledRun};
use engine::config::{default_config_path, Config};
use engine::secrets::{KeyringStore, MemorySecretStore, SecretStore};
use engine::session::{
    ChannelSink, DisconnectReason, OutputStream, ProcessSession, SessionConfig, SessionEvent,
    SessionSettings, SessionState, DEFAULT_SSH_PORT,
};

/// Ctrl-] closes the session from the local side.
const LOCAL_ESCAPE: u8 = 0x1d;

/// sshterm - ssh sessions with styled output.
#[derive(Parser, Debug)]
#[command(name = "sshterm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Open an interactive session
    Connect(ConnectArgs),

    /// Manage stored passwords
    #[command(subcommand)]
    Secret(SecretCommands),

    /// Print a file (or stdin) with escape sequences removed
    Strip {
        /// Input file; stdin when omitted
        file: Option<PathBuf>,
    },

    /// Decode a file (or stdin) and print its styled runs
    Decode {
        /// Input file; stdin when omitted
        file: Option<PathBuf>,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Arguments for `connect`.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Target as user@host
    pub destination: String,

    /// Remote port
    #[arg(short, long, default_value_t = DEFAULT_SSH_PORT)]
    pub port: u16,

    /// Identity file for public key authentication
    #[arg(short, long, value_name = "FILE", conflicts_with = "password")]
    pub identity: Option<PathBuf>,

    /// Authenticate with a password instead of a key
    #[arg(long)]
    pub password: bool,

    /// Prompt for the password instead of reading the keychain
    #[arg(long, requires = "password")]
    pub ask_password: bool,

    /// Keychain entry holding the password (defaults to the destination)
    #[arg(long, value_name = "ID")]
    pub secret_id: Option<String>,
}

/// Stored password commands.
#[derive(Subcommand, Debug, Clone)]
pub enum SecretCommands {
    /// Store a password read from the terminal or stdin
    Set {
        /// Keychain entry, usually user@host
        id: String,
    },
    /// Remove a stored password
    Delete {
        /// Keychain entry, usually user@host
        id: String,
    },
}

/// Configuration file commands.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load(&config_path)?;
    config.apply_env_overrides();
    config.validate()?;

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };

    // Session output owns the terminal, so `connect` logs to a file.
    let _guard = match &cli.command {
        Commands::Connect(_) => Some(init_file_logging(&level, &config.logging.directory)?),
        _ => {
            init_stderr_logging(&level)?;
            None
        }
    };

    match cli.command {
        Commands::Connect(args) => {
            let state = run_connect(&config, args).await?;
            match state {
                SessionState::Disconnected(DisconnectReason::Exited)
                | SessionState::Disconnected(DisconnectReason::Requested) => {
                    eprintln!("Connection closed.");
                }
                other => {
                    eprintln!("Error: {other}");
                    drop(_guard);
                    std::process::exit(1);
                }
            }
        }
        Commands::Secret(SecretCommands::Set { id }) => {
            let secret = read_secret(&format!("Password for {id}: "))?;
            if !KeyringStore::system().set(&id, &secret) {
                anyhow::bail!("Failed to store password for {id}");
            }
            println!("Stored password for {id}");
        }
        Commands::Secret(SecretCommands::Delete { id }) => {
            if KeyringStore::system().delete(&id) {
                println!("Deleted password for {id}");
            } else {
                println!("No stored password for {id}");
            }
        }
        Commands::Strip { file } => {
            let input = read_input(file.as_deref())?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(strip_ansi(&input).as_bytes())?;
            stdout.flush()?;
        }
        Commands::Decode { file } => {
            let input = read_input(file.as_deref())?;
            let mut decoder = AnsiDecoder::new();
            let runs = decoder.append(&input);
            render_runs(&mut io::stdout().lock(), &runs, decoder.palette())?;
        }
        Commands::Config(ConfigCommands::Init { force }) => {
            if config_path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {} (use --force to overwrite)",
                    config_path.display()
                );
            }
            Config::default().save(&config_path)?;
            println!("Wrote default configuration to {}", config_path.display());
        }
        Commands::Config(ConfigCommands::Show) => {
            println!("# {}", config_path.display());
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_new(level).with_context(|| format!("Invalid log level: {level}"))
}

fn init_stderr_logging(level: &str) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level)?)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

fn init_file_logging(level: &str, directory: &Path) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory: {}", directory.display()))?;

    let appender = tracing_appender::rolling::never(directory, "sshterm.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level)?)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

/// Splits `user@host`; a bare host uses the local user name.
fn parse_destination(destination: &str) -> anyhow::Result<(String, String)> {
    match destination.rsplit_once('@') {
        Some((user, host)) if !user.is_empty() && !host.is_empty() => {
            Ok((user.to_string(), host.to_string()))
        }
        Some(_) => anyhow::bail!("Invalid destination: {destination}"),
        None => {
            let user = std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .context("No user in destination and USER is not set")?;
            Ok((user, destination.to_string()))
        }
    }
}

fn session_config(args: &ConnectArgs, cols: u16, rows: u16) -> anyhow::Result<SessionConfig> {
    let (user, host) = parse_destination(&args.destination)?;
    let mut config = SessionConfig::new(host, user)
        .with_port(args.port)
        .with_geometry(cols, rows);
    if let Some(identity) = &args.identity {
        config = config.with_key_path(identity);
    }
    if args.password {
        config = config.with_password_auth();
    }
    config.validate()?;
    Ok(config)
}

/// Leaves raw mode when dropped.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!(error = %e, "Failed to leave raw mode");
        }
    }
}

async fn run_connect(config: &Config, args: ConnectArgs) -> anyhow::Result<SessionState> {
    let (cols, rows) = terminal::size().unwrap_or((config.terminal.cols, config.terminal.rows));
    let session_config = session_config(&args, cols, rows)?;
    let secret_id = args
        .secret_id
        .clone()
        .unwrap_or_else(|| session_config.destination());

    let secrets: Arc<dyn SecretStore> = if args.ask_password {
        let secret = read_secret(&format!("{}'s password: ", session_config.destination()))?;
        Arc::new(MemorySecretStore::with_secret(secret_id.clone(), secret))
    } else {
        Arc::new(KeyringStore::system())
    };

    let (sink, mut events) = ChannelSink::new();
    let session = ProcessSession::new(
        secret_id,
        SessionSettings::from_config(config),
        secrets,
        Arc::new(sink),
    );

    let mut input = spawn_stdin_reader();
    let mut resizes = spawn_resize_watcher();
    let raw = RawModeGuard::enable().context("Failed to enable raw mode")?;

    session.connect(session_config);

    let mut stdout_decoder = AnsiDecoder::new();
    let mut stderr_decoder = AnsiDecoder::new();
    let palette = Palette::default();
    let mut out = io::stdout();

    let final_state = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Output { stream, data }) => {
                    let decoder = match stream {
                        OutputStream::Stdout => &mut stdout_decoder,
                        OutputStream::Stderr => &mut stderr_decoder,
                    };
                    let runs = decoder.append(&data);
                    decoder.clear();
                    render_runs(&mut out, &runs, &palette)?;
                }
                Some(SessionEvent::State(state)) => {
                    tracing::debug!(state = %state, "Session state changed");
                    if state.is_terminal() {
                        break state;
                    }
                }
                None => break session.state(),
            },
            Some(bytes) = input.recv() => {
                if bytes.contains(&LOCAL_ESCAPE) {
                    session.disconnect();
                } else {
                    session.send(&bytes);
                }
            }
            Some((cols, rows)) = resizes.recv() => session.resize(cols, rows),
        }
    };

    drop(raw);
    Ok(final_state)
}

/// Forwards raw stdin reads from a dedicated thread.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<Vec<u8>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut stdin = io::stdin();
        let mut buffer = [0u8; 1024];
        loop {
            match stdin.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buffer[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}

/// Reports terminal size changes.
fn spawn_resize_watcher() -> mpsc::UnboundedReceiver<(u16, u16)> {
    let (tx, rx) = mpsc::unbounded_channel();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::window_change()) {
            Ok(mut winch) => {
                tokio::spawn(async move {
                    while winch.recv().await.is_some() {
                        if let Ok(size) = terminal::size() {
                            if tx.send(size).is_err() {
                                break;
                            }
                        }
                    }
                });
            }
            Err(e) => tracing::warn!(error = %e, "Failed to watch terminal size"),
        }
    }

    #[cfg(not(unix))]
    drop(tx);

    rx
}

fn read_input(file: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    match file {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
        }
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

/// Reads a password without echo when attached to a terminal.
fn read_secret(prompt: &str) -> anyhow::Result<String> {
    if !io::stdin().is_terminal() {
        let mut line = String::new();
        io::stdin().read_line(&mut line).context("Failed to read password")?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    eprint!("{prompt}");
    io::stderr().flush()?;

    let raw = RawModeGuard::enable()?;
    let mut secret = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Enter => break,
                KeyCode::Backspace => {
                    secret.pop();
                }
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    drop(raw);
                    eprintln!();
                    anyhow::bail!("Cancelled");
                }
                KeyCode::Char(c) => secret.push(c),
                _ => {}
            }
        }
    }
    drop(raw);
    eprintln!();
    Ok(secret)
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb {
        r: rgb.r,
        g: rgb.g,
        b: rgb.b,
    }
}

/// Writes styled runs with crossterm colours. The palette's default
/// foreground maps to the terminal's own default.
fn render_runs<W: Write>(out: &mut W, runs: &[StyledRun], palette: &Palette) -> io::Result<()> {
    for run in runs {
        queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
        if run.foreground != palette.foreground {
            queue!(out, SetForegroundColor(to_color(run.foreground)))?;
        }
        if let Some(background) = run.background {
            queue!(out, SetBackgroundColor(to_color(background)))?;
        }
        if run.bold {
            queue!(out, SetAttribute(Attribute::Bold))?;
        }
        if run.underline {
            queue!(out, SetAttribute(Attribute::Underlined))?;
        }
        queue!(out, Print(&run.text))?;
    }
    queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
    out.flush()
}
