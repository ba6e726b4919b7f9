//! Converse CLI
//!
//! Thin wrapper around converse-core functions for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Create a signing key and make this user the default
//! converse init alice@example.com
//!
//! # Post to a conversation (created on first use)
//! converse post trip "Shall we leave on Friday?"
//!
//! # Let someone else take part
//! converse invite trip bob@example.com
//!
//! # As bob: pull alice's replica into your own, then read it
//! converse --user bob@example.com sync alice@example.com trip
//! converse --user bob@example.com show trip --verify
//!
//! # Render the thread to index.html
//! converse publish trip
//! ```

mod config;

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use converse_core::conversation::{
    add_attachment, has_access, list_conversations, publish, read_conversation, MarkdownRenderer,
    CONVERSATIONS_DIR,
};
use converse_core::sync::{sync_conversation, synchronize};
use converse_core::{PathName, Session, UserName};

use config::{default_data_dir, Config};

/// Converse - signed conversations without a central server
#[derive(Parser)]
#[command(name = "converse")]
#[command(version = "0.1.0")]
#[command(about = "Converse - signed conversations without a central server")]
#[command(
    long_about = "Exchange signed text messages in named conversations, replicated across each participant's own storage."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Data directory (default: ~/.converse)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Act as this user instead of the configured default
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create (or reuse) a signing key and make the user the default
    Init {
        /// User name, e.g. alice@example.com
        #[arg(value_name = "USER")]
        name: String,
    },

    /// Show the acting user and their public key
    Whoami,

    /// List your conversations
    List,

    /// Print a conversation
    Show {
        title: String,
        /// Check every message signature
        #[arg(long)]
        verify: bool,
    },

    /// Sign and send a message
    Post {
        title: String,
        /// Message text
        text: String,
    },

    /// Add a participant to a conversation
    Invite {
        title: String,
        #[arg(value_name = "USER")]
        participant: String,
    },

    /// Copy what you are missing from a peer's replica
    Sync {
        /// Peer whose replica to read from
        peer: String,
        /// Only this conversation (default: all of them)
        title: Option<String>,
    },

    /// Render a conversation to index.html
    Publish { title: String },

    /// Store a file alongside a conversation's messages
    Attach { title: String, file: PathBuf },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// `--user`, else the default recorded by `init`.
fn resolve_user(cli_user: Option<String>, data_dir: &Path) -> Result<UserName> {
    if let Some(user) = cli_user {
        return Ok(UserName::new(user));
    }
    match Config::load(data_dir)?.default_user {
        Some(user) => Ok(UserName::new(user)),
        None => anyhow::bail!("No user configured. Run `converse init <user>` or pass --user"),
    }
}

fn open_session(cli_user: Option<String>, data_dir: &Path) -> Result<Session> {
    let user = resolve_user(cli_user, data_dir)?;
    Session::open(data_dir, &user).with_context(|| format!("Failed to open session for {}", user))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);

    match cli.command {
        Commands::Init { name } => {
            let user = UserName::new(name);
            let session = Session::init(&data_dir, &user)?;
            let key = session.identity().public_key_lookup(&user)?;

            let mut config = Config::load(&data_dir)?;
            config.default_user = Some(user.to_string());
            config.save(&data_dir)?;

            println!("Initialized {}", user);
            println!("  Public key: {}", key.to_base58());
            println!("  Fingerprint: {}", key.fingerprint());
        }

        Commands::Whoami => {
            let session = open_session(cli.user, &data_dir)?;
            let key = session.identity().public_key_lookup(session.user())?;

            println!("User: {}", session.user());
            println!("  Public key: {}", key.to_base58());
            println!("  Data directory: {}", data_dir.display());
        }

        Commands::List => {
            let session = open_session(cli.user, &data_dir)?;
            let titles = list_conversations(&session)?;

            if titles.is_empty() {
                println!("No conversations found.");
            } else {
                println!("Conversations ({}):", titles.len());
                for title in titles {
                    println!("  {}", title);
                }
            }
        }

        Commands::Show { title, verify } => {
            let session = open_session(cli.user, &data_dir)?;
            let conv = read_conversation(&session, &title)?;

            let participants: Vec<String> =
                conv.participants().iter().map(ToString::to_string).collect();
            println!("Conversation: {}", title);
            println!("Participants: {}", participants.join(", "));
            if conv.is_empty() {
                println!("No messages yet.");
            } else {
                print!("{}", conv);
            }

            if verify {
                let mut failures = 0;
                for (name, result) in conv.verify_all(session.identity()) {
                    match result {
                        Ok(()) => println!("  ✓ {}", name),
                        Err(e) => {
                            failures += 1;
                            println!("  ✗ {}: {}", name, e);
                        }
                    }
                }
                if failures > 0 {
                    anyhow::bail!("{} message(s) failed verification", failures);
                }
            }
        }

        Commands::Post { title, text } => {
            let session = open_session(cli.user, &data_dir)?;
            let mut conv = read_conversation(&session, &title)?;
            let name = conv.post(&session, std::io::Cursor::new(text.into_bytes()))?;

            println!("Posted {} to '{}'", name, title);
        }

        Commands::Invite { title, participant } => {
            let session = open_session(cli.user, &data_dir)?;
            let mut conv = read_conversation(&session, &title)?;
            let user = UserName::new(participant);

            match conv.add_participant(&session, &user)? {
                Some(_) => println!("Invited {} to '{}'", user, title),
                None => println!("{} already has access to '{}'", user, title),
            }
            if !has_access(&session, &conv, &user)? {
                tracing::warn!(%user, "Grant does not give read access");
            }
        }

        Commands::Sync { peer, title } => {
            let session = open_session(cli.user, &data_dir)?;
            let peer = UserName::new(peer);

            let report = match title {
                Some(title) => sync_conversation(&session, &peer, &title)?,
                None => {
                    let src = PathName::root(&peer).join(CONVERSATIONS_DIR);
                    let dst = PathName::root(session.user()).join(CONVERSATIONS_DIR);
                    synchronize(session.store(), &src, &dst)?
                }
            };

            println!(
                "Synchronized from {}: {} copied, {} already present",
                peer,
                report.copied.len(),
                report.skipped.len()
            );
            for path in &report.copied {
                println!("  + {}", path);
            }
        }

        Commands::Publish { title } => {
            let session = open_session(cli.user, &data_dir)?;
            let conv = read_conversation(&session, &title)?;
            let entry = publish(&session, &conv, &MarkdownRenderer)?;

            println!("Published {} ({} bytes)", entry.name, entry.size);
        }

        Commands::Attach { title, file } => {
            let session = open_session(cli.user, &data_dir)?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("Invalid file name: {}", file.display()))?
                .to_string();
            let mut reader =
                File::open(&file).with_context(|| format!("Failed to open {}", file.display()))?;
            let entry = add_attachment(&session, &title, &name, &mut reader)?;

            println!("Attached {} ({} bytes)", entry.name, entry.size);
        }
    }

    Ok(())
}
