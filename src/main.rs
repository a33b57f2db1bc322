//! dropboxfs - command line access to a Dropbox account
//!
//! Runs single filesystem operations against Dropbox, mainly for testing
//! the cache and transfer layers against the live service.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use dropboxfs::fs::EntryFilter;
use dropboxfs::{DropboxConfig, DropboxFs, FileSystem, ListDirOptions, OpenMode};

/// CLI command
#[derive(Debug)]
enum Command {
    /// List a folder
    Ls { path: String },
    /// Show one path's info
    Stat { path: String },
    /// Create a folder
    Mkdir { path: String },
    /// Delete a file or folder
    Rm { path: String },
    /// Move a file or folder
    Mv { src: String, dst: String },
    /// Copy a file or folder
    Cp { src: String, dst: String },
    /// Download a file
    Get { remote: String, local: PathBuf },
    /// Upload a file
    Put { local: PathBuf, remote: String },
    /// Show help
    Help,
}

fn print_help() {
    eprintln!(
        r#"dropboxfs - Use a Dropbox account as a filesystem

USAGE:
    dropboxfs ls [path]
    dropboxfs stat <path>
    dropboxfs mkdir <path>
    dropboxfs rm <path>
    dropboxfs mv <src> <dst>
    dropboxfs cp <src> <dst>
    dropboxfs get <remote> <local>
    dropboxfs put <local> <remote>
    dropboxfs help

COMMANDS:
    ls      List a folder (default "/"); folders end with '/'
    stat    Show size, kind and modification time
    mkdir   Create a folder, including missing parents
    rm      Delete a file or an empty folder
    mv      Move or rename a file or folder
    cp      Copy a file or folder
    get     Download a remote file to a local path
    put     Upload a local file, replacing any remote file
    help    Show this help message

ENVIRONMENT:
    DROPBOX_ACCESS_TOKEN   OAuth access token (required)
    DROPBOX_ACCESS_TYPE    dropbox (default) or app_folder
    DROPBOXFS_LOCALTIME    1 to show local modification times
    DROPBOXFS_CACHE_TTL    Metadata cache TTL in seconds (default 300)
    DROPBOXFS_MAX_BUFFER   Bytes kept in memory per transfer (default 5 MiB)
    RUST_LOG               Log level (trace, debug, info, warn, error)
"#
    );
}

fn usage(line: &str) -> anyhow::Error {
    anyhow!("Usage: dropboxfs {}", line)
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        return Ok(Command::Help);
    }

    match args[1].as_str() {
        "ls" => Ok(Command::Ls {
            path: args.get(2).cloned().unwrap_or_else(|| "/".to_string()),
        }),
        "stat" | "mkdir" | "rm" => {
            let path = args
                .get(2)
                .cloned()
                .ok_or_else(|| usage(&format!("{} <path>", args[1])))?;
            Ok(match args[1].as_str() {
                "stat" => Command::Stat { path },
                "mkdir" => Command::Mkdir { path },
                _ => Command::Rm { path },
            })
        }
        "mv" | "cp" => {
            if args.len() < 4 {
                return Err(usage(&format!("{} <src> <dst>", args[1])));
            }
            let (src, dst) = (args[2].clone(), args[3].clone());
            Ok(if args[1] == "mv" {
                Command::Mv { src, dst }
            } else {
                Command::Cp { src, dst }
            })
        }
        "get" => {
            if args.len() < 4 {
                return Err(usage("get <remote> <local>"));
            }
            Ok(Command::Get {
                remote: args[2].clone(),
                local: PathBuf::from(&args[3]),
            })
        }
        "put" => {
            if args.len() < 4 {
                return Err(usage("put <local> <remote>"));
            }
            Ok(Command::Put {
                local: PathBuf::from(&args[2]),
                remote: args[3].clone(),
            })
        }
        "help" | "--help" | "-h" => Ok(Command::Help),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            Ok(Command::Help)
        }
    }
}

fn run<F: FileSystem>(fs: &F, command: Command) -> Result<()> {
    match command {
        Command::Ls { path } => {
            let options = ListDirOptions {
                filter: EntryFilter::DirsOnly,
                ..ListDirOptions::default()
            };
            let dirs = fs.listdir(&path, &options)?;
            for name in fs.listdir(&path, &ListDirOptions::default())? {
                if dirs.contains(&name) {
                    println!("{}/", name);
                } else {
                    println!("{}", name);
                }
            }
        }
        Command::Stat { path } => {
            let info = fs.getinfo(&path)?;
            println!("path:     {}", fs.getsyspath(&path));
            println!("kind:     {}", if info.is_dir { "folder" } else { "file" });
            println!("size:     {}", info.size);
            match info.modified_time {
                Some(time) => println!("modified: {}", time),
                None => println!("modified: -"),
            }
        }
        Command::Mkdir { path } => {
            fs.makedir(&path, true, false)?;
            info!(path = %path, "Folder created");
        }
        Command::Rm { path } => {
            fs.remove(&path)?;
            info!(path = %path, "Deleted");
        }
        Command::Mv { src, dst } => {
            fs.move_file(&src, &dst)?;
            info!(src = %src, dst = %dst, "Moved");
        }
        Command::Cp { src, dst } => {
            fs.copy(&src, &dst)?;
            info!(src = %src, dst = %dst, "Copied");
        }
        Command::Get { remote, local } => {
            let mut source = fs.open(&remote, OpenMode::Read)?;
            let mut target = File::create(&local)
                .with_context(|| format!("Failed to create {}", local.display()))?;
            let bytes = io::copy(&mut source, &mut target)?;
            source.close()?;
            info!(remote = %remote, local = %local.display(), bytes = bytes, "Downloaded");
        }
        Command::Put { local, remote } => {
            let mut source = File::open(&local)
                .with_context(|| format!("Failed to open {}", local.display()))?;
            let mut target = fs.open(&remote, OpenMode::Write)?;
            let bytes = io::copy(&mut source, &mut target)?;
            target.close()?;
            info!(local = %local.display(), remote = %remote, bytes = bytes, "Uploaded");
        }
        Command::Help => print_help(),
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    let log_level = env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let command = match parse_args() {
        Ok(Command::Help) => {
            print_help();
            return Ok(());
        }
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    let config = DropboxConfig::from_env()?;

    // Filesystem calls block on this runtime, so they run on the main thread
    let runtime = Runtime::new().context("Failed to start tokio runtime")?;
    let fs = DropboxFs::from_config(&config, runtime.handle().clone())?;

    if let Err(e) = run(&fs, command) {
        error!(error = %e, "Command failed");
        return Err(e);
    }

    fs.client().log_metrics();
    Ok(())
}
