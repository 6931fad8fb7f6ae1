use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser};

use git_archive::{FileCache, Input, LocalStore, Registry, Revision, Settings};

use crate::error::AppError;

// Shamelessly borrowed from https://github.com/crate-ci/clap-cargo/blob/0378657ffdf2b67bcd6f1ab56e04a1322b92dd0e/src/style.rs
// thanks to https://stackoverflow.com/a/79614957
use anstyle::AnsiColor::*;
use anstyle::Effects;
use anstyle::Style;

const HEADER: Style = Green.on_default().effects(Effects::BOLD);
const USAGE: Style = Green.on_default().effects(Effects::BOLD);
const LITERAL: Style = Cyan.on_default().effects(Effects::BOLD);
const PLACEHOLDER: Style = Cyan.on_default();
const ERROR: Style = Red.on_default().effects(Effects::BOLD);
const VALID: Style = Cyan.on_default().effects(Effects::BOLD);
const INVALID: Style = Yellow.on_default().effects(Effects::BOLD);

const APP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(HEADER)
    .usage(USAGE)
    .literal(LITERAL)
    .placeholder(PLACEHOLDER)
    .error(ERROR)
    .valid(VALID)
    .invalid(INVALID);

/// Environment variable naming the cache directory when `--cache` is not given.
pub const CACHE_DIR_VAR: &str = "GIT_ARCHIVE_FETCH_CACHE";

#[derive(Debug, Parser)]
#[command(name = "git-archive-fetch")]
#[command(about = "Fetch GitHub and GitLab repositories as locked, cached source trees")]
#[command(long_about = None)]
#[command(styles = APP_STYLING)]
#[command(term_width = 80)]
pub struct Args {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v for debug, -vv for trace). `RUST_LOG` takes precedence.
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file holding access tokens. Defaults to `config.toml` in the platform config
    /// directory.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Fetch one or more inputs into the store and print where each tree landed
    Fetch {
        /// Input URLs, e.g. `github:NixOS/nixpkgs/nixos-23.05`
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,

        #[command(flatten)]
        overrides: Overrides,

        /// Cache directory to use. If omitted, check the `GIT_ARCHIVE_FETCH_CACHE` environment
        /// variable and then `~/.cache/git-archive-fetch`
        #[arg(long = "cache", short = 'c', value_name = "PATH")]
        cache_dir: Option<PathBuf>,

        /// Number of threads to spawn. Defaults to one per logical CPU.
        #[arg(long, short = 't', value_name = "NUM-THREADS")]
        threads: Option<u32>,
    },
    /// Parse an input URL and print its attributes without fetching anything
    Show {
        #[arg(value_name = "URL")]
        url: String,

        #[command(flatten)]
        overrides: Overrides,

        /// Output format
        #[arg(long, short = 'f', value_enum, value_name = "FORMAT")]
        format: Option<OutputFormat>,
    },
    /// Clone an input over SSH with git instead of downloading an archive
    Clone {
        #[arg(value_name = "URL")]
        url: String,

        /// Directory to clone into
        #[arg(value_name = "DEST")]
        dest: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// List the cached trees
    Cached {
        /// Output format
        #[arg(long, short = 'f', value_enum, value_name = "FORMAT")]
        format: Option<OutputFormat>,

        /// Cache directory to use. If omitted, check the `GIT_ARCHIVE_FETCH_CACHE` environment
        /// variable and then `~/.cache/git-archive-fetch`
        #[arg(long = "cache", short = 'c', value_name = "PATH")]
        cache_dir: Option<PathBuf>,
    },
}

#[derive(Debug, clap::Args)]
struct Overrides {
    /// Use this branch or tag instead of the one in the URL
    #[arg(long = "ref", value_name = "REF", conflicts_with = "rev")]
    git_ref: Option<String>,

    /// Use this commit instead of the one in the URL
    #[arg(long, value_name = "REV")]
    rev: Option<Revision>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Output in JSON format
    Json,
    /// Output in TOML format
    Toml,
}

pub struct ValidatedArgs {
    pub registry: Registry,
    pub command: ValidatedCommand,
}

pub enum ValidatedCommand {
    Fetch {
        inputs: Vec<Input>,
        store: LocalStore,
        cache: FileCache,
    },
    Show {
        input: Input,
        format: Option<OutputFormat>,
    },
    Clone {
        input: Input,
        dest: PathBuf,
    },
    Cached {
        format: Option<OutputFormat>,
        cache: FileCache,
    },
}

fn project_dirs() -> Result<directories::ProjectDirs, AppError> {
    directories::ProjectDirs::from("", "", "git-archive-fetch").ok_or(AppError::arg_validation(
        "could not determine the user's home directory".to_string(),
    ))
}

/// Detect the cache directory, falling back to `GIT_ARCHIVE_FETCH_CACHE` then
/// ~/.cache/git-archive-fetch
fn detect_cache_dir(arg: Option<PathBuf>) -> Result<PathBuf, AppError> {
    match arg {
        Some(dir) => Ok(dir),
        None => match std::env::var_os(CACHE_DIR_VAR) {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => Ok(project_dirs()?.cache_dir().to_path_buf()),
        },
    }
}

fn load_settings(arg: Option<PathBuf>) -> Result<Settings, AppError> {
    let path = match arg {
        Some(path) => {
            if !path.is_file() {
                return Err(AppError::arg_validation(format!(
                    "settings file does not exist: {}",
                    path.display()
                )));
            }
            path
        }
        None => match project_dirs() {
            Ok(dirs) => dirs.config_dir().join("config.toml"),
            Err(_) => return Ok(Settings::default().with_env_overrides()),
        },
    };
    Settings::load(&path)
        .map(Settings::with_env_overrides)
        .map_err(|err| AppError::settings(path, err))
}

fn parse_input(
    registry: &Registry,
    url: &str,
    overrides: Overrides,
) -> Result<Input, AppError> {
    registry
        .input_from_url(url)
        .and_then(|input| input.apply_overrides(overrides.git_ref.as_deref(), overrides.rev))
        .map_err(|err| AppError::bad_input(url.to_string(), err))
}

impl ValidatedCommand {
    fn validate(command: Command, registry: &Registry) -> Result<Self, AppError> {
        match command {
            Command::Fetch {
                urls,
                overrides,
                cache_dir,
                threads,
            } => {
                let inputs = urls
                    .iter()
                    .map(|url| {
                        parse_input(
                            registry,
                            url,
                            Overrides {
                                git_ref: overrides.git_ref.clone(),
                                rev: overrides.rev,
                            },
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                let cache_dir = detect_cache_dir(cache_dir)?;
                let store = LocalStore::open(cache_dir.join("store"), &registry.settings().user_agent)
                    .map_err(|err| AppError::open_cache(cache_dir.clone(), err))?;
                let cache = FileCache::load(&cache_dir)
                    .map_err(|err| AppError::open_cache(cache_dir.clone(), err))?;

                if let Some(threads) = threads {
                    rayon::ThreadPoolBuilder::new()
                        .num_threads(threads as usize)
                        .build_global()
                        .map_err(|e| {
                            AppError::arg_validation(format!("Failed to set thread count: {e}"))
                        })?;
                }

                Ok(ValidatedCommand::Fetch {
                    inputs,
                    store,
                    cache,
                })
            }
            Command::Show {
                url,
                overrides,
                format,
            } => Ok(ValidatedCommand::Show {
                input: parse_input(registry, &url, overrides)?,
                format,
            }),
            Command::Clone {
                url,
                dest,
                overrides,
            } => {
                if dest.exists() {
                    return Err(AppError::arg_validation(format!(
                        "destination already exists: {}",
                        dest.display()
                    )));
                }
                Ok(ValidatedCommand::Clone {
                    input: parse_input(registry, &url, overrides)?,
                    dest,
                })
            }
            Command::Cached { format, cache_dir } => {
                let cache_dir = detect_cache_dir(cache_dir)?;
                // Listing never creates a cache
                if !FileCache::exists(&cache_dir) {
                    return Err(AppError::missing_cache(cache_dir));
                }
                let cache = FileCache::load(&cache_dir)
                    .map_err(|err| AppError::open_cache(cache_dir.clone(), err))?;
                Ok(ValidatedCommand::Cached { format, cache })
            }
        }
    }
}

pub fn parse() -> Args {
    let matches = Args::command()
        .version(env!("CARGO_PKG_VERSION"))
        .get_matches();
    match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(err) => {
            err.format(&mut Args::command()).exit();
        }
    }
}

impl Args {
    /// Load settings and check every argument, opening the store and cache where needed.
    pub fn validate(self) -> Result<ValidatedArgs, AppError> {
        let registry = Registry::with_default_providers(load_settings(self.config)?);
        let command = ValidatedCommand::validate(self.command, &registry)?;
        Ok(ValidatedArgs { registry, command })
    }
}
