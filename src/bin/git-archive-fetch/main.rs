use std::process::ExitCode;

use git_archive::{Attrs, CacheEntry, FileCache, Input};

use crate::args::{OutputFormat, ValidatedArgs, ValidatedCommand};
use crate::error::AppError;

mod args;
mod error;
mod fetch;
mod progress;

fn main() -> ExitCode {
    let args = args::parse();
    init_tracing(args.verbose);
    match args.validate().and_then(run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("❌ {err}");
            for cause in anyhow::Chain::new(&err).skip(1) {
                eprintln!("   caused by: {cause}");
            }
            err.into()
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("git_archive={level},git_archive_fetch={level}"))
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(args: ValidatedArgs) -> Result<(), AppError> {
    let ValidatedArgs { registry, command } = args;
    match command {
        ValidatedCommand::Fetch {
            inputs,
            store,
            cache,
        } => {
            let results = fetch::parallel_fetch(&registry, &store, &cache, &inputs);
            let mut errors = 0usize;
            for (input, result) in inputs.iter().zip(results) {
                match result {
                    Ok((tree, locked)) => {
                        println!("{locked}\t{}", tree.actual_path.display());
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to fetch {input}: {err}");
                        errors += 1;
                    }
                }
            }
            if errors > 0 {
                return Err(AppError::fetch());
            }
            Ok(())
        }
        ValidatedCommand::Show { input, format } => {
            println!("{}", render_input(&input, format)?);
            Ok(())
        }
        ValidatedCommand::Clone { input, dest } => registry
            .clone_input(&input, &dest)
            .map_err(|err| AppError::clone_failed(input.to_string(), dest, err)),
        ValidatedCommand::Cached { format, cache } => {
            println!("{}", render_cache(&cache, format)?);
            Ok(())
        }
    }
}

fn render_input(input: &Input, format: Option<OutputFormat>) -> Result<String, AppError> {
    let attrs: &Attrs = input.attrs();
    Ok(match format {
        Some(OutputFormat::Json) => serde_json::to_string_pretty(attrs)?,
        Some(OutputFormat::Toml) => toml::to_string(attrs)?,
        None => {
            let mut out = input.to_string();
            for (name, value) in attrs {
                out.push_str(&format!("\n  {name} = {value}"));
            }
            out
        }
    })
}

#[derive(serde::Serialize)]
struct CachedTrees {
    tree: Vec<CacheEntry>,
}

fn render_cache(cache: &FileCache, format: Option<OutputFormat>) -> Result<String, AppError> {
    let tree = cache.entries();
    Ok(match format {
        Some(OutputFormat::Json) => serde_json::to_string_pretty(&tree)?,
        Some(OutputFormat::Toml) => toml::to_string(&CachedTrees { tree })?,
        None => tree
            .iter()
            .map(|entry| {
                let rev = entry.key.get("rev").map(ToString::to_string).unwrap_or_default();
                let last_modified = entry
                    .value
                    .get("lastModified")
                    .map(ToString::to_string)
                    .unwrap_or_default();
                format!("{rev}\t{last_modified}\t{}", entry.path)
            })
            .collect::<Vec<_>>()
            .join("\n"),
    })
}
