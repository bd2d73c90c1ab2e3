//! mcman - inspect and maintain the compact mod-list files.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bitstream::BitBuffer;
use clap::{Parser, Subcommand, ValueEnum};
use cli::catalog::{CfFile, CfGameVersion, CfResponse};
use cli::{ModStore, StoreConfig};
use records::{GameVersion, ModEntry, ModLoader, QueryState};

#[derive(Parser)]
#[command(name = "mcman")]
#[command(about = "Compact Minecraft mod-list manager")]
#[command(version)]
struct Cli {
    /// Directory holding modlist, config and versions
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Fail on out-of-range fields instead of truncating them
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed mods
    List {
        /// Only mods whose name contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Only the mod with this id
        #[arg(long)]
        id: Option<u32>,
    },

    /// Show the version catalog, or merge a saved catalog response into it
    Versions {
        /// JSON `{"data": [{"versionString": ...}]}` from the remote catalog
        #[arg(long)]
        update_from: Option<PathBuf>,
    },

    /// Show or change the search query
    Query {
        /// Loader name or number
        #[arg(long)]
        loader: Option<ModLoader>,

        /// Game version such as 1.20.1
        #[arg(long)]
        game_version: Option<GameVersion>,
    },

    /// Record a mod from a saved catalog file response
    Add {
        /// Mod id
        id: u32,

        /// JSON `{"data": <file>}` from the remote catalog
        file: PathBuf,
    },

    /// Remove an installed mod
    Remove {
        id: u32,
    },

    /// Export installed mods to JSON
    Export {
        #[arg(default_value = "mods.json")]
        out: PathBuf,
    },

    /// Print the mod ids listed in a `[{"id": ...}]` file
    Import {
        file: PathBuf,
    },

    /// Print a store file as binary
    Dump {
        #[arg(value_enum, default_value_t = StoreFile::Modlist)]
        file: StoreFile,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreFile {
    Modlist,
    Config,
    Versions,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = StoreConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if cli.strict {
        config = config.strict(true);
    }

    match cli.command {
        Commands::List { search, id } => {
            let store = ModStore::open(config)?;
            let matches: Vec<(usize, &ModEntry)> = match (&search, id) {
                (_, Some(id)) => store
                    .mods()
                    .iter()
                    .enumerate()
                    .filter(|(_, m)| m.id == id)
                    .collect(),
                (Some(needle), None) => store.search(needle).collect(),
                (None, None) => store.mods().iter().enumerate().collect(),
            };
            println!("Found {} mods", matches.len());
            for (i, m) in matches {
                print_mod(&store, i, m);
            }
        }
        Commands::Versions { update_from } => {
            let mut store = ModStore::open(config)?;
            if let Some(path) = update_from {
                let body = fs::read(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let res: CfResponse<Vec<CfGameVersion>> = serde_json::from_slice(&body)
                    .with_context(|| format!("parsing {}", path.display()))?;
                let added = store.update_versions(res.data.iter().map(|v| &v.version_string));
                if added == 0 {
                    println!("Up to date");
                    return Ok(());
                }
                store.save_config()?;
                println!("Added {added} versions");
            }
            let shown: Vec<String> = store.catalog().iter().map(ToString::to_string).collect();
            println!("Found {} versions\n{}", shown.len(), shown.join(" | "));
        }
        Commands::Query {
            loader,
            game_version,
        } => {
            let mut store = ModStore::open(config)?;
            if loader.is_some() || game_version.is_some() {
                let current = store.query();
                store.set_query(QueryState {
                    loader: loader.unwrap_or(current.loader),
                    game_version: game_version.unwrap_or(current.game_version),
                });
                store.save_config()?;
            }
            let q = store.query();
            println!("loader={} gameVersion={}", q.loader, q.game_version);
        }
        Commands::Add { id, file } => {
            let mut store = ModStore::open(config)?;
            let body =
                fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let res: CfResponse<CfFile> = serde_json::from_slice(&body)
                .with_context(|| format!("parsing {}", file.display()))?;
            if store.add_from_file(id, &res.data) {
                store.save_mods()?;
                println!("Added {} # {id}", res.data.file_name);
            } else {
                println!("Mod {id} is already installed");
            }
        }
        Commands::Remove { id } => {
            let mut store = ModStore::open(config)?;
            match store.remove(id) {
                Some(m) => {
                    store.save_mods()?;
                    println!("Removed {} # {}", m.name, m.id);
                }
                None => println!("Mod {id} is not installed"),
            }
        }
        Commands::Export { out } => {
            let store = ModStore::open(config)?;
            let n = store.export_json(&out)?;
            println!("Exported {n} mods to {}", out.display());
        }
        Commands::Import { file } => {
            let ids = ModStore::import_ids(&file)?;
            for id in &ids {
                println!("{id}");
            }
            eprintln!("{} mod ids in {}", ids.len(), file.display());
        }
        Commands::Dump { file } => {
            let path = match file {
                StoreFile::Modlist => config.modlist_path(),
                StoreFile::Config => config.config_path(),
                StoreFile::Versions => config.versions_path(),
            };
            let buf = BitBuffer::open(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            println!("{} ({} bits)", path.display(), buf.len_bits());
            println!("{buf}");
        }
    }

    Ok(())
}

fn print_mod(store: &ModStore, index: usize, m: &ModEntry) {
    println!(
        "\n{index:03} {} # {} [{} {}]",
        m.name, m.id, m.loader, m.game_version
    );
    if !m.deps.is_empty() {
        let deps: Vec<String> = m
            .deps
            .iter()
            .map(|id| match store.get(*id) {
                Some(dep) => format!("{id}#{}", dep.name),
                None => id.to_string(),
            })
            .collect();
        println!("Deps:     {}", deps.join(", "));
    }
    println!("Download: {}", m.download_url);
    println!("Uploaded: {}", m.uploaded.to_rfc2822());
}
