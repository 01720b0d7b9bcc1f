mod demo;
mod inspect;

use std::io::Write;
use std::path::PathBuf;
use std::{env, fs, fs::OpenOptions};

use anyhow::Context;
use tally_config::TallyConfig;
use tally_keypair::Keypair;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const KEY_DIR_NAME: &str = ".tally";
const DEFAULT_KEY_FILE: &str = "id.json";

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let config = match TallyConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error loading config: {:#}", e);
            std::process::exit(1);
        }
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    let cmd = &args[1];

    match cmd.as_str() {
        "genkey" => {
            let filename = args.get(2).cloned();
            if let Err(e) = genkey(filename) {
                eprintln!("❌ Error generating key: {:#}", e);
                std::process::exit(1);
            }
        }
        "pubkey" => {
            let filename = args.get(2).cloned();
            if let Err(e) = pubkey(filename) {
                eprintln!("❌ Error reading key: {:#}", e);
                std::process::exit(1);
            }
        }
        "demo" => {
            let options = parse_demo_args(&args[2..]);
            if let Err(e) = demo::run(&config, options).await {
                eprintln!("❌ Error running demo: {:#}", e);
                std::process::exit(1);
            }
        }
        "order" => {
            let json = args[2..].iter().any(|a| a == "--json");
            if let Err(e) = inspect::order(&config, json) {
                eprintln!("❌ Error reading ledger: {:#}", e);
                std::process::exit(1);
            }
        }
        "stats" => {
            if let Err(e) = inspect::stats(&config) {
                eprintln!("❌ Error reading ledger: {:#}", e);
                std::process::exit(1);
            }
        }
        "config" => {
            print!("{}", TallyConfig::generate_sample());
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        _ => {
            println!("❌ Unknown command: {}", cmd);
            println!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Tally CLI - resource ledger with double-spend protection");
    println!();
    println!("USAGE:");
    println!("  tally <command> [args]");
    println!();
    println!("KEY COMMANDS:");
    println!("  genkey [filename]          Generate a new keypair under ~/.tally");
    println!("  pubkey [filename]          Print the public key of a keypair file");
    println!();
    println!("LEDGER COMMANDS:");
    println!("  demo [options]             Mint, transfer and attempt a double spend");
    println!("  order [--json]             Print the persisted transaction order");
    println!("  stats                      Print persisted ledger statistics");
    println!();
    println!("OTHER COMMANDS:");
    println!("  config                     Print a sample config.toml");
    println!("  help                       Show this help message");
    println!();
    println!("DEMO OPTIONS:");
    println!("  --persist                  Write to the configured database");
    println!("  --label <label>            Resource label (default: x)");
    println!("  --quantity <n>             Quantity minted (default: 10)");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("  TALLY_CONFIG         Path to config.toml");
    println!("  TALLY_DB_PATH        Ledger database path");
    println!("  RUST_LOG             Log level (debug/info/warn/error)");
}

fn parse_demo_args(args: &[String]) -> demo::DemoOptions {
    let mut options = demo::DemoOptions::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--persist" => {
                options.persist = true;
            }
            "--label" => {
                if let Some(label) = args.get(i + 1) {
                    options.label = label.clone();
                    i += 1;
                }
            }
            "--quantity" => {
                if let Some(q) = args.get(i + 1) {
                    if let Ok(q) = q.parse() {
                        options.quantity = q;
                    }
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    options
}

fn key_dir() -> anyhow::Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join(KEY_DIR_NAME))
        .context("Could not determine home directory")
}

fn key_path(filename: Option<String>) -> anyhow::Result<PathBuf> {
    match filename {
        Some(name) if name.contains(std::path::MAIN_SEPARATOR) => Ok(PathBuf::from(name)),
        Some(name) => Ok(key_dir()?.join(name)),
        None => Ok(key_dir()?.join(DEFAULT_KEY_FILE)),
    }
}

fn genkey(filename: Option<String>) -> anyhow::Result<()> {
    let key_path = key_path(filename)?;
    let key_dir = key_path
        .parent()
        .map(PathBuf::from)
        .context("Key path has no parent directory")?;

    // Create directory if it doesn't exist
    if !key_dir.as_os_str().is_empty() && !key_dir.exists() {
        fs::create_dir_all(&key_dir)?;
        println!("📁 Created directory: {}", key_dir.display());

        #[cfg(unix)]
        {
            // rwx------
            let mut perms = fs::metadata(&key_dir)?.permissions();
            perms.set_mode(0o700);
            fs::set_permissions(&key_dir, perms)?;
        }
    }

    if key_path.exists() {
        anyhow::bail!(
            "File {} already exists. Remove it first or use a different filename.",
            key_path.display()
        );
    }

    println!("🔐 Generating new keypair...");
    let key = Keypair::new();
    let json = serde_json::to_string(&key.secret_key().to_seed().to_vec())?;

    let mut f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&key_path)?;

    #[cfg(unix)]
    {
        // rw-------
        let mut perms = f.metadata()?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(&key_path, perms)?;
    }

    f.write_all(json.as_bytes())?;

    println!("✅ Wrote new keypair to {}", key_path.display());
    println!("🔑 Public key: {}", key.public_key());

    Ok(())
}

fn pubkey(filename: Option<String>) -> anyhow::Result<()> {
    let key_path = key_path(filename)?;
    let key = Keypair::read_from_file(&key_path)
        .with_context(|| format!("Failed to read keypair {}", key_path.display()))?;
    println!("{}", key.public_key());
    Ok(())
}
