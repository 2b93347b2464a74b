use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use profile_records::config::{Args, Command};
use profile_records::{RecordStore, derive_filename, server};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let store = RecordStore::open(&args.records_dir).with_context(|| {
        format!(
            "cannot create records directory {}",
            args.records_dir.display()
        )
    })?;

    match args.command {
        Some(Command::Init(init)) => {
            let filename = derive_filename(&init.stream, &init.year, &init.session);
            let path = store.path_for(&filename);
            if store.init(&filename)? {
                println!("Created record file: {}", path.display());
            } else {
                println!("Record file already exists: {}", path.display());
            }
            Ok(())
        }
        Some(Command::Serve) | None => server::serve(store, args.bind).await,
    }
}
