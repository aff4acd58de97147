use clap::Parser;
use statewalk::cli::{self, Cli};

#[tokio::main]
async fn main() -> statewalk::Result<()> {
    let args = Cli::parse();
    statewalk::logging::init(args.log_json)?;
    cli::run(args).await
}
