use clap::Parser;
use tunes_presence_lib::Args;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let guard = tunes_presence_lib::init_logging();

    if let Err(e) = tunes_presence_lib::run(args).await {
        tracing::error!("{}", e);
        drop(guard);
        std::process::exit(1);
    }
}
