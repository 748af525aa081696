// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Keygen, Run, Version};
use escrow_app::logging;
use escrow_app::state::{AppState, DEFAULT_LOG_LEVEL};

command_enum! {
    (Keygen, Keygen),
    (Run, Run),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Log settings come from an existing config; a missing one is created by
    // the commands that need it
    let _guards = match AppState::load(args.config_path.clone()) {
        Ok(state) => logging::init_logging(&state.config.log_level, state.config.log_dir.as_deref()),
        Err(_) => logging::init_logging(DEFAULT_LOG_LEVEL, None),
    };

    let ctx = cli::op::OpContext::new(args.config_path);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
