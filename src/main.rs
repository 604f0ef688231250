use clap::Parser;
use jacquard::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::{merge, summarize, translate},
    utils::util::{execution_context, handle_error_and_exit, Result},
};
use std::time;

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    log::trace!("CLI options set: {:?}", cli);

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        &**FULL_VERSION,
        cli.command.name()
    );

    let context = execution_context(&FULL_VERSION);
    let start_timer = time::Instant::now();
    match &cli.command {
        Command::Translate(args) => {
            log::trace!("Translate arguments: {:#?}", args);
            translate::execute(args, &context)?
        }
        Command::Merge(args) => {
            log::trace!("Merge arguments: {:#?}", args);
            merge::execute(args, &context)?
        }
        Command::Summarize(args) => {
            log::trace!("Summarize arguments: {:#?}", args);
            summarize::execute(args, &context)?
        }
    }
    log::info!("Total execution time: {:.2?}", start_timer.elapsed());

    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
