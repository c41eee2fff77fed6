mod cli;
mod commands;
mod env_loader;
mod error;
mod ledger;
mod logging;
mod site;

fn main() {
    env_loader::load_dotenv();
    logging::init();

    if let Err(err) = cli::run() {
        match error::pipeline_error(&err) {
            Some(failure) => eprintln!("error[{}]: {err:#}", failure.code()),
            None => eprintln!("error: {err:#}"),
        }
        std::process::exit(1);
    }
}
