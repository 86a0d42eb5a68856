mod attributes;
mod banking;
mod cli;
mod db;
mod error;
mod logging;
mod models;
mod protocol;
mod repository;
mod settings;

use clap::Parser;

use cli::{AccountsCommands, BanksCommands, Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let settings = match settings::load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    logging::init_tracing(&settings.log_level);

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(settings, data_dir),
        Commands::Banks { command } => match command {
            BanksCommands::List => cli::banks::list(&settings),
            BanksCommands::Add {
                blz,
                user,
                hbci_version,
            } => cli::banks::add(&settings, &blz, &user, hbci_version),
            BanksCommands::Import {
                bank_id,
                iban,
                into,
                since,
            } => cli::banks::import(&settings, bank_id, &iban, into, since),
            BanksCommands::Remove { bank_id } => cli::banks::remove(&settings, bank_id),
        },
        Commands::Accounts { command } => match command {
            AccountsCommands::List => cli::accounts::list(&settings),
        },
        Commands::Sync { account_id } => cli::sync::run(&settings, account_id),
        Commands::Status => cli::status::run(&settings),
    };

    if let Err(e) = result {
        if e.is_unexpected() {
            error::report_unexpected(&e);
        }
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
