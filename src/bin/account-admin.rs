// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! account-admin - maintenance CLI for the account service database.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use account_service::admin;
use account_service::config::{BCRYPT_COST_ENV, DATABASE_PATH_ENV, DEFAULT_DATABASE_PATH};
use account_service::storage::UserDatabase;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "Error: {err:?}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[tokio::main]
async fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let db = Arc::new(
        UserDatabase::open(&cli.database_path)
            .with_context(|| format!("connect database {}", cli.database_path.display()))?,
    );

    match cli.command {
        Command::Gentoken {
            user_id,
            private_key_file,
            algorithm,
        } => {
            let token =
                admin::gen_token(db, &user_id, &private_key_file, &algorithm, Utc::now()).await?;
            println!("{}", admin::format_token_block(&token));
        }
        Command::Useradd { email, password } => {
            let user = admin::user_add(db, &email, &password, cli.bcrypt_cost).await?;
            println!("user id: {}", user.id);
        }
        Command::Seed => {
            let inserted = admin::seed(&db)?;
            println!("seeded {inserted} user(s)");
        }
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "account-admin",
    author,
    version,
    about = "Maintenance CLI for the account service - mint tokens and manage users."
)]
struct Cli {
    /// redb database file
    #[arg(long, default_value = DEFAULT_DATABASE_PATH, env = DATABASE_PATH_ENV)]
    database_path: PathBuf,

    /// bcrypt work factor for new passwords
    #[arg(long, default_value_t = bcrypt::DEFAULT_COST, env = BCRYPT_COST_ENV)]
    bcrypt_cost: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a one-year token for an existing user
    Gentoken {
        /// User id (UUID)
        user_id: String,
        /// PEM private key (RS*) or shared secret file (HS*)
        private_key_file: PathBuf,
        /// RS256, RS384, RS512, HS256, HS384 or HS512
        algorithm: String,
    },

    /// Add a user with the ADMIN and USER roles
    Useradd { email: String, password: String },

    /// Insert the example admin and user accounts
    Seed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn missing_arguments_are_rejected() {
        assert!(Cli::try_parse_from(["account-admin", "gentoken", "id"]).is_err());
        assert!(Cli::try_parse_from(["account-admin", "useradd", "a@b.co"]).is_err());
        assert!(Cli::try_parse_from(["account-admin"]).is_err());
    }

    #[test]
    fn parses_gentoken() {
        let cli = Cli::try_parse_from([
            "account-admin",
            "--database-path",
            "/tmp/users.redb",
            "gentoken",
            "5cf37266-3473-4006-984f-9325122678b7",
            "private.pem",
            "RS256",
        ])
        .unwrap();
        assert_eq!(cli.database_path, PathBuf::from("/tmp/users.redb"));
        assert!(matches!(cli.command, Command::Gentoken { ref algorithm, .. } if algorithm == "RS256"));
    }
}
