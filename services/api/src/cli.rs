use crate::server;
use clap::{Args, Parser, Subcommand, ValueEnum};
use housing_listings::config::AppConfig;
use housing_listings::error::AppError;
use housing_listings::listings::{ModeratorId, Role, TokenAuthority};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(
    name = "Housing Listings",
    about = "Serve house and flat listings with a moderation workflow",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Mint a bearer token signed with the configured secret
    Token(TokenArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct TokenArgs {
    /// Role embedded in the token
    #[arg(long, value_enum)]
    pub(crate) role: RoleArg,
    /// Moderator identity; allocated automatically when omitted
    #[arg(long)]
    pub(crate) moderator_id: Option<i64>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RoleArg {
    Client,
    Moderator,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Client => Role::Client,
            RoleArg::Moderator => Role::Moderator,
        }
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Token(args) => print_token(args),
    }
}

fn print_token(args: TokenArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let authority = TokenAuthority::from_config(&config.auth);
    let (token, caller) = authority.issue(args.role.into(), args.moderator_id.map(ModeratorId))?;

    let payload = json!({
        "token": token,
        "role": caller.role.label(),
        "moderator_id": caller.moderator_id,
    });
    println!("{payload}");
    Ok(())
}
