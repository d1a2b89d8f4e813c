use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use tokenship_deploy::{CONFIG_FILENAME, DeploymentRequest, parse_address};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "tokenship")]
#[command(
    author,
    version,
    about = "Compile, deploy and verify a Token contract on EVM networks"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "TOKENSHIP_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the project configuration file.
    ///
    /// The file is optional: built-in defaults apply when it does not exist.
    #[arg(short, long, global = true, alias = "conf", env = "TOKENSHIP_CONFIG", default_value = CONFIG_FILENAME)]
    pub config: PathBuf,

    /// The network to deploy to. Defaults to `default_network` from the configuration.
    #[arg(short, long, global = true, env = "TOKENSHIP_NETWORK")]
    pub network: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a new wallet and print its private key, address and mnemonic.
    GenerateWallet,

    /// Deploy the Token contract with the given constructor arguments.
    Deploy(DeployArgs),

    /// Verify an already deployed Token contract on the network's explorer.
    Verify(VerifyArgs),

    /// List the known networks.
    Networks,

    /// Write a configuration file with the default settings.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// The Token constructor parameters, in constructor order.
#[derive(Debug, Clone, Args)]
pub struct TokenArgs {
    /// The owner's address of the Token.
    #[arg(value_parser = parse_address)]
    pub owner: Address,

    /// The name of the Token.
    pub name: String,

    /// The symbol of the Token.
    pub symbol: String,

    /// The address receiving the Token's fees.
    #[arg(value_parser = parse_address)]
    pub fee: Address,
}

impl From<TokenArgs> for DeploymentRequest {
    fn from(args: TokenArgs) -> Self {
        DeploymentRequest::new(args.owner, args.name, args.symbol, args.fee)
    }
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub token: TokenArgs,

    /// Blocks to wait on top of the deployment block before verifying.
    #[arg(long, env = "TOKENSHIP_CONFIRMATIONS")]
    pub confirmations: Option<u64>,

    /// Skip source verification.
    #[arg(long)]
    pub no_verify: bool,

    /// Do not write a deployment record.
    #[arg(long)]
    pub no_record: bool,
}

#[derive(Debug, Clone, Args)]
pub struct VerifyArgs {
    /// The deployed contract address.
    #[arg(value_parser = parse_address)]
    pub address: Address,

    /// The constructor arguments used at deployment: `<owner> <name> <symbol> <fee>`.
    ///
    /// When omitted they are read from the deployment record of the network.
    #[arg(num_args = 4, value_names = ["OWNER", "NAME", "SYMBOL", "FEE"])]
    pub constructor_args: Vec<String>,
}

impl VerifyArgs {
    /// The constructor arguments given on the command line, if any.
    pub fn request(&self) -> anyhow::Result<Option<DeploymentRequest>> {
        match self.constructor_args.as_slice() {
            [] => Ok(None),
            [owner, name, symbol, fee] => Ok(Some(DeploymentRequest::new(
                parse_address(owner)?,
                name.as_str(),
                symbol.as_str(),
                parse_address(fee)?,
            ))),
            _ => anyhow::bail!("expected 4 constructor arguments: <owner> <name> <symbol> <fee>"),
        }
    }
}
