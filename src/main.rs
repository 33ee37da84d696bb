use clap::Parser;
use std::path::PathBuf;

use saltmine::MinerOptions;

/// Mine TON vanity addresses by brute-forcing the vanity contract salt.
#[derive(Parser)]
#[command(name = "saltmine")]
struct Args {
    /// Base64url owner address for the vanity contract
    #[arg(short, long)]
    owner: String,
    /// Address prefix to match, base64url
    #[arg(short, long)]
    start: Option<String>,
    /// Address suffix to match, base64url
    #[arg(short, long)]
    end: Option<String>,
    /// Use masterchain (workchain -1) instead of basechain
    #[arg(short, long)]
    masterchain: bool,
    /// Search for non-bounceable addresses instead of bounceable
    #[arg(short = 'n', long)]
    non_bounceable: bool,
    /// Search for testnet addresses
    #[arg(short, long)]
    testnet: bool,
    /// Treat prefix/suffix matching as case-sensitive
    #[arg(long)]
    case_sensitive: bool,
    /// Stop after the first matching address is found
    #[arg(long)]
    only_one: bool,
    /// Pin the contract fixedPrefixLength instead of scanning all variants
    #[arg(long)]
    fixed_prefix_length: Option<u8>,
    /// Append rate snapshots to a CSV file
    #[arg(long)]
    stats_csv: Option<PathBuf>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let options = MinerOptions {
        owner: args.owner,
        start: args.start,
        end: args.end,
        case_sensitive: args.case_sensitive,
        masterchain: args.masterchain,
        non_bounceable: args.non_bounceable,
        testnet: args.testnet,
        only_one: args.only_one,
        fixed_prefix_length: args.fixed_prefix_length,
    };
    saltmine::run(&options, args.stats_csv).map_err(saltmine::io_utils::miner_cli_error)?;
    Ok(())
}
