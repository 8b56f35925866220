//! Mint a bearer token the gateway will accept. For development and tests.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use edge_gateway::security::ClaimsVerifier;

#[derive(Parser)]
#[command(name = "gateway-token")]
#[command(about = "Issue a development bearer token for the edge gateway", long_about = None)]
struct Cli {
    /// HMAC secret shared with the gateway.
    #[arg(short, long, env = "JWT_SECRET")]
    secret: String,

    /// Subject (user id) to embed.
    #[arg(long)]
    subject: u64,

    /// Role to embed, e.g. "customer" or "admin".
    #[arg(short, long, default_value = "customer")]
    role: String,

    /// Lifetime in seconds.
    #[arg(long, default_value_t = 3600)]
    ttl_secs: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.subject == 0 {
        eprintln!("Error: subject must be non-zero");
        return ExitCode::FAILURE;
    }

    let verifier = ClaimsVerifier::new(&cli.secret, 0);
    match verifier.issue(cli.subject, &cli.role, Duration::from_secs(cli.ttl_secs)) {
        Ok(token) => {
            println!("{}", token);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
