// Command Line Interface Module
// CLI using clap for engine management

pub mod commands;

use clap::{Parser, Subcommand};
use colored::*;

/// Quince - Multi-Tenant Broker Admission and Placement Engine
#[derive(Parser)]
#[command(name = "quince")]
#[command(author = "Quince Team")]
#[command(version = "0.4.0")]
#[command(about = "Multi-tenant message-broker admission, placement and scaling engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Quince engine daemon
    Start {
        /// Configuration file path
        #[arg(short, long, default_value = "quince.toml")]
        config: String,

        /// Run in foreground (don't daemonize)
        #[arg(short, long)]
        foreground: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[arg(short, long, default_value = "quince.toml")]
        file: String,
    },

    /// Run a placement scenario offline and print the admission results
    Simulate {
        /// Scenario file describing plans, namespaces and destinations
        file: String,

        /// Emit machine-readable JSON instead of the table
        #[arg(long)]
        json: bool,
    },
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{} {}", "⚠".yellow().bold(), msg);
}

/// Print the Quince banner
pub fn print_banner() {
    println!("{}", r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║   QUINCE  v0.4.0                                          ║
║                                                           ║
║   Multi-Tenant Broker Admission, Placement                ║
║   and Scaling Engine                                      ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
    "#.bright_cyan().bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let _cli = Cli::parse_from(["quince", "start", "--foreground"]);
        let _cli = Cli::parse_from(["quince", "simulate", "scenario.toml"]);
    }
}
