use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "station-sync")]
#[command(about = "Keeps local weather station series in sync with the INMET portal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Configuration file (TOML)")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Hide progress bars")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Download every bulk archive missing from the historical folder
    Bootstrap,

    /// Fetch the records missing since each station's last update
    Refresh {
        #[arg(
            short,
            long = "station",
            help = "Station key to refresh, repeatable [default: all onboarded stations]"
        )]
        stations: Vec<String>,
    },

    /// Bootstrap, then refresh every onboarded station
    Sync,

    /// Build a station series from the downloaded bulk archives
    Onboard {
        #[arg(short, long, help = "Station key, e.g. A001")]
        station: String,
    },

    /// Show the archive marker and per-station sync metadata
    Status,

    /// List the archives advertised by the portal
    Discover,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_accepts_repeated_stations() {
        let cli = Cli::try_parse_from([
            "station-sync",
            "refresh",
            "--station",
            "A001",
            "-s",
            "A002",
            "--verbose",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(
            cli.command,
            Commands::Refresh {
                stations: vec!["A001".to_string(), "A002".to_string()]
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "station-sync",
            "onboard",
            "--station",
            "A001",
            "--config",
            "custom.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Onboard { ref station } if station == "A001"));
    }

    #[test]
    fn test_onboard_requires_station() {
        assert!(Cli::try_parse_from(["station-sync", "onboard"]).is_err());
    }
}
