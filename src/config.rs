use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

/// Tuning shared by every session in the process.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Actions per second at speed 0.
    pub base_frequency: f64,
    /// Manhattan distance within which monsters chase players.
    pub aggro_radius: i32,
    /// Batches buffered per observer. An observer that falls further behind
    /// is disconnected.
    pub outbound_capacity: usize,
    pub tick_capacity: usize,
    pub join_attempts: usize,
    /// How long a session with no players waits for a join before exiting.
    pub idle_grace: Duration,
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_frequency: 10.0,
            aggro_radius: 10,
            outbound_capacity: 16,
            tick_capacity: 256,
            join_attempts: 3,
            idle_grace: Duration::from_secs(10),
            seed: None,
        }
    }
}

impl Settings {
    /// Minimum time between two actions of an entity with the given speed.
    /// Every speed point makes the entity 7% faster.
    pub fn action_interval(&self, speed: i32) -> Duration {
        let frequency = self.base_frequency * 1.07f64.powi(speed);
        Duration::from_secs_f64(1.0 / frequency)
    }
}

#[derive(Clone, Debug, Parser)]
#[command(name = "deepdelve", about = "Multiplayer dungeon crawl server")]
pub struct Cli {
    /// Port to listen on.
    #[arg(default_value_t = 8000)]
    pub port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Enable debug logs (RUST_LOG takes precedence).
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the item catalog as JSON and exit.
    #[arg(long)]
    pub dump_items: bool,

    /// Seed every session's RNG, for reproducible dungeons.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Cli {
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn settings(&self) -> Settings {
        Settings {
            seed: self.seed,
            ..Settings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faster_entities_act_more_often() {
        let settings = Settings::default();
        assert_eq!(settings.action_interval(0), Duration::from_millis(100));
        assert!(settings.action_interval(10) < settings.action_interval(0));
        assert!(settings.action_interval(-10) > settings.action_interval(0));
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["deepdelve"]);
        assert_eq!(cli.port, 8000);
        assert!(!cli.verbose);
        assert_eq!(cli.bind_addr().ok(), "127.0.0.1:8000".parse().ok());
    }

    #[test]
    fn cli_flags() {
        let cli = Cli::parse_from(["deepdelve", "-v", "--seed", "9", "9001"]);
        assert!(cli.verbose);
        assert_eq!(cli.port, 9001);
        assert_eq!(cli.settings().seed, Some(9));
    }
}
