//! Command-line arguments.
//!
//! Every option can also be set through an `AGENT_BRIDGE_*` environment
//! variable, including from a `.env` file.

use agent_bridge_core::config::{DEFAULT_HOST, DEFAULT_HTTP_PORT, DEFAULT_WS_PORT};
use agent_bridge_core::{BridgeConfig, StreamingMode};
use clap::Parser;

/// Bridge local HTTP clients to a remote agent over a WebSocket.
#[derive(Debug, Parser)]
#[command(name = "agent-bridge")]
#[command(version, about)]
pub struct Cli {
    /// Host both listeners bind to
    #[arg(long, env = "AGENT_BRIDGE_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port of the HTTP surface
    #[arg(long, env = "AGENT_BRIDGE_HTTP_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub http_port: u16,

    /// Port the agent connects to
    #[arg(long, env = "AGENT_BRIDGE_WS_PORT", default_value_t = DEFAULT_WS_PORT)]
    pub ws_port: u16,

    /// Streaming mode at startup: "fake" or "real"
    #[arg(long, env = "AGENT_BRIDGE_MODE", default_value = "fake")]
    pub mode: StreamingMode,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    /// Bridge configuration for these arguments.
    pub fn to_config(&self) -> BridgeConfig {
        BridgeConfig::default()
            .with_host(self.host.clone())
            .with_ports(self.http_port, self.ws_port)
            .with_mode(self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["agent-bridge"]);
        let config = cli.to_config();
        assert_eq!(config.http_addr(), "127.0.0.1:8889");
        assert_eq!(config.ws_addr(), "127.0.0.1:9998");
        assert_eq!(config.initial_mode, StreamingMode::Fake);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "agent-bridge",
            "--host",
            "0.0.0.0",
            "--http-port",
            "8080",
            "--ws-port",
            "9090",
            "--mode",
            "real",
            "-v",
        ]);
        let config = cli.to_config();
        assert_eq!(config.http_addr(), "0.0.0.0:8080");
        assert_eq!(config.ws_addr(), "0.0.0.0:9090");
        assert_eq!(config.initial_mode, StreamingMode::Real);
        assert!(cli.verbose);
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["agent-bridge", "--mode", "turbo"]).is_err());
    }
}
