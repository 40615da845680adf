//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::Method;

/// Claims API client - log in and send authenticated requests.
#[derive(Debug, Parser)]
#[command(name = "claims")]
#[command(about = "Claims API client with automatic token refresh")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the TOML config file
    #[arg(long, env = "CONFIG_PATH", global = true)]
    pub config: Option<String>,

    /// Write Prometheus metrics to stderr after the command
    #[arg(long, global = true)]
    pub print_metrics: bool,
}

#[derive(Debug, PartialEq, Subcommand)]
pub enum Command {
    /// Log in with username and password (password from CLAIMS_PASSWORD or a file)
    Login {
        username: String,

        /// File containing the password
        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Log out and clear the stored session
    Logout,

    /// Show whether a session is stored
    Status,

    /// Send one request through the gateway and print the response body
    Request {
        /// HTTP method, case-insensitive
        #[arg(value_parser = parse_method)]
        method: Method,

        /// Path relative to the API base URL
        #[arg(value_parser = parse_api_path)]
        path: String,

        /// JSON request body
        #[arg(value_parser = parse_json)]
        body: Option<serde_json::Value>,
    },
}

fn parse_method(raw: &str) -> Result<Method, String> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .map_err(|e| format!("invalid HTTP method {raw}: {e}"))
}

fn parse_api_path(raw: &str) -> Result<String, String> {
    if raw.starts_with('/') {
        Ok(raw.to_string())
    } else {
        Err(format!("must start with /, got: {raw}"))
    }
}

fn parse_json(raw: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("request body must be JSON: {e}"))
}
