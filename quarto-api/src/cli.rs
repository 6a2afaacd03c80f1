//! Command-line options for the API server.

use std::path::PathBuf;

use clap::Parser;

/// Local backend for a two-player Quarto board
#[derive(Parser, Debug)]
#[command(name = "quarto-api")]
#[command(about = "Serves one local Quarto game to a browser frontend", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Host to bind to
    #[arg(long, env = "QUARTO_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind to
    #[arg(short, long, env = "QUARTO_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory with the frontend (index.html, pieces/*.png), served for unknown paths
    #[arg(long)]
    pub static_dir: Option<PathBuf>,
}

impl Cli {
    /// Address to listen on, as `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
