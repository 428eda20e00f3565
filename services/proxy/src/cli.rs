//! Command-line surface. Parsing lives entirely outside the core: this
//! binary only resolves a config path and hands the rest to `config::load_config_from_path`.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "wrap-proxy", version, about = "Reverse proxy exposing an HTTP origin through a relay network")]
pub struct Cli {
    /// Path to the proxy's TOML config file.
    #[arg(short, long, default_value = "/etc/wrap-proxy/proxy.toml")]
    pub config: PathBuf,
}
