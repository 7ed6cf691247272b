//! Command-line surface.
//!
//! Every flag can also come from an environment variable. Arguments after
//! the flags are handed to the supervised application.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::config::env::child_environment;
use crate::config::loader::{load_config, parse_build_args};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, ProxyConfig, Settings};
use crate::process::OutputSink;

#[derive(Debug, Parser)]
#[command(name = "reload")]
#[command(about = "A live reload utility for locally built web applications", long_about = None)]
pub struct Cli {
    /// Listening address for the proxy server
    #[arg(short, long, env = "RELOAD_LADDR", default_value = "")]
    pub laddr: String,

    /// Port for the proxy server
    #[arg(short, long, env = "RELOAD_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port the application listens on
    #[arg(short, long = "app-port", env = "BIN_APP_PORT", default_value_t = 3001)]
    pub app_port: u16,

    /// Name of generated binary file
    #[arg(short, long, env = "RELOAD_BIN", default_value = "reload-bin")]
    pub bin: String,

    /// Path to watch files from
    #[arg(short = 't', long, env = "RELOAD_PATH", default_value = ".")]
    pub path: PathBuf,

    /// Path to build files from (defaults to --path)
    #[arg(short = 'd', long, env = "RELOAD_BUILD")]
    pub build: Option<PathBuf>,

    /// Relative directories to exclude
    #[arg(short = 'x', long = "exclude-dir", env = "RELOAD_EXCLUDE_DIR", value_delimiter = ',')]
    pub exclude_dir: Vec<PathBuf>,

    /// Run the server immediately after it's built
    #[arg(short, long, env = "RELOAD_IMMEDIATE")]
    pub immediate: bool,

    /// Reload whenever any file changes, not only source files
    #[arg(long, env = "RELOAD_ALL")]
    pub all: bool,

    /// Additional build arguments, shell quoted
    #[arg(long = "build-args", env = "RELOAD_BUILD_ARGS", allow_hyphen_values = true)]
    pub build_args: Option<String>,

    /// TLS certificate (PEM)
    #[arg(long = "cert-file", env = "RELOAD_CERT_FILE")]
    pub cert_file: Option<String>,

    /// TLS certificate key (PEM)
    #[arg(long = "key-file", env = "RELOAD_KEY_FILE")]
    pub key_file: Option<String>,

    /// Where the application's stdout goes
    #[arg(long = "app-output", env = "RELOAD_APP_OUTPUT", value_enum, default_value_t = OutputSink::Inherit)]
    pub app_output: OutputSink,

    /// Log prefix
    #[arg(long = "log-prefix", env = "RELOAD_LOG_PREFIX", default_value = "reload")]
    pub log_prefix: String,

    /// Enable build notifications
    #[arg(long, env = "RELOAD_NOTIFICATIONS")]
    pub notifications: bool,

    /// Toolchain executable, invoked as `<toolchain> build -o <artifact>`
    #[arg(long, env = "RELOAD_TOOLCHAIN", default_value = "go")]
    pub toolchain: String,

    /// Source file extension that triggers a rebuild
    #[arg(long, env = "RELOAD_EXTENSION", default_value = "go")]
    pub extension: String,

    /// Gateway configuration file (JSON, or TOML by extension)
    #[arg(long, env = "RELOAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serve Prometheus metrics on this address
    #[arg(long = "metrics-address", env = "RELOAD_METRICS_ADDRESS")]
    pub metrics_address: Option<SocketAddr>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Arguments passed to the application
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub app_args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the reload proxy in the current working directory
    #[command(visible_alias = "r")]
    Run,
    /// Display environment variables set by the .env file
    #[command(visible_alias = "e")]
    Env,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }

    /// Resolve flags into run settings rooted at `work_dir`.
    pub fn into_settings(self, work_dir: &Path) -> Result<Settings, ConfigError> {
        let proxy = match &self.config {
            Some(path) => load_config(path)?,
            None => {
                let proxy = ProxyConfig {
                    laddr: self.laddr.clone(),
                    port: self.port,
                    proxy_to: format!("http://localhost:{}", self.app_port),
                    cert_file: self.cert_file.clone(),
                    key_file: self.key_file.clone(),
                };
                validate_config(&proxy).map_err(ConfigError::Validation)?;
                proxy
            }
        };

        let build_args = parse_build_args(self.build_args.as_deref().unwrap_or_default())?;
        let env = child_environment(work_dir, self.app_port)?;
        let build_path = self.build.unwrap_or_else(|| self.path.clone());

        Ok(Settings {
            proxy,
            app_port: self.app_port,
            bin: self.bin,
            watch_path: self.path,
            build_path,
            work_dir: work_dir.to_path_buf(),
            exclude_dirs: self.exclude_dir,
            build_args,
            app_args: self.app_args,
            app_output: self.app_output,
            immediate: self.immediate,
            all_files: self.all,
            toolchain: self.toolchain,
            extension: self.extension,
            log_prefix: self.log_prefix,
            notifications: self.notifications,
            metrics_address: self.metrics_address,
            env,
        })
    }
}
