//! Server CLI.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use oxsftp_core::constants::DEFAULT_WORKERS;
use oxsftp_core::SessionConfig;

/// Log output format for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

impl From<CliLogFormat> for oxsftp_core::LogFormat {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => oxsftp_core::LogFormat::Text,
            CliLogFormat::Json => oxsftp_core::LogFormat::Json,
        }
    }
}

/// oxsftp server - SFTP protocol versions 3-6 over stdio or TCP.
///
/// By default the server speaks SFTP on stdin/stdout, the way an SSH daemon
/// invokes a subsystem. Not intended for interactive use.
#[derive(Debug, Parser)]
#[command(
    name = "oxsftp-server",
    version,
    about = "SFTP server (protocol versions 3-6) over stdio or TCP"
)]
pub struct Cli {
    /// Refuse all operations that modify the filesystem
    #[arg(short = 'R', long = "readonly")]
    pub readonly: bool,

    /// Expect v3 SYMLINK arguments in (targetpath, linkpath) order
    #[arg(long = "reverse-symlink")]
    pub reverse_symlink: bool,

    /// Worker pool size
    #[arg(long = "workers", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Accept TCP connections on PORT instead of serving stdin/stdout
    #[arg(short = 'L', long = "listen", value_name = "PORT")]
    pub listen: Option<u16>,

    /// Bind address for --listen
    #[arg(short = 'H', long = "host", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log to file instead of stderr
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long = "log-format", default_value = "text")]
    pub log_format: CliLogFormat,
}

impl Cli {
    /// Engine configuration derived from the flags.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            readonly: self.readonly,
            reverse_symlink: self.reverse_symlink,
            workers: self.workers.max(1),
            ..SessionConfig::default()
        }
    }

    /// Listen address, when TCP mode is requested.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listen.map(|port| SocketAddr::new(self.host, port))
    }
}
