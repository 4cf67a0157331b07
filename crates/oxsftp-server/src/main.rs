//! oxsftp server binary entry point.

use clap::Parser;
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::stat::{umask, Mode};
use tracing::{error, info};

use oxsftp_server::{service, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = oxsftp_core::init_logging(cli.verbose, cli.log_file.as_deref(), cli.log_format.into())
    {
        eprintln!("failed to initialize logging: {e}");
        std::process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "oxsftp-server starting");
    setup_process();

    let config = cli.session_config();
    let result = match cli.listen_addr() {
        Some(addr) => service::serve_tcp(addr, config).await,
        None => service::serve_stdio(config).await,
    };
    if let Err(e) = result {
        error!(error = %e, "fatal");
        std::process::exit(1);
    }
}

fn setup_process() {
    // A lost peer must surface as EPIPE on write, which we can report, not
    // as a SIGPIPE that kills the process mid-response.
    unsafe {
        let _ = signal(Signal::SIGPIPE, SigHandler::SigIgn);
    }
    // The server must not apply a umask to client-supplied mode bits.
    umask(Mode::empty());
}
