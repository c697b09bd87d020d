//! Responder CLI entry point (component C10, SPEC_FULL.md §4.10).
//!
//! Grounded on `original_source/server/src/main.c`: a single required
//! `<interface>` argument, a fixed `./assets/` asset root, and an
//! accept loop that never returns on success.

use log::error;

use l2xfer::config::Config;
use l2xfer::dispatcher;
use l2xfer::linux_socket::RawSocketTransport;

fn usage(exec: &str) {
    eprintln!("usage: {exec} <network-interface>");
}

fn main() {
    env_logger::init();

    let argv: Vec<String> = std::env::args().collect();
    let Some(interface) = argv.get(1) else {
        usage(&argv[0]);
        std::process::exit(1);
    };

    let mut transport = match RawSocketTransport::bind(interface) {
        Ok(t) => t,
        Err(e) => {
            error!("failed to open socket on {interface}: {e}");
            std::process::exit(1);
        }
    };

    let config = Config::default();
    dispatcher::run_responder_forever(&mut transport, &config);
}
