//! Requester CLI entry point (component C10, SPEC_FULL.md §4.10).
//!
//! Grounded on `original_source/client/src/main.c`: `parse_args`'s flag
//! shape (`--i`, `--list`, `--download`, `--exec`), `usage`, and
//! `runapp`'s post-download launch of an external program. Argument
//! parsing is hand-rolled rather than built on a CLI framework since
//! spec.md §1 scopes it out of the core as an external collaborator.

use std::path::PathBuf;
use std::process::Command;

use log::{error, info};

use l2xfer::config::Config;
use l2xfer::dispatcher;
use l2xfer::linux_socket::RawSocketTransport;
use l2xfer::requester::{Outcome, Request};

struct Args {
    interface: String,
    request: Request,
    exec: Option<String>,
}

fn usage(exec: &str) {
    eprintln!(
        "usage:\n\
         {exec} --i <network-interface> --list\n\
         {exec} --i <network-interface> --download <name>\n\
         {exec} --i <network-interface> --download <name> --exec <executable>"
    );
}

fn parse_args(argv: &[String]) -> Option<Args> {
    let mut interface: Option<String> = None;
    let mut request: Option<Request> = None;
    let mut exec: Option<String> = None;

    let mut i = 0;
    while i < argv.len() {
        match argv[i].as_str() {
            "--i" => {
                interface = Some(argv.get(i + 1)?.clone());
                i += 2;
            }
            "--list" if request.is_none() => {
                request = Some(Request::Ls);
                i += 1;
            }
            "--download" if request.is_none() => {
                request = Some(Request::Download(PathBuf::from(argv.get(i + 1)?)));
                i += 2;
            }
            "--exec" => {
                exec = Some(argv.get(i + 1)?.clone());
                i += 2;
            }
            _ => return None,
        }
    }

    Some(Args { interface: interface?, request: request?, exec })
}

fn run_exec(exec: &str, path: &std::path::Path) {
    let command = format!("{exec} {}", path.display());
    match Command::new("sh").arg("-c").arg(&command).status() {
        Ok(status) if status.success() => info!("launched: {command}"),
        Ok(status) => error!("{command} exited with {status}"),
        Err(e) => error!("failed to launch {command}: {e}"),
    }
}

fn main() {
    env_logger::init();

    let argv: Vec<String> = std::env::args().collect();
    let Some(args) = parse_args(&argv[1..]) else {
        usage(&argv[0]);
        std::process::exit(1);
    };

    let mut transport = match RawSocketTransport::bind(&args.interface) {
        Ok(t) => t,
        Err(e) => {
            error!("failed to open socket on {}: {e}", args.interface);
            std::process::exit(1);
        }
    };

    let download_path = match &args.request {
        Request::Download(path) => Some(path.clone()),
        Request::Ls => None,
    };

    let config = Config::default();
    let mut stdout = std::io::stdout();
    let outcome = dispatcher::run_requester(args.request, &mut transport, &config, &mut stdout);

    match outcome {
        Ok(Outcome::Completed) => {
            if let (Some(exec), Some(path)) = (&args.exec, &download_path) {
                run_exec(exec, path);
            }
        }
        Ok(Outcome::RemoteError(_)) => {
            // Already printed by the requester session; suppress --exec.
        }
        Err(e) => {
            error!("transfer failed: {e}");
            std::process::exit(1);
        }
    }
}
