//! Slipway binary entry point.

fn main() {
    if let Err(e) = slipway::cli::run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
