//! Fuse CLI

use fusec::{init_tracing, run, Args};

fn main() {
    init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{}", fusec::USAGE);
        std::process::exit(1);
    }

    let result = Args::parse(&args).and_then(|args| run(&args));
    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
