mod build_ebpf;
mod run;

use std::process::exit;

use clap::Parser;

/// Build helpers for the UPF XDP workspace.
#[derive(Debug, Parser)]
pub struct Options {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    /// Build the XDP object.
    BuildEbpf(build_ebpf::Options),
    /// Build everything and run the loader, as root.
    Run(run::Options),
}

fn main() {
    let opts = Options::parse();

    use Command::*;
    let ret = match opts.command {
        BuildEbpf(opts) => build_ebpf::build_ebpf(opts),
        Run(opts) => run::run(opts),
    };

    if let Err(e) = ret {
        eprintln!("{e:#}");
        exit(1);
    }
}
