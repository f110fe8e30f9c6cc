use std::path::PathBuf;
use std::process::Command;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum Architecture {
    BpfEl,
    BpfEb,
}

impl Architecture {
    pub fn target(self) -> &'static str {
        match self {
            Architecture::BpfEl => "bpfel-unknown-none",
            Architecture::BpfEb => "bpfeb-unknown-none",
        }
    }
}

#[derive(Debug, Parser)]
pub struct Options {
    /// Target to build the object for.
    #[clap(long, value_enum, default_value = "bpf-el")]
    pub target: Architecture,
    /// Build the release profile.
    #[clap(long)]
    pub release: bool,
}

pub fn build_ebpf(opts: Options) -> anyhow::Result<()> {
    let dir = PathBuf::from("upf-xdp-ebpf");
    let target = format!("--target={}", opts.target.target());
    let mut args = vec!["build", target.as_str(), "-Z", "build-std=core"];
    if opts.release {
        args.push("--release");
    }

    // Let the ebpf crate's rust-toolchain.toml pick the nightly compiler.
    let status = Command::new("cargo")
        .current_dir(dir)
        .env_remove("RUSTUP_TOOLCHAIN")
        .args(&args)
        .status()
        .context("failed to run cargo")?;
    if !status.success() {
        bail!("building the XDP object failed: {status}");
    }
    Ok(())
}
