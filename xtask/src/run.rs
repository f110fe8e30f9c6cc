use std::process::Command;

use anyhow::{bail, Context};
use clap::Parser;

use crate::build_ebpf::{build_ebpf, Architecture, Options as BuildOptions};

#[derive(Debug, Parser)]
pub struct Options {
    /// Target the XDP object is built for.
    #[clap(long, value_enum, default_value = "bpf-el")]
    pub bpf_target: Architecture,
    /// Build and run the release profile.
    #[clap(long)]
    pub release: bool,
    /// Command used to gain the privileges attaching XDP needs.
    #[clap(long, default_value = "sudo -E")]
    pub runner: String,
    /// Arguments passed on to the loader.
    #[clap(last = true)]
    pub run_args: Vec<String>,
}

fn build(release: bool) -> anyhow::Result<()> {
    let mut args = vec!["build", "--package", "upf-xdp"];
    if release {
        args.push("--release");
    }
    let status = Command::new("cargo")
        .args(&args)
        .status()
        .context("failed to run cargo")?;
    if !status.success() {
        bail!("building the loader failed: {status}");
    }
    Ok(())
}

pub fn run(opts: Options) -> anyhow::Result<()> {
    build_ebpf(BuildOptions {
        target: opts.bpf_target,
        release: opts.release,
    })
    .context("error while building the XDP object")?;
    build(opts.release).context("error while building the loader")?;

    let profile = if opts.release { "release" } else { "debug" };
    let loader = format!("target/{profile}/upf-xdp");
    let object = format!("target/{}/{profile}/upf-xdp", opts.bpf_target.target());

    let mut cmd: Vec<&str> = opts.runner.split_whitespace().collect();
    cmd.push(&loader);
    cmd.push("--bpf-object");
    cmd.push(&object);
    cmd.extend(opts.run_args.iter().map(String::as_str));

    let Some((program, args)) = cmd.split_first() else {
        bail!("empty command");
    };
    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("failed to run `{}`", cmd.join(" ")))?;
    if !status.success() {
        bail!("`{}` exited with {status}", cmd.join(" "));
    }
    Ok(())
}
