use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use nhdp::Interface;
use olsrv2_core::OlsrCore;

use crate::config::Config;
use crate::repl::Repl;

mod config;
mod repl;

#[derive(Parser)]
struct Cli {
    /// Sets a custom config file, in the same format `olsrv2d` reads
    #[arg(short, long, value_name = "FILE", default_value = "/etc/olsrv2/olsrv2d.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::from_file(cli.config)?;

    let mut core = OlsrCore::builder()
        .with_originator(cfg.originator)
        .with_address_family(cfg.address_family)
        .build();

    for iface_cfg in &cfg.interfaces {
        let mut iface = Interface::new(iface_cfg.name.clone(), 2_000, 6_000);
        for addr in &iface_cfg.addresses {
            iface.push_addr(*addr);
        }
        core.add_interface(iface);
    }

    let mut repl = Repl::new(">> ", core);
    Ok(repl.run()?)
}
