use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use nhdp::{IfaceId, Interface};
use olsrv2_core::{LoggingRouteSink, OlsrCore, RouteSink, TargetKind};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::socket::{bind_interface_socket, multicast_target};

mod config;
mod socket;

#[derive(Parser)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", default_value = "/etc/olsrv2/olsrv2d.toml")]
    config: PathBuf,

    /// Enables verbose output on STDOUT
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let cfg = Config::from_file(cli.config)?;

    let mut core = OlsrCore::builder()
        .with_originator(cfg.originator)
        .with_address_family(cfg.address_family)
        .with_hello_timing(cfg.hello_interval.as_millis() as u64, cfg.hello_validity.as_millis() as u64)
        .with_tc_timing(cfg.tc_validity.as_millis() as u64)
        .with_mtu(cfg.mtu)
        .build();

    for domain_cfg in &cfg.domains {
        if let Some(domain) = core.nhdp.domains.get_mut(domain_cfg.id) {
            domain.willingness = domain_cfg.willingness;
        } else {
            let mut domain = nhdp::Domain::default_for(domain_cfg.id);
            domain.willingness = domain_cfg.willingness;
            core.nhdp
                .domains
                .register(domain)
                .unwrap_or_else(|err| warn!(domain = domain_cfg.id, %err, "failed to register domain"));
        }
    }

    let (tx, mut rx) = mpsc::channel::<(IfaceId, IpAddr, Vec<u8>)>(256);
    let mut sockets: HashMap<IfaceId, (Arc<UdpSocket>, IpAddr)> = HashMap::new();

    for iface_cfg in &cfg.interfaces {
        let mut iface = Interface::new(
            iface_cfg.name.clone(),
            iface_cfg.hello_interval.as_millis() as u64,
            iface_cfg.hello_validity.as_millis() as u64,
        );
        for addr in &iface_cfg.addresses {
            iface.push_addr(*addr);
        }
        let iface_id = core.add_interface(iface);

        let local_addr = iface_cfg.addresses[0];
        let socket = Arc::new(bind_interface_socket(local_addr).await?);
        sockets.insert(iface_id, (socket.clone(), local_addr));

        info!(interface = %iface_cfg.name, %local_addr, "listening");

        let recv_socket = socket.clone();
        let recv_tx = tx.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 65536];
            loop {
                match recv_socket.recv_from(&mut buf).await {
                    Ok((n, src)) => {
                        if recv_tx.send((iface_id, src.ip(), buf[..n].to_vec())).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(%err, "recv_from failed"),
                }
            }
        });
    }
    drop(tx);

    let hello_period = cfg.interfaces.iter().map(|i| i.hello_interval).min().unwrap_or(cfg.hello_interval);
    let mut hello_ticker = tokio::time::interval(hello_period);
    let mut tc_ticker = tokio::time::interval(cfg.tc_interval);

    let iface_ids: Vec<IfaceId> = sockets.keys().copied().collect();
    let mut route_sink = LoggingRouteSink;

    loop {
        tokio::select! {
            maybe_pkt = rx.recv() => {
                match maybe_pkt {
                    Some((iface_id, src, bytes)) => {
                        if let Err(err) = core.on_packet(iface_id, src, &bytes, Instant::now()) {
                            warn!(%err, "failed to process incoming datagram");
                        }
                    }
                    None => {}
                }
            }
            _ = hello_ticker.tick() => {
                for &iface_id in &iface_ids {
                    if let Err(err) = core.on_hello_timer(iface_id, Instant::now()) {
                        warn!(%err, "failed to build HELLO");
                    }
                }
            }
            _ = tc_ticker.tick() => {
                if let Err(err) = core.on_tc_timer(Instant::now()) {
                    warn!(%err, "failed to build TC");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c, shutting down");
                break;
            }
        }

        for op in core.drain_route_ops() {
            route_sink.apply(&op);
        }

        for (target, bytes) in core.drain_outgoing_packets() {
            match target {
                TargetKind::Hello(iface_id) => {
                    if let Some((socket, local_addr)) = sockets.get(&iface_id) {
                        let dest = multicast_target(*local_addr);
                        if let Err(err) = socket.send_to(&bytes, dest).await {
                            warn!(%err, "failed to send HELLO");
                        }
                    }
                }
                TargetKind::Tc => {
                    for (socket, local_addr) in sockets.values() {
                        let dest = multicast_target(*local_addr);
                        if let Err(err) = socket.send_to(&bytes, dest).await {
                            warn!(%err, "failed to send TC");
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
