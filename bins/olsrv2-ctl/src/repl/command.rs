use std::time::Instant;

use nhdp::LinkStatus;
use olsrv2_core::OlsrCore;

/// Dispatch one REPL line against the live core snapshot, returning the
/// text to print. `Quit` tells the caller to stop the read loop.
pub enum Outcome {
    Printed(String),
    Quit,
}

pub fn dispatch(core: &mut OlsrCore, line: &str) -> Outcome {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Outcome::Printed(String::new());
    };

    match cmd {
        "links" => Outcome::Printed(links_table(core)),
        "neighbors" => Outcome::Printed(neighbors_table(core)),
        "topology" => Outcome::Printed(topology_table(core)),
        "routes" => Outcome::Printed(routes_table(core)),
        "tick" => {
            core.on_tick(Instant::now());
            Outcome::Printed("recomputed".to_string())
        }
        "help" => Outcome::Printed(help_text()),
        "quit" | "exit" => Outcome::Quit,
        other => Outcome::Printed(format!("unknown command {other:?}, try \"help\"")),
    }
}

fn help_text() -> String {
    "commands: links, neighbors, topology, routes, tick, help, quit".to_string()
}

fn links_table(core: &OlsrCore) -> String {
    let mut out = String::from("IFACE                REMOTE ADDR          STATUS\n");
    for (_, neighbor) in core.nhdp.neighbors() {
        for &link_id in &neighbor.links {
            let Some(link) = core.nhdp.link(link_id) else { continue };
            let iface_name = core.nhdp.iface(link.iface).map(|i| i.name.as_str()).unwrap_or("?");
            let status = match link.status {
                LinkStatus::Heard => "HEARD",
                LinkStatus::Symmetric => "SYMMETRIC",
                LinkStatus::Lost => "LOST",
            };
            out.push_str(&format!("{:<20} {:<20} {}\n", iface_name, link.remote_addr, status));
        }
    }
    out
}

fn neighbors_table(core: &OlsrCore) -> String {
    let mut out = String::from("ORIGINATOR           SYMMETRIC   MPR     WILLINGNESS\n");
    for (_, neighbor) in core.nhdp.neighbors() {
        let originator = neighbor
            .originator
            .map(|a| a.to_string())
            .unwrap_or_else(|| "(unknown)".to_string());
        out.push_str(&format!(
            "{:<20} {:<11} {:<7} {}\n",
            originator, neighbor.symmetric, neighbor.is_mpr, neighbor.willingness
        ));
    }
    out
}

fn topology_table(core: &OlsrCore) -> String {
    let mut out = String::from("NODE                 ANSN   EDGE -> (DOMAIN, METRIC)\n");
    for (id, node) in core.tc.nodes() {
        out.push_str(&format!("{:<20} {:<6}", node.originator, node.ansn));
        let edges = core.tc.edges(id);
        if edges.is_empty() {
            out.push('\n');
            continue;
        }
        for (i, edge) in edges.iter().enumerate() {
            if i > 0 {
                out.push_str(&format!("{:<27}", ""));
            }
            out.push_str(&format!("{} (domain {}, metric {})\n", edge.to_originator, edge.domain, edge.metric));
        }
    }
    out
}

fn routes_table(core: &OlsrCore) -> String {
    let mut out = String::from("DESTINATION          NEXT HOP             DISTANCE  DOMAIN\n");
    for route in core.routes() {
        out.push_str(&format!(
            "{:<20} {:<20} {:<9} {}\n",
            route.destination, route.next_hop, route.distance, route.domain
        ));
    }
    out
}
