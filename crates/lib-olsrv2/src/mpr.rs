use nhdp::{NhdpDb, NhdpEvent};

/// Watches the NHDP event feed and re-runs each domain's MPR handler
/// whenever the one-hop/two-hop neighborhood it depends on could have
/// changed. The actual greedy-cover algorithm lives in `nhdp::GreedyMprHandler`
/// (NHDP owns the one-hop/two-hop data it needs); this is just the trigger.
#[derive(Default)]
pub struct MprDriver;

impl MprDriver {
    pub fn new() -> Self {
        Self
    }

    /// Inspect `events` and recompute MPRs for every domain touched by a
    /// neighborhood change. Idempotent: recomputing on an unchanged
    /// neighborhood returns the same selection.
    pub fn on_events(&mut self, db: &mut NhdpDb, events: &[NhdpEvent]) {
        let needs_recompute = events.iter().any(|e| {
            matches!(
                e,
                NhdpEvent::TwoHopSetChanged { .. }
                    | NhdpEvent::NeighborSymmetric { .. }
                    | NhdpEvent::NeighborLost { .. }
                    | NhdpEvent::LinkUp { .. }
                    | NhdpEvent::LinkDown { .. }
            )
        });

        if !needs_recompute {
            return;
        }

        let domain_ids: Vec<u8> = db.domains.ids().collect();
        for domain_id in domain_ids {
            db.recompute_mpr(domain_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generational_arena::Index;

    #[test]
    fn ignores_unrelated_events() {
        let mut db = NhdpDb::new();
        let mut driver = MprDriver::new();
        let fake_id: Index = Index::from_raw_parts(0, 0);
        driver.on_events(&mut db, &[NhdpEvent::OriginatorChanged { neighbor: fake_id, originator: None }]);
        // no panic, no-op when nothing neighborhood-relevant happened
    }
}
