use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use rfc5444::is_newer;

/// The highest sequence number seen so far for one (originator, message
/// type) pair, per the RFC 5444 §13 half-range (2^15) wraparound comparison:
/// a message is a duplicate when its sequence number is not newer than
/// `highest_seq`, never by literal equality against a retained window.
struct DupEntry {
    highest_seq: u16,
    expire_time: Instant,
}

/// RFC 5444 §13 duplicate message set: have we processed this (originator,
/// message type, sequence number) before, within its hold time? Used to
/// suppress reprocessing forwarded/retransmitted HELLO and TC messages.
#[derive(Default)]
pub struct DupSet {
    entries: HashMap<(IpAddr, u8), DupEntry>,
}

impl DupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `(addr, msg_type, seq)` was already seen; if not,
    /// record it. Returns `true` if this is a duplicate that should be
    /// dropped. `expire_time` only advances when a genuinely newer sequence
    /// number arrives, so a duplicate can never keep its own entry alive.
    pub fn check_and_insert(&mut self, addr: IpAddr, msg_type: u8, seq: u16, now: Instant, hold_ms: u64) -> bool {
        let key = (addr, msg_type);
        match self.entries.get_mut(&key) {
            Some(entry) if now < entry.expire_time => {
                if is_newer(seq, entry.highest_seq) {
                    entry.highest_seq = seq;
                    entry.expire_time = now + Duration::from_millis(hold_ms);
                    false
                } else {
                    true
                }
            }
            _ => {
                self.entries.insert(
                    key,
                    DupEntry {
                        highest_seq: seq,
                        expire_time: now + Duration::from_millis(hold_ms),
                    },
                );
                false
            }
        }
    }

    /// Drop hold-time-expired entries entirely, so the map doesn't grow
    /// without bound over the lifetime of the daemon.
    pub fn expire(&mut self, now: Instant) {
        self.entries.retain(|_, entry| entry.expire_time > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_occurrence_is_a_duplicate() {
        let mut set = DupSet::new();
        let addr: IpAddr = "10.0.0.1".parse().unwrap();
        let now = Instant::now();

        assert!(!set.check_and_insert(addr, 1, 42, now, 30_000));
        assert!(set.check_and_insert(addr, 1, 42, now, 30_000));
    }

    #[test]
    fn different_seq_is_not_a_duplicate() {
        let mut set = DupSet::new();
        let addr: IpAddr = "10.0.0.1".parse().unwrap();
        let now = Instant::now();

        assert!(!set.check_and_insert(addr, 1, 42, now, 30_000));
        assert!(!set.check_and_insert(addr, 1, 43, now, 30_000));
    }

    #[test]
    fn expiry_resets_the_window() {
        let mut set = DupSet::new();
        let addr: IpAddr = "10.0.0.1".parse().unwrap();
        let now = Instant::now();

        set.check_and_insert(addr, 1, 42, now, 1_000);
        let later = now + Duration::from_millis(1_001);
        assert!(!set.check_and_insert(addr, 1, 42, later, 1_000));
    }

    #[test]
    fn wrapped_sequence_is_still_recognized_as_newer() {
        let mut set = DupSet::new();
        let addr: IpAddr = "10.0.0.1".parse().unwrap();
        let now = Instant::now();

        assert!(!set.check_and_insert(addr, 1, 65_534, now, 30_000));
        // 3 is numerically smaller than 65_534 but newer in the half-range sense.
        assert!(!set.check_and_insert(addr, 1, 3, now, 30_000));
        assert!(set.check_and_insert(addr, 1, 3, now, 30_000));
    }

    #[test]
    fn duplicates_never_extend_the_hold_window() {
        let mut set = DupSet::new();
        let addr: IpAddr = "10.0.0.1".parse().unwrap();
        let now = Instant::now();

        set.check_and_insert(addr, 1, 42, now, 1_000);
        // Replaying the same sequence repeatedly must not push expiry forward.
        for _ in 0..5 {
            assert!(set.check_and_insert(addr, 1, 42, now + Duration::from_millis(500), 1_000));
        }
        set.expire(now + Duration::from_millis(1_001));
        assert!(!set.check_and_insert(addr, 1, 42, now + Duration::from_millis(1_002), 1_000));
    }
}
