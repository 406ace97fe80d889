/*!
The MAC learning table of one switch and the forwarding decision on it

Hosts are learned from the source address of every frame that reaches
the controller. A known destination gets a direct path, anything else
is flooded. Entries are never aged out.
*/

use crate::packet::MacAddr;

use std::collections::HashMap;
use std::time::Instant;

/// Outcome of a sighting of a source address
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Learning {
    /// First sighting, or another one on the known port
    Learned,
    /// The address showed up on another port than before
    Moved {
        /// The port the address was learned on before
        from: u32,
    },
    /// Group addresses never identify a single host
    BroadcastSourceIgnored,
}

/// What to do with a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Neither forward nor install anything
    Drop,
    /// Send out of all ports but the ingress port
    Flood,
    /// Send out of the port the destination was learned on
    Directed {
        port: u32,
    },
}

#[derive(Debug, Clone)]
struct Entry {
    port: u32,
    last_seen: Instant,
    hits: u64,
}

/// Maps host addresses to the switch port they were last seen on
#[derive(Debug, Default)]
pub struct LearningBridge {
    table: HashMap<MacAddr, Entry>,
}

impl LearningBridge {
    pub fn new() -> LearningBridge {
        LearningBridge::default()
    }

    /// Records that `mac` sent a frame that entered the switch at `port`
    pub fn update(&mut self, port: u32, mac: MacAddr) -> Learning {
        if mac.is_multicast() {
            return Learning::BroadcastSourceIgnored;
        }
        let now = Instant::now();
        match self.table.get_mut(&mac) {
            Some(entry) => {
                entry.last_seen = now;
                entry.hits += 1;
                if entry.port == port {
                    return Learning::Learned;
                }
                let from = entry.port;
                entry.port = port;
                info!("{} moved from port {} to port {}", mac, from, port);
                Learning::Moved { from }
            }
            None => {
                self.table.insert(
                    mac,
                    Entry {
                        port,
                        last_seen: now,
                        hits: 1,
                    },
                );
                debug!("Learned {} on port {}", mac, port);
                Learning::Learned
            }
        }
    }

    /// The port `mac` was last seen on. `None` means it has to be flooded.
    pub fn lookup(&self, mac: MacAddr) -> Option<u32> {
        self.table.get(&mac).map(|e| e.port)
    }

    /// Learns the source of a frame and decides how to forward it
    pub fn decide(&mut self, in_port: u32, src: MacAddr, dst: MacAddr) -> Verdict {
        if self.update(in_port, src) == Learning::BroadcastSourceIgnored {
            warn!("Dropping frame with group source address {} from port {}", src, in_port);
            return Verdict::Drop;
        }
        if dst.is_multicast() {
            return Verdict::Flood;
        }
        match self.lookup(dst) {
            None => Verdict::Flood,
            Some(port) if port == in_port => {
                trace!("{} is on the ingress port {}", dst, port);
                Verdict::Drop
            }
            Some(port) => Verdict::Directed { port },
        }
    }

    /// How often `mac` was seen as a source and when it was seen last
    pub fn stats(&self, mac: MacAddr) -> Option<(u64, Instant)> {
        self.table.get(&mac).map(|e| (e.hits, e.last_seen))
    }

    /// Number of learned hosts
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
