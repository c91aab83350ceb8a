//! NUMA (Non-Uniform Memory Access) Topology
//!
//! On multi-socket systems the old generation is expanded by at least one
//! alignment unit per locality group, so round-robin page placement has
//! something to place on every node.
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │  CPU Node 0 │     │  CPU Node 1 │
//! │  ┌───────┐  │     │  ┌───────┐  │
//! │  │ Local │  │     │  │ Local │  │
//! │  │ Memory│  │     │  │ Memory│  │
//! │  └───────┘  │     │  └───────┘  │
//! └─────────────┘     └─────────────┘
//!       └────────┬──────────┘
//!         Interconnect (slower access)
//! ```

/// Detect number of online NUMA nodes
///
/// Linux reads `/sys/devices/system/node/online`; other platforms report a
/// single node (UMA).
pub fn detect_numa_nodes() -> usize {
    #[cfg(target_os = "linux")]
    {
        if let Ok(online) = std::fs::read_to_string("/sys/devices/system/node/online") {
            if let Some(count) = parse_node_list(online.trim()) {
                return count.max(1);
            }
        }
    }

    1
}

/// Parse a kernel node list such as `0-3,5` into a node count
pub fn parse_node_list(list: &str) -> Option<usize> {
    if list.is_empty() {
        return None;
    }

    let mut count = 0usize;
    for part in list.split(',') {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: usize = lo.trim().parse().ok()?;
                let hi: usize = hi.trim().parse().ok()?;
                if hi < lo {
                    return None;
                }
                count += hi - lo + 1;
            },
            None => {
                part.trim().parse::<usize>().ok()?;
                count += 1;
            },
        }
    }
    Some(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_at_least_one_node() {
        assert!(detect_numa_nodes() >= 1);
    }

    #[test]
    fn test_parse_node_list() {
        assert_eq!(parse_node_list("0"), Some(1));
        assert_eq!(parse_node_list("0-3"), Some(4));
        assert_eq!(parse_node_list("0-1,3"), Some(3));
        assert_eq!(parse_node_list(""), None);
        assert_eq!(parse_node_list("3-1"), None);
        assert_eq!(parse_node_list("x"), None);
    }
}
