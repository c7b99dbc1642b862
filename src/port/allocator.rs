//! Offset-based host port allocation for worktree environments.
//!
//! The core formula is deterministic: `shifted = original + index * 10_000`.
//! A developer on worktree index 2 knows ahead of time that the app on port
//! 3000 will answer on 23000. The allocator layers two conflict checks on
//! top: the set of allocations already owned by other environments
//! (supplied by the caller from the label store — the allocator never reads
//! Docker itself), and an OS bind probe via [`PortScanner`].

use super::scanner::PortScanner;
use crate::error::{Error, Result};
use crate::model::{PortAllocation, PortSpec, Protocol};

/// Width of the port band owned by each worktree index.
pub const SHIFT: u32 = 10_000;

/// Highest valid TCP/UDP port number.
pub const MAX_PORT: u32 = 65_535;

/// IANA dynamic/private range, scanned when the shifted port overflows or
/// its whole block is occupied.
pub const EPHEMERAL_START: u16 = 49_152;
pub const EPHEMERAL_END: u16 = 65_535;

/// Highest supported worktree index. Ten concurrent environments is the
/// design limit; index 0 is the primary worktree and keeps original ports.
pub const MAX_INDEX: u8 = 9;

#[derive(Debug, Default)]
pub struct PortAllocator {
    scanner: PortScanner,
    /// Host ports already assigned to other environments, plus every
    /// allocation made earlier in the current batch.
    known: Vec<PortAllocation>,
}

impl PortAllocator {
    pub fn new(scanner: PortScanner) -> Self {
        PortAllocator {
            scanner,
            known: Vec::new(),
        }
    }

    /// Register allocations owned by other environments, gathered from
    /// container labels. Call before allocating.
    pub fn set_known_allocations(&mut self, allocations: Vec<PortAllocation>) {
        self.known = allocations;
    }

    /// Allocate a host port for one container port.
    ///
    /// Steps: index 0 keeps the original port; otherwise the shift formula
    /// applies. An unavailable or overflowing candidate falls into a scan
    /// of the remainder of its 10 000-wide block, then the ephemeral range.
    ///
    /// The ephemeral fallback checks only the OS probe and the known set
    /// handed to this allocator; uniqueness against environments at
    /// arbitrary indices beyond that set is first-non-conflicting-bind
    /// wins, with no deterministic ordering promised.
    pub fn allocate_port(
        &self,
        original_port: u16,
        worktree_index: u8,
        service_name: &str,
        protocol: Protocol,
    ) -> Result<PortAllocation> {
        if worktree_index > MAX_INDEX {
            return Err(Error::PortAllocation(format!(
                "worktree index {worktree_index} out of range (0-{MAX_INDEX})"
            )));
        }

        let candidate = if worktree_index == 0 {
            // The primary worktree behaves identically to a plain
            // devcontainer setup.
            u32::from(original_port)
        } else {
            u32::from(original_port) + u32::from(worktree_index) * SHIFT
        };

        let host_port = if candidate > MAX_PORT {
            self.scan_ephemeral(protocol).map_err(|e| {
                Error::PortAllocation(format!(
                    "port overflow: {original_port}+({worktree_index}*{SHIFT})={candidate} exceeds {MAX_PORT}, and fallback failed: {e}"
                ))
            })?
        } else {
            let candidate = candidate as u16;
            if self.is_allocatable(candidate, protocol) {
                candidate
            } else {
                self.scan_block(candidate, protocol)
                    .or_else(|| self.scan_ephemeral(protocol).ok())
                    .ok_or_else(|| {
                        Error::PortAllocation(format!(
                            "port {candidate} (shifted from {original_port}) is in use and no alternative found in its block or the ephemeral range"
                        ))
                    })?
            }
        };

        Ok(PortAllocation {
            service_name: service_name.to_string(),
            container_port: original_port,
            host_port,
            protocol,
            label: None,
        })
    }

    /// Allocate the full batch for one environment, in input order. Every
    /// success is appended to the known set before the next port is
    /// considered, so two services requesting the same container port
    /// cannot collide within a batch.
    pub fn allocate_ports(
        &mut self,
        specs: &[PortSpec],
        worktree_index: u8,
    ) -> Result<Vec<PortAllocation>> {
        let mut allocations = Vec::with_capacity(specs.len());

        for spec in specs {
            let mut alloc = self
                .allocate_port(
                    spec.container_port,
                    worktree_index,
                    &spec.service_name,
                    spec.protocol,
                )
                .map_err(|e| {
                    let reason = match e {
                        Error::PortAllocation(msg) => msg,
                        other => other.to_string(),
                    };
                    Error::PortAllocation(format!(
                        "{}:{}: {reason}",
                        spec.service_name, spec.container_port
                    ))
                })?;
            alloc.label = spec.label.clone();

            self.known.push(alloc.clone());
            allocations.push(alloc);
        }

        Ok(allocations)
    }

    /// Scan the remainder of the candidate's 10 000-wide block, capped at
    /// the port-space ceiling.
    fn scan_block(&self, candidate: u16, protocol: Protocol) -> Option<u16> {
        let block_end = (u32::from(candidate) + SHIFT - 1).min(MAX_PORT) as u16;
        (candidate.checked_add(1)?..=block_end)
            .find(|&port| self.is_allocatable(port, protocol))
    }

    fn scan_ephemeral(&self, protocol: Protocol) -> Result<u16> {
        (EPHEMERAL_START..=EPHEMERAL_END)
            .find(|&port| self.is_allocatable(port, protocol))
            .ok_or_else(|| {
                Error::PortAllocation(format!(
                    "no available {protocol} port found in range {EPHEMERAL_START}-{EPHEMERAL_END}"
                ))
            })
    }

    /// Two-layer availability: not claimed by a known allocation with the
    /// same protocol, and free at the OS level. The known set also covers
    /// stopped environments, whose ports the OS probe alone would miss.
    fn is_allocatable(&self, port: u16, protocol: Protocol) -> bool {
        let claimed = self
            .known
            .iter()
            .any(|a| a.host_port == port && a.protocol == protocol);
        !claimed && self.scanner.is_available(port, protocol)
    }
}
