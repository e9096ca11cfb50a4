//! Linux process memory introspection
//!
//! Uses /proc/self/status. There is no managed heap in a Rust process, so the
//! anonymous resident memory stands in for "heap used" and the data segment
//! size (which contains the allocator's arenas) for "heap total".

use super::{MemoryIntrospector, MemoryReading};
use crate::error::{Error, Result};
use procfs::process::Process;

const KIB: u64 = 1024;

#[derive(Debug, Default)]
pub struct ProcessMemoryIntrospector;

impl ProcessMemoryIntrospector {
    pub fn new() -> Self {
        Self
    }
}

impl MemoryIntrospector for ProcessMemoryIntrospector {
    fn sample(&self) -> Result<MemoryReading> {
        let process = Process::myself()
            .map_err(|e| Error::Collection(format!("Failed to open /proc/self: {}", e)))?;
        let status = process
            .status()
            .map_err(|e| Error::Collection(format!("Failed to read /proc/self/status: {}", e)))?;

        let rss = status
            .vmrss
            .ok_or_else(|| Error::Collection("VmRSS missing from /proc/self/status".to_string()))?;
        let heap_used = status.rssanon.unwrap_or(rss);
        let heap_total = status.vmdata.unwrap_or(heap_used).max(heap_used);
        let external = status.rssfile.unwrap_or(0) + status.rssshmem.unwrap_or(0);

        Ok(MemoryReading {
            heap_used: heap_used * KIB,
            heap_total: heap_total * KIB,
            rss: rss * KIB,
            external: external * KIB,
        })
    }

    fn platform_name(&self) -> &str {
        "linux"
    }
}
