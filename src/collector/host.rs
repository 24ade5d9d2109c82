//! Host configuration scalars needed for unit conversion.

/// Page size and clock tick rate of the sampled host.
///
/// Both are normally obtained from `getconf PAGESIZE` and `getconf CLK_TCK`.
/// Resolving them is left to the caller; readers and the rate engine only
/// consume the values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostParams {
    /// Bytes per memory page.
    pub page_size: u64,
    /// Clock ticks per second (USER_HZ).
    pub clock_ticks: u64,
}

impl HostParams {
    pub const DEFAULT_PAGE_SIZE: u64 = 4096;
    pub const DEFAULT_CLOCK_TICKS: u64 = 100;

    pub fn new(page_size: u64, clock_ticks: u64) -> Self {
        Self {
            page_size,
            clock_ticks,
        }
    }
}

impl Default for HostParams {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE_SIZE, Self::DEFAULT_CLOCK_TICKS)
    }
}
