//! Chip-level queries and control: heap statistics and restart.
//!
//! Off-target the heap figures are synthetic constants and restart ends
//! the process.

#[cfg(not(target_os = "espidf"))]
const SIM_FREE_HEAP: u32 = 200 * 1024;

/// Bytes currently free on the default heap.
#[cfg(target_os = "espidf")]
pub fn free_heap() -> u32 {
    // SAFETY: read-only allocator statistic.
    unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
}

#[cfg(not(target_os = "espidf"))]
pub fn free_heap() -> u32 {
    SIM_FREE_HEAP
}

/// Low-water mark of [`free_heap`] since boot.
#[cfg(target_os = "espidf")]
pub fn min_free_heap() -> u32 {
    // SAFETY: read-only allocator statistic.
    unsafe { esp_idf_svc::sys::esp_get_minimum_free_heap_size() }
}

#[cfg(not(target_os = "espidf"))]
pub fn min_free_heap() -> u32 {
    SIM_FREE_HEAP
}

#[cfg(target_os = "espidf")]
pub fn restart() -> ! {
    log::warn!("System: restarting");
    // SAFETY: does not return; the chip resets.
    unsafe { esp_idf_svc::sys::esp_restart() }
}

#[cfg(not(target_os = "espidf"))]
pub fn restart() -> ! {
    log::warn!("System(sim): restart requested, exiting");
    std::process::exit(0)
}
