//! Utility functions and types used throughout dramloc.
//!
//! This module provides:
//! - [`Size`] - Memory size representation, parseable from strings like `64GB`
//! - Constants for address decoding ([`PAGE_SIZE`], [`PHYS_ADDR_LIMIT`], etc.)
//! - [`os_page_size`] - The page size of the running system
//! - Progress reporting utilities ([`NamedProgress`])

mod constants;
mod named_progress;
mod size;

pub use self::constants::*;
pub use self::named_progress::NamedProgress;
pub use self::size::{ParseSizeError, Size};

/// Returns the page size of the running system.
///
/// Falls back to [`PAGE_SIZE`] if the system does not report one.
pub fn os_page_size() -> u64 {
    // SAFETY: sysconf has no preconditions
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        PAGE_SIZE as u64
    } else {
        size as u64
    }
}
