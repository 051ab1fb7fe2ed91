//! Fabula Store — conversation persistence and the pending-unit cache.
//!
//! Ships the in-memory [`MemoryStore`] (mirroring the product's local mode),
//! the single-slot [`PendingUnitCache`] the continuation scheduler hands
//! units through, and a filesystem [`FsMediaStore`].

mod fs_media;
mod memory;
mod pending;

pub use fs_media::FsMediaStore;
pub use memory::MemoryStore;
pub use pending::PendingUnitCache;
