// =============================================================================
// Playback Engine
// =============================================================================
// Adapters, merged state, persistence and continuation. The player module
// wires these together into one event loop.

pub mod continuation;
pub mod local;
pub mod progress;
pub mod remote;
pub mod resolver;
pub mod store;

pub use continuation::{ContinuationEngine, ContinuationTrigger, EndReason};
pub use local::{LocalMediaAdapter, LocalPlayerError};
pub use progress::ProgressTracker;
pub use remote::{scan_devices, CastError, CastTransport, CattTransport, RemoteSessionAdapter};
pub use resolver::StreamUrlResolver;
pub use store::PlaybackStateStore;
