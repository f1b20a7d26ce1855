//! Unified adapter between the replicated log apply engine and
//! application state machines.
//!
//! The apply engine holds one [`ManagedStateMachine`] per replicated
//! object and drives it through a single uniform contract, regardless of
//! which of the three machine flavours the application supplied. The
//! variant is selected once, at construction, from the capability the
//! machine declares; all variant-specific behavior stays behind the
//! adapter.
//!
//! ```text
//! ┌──────────────┐     ┌─────────────────────┐     ┌──────────────────────┐
//! │ Apply engine │────▶│ ManagedStateMachine │────▶│ application machine  │
//! │ (external)   │     │  ├─ Regular         │     │ one of three flavours│
//! └──────────────┘     │  ├─ Concurrent      │     └──────────────────────┘
//!                      │  └─ OnDisk          │
//!                      └─────────────────────┘
//! ```
//!
//! The contract separates two failure channels. Errors surfaced by the
//! wrapped machine come back as [`statemachine::SmError`] for the caller
//! to handle. Calling an operation a variant does not support — updating
//! a regular machine with a batch, opening anything but an on-disk
//! machine, touching an on-disk machine before `open` — is a caller bug,
//! not a runtime condition, and panics.
//!
//! # Modules
//!
//! - [`managed`]: the closed union dispatching the uniform contract
//! - [`regular`]: adapter for single-entry synchronous machines
//! - [`concurrent`]: adapter for batched machines with snapshot isolation
//! - [`disk`]: adapter for machines backed by durable storage

pub mod concurrent;
pub mod disk;
pub mod managed;
pub mod regular;

pub use concurrent::ConcurrentAdapter;
pub use disk::OnDiskAdapter;
pub use managed::ManagedStateMachine;
pub use regular::RegularAdapter;
