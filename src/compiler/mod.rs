//! Compiler infrastructure for SSA-based whole-program transformations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Compiler Pipeline                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CompilerContext              Shared cross-method state          │
//! │    ├─ SSA functions           (per-method bodies)                │
//! │    ├─ processed / no_peephole                                    │
//! │    └─ EventLog                                                   │
//! │                                                                  │
//! │  PassScheduler               Wave-based parallel execution       │
//! │    ├─ sorted methods split into waves                            │
//! │    └─ on_wave_done() after each wave                             │
//! │                                                                  │
//! │  SsaPass trait               Interface for all passes            │
//! │    ├─ run_on_method()         Per-method transformation          │
//! │    ├─ initialize()            One-time setup                     │
//! │    └─ finalize()              Cleanup after the last wave        │
//! │                                                                  │
//! │  LensCodeRewriter            Applies a lens layer to a body      │
//! │  EventLog                    Change tracking and diagnostics     │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod context;
mod events;
mod pass;
mod remap;
mod scheduler;

pub use context::CompilerContext;
pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use pass::SsaPass;
pub use remap::{LensCodeRewriter, LensRewrite};
pub use scheduler::{PassScheduler, DEFAULT_WAVE_SIZE};
