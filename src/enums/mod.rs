//! Enum unboxing: replacing enum objects with `int` ordinals.
//!
//! An enum qualifies when every use of its values can be expressed on
//! integers. Each value then becomes `ordinal + 1`, and `0` stands for
//! `null`. The enum class disappears, its methods move into a synthesized
//! utility class, and every method mentioning it is rewritten.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Enum Unboxing                             │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CandidateRegistry            enums that may still be unboxed    │
//! │                                                                  │
//! │  EnumUnboxer                                                     │
//! │    ├─ prepare()               collect and pre-filter candidates  │
//! │    ├─ analyze_method()        record reasons per use site        │
//! │    ├─ finish_analysis()       build the EnumDataMap              │
//! │    └─ unbox_enums()           utility classes, tree fixer, lens  │
//! │                                                                  │
//! │  EnumUnboxingTreeFixer        moves members, retypes signatures  │
//! │  EnumUnboxingLens             old references to new references   │
//! │  EnumUnboxingRewriter         enum operations to int operations  │
//! │  EnumUnboxingUtilityClasses   helpers the rewritten code calls   │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`unbox_program`] runs all of it over an [`crate::program::AppView`].
//!
//! # Example
//!
//! ```rust,ignore
//! use enumbox::prelude::*;
//!
//! let mut builder = ProgramBuilder::new();
//! let color = builder.enum_class("com.example.Color", |e| {
//!     e.constants(&["RED", "GREEN", "BLUE"]);
//! });
//! let (mut app, ctx) = builder.build();
//!
//! let summary = unbox_program(&mut app, &ctx, EnumUnboxingConfig::default())?;
//! assert_eq!(summary.unboxed, vec![color.ty]);
//! ```

mod analyzer;
mod candidates;
mod config;
mod data;
mod finalize;
mod lens;
mod passes;
mod reason;
mod report;
mod rewriter;
mod treefixer;
mod unboxer;
mod utility;

pub use candidates::{CandidateRegistry, EnumCandidate};
pub use config::{EnumUnboxingConfig, DEFAULT_MAX_INSTANCE_FIELDS};
pub use data::{unboxed_value, EnumData, EnumDataMap, InstanceFieldData};
pub use lens::{EnumUnboxingLens, EnumUnboxingLensBuilder};
pub use passes::{EnumUnboxingAnalysisPass, EnumUnboxingRewritePass};
pub use reason::{EnumInstanceRef, Reason, ReasonKind};
pub use report::AnalysisReport;
pub use rewriter::EnumUnboxingRewriter;
pub use treefixer::{CheckNotZeroMethods, EnumUnboxingTreeFixer, TreeFixResult};
pub use unboxer::{unbox_program, EnumUnboxer, UnboxingPlan, UnboxingSummary};
pub use utility::{EnumUnboxingUtilityClasses, UtilityMethodKind};
