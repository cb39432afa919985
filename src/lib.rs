// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # enumbox
//!
//! Whole-program enum unboxing for JVM-style bytecode optimizers.
//!
//! `enumbox` proves which enum classes of a program are only ever used in
//! ways an `int` can express, replaces their values with `ordinal + 1`
//! (`0` meaning `null`), removes the classes and rewrites every method that
//! touched them.
//!
//! ## Features
//!
//! - **🔍 Sound eligibility analysis** - Every use site is checked; an enum is unboxed only if all of them are expressible on ints
//! - **⚡ Parallel** - Methods are analyzed and rewritten in waves on a rayon pool
//! - **🧩 Lens chain** - Old member references map to their unboxed counterparts through composable lenses
//! - **📊 Diagnostics** - Every rejection is recorded with its reason; debug mode prints a full report
//! - **🛡️ Deterministic** - Names, helper order and reports do not depend on thread scheduling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use enumbox::prelude::*;
//!
//! let mut builder = ProgramBuilder::new();
//! let known = builder.known().clone();
//! let color = builder.enum_class("com.example.Color", |e| {
//!     e.constants(&["RED", "GREEN", "BLUE"]);
//! });
//! let red = color.constant(0);
//! builder.class("com.example.Main", |c| {
//!     c.static_method("red", known.int, &[], |f| {
//!         f.block(0, |b| {
//!             let value = b.get_static(red);
//!             let ordinal = b.call(InvokeKind::Virtual, known.enum_ordinal, &[value]);
//!             b.ret_val(ordinal);
//!         });
//!     });
//! });
//! let (mut app, ctx) = builder.build();
//!
//! let summary = unbox_program(&mut app, &ctx, EnumUnboxingConfig::default())?;
//! println!("unboxed {} enums", summary.unboxed.len());
//! # Ok::<(), enumbox::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`program`] - Interned symbols, class definitions, keep info and the lens chain
//! - [`analysis`] - SSA form of method bodies and def-use indexing
//! - [`compiler`] - Compiler context, event log, the wave scheduler and lens-driven code rewriting
//! - [`enums`] - The unboxing analysis, tree fixer, utility synthesis and code rewriter
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade: candidate pruning at `debug`,
//! per-instruction rewrites at `trace`, and the analysis report at `info`
//! when [`enums::EnumUnboxingConfig::debug_log`] is set.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

pub mod analysis;
pub mod compiler;
pub mod enums;
pub mod program;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use enumbox::prelude::*;
///
/// let (mut app, ctx) = ProgramBuilder::new().build();
/// let summary = unbox_program(&mut app, &ctx, EnumUnboxingConfig::default())?;
/// assert!(summary.unboxed.is_empty());
/// # Ok::<(), enumbox::Error>(())
/// ```
pub mod prelude;

/// `enumbox` Result type.
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `enumbox` Error type.
///
/// # Example
///
/// ```rust,no_run
/// use enumbox::{prelude::*, Error};
///
/// let (mut app, ctx) = ProgramBuilder::new().build();
/// let config = EnumUnboxingConfig::default().require_unboxed("com.example.Color");
/// match unbox_program(&mut app, &ctx, config) {
///     Ok(summary) => println!("unboxed {}", summary.unboxed.len()),
///     Err(Error::EnumsNotUnboxed { classes }) => println!("still boxed: {classes:?}"),
///     Err(e) => println!("error: {e}"),
/// }
/// ```
pub use error::Error;
