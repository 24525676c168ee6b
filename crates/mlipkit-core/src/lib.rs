//! # mlipkit Core Library
//!
//! A library for configuring and running atomistic simulation tasks
//! (single-point property evaluation and geometry optimization) against a
//! pluggable interatomic-potential calculator.
//!
//! ## Architectural Philosophy
//!
//! The library is split into three layers with a strict dependency direction:
//!
//! - **[`core`]: The Foundation.** Stateless data models ([`core::models::structure::Structure`]),
//!   structure file I/O (`extxyz`), and the [`core::kwargs`] value type that
//!   free-form CLI options decode into.
//!
//! - **[`calculator`] and [`optimize`]: The Services.** The calculator seam
//!   (trait, factory, and the built-in pair-potential backends) and the FIRE
//!   geometry optimizer with its optional cell-deformation filter. Both are
//!   configured by plain data and report progress through [`progress`].
//!   [`analysis`] post-processes the trajectories the optimizer records.
//!
//! - **[`workflows`]: The Public API.** Ties the services together into
//!   complete tasks. [`workflows::single_point::Session`] is the entry point
//!   shared by single-point evaluation and geometry optimization: a loaded
//!   structure with an attached calculator and an open session log.

pub mod analysis;
pub mod calculator;
pub mod core;
pub mod logging;
pub mod optimize;
pub mod progress;
pub mod workflows;
