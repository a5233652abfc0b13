//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements exactly one step of a single conversion.
//!
//! ## Data Flow
//!
//! ```text
//! workspace ──▶ compile ──▶ invoke
//! (docs/ + output/)  (pandoc.yaml, eisvogel.yaml)  (pandoc + LaTeX)
//! ```
//!
//! 1. [`workspace`] — allocate a private directory tree and store the
//!    uploaded sources under sanitised names
//! 2. [`compile`]   — turn request options into the defaults and metadata
//!    documents pandoc reads
//! 3. [`invoke`]    — run the converter with a deadline and decide whether
//!    it produced a PDF
//!
//! Storing the result and removing the workspace are the caller's job; see
//! [`crate::convert`].

pub mod compile;
pub mod invoke;
pub mod workspace;
