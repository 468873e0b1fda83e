//! Core library for pdfdigest
//!
//! This crate implements the **Functional Core** of the pdfdigest application,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! - **`pdfdigest_core`** (this crate): pure transformations with zero I/O
//! - **`pdf`**: page decoding and structure detection
//! - **`pdfdigest`**: file, model and terminal I/O (the Imperative Shell)
//!
//! Every function here takes plain values and returns plain values, so the
//! tests build fixture data directly and never touch the filesystem or the
//! model server.
//!
//! # Module Organization
//!
//! - [`stats`]: tokenization, stop-word filtering and word frequencies
//! - [`report`]: rendering of the Markdown report blocks
//! - [`summary`]: prompt construction and model response cleanup
//! - [`paths`]: output locations derived from the input file name

pub mod paths;
pub mod report;
pub mod stats;
pub mod summary;
