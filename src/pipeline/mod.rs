//! Parsing stages: from a PDF to a consolidated pitch record.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text ──▶ llm ──▶ consolidate
//! (path/URL) (pages)  (fields  (one record)
//!                     per page)
//! ```
//!
//! 1. [`input`]: load a local file or download a URL, validate PDF magic
//! 2. [`text`]: split the text layer into numbered pages
//! 3. [`llm`]: ask the extraction oracle for nine fields per page
//! 4. [`consolidate`]: pick one value per field across pages

pub mod consolidate;
pub mod input;
pub mod llm;
pub mod text;
