//! This crate provides format specifications of legacy
//! file formats what uses mostly in IBM OS/2 different versions and revisions
//!
//! Information which represented here bases mostly on official documents
//! by IBM and Microsoft, but some of the facts from there are invalid and fixed.
//! 
//! ### Support
//!
//! This crate supports formats of executables:
//!  - `MZ (mod exe)` DOS 16-bit executables, as the DOS stub preceding an LE/LX module
//!  - `LE (mod exe386)` Microsoft OS/2 2.0+ and Windows 9x VxDs 16-32-bit
//!  - `LX (mod exe386)` IBM OS/2 2.0-4.5 16-32-bit executables
//!
//! On top of those container formats, this crate disassembles a loaded
//! module into a labeled code/data/vtable listing (see [`core`], [`loader`],
//! [`printer`]).
//!
//! ### Issues
//! List what has written here is temporary, I hope.
//! I really want to fix all known problems and specially warn you about most serious of them.
//!
//! - Crate works correctly only with `LittleEndian` linked files;
//! - Some of the structures are undocumented;
//! - No correct data-container for values (the worst for cross-platform compilation);
//!

/// 16-bit DOS Executables
pub mod exe;
/// Microsoft-IBM 16-32-bit Linear Executables
pub mod exe386;

/// The analysis core: image model, region/label maps, decoder, driver.
pub mod core;
/// LE/LX loader: builds a fixup-patched `core::image::Image` plus entry point.
pub mod loader;
/// Renders the completed analysis as a GNU-`as`-style listing.
pub mod printer;
/// CLI argument parsing.
pub mod cli;
/// Crate-wide error type.
pub mod error;
