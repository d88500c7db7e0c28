//! This module represents API for reading the nested tables in a linear
//! executable that `loader::Loader` needs to build an [`crate::core::image::Image`]:
//! the header, the object and object-page tables, and the fixup page/record
//! tables. The "Linear eXecutable" is the IBM standard for OS/2 - ArcaOS
//! operating systems, and "Linear Executable" is Microsoft's next format for
//! IA-32 protected mode applications.
//!
//! Unlike segmented "New Executables", those formats are documented badly
//! and most important structures for us are non-linear and difficult to
//! understand the first time.
//!
//! Most important structures the executable holds are the `fixup records
//! table` and the objects data (`objects table`, `object pages`). Fixup
//! tables tell us "what pointers need to resolve at runtime?" and object
//! pages hold the code and data which will be loaded into memory.
pub mod fpagetab;
pub mod frectab;
pub mod header;
pub mod objpagetab;
pub mod objtab;
