// Allow pre-existing clippy lints across the codebase
#![allow(
    clippy::collapsible_if,
    clippy::identity_op,
    clippy::len_without_is_empty,
    clippy::manual_range_contains,
    clippy::needless_lifetimes,
    clippy::needless_return,
    clippy::too_many_arguments
)]

/// Use mimalloc as the global allocator for all binaries.
/// 2-3x faster than glibc malloc for small allocations,
/// better thread-local caching, and reduced fragmentation.
/// Critical for the sort path, which decodes and compares
/// millions of small buffers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod cache;
pub mod checker;
pub mod creator;
pub mod error;
pub mod index;
pub mod list;
pub mod options;
pub mod sorter;
