//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! - [`page`]: `FakePage`, a scriptable in-memory [`PageSurface`](crate::surface::PageSurface).

pub mod page;

pub use page::{FakeClick, FakeElement, FakePage, FakeRow};
