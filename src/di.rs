//! Dependency resolution.
//!
//! Services are built from the application [`Context`](crate::context::Context)
//! through the `FromRef` trait: each service declares how to pull its
//! dependencies out of the context, and callers write
//! `ChainService::from_ref(&ctx)` without wiring anything by hand.
//!
//! # Example
//!
//! ```ignore
//! use flowchain::di::FromRef;
//!
//! let ctx = Context::new(MemoryBackend::new(), Config::default());
//! let chains = ChainService::from_ref(&ctx);
//! ```

/// Trait for extracting a value from a reference to another type.
pub trait FromRef<T> {
    fn from_ref(input: &T) -> Self;
}

/// Blanket implementation: any Clone type can be extracted from itself.
impl<T: Clone> FromRef<T> for T {
    fn from_ref(input: &T) -> Self {
        input.clone()
    }
}
