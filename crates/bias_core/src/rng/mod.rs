//! # Random Number Generation
//!
//! Seeded random number generation for transport workers.
//!
//! ## Design Rationale
//!
//! - **Reproducibility**: every generator is seeded and remembers its seed
//! - **Independence**: each worker derives its own stream from the run seed,
//!   so no generator is ever shared between threads
//! - **Static dispatch**: a concrete wrapper type is passed by `&mut`
//!
//! ## Usage Example
//!
//! ```rust
//! use bias_core::rng::TransportRng;
//!
//! let mut rng = TransportRng::from_seed(2024);
//!
//! let u = rng.gen_uniform();
//! assert!((0.0..1.0).contains(&u));
//!
//! // Independent stream for worker 3
//! let worker = TransportRng::stream(2024, 3);
//! assert_ne!(worker.seed(), rng.seed());
//! ```

mod prng;

pub use prng::TransportRng;
