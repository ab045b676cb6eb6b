//! deskcoach: front-desk reply trainer.
//!
//! A trainee answers a hotel guest scenario; a language-model "manager"
//! scores the reply for policy, tone and clarity and suggests a rewrite in
//! house style. The library covers the grading contract end to end:
//! profile loading, prompt construction, the provider call and strict
//! validation of the structured answer.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod providers;

pub mod profile;
pub mod reference;
pub mod scenario;

pub mod grading;
pub mod render;
pub mod session;

pub use error::{CoachError, SchemaViolation, TransportKind};
