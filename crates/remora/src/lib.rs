#![forbid(unsafe_code)]

//! `remora` is a headless analytics chart engine.
//!
//! It takes a declarative chart configuration, validates it, reconciles it
//! against an analytics backend in two sequential requests (metadata, then
//! data), and produces a fully specified [`ChartModel`]. Drawing the model is
//! left to the embedding application.
//!
//! The crate is runtime-agnostic: the [`Engine`] exposes `async` entry points
//! but never spawns tasks or performs I/O itself. Transport lives behind the
//! [`AnalyticsSource`] trait supplied by the caller.

pub use remora_core::*;

mod engine;

pub use engine::{AnalyticsSource, Engine, EngineError, RenderOutcome, RenderedChart, SourceError};
