//! Engine registry
//!
//! Static table mapping engine names to constructors. Every engine is
//! compiled in; there is no runtime registration.

use tracing::debug;

use crate::config::Config;
use crate::engines::{BlackholeEngine, VcmapEngine, VsmapEngine};
use crate::error::{KvError, Result};
use crate::stree::StreeEngine;

use super::Engine;

type Constructor = fn(Config) -> Result<Box<dyn Engine>>;

const ENGINES: &[(&str, Constructor)] = &[
    ("blackhole", open_blackhole),
    ("vsmap", open_vsmap),
    ("vcmap", open_vcmap),
    ("stree", open_stree),
];

fn open_blackhole(config: Config) -> Result<Box<dyn Engine>> {
    Ok(Box::new(BlackholeEngine::open(config)?))
}

fn open_vsmap(config: Config) -> Result<Box<dyn Engine>> {
    Ok(Box::new(VsmapEngine::open(config)?))
}

fn open_vcmap(config: Config) -> Result<Box<dyn Engine>> {
    Ok(Box::new(VcmapEngine::open(config)?))
}

fn open_stree(config: Config) -> Result<Box<dyn Engine>> {
    Ok(Box::new(StreeEngine::open(config)?))
}

/// Construct the engine registered as `name`, handing it `config`
///
/// The config is consumed even on failure, so objects it owns are released.
pub fn open(name: &str, config: Config) -> Result<Box<dyn Engine>> {
    let (_, constructor) = ENGINES
        .iter()
        .find(|(engine, _)| *engine == name)
        .ok_or_else(|| KvError::WrongEngineName(name.to_string()))?;

    let engine = constructor(config)?;
    debug!(engine = name, "Opened engine");
    Ok(engine)
}

/// Names of all registered engines
pub fn engine_names() -> impl Iterator<Item = &'static str> {
    ENGINES.iter().map(|(name, _)| *name)
}
