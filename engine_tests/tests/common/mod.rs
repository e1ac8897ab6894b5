//! Resource types and helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, ensure};
use engine_core::prelude::*;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

pub fn registry(name: &str) -> Registry {
    Registry::with_config(RegistryConfig {
        log_lifecycle: false,
        ..RegistryConfig::named(name)
    })
}

/// Construction/destruction counters for one test.
#[derive(Debug, Default)]
pub struct Stats {
    built: AtomicUsize,
    dropped: AtomicUsize,
}

impl Stats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn alive(&self) -> usize {
        self.built() - self.dropped()
    }
}

/// Texture constructor arguments.
#[derive(Clone)]
pub struct TextureDesc {
    pub stats: Arc<Stats>,
    pub width: u32,
    /// Time spent "decoding", to widen construction races.
    pub decode_time: Duration,
}

impl TextureDesc {
    pub fn new(stats: &Arc<Stats>, width: u32) -> Self {
        Self {
            stats: stats.clone(),
            width,
            decode_time: Duration::ZERO,
        }
    }

    pub fn slow(mut self, decode_time: Duration) -> Self {
        self.decode_time = decode_time;
        self
    }
}

pub struct Texture {
    pub key: Guid,
    pub width: u32,
    /// Construction order within the test, distinguishes fresh instances.
    pub serial: usize,
    stats: Arc<Stats>,
}

impl RefCounted for Texture {
    type Args = TextureDesc;

    fn create(key: &Guid, desc: TextureDesc) -> anyhow::Result<Self> {
        if desc.width == 0 {
            bail!("texture {key} has zero width");
        }
        if !desc.decode_time.is_zero() {
            std::thread::sleep(desc.decode_time);
        }
        let serial = desc.stats.built.fetch_add(1, Ordering::SeqCst);
        Ok(Texture {
            key: *key,
            width: desc.width,
            serial,
            stats: desc.stats,
        })
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.stats.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// A resource whose constructor acquires handles to other resources.
pub struct Material {
    pub albedo: Handle<Texture>,
    pub normal: Handle<Texture>,
}

pub struct MaterialDesc {
    pub registry: Registry,
    pub albedo: String,
    pub normal: String,
    pub textures: TextureDesc,
}

impl RefCounted for Material {
    type Args = MaterialDesc;

    fn create(_key: &Guid, desc: MaterialDesc) -> anyhow::Result<Self> {
        let albedo = Texture::try_get_handle_in(&desc.registry, desc.albedo.as_str(), desc.textures.clone())?;
        let normal = Texture::get_handle_in(&desc.registry, desc.normal.as_str(), desc.textures);
        ensure!(normal.is_valid(), "normal map '{}' failed to load", desc.normal);
        Ok(Material { albedo, normal })
    }
}
