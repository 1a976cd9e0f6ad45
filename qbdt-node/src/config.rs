//! Environment configuration loading from .env files
//!
//! Loads numerical tolerance and concurrency toggles from .env or environment
//! variables. Values are read once and cached for the lifetime of the process.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

// Automatically load .env when config module is accessed
static DOTENV_INIT: Lazy<()> = Lazy::new(|| {
    let _ = dotenv::dotenv();
});

/// Ensure environment is loaded
#[inline]
fn ensure_loaded() {
    let _ = &*DOTENV_INIT;
}

/// Squared-magnitude tolerance shared by zero tests, equality, prune and
/// separability detection.
/// Default: 1e-12
pub fn norm_epsilon() -> f64 {
    ensure_loaded();
    env::var("QBDT_NORM_EPSILON")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|v: &f64| v.is_finite() && *v >= 0.0)
        .unwrap_or(1e-12)
}

/// Runtime fork/join toggle
/// Default: true
pub fn parallel_enabled() -> bool {
    ensure_loaded();
    env::var("QBDT_PARALLEL")
        .ok()
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Some(true),
            "0" | "false" | "off" | "no" => Some(false),
            _ => None,
        })
        .unwrap_or(true)
}

/// Default fork budget for recursive operations
/// Default: floor(log2(available cores))
pub fn parallel_depth() -> u32 {
    ensure_loaded();
    env::var("QBDT_PARALLEL_DEPTH")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(default_parallel_depth)
}

/// floor(log2(available cores)), 0 when the core count is unknown
fn default_parallel_depth() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get().ilog2())
        .unwrap_or(0)
}

/// Separability threshold used by callers deciding when to hand this core a
/// dense leaf. Not interpreted here.
/// Default: 0.0
pub fn separability_threshold() -> f64 {
    ensure_loaded();
    env::var("QBDT_SEPARABILITY_THRESHOLD")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0)
}

/// Cached values
pub static NORM_EPSILON: Lazy<f64> = Lazy::new(norm_epsilon);
pub static PARALLEL_ENABLED: Lazy<bool> = Lazy::new(parallel_enabled);
pub static PARALLEL_DEPTH: Lazy<u32> = Lazy::new(parallel_depth);
pub static SEPARABILITY_THRESHOLD: Lazy<f64> = Lazy::new(separability_threshold);

/// Tolerância ativa (ε sobre |z|²)
#[inline]
pub fn epsilon() -> f64 {
    *NORM_EPSILON
}

/// Configuração efetiva do núcleo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QbdtConfig {
    /// Tolerância sobre magnitude ao quadrado
    pub norm_epsilon: f64,
    /// Fork/join habilitado em tempo de execução
    pub parallel: bool,
    /// Orçamento de profundidade paralela
    pub parallel_depth: u32,
    /// Limiar de separabilidade (consumido pelo chamador)
    pub separability_threshold: f64,
}

impl Default for QbdtConfig {
    fn default() -> Self {
        Self {
            norm_epsilon: 1e-12,
            parallel: true,
            parallel_depth: default_parallel_depth(),
            separability_threshold: 0.0,
        }
    }
}

impl QbdtConfig {
    /// Snapshot dos valores em cache
    pub fn from_env() -> Self {
        Self {
            norm_epsilon: *NORM_EPSILON,
            parallel: *PARALLEL_ENABLED && cfg!(feature = "parallel"),
            parallel_depth: *PARALLEL_DEPTH,
            separability_threshold: *SEPARABILITY_THRESHOLD,
        }
    }
}
