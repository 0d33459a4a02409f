//! Verifier backend selection.
//!
//! The backend is set via the `FDTFUZZ_VERIFIER` environment variable:
//! - `plain` (default): null check plus a volatile read of each byte. Relies on
//!   whatever instrumentation the binary was built with to flag bad reads.
//! - `sanitizer`: ASan/MSan interface checks when the `asan`/`msan` features
//!   are enabled, plain reads otherwise.
//! - `shadow`: in-process registry seeded with the input blob. Flags any
//!   region that leaves the blob, with no sanitizer toolchain required.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::plain::PlainReadVerifier;
use crate::region::{MemRegion, RegionVerifier};
use crate::sanitizer::SanitizerVerifier;
use crate::shadow::ShadowVerifier;

/// Which verifier backend to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerifierKind {
    #[default]
    Plain,
    Sanitizer,
    Shadow,
}

impl VerifierKind {
    /// Parse from string (case-insensitive). Unknown values fall back to `Plain`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "sanitizer" | "asan" | "msan" | "san" => Self::Sanitizer,
            "shadow" | "bounds" => Self::Shadow,
            _ => Self::Plain,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Sanitizer => "sanitizer",
            Self::Shadow => "shadow",
        }
    }
}

// 0=unresolved, 1=Plain, 2=Sanitizer, 3=Shadow.
static CACHED_KIND: AtomicU8 = AtomicU8::new(0);

const KIND_UNRESOLVED: u8 = 0;
const KIND_PLAIN: u8 = 1;
const KIND_SANITIZER: u8 = 2;
const KIND_SHADOW: u8 = 3;

fn kind_to_u8(kind: VerifierKind) -> u8 {
    match kind {
        VerifierKind::Plain => KIND_PLAIN,
        VerifierKind::Sanitizer => KIND_SANITIZER,
        VerifierKind::Shadow => KIND_SHADOW,
    }
}

fn u8_to_kind(v: u8) -> VerifierKind {
    match v {
        KIND_SANITIZER => VerifierKind::Sanitizer,
        KIND_SHADOW => VerifierKind::Shadow,
        _ => VerifierKind::Plain,
    }
}

/// Get the configured backend (reads the env var on first call, caches thereafter).
#[must_use]
pub fn verifier_kind() -> VerifierKind {
    let cached = CACHED_KIND.load(Ordering::Relaxed);
    if cached != KIND_UNRESOLVED {
        return u8_to_kind(cached);
    }
    let kind = std::env::var("FDTFUZZ_VERIFIER")
        .map(|v| VerifierKind::from_str_loose(&v))
        .unwrap_or_default();
    // Racing first calls all read the same environment, so last store wins harmlessly.
    CACHED_KIND.store(kind_to_u8(kind), Ordering::Release);
    kind
}

/// A verifier chosen at runtime, ready for one input blob.
pub enum ConfiguredVerifier<'a> {
    Plain(PlainReadVerifier),
    Sanitizer(SanitizerVerifier),
    Shadow(ShadowVerifier<'a>),
}

impl<'a> ConfiguredVerifier<'a> {
    /// Build the backend for `blob`. Only the shadow backend needs the blob.
    #[must_use]
    pub fn for_blob(kind: VerifierKind, blob: &'a [u8]) -> Self {
        match kind {
            VerifierKind::Plain => Self::Plain(PlainReadVerifier::new()),
            VerifierKind::Sanitizer => Self::Sanitizer(SanitizerVerifier::new()),
            VerifierKind::Shadow => Self::Shadow(ShadowVerifier::for_blob(blob)),
        }
    }

    #[must_use]
    pub fn kind(&self) -> VerifierKind {
        match self {
            Self::Plain(_) => VerifierKind::Plain,
            Self::Sanitizer(_) => VerifierKind::Sanitizer,
            Self::Shadow(_) => VerifierKind::Shadow,
        }
    }
}

impl RegionVerifier for ConfiguredVerifier<'_> {
    fn verify(&self, region: MemRegion) {
        match self {
            Self::Plain(v) => v.verify(region),
            Self::Sanitizer(v) => v.verify(region),
            Self::Shadow(v) => v.verify(region),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Plain(v) => v.name(),
            Self::Sanitizer(v) => v.name(),
            Self::Shadow(v) => v.name(),
        }
    }
}
