#![forbid(unsafe_code)]

//! Connector options and build-mode detection.
//!
//! [`ConnectOptions`] is fixed per `connect()` call site. [`BuildMode`]
//! decides whether development-only checks run: mapper-shape validation and
//! live-reload reconciliation. In [`BuildMode::Optimized`] both are inert.
//!
//! The mode is detected once per process from `FTUI_CONNECT_MODE`
//! (`dev`, `development`, `prod`, `optimized`, `release`), falling back to
//! `cfg!(debug_assertions)` when unset or unrecognized.

use std::sync::OnceLock;

/// Environment variable overriding the detected build mode.
pub const MODE_ENV_VAR: &str = "FTUI_CONNECT_MODE";

/// Whether development-only checks are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMode {
    /// Validate mapper output and honour live reloads.
    Development,
    /// Skip validation; reload versions are ignored.
    Optimized,
}

impl BuildMode {
    /// Cached process-wide mode (environment, then build profile).
    #[must_use]
    pub fn detect() -> Self {
        static MODE: OnceLock<BuildMode> = OnceLock::new();
        *MODE.get_or_init(|| mode_from_env(|key| std::env::var(key).ok()))
    }

    /// Whether this is [`BuildMode::Development`].
    #[inline]
    #[must_use]
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl Default for BuildMode {
    fn default() -> Self {
        Self::detect()
    }
}

#[inline]
fn parse_mode(value: &str) -> Option<BuildMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "dev" | "development" | "debug" => Some(BuildMode::Development),
        "prod" | "production" | "optimized" | "release" => Some(BuildMode::Optimized),
        _ => None,
    }
}

/// Compute the build mode using a custom environment lookup.
pub fn mode_from_env<F>(get_env: F) -> BuildMode
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(mode) = get_env(MODE_ENV_VAR).as_deref().and_then(parse_mode) {
        return mode;
    }
    if cfg!(debug_assertions) {
        BuildMode::Development
    } else {
        BuildMode::Optimized
    }
}

/// Options fixed at `connect()` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Assume immutable state and props; enables shallow-equality
    /// short-circuiting of updates.
    pub pure: bool,
    /// Expose the wrapped component instance through
    /// `wrapped_instance()`.
    pub with_ref: bool,
    /// Development checks on or off.
    pub mode: BuildMode,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            pure: true,
            with_ref: false,
            mode: BuildMode::detect(),
        }
    }
}

impl ConnectOptions {
    /// Default options: pure, no ref access, detected mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a connector that re-renders on every change.
    #[must_use]
    pub fn impure() -> Self {
        Self {
            pure: false,
            ..Self::default()
        }
    }

    /// Set pure mode.
    #[must_use]
    pub fn with_pure(mut self, pure: bool) -> Self {
        self.pure = pure;
        self
    }

    /// Enable or disable imperative access to the wrapped instance.
    #[must_use]
    pub fn with_ref(mut self, with_ref: bool) -> Self {
        self.with_ref = with_ref;
        self
    }

    /// Pin the build mode instead of using the detected one.
    #[must_use]
    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }
}
