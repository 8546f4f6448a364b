//! Solver configuration, named presets and override merging.
//!
//! Presets are pure data: each names a complete [`SolverConfig`]. Resolution
//! merges a preset with explicit per-field overrides, overrides always
//! winning. Resolution performs no semantic validation: a nonsensical
//! tolerance passes through here and is rejected by the solver constructor,
//! which is the single place that validates parameter semantics.

use thiserror::Error;

/// Configuration errors. All of these are fatal: they abort the invocation
/// before any trial runs.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A preset name outside the registered preset table
    #[error("Unknown preset '{name}' (expected one of: default, strict, fast)")]
    UnknownPreset { name: String },

    /// The convergence tolerance must be strictly positive
    #[error("Tolerance must be strictly positive, got {tol}")]
    NonPositiveTolerance { tol: f64 },

    /// The iteration cap must be at least one
    #[error("Iteration cap must be at least 1")]
    ZeroIterationCap,
}

/// Parameters of the damped Gauss-Newton solver.
///
/// Build one from a preset via [`resolve`], or directly with the `with_*`
/// builders:
///
/// ```
/// use multistart::solver::presets::SolverConfig;
///
/// let config = SolverConfig::default()
///     .with_tol(1e-10)
///     .with_max_iterations(500);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Convergence tolerance on the residual norm ‖r(x)‖₂.
    pub tol: f64,
    /// Iteration cap.
    pub max_iterations: usize,
    /// Sufficient-decrease constant for the Armijo condition.
    pub armijo_c: f64,
    /// Multiplicative step-size reduction per backtracking attempt.
    pub backtrack_factor: f64,
    /// Backtracking attempt budget before the line search gives up.
    pub max_backtracks: usize,
    /// Trial step size the line search starts from.
    pub initial_step: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Preset::Default.config()
    }
}

impl SolverConfig {
    /// Set the convergence tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the Armijo sufficient-decrease constant.
    pub fn with_armijo_c(mut self, armijo_c: f64) -> Self {
        self.armijo_c = armijo_c;
        self
    }

    /// Set the backtracking reduction factor.
    pub fn with_backtrack_factor(mut self, backtrack_factor: f64) -> Self {
        self.backtrack_factor = backtrack_factor;
        self
    }

    /// Set the backtracking attempt budget.
    pub fn with_max_backtracks(mut self, max_backtracks: usize) -> Self {
        self.max_backtracks = max_backtracks;
        self
    }

    /// Set the initial trial step size.
    pub fn with_initial_step(mut self, initial_step: f64) -> Self {
        self.initial_step = initial_step;
        self
    }

    /// Check parameter semantics. Called by the solver constructor; callers
    /// that build machines in a loop can fail fast by calling it once
    /// up front.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tol > 0.0) {
            return Err(ConfigError::NonPositiveTolerance { tol: self.tol });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::ZeroIterationCap);
        }
        Ok(())
    }
}

/// The registered preset table, as a closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Balanced defaults for benchmarking.
    Default,
    /// Tight tolerance, generous iteration and backtracking budgets.
    Strict,
    /// Loose tolerance and small budgets for quick smoke runs.
    Fast,
}

impl Preset {
    /// Resolve a preset by name. Unknown names are a fatal configuration
    /// error, never a silent fallback.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "default" => Ok(Preset::Default),
            "strict" => Ok(Preset::Strict),
            "fast" => Ok(Preset::Fast),
            _ => Err(ConfigError::UnknownPreset {
                name: name.to_string(),
            }),
        }
    }

    /// The preset's registered name.
    pub fn name(self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Strict => "strict",
            Preset::Fast => "fast",
        }
    }

    /// The parameter bundle this preset names.
    pub fn config(self) -> SolverConfig {
        match self {
            Preset::Default => SolverConfig {
                tol: 1e-8,
                max_iterations: 200,
                armijo_c: 1e-4,
                backtrack_factor: 0.5,
                max_backtracks: 40,
                initial_step: 1.0,
            },
            Preset::Strict => SolverConfig {
                tol: 1e-12,
                max_iterations: 1000,
                armijo_c: 1e-4,
                backtrack_factor: 0.5,
                max_backtracks: 60,
                initial_step: 1.0,
            },
            Preset::Fast => SolverConfig {
                tol: 1e-6,
                max_iterations: 50,
                armijo_c: 1e-4,
                backtrack_factor: 0.5,
                max_backtracks: 20,
                initial_step: 1.0,
            },
        }
    }
}

/// Explicit per-field overrides applied on top of a preset.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub tol: Option<f64>,
    pub max_iterations: Option<usize>,
    pub armijo_c: Option<f64>,
    pub backtrack_factor: Option<f64>,
    pub max_backtracks: Option<usize>,
    pub initial_step: Option<f64>,
}

/// Merge a named preset with explicit overrides, overrides winning
/// field by field.
pub fn resolve(preset_name: &str, overrides: &Overrides) -> Result<SolverConfig, ConfigError> {
    let mut config = Preset::from_name(preset_name)?.config();
    if let Some(tol) = overrides.tol {
        config.tol = tol;
    }
    if let Some(max_iterations) = overrides.max_iterations {
        config.max_iterations = max_iterations;
    }
    if let Some(armijo_c) = overrides.armijo_c {
        config.armijo_c = armijo_c;
    }
    if let Some(backtrack_factor) = overrides.backtrack_factor {
        config.backtrack_factor = backtrack_factor;
    }
    if let Some(max_backtracks) = overrides.max_backtracks {
        config.max_backtracks = max_backtracks;
    }
    if let Some(initial_step) = overrides.initial_step {
        config.initial_step = initial_step;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_without_overrides_is_preset() {
        let config = resolve("strict", &Overrides::default()).unwrap();
        assert_eq!(config, Preset::Strict.config());
    }

    #[test]
    fn test_overrides_win_field_by_field() {
        let overrides = Overrides {
            tol: Some(1e-3),
            max_iterations: Some(7),
            ..Overrides::default()
        };
        let config = resolve("default", &overrides).unwrap();
        assert_eq!(config.tol, 1e-3);
        assert_eq!(config.max_iterations, 7);
        // Untouched fields come from the preset.
        assert_eq!(config.max_backtracks, Preset::Default.config().max_backtracks);
    }

    #[test]
    fn test_unknown_preset_is_typed_error() {
        let err = resolve("turbo", &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPreset { .. }));
    }

    #[test]
    fn test_resolution_does_not_validate_semantics() {
        // A nonsensical override passes resolution; the solver constructor
        // is the validation point.
        let overrides = Overrides {
            tol: Some(-1.0),
            ..Overrides::default()
        };
        let config = resolve("default", &overrides).unwrap();
        assert_eq!(config.tol, -1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_iteration_cap() {
        let config = SolverConfig::default().with_max_iterations(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroIterationCap)
        ));
    }

    #[test]
    fn test_preset_names_round_trip() {
        for preset in [Preset::Default, Preset::Strict, Preset::Fast] {
            assert_eq!(Preset::from_name(preset.name()).unwrap(), preset);
        }
    }
}
