//! Configuration for the enum unboxer.

use crate::compiler::DEFAULT_WAVE_SIZE;

/// Default maximum number of instance fields an unboxable enum may declare.
pub const DEFAULT_MAX_INSTANCE_FIELDS: usize = 7;

/// Configuration for enum unboxing.
///
/// # Examples
///
/// ```rust,ignore
/// use enumbox::enums::EnumUnboxingConfig;
///
/// let config = EnumUnboxingConfig::debug().require_unboxed("com.example.Color");
/// assert!(config.debug_log);
/// ```
#[derive(Debug, Clone)]
pub struct EnumUnboxingConfig {
    /// Run the pass at all (default: true).
    pub enabled: bool,

    /// Unbox enums whose constants have bodies (default: true).
    pub allow_subtypes: bool,

    /// Collect every rejection reason and print the analysis report
    /// (default: false). Rejected enums stay candidates until the end of the
    /// analysis instead of being dropped at the first reason.
    pub debug_log: bool,

    /// Enums declaring more instance fields are not unboxed (default: 7).
    pub max_instance_fields: usize,

    /// Accept `Enum.<init>` calls from any instance initializer of the
    /// representative enum and from its class initializer (default: false).
    pub init_using_superclass_constructor: bool,

    /// Canonical names of enums that must be unboxed. Compilation fails if
    /// any of them is not.
    pub required_unboxed: Vec<String>,

    /// Methods per analysis wave.
    pub wave_size: usize,
}

impl Default for EnumUnboxingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_subtypes: true,
            debug_log: false,
            max_instance_fields: DEFAULT_MAX_INSTANCE_FIELDS,
            init_using_superclass_constructor: false,
            required_unboxed: Vec::new(),
            wave_size: DEFAULT_WAVE_SIZE,
        }
    }
}

impl EnumUnboxingConfig {
    /// A configuration that turns the pass off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// The default configuration with debug logging on.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            debug_log: true,
            ..Self::default()
        }
    }

    /// Adds an enum (by canonical name) that must be unboxed.
    #[must_use]
    pub fn require_unboxed(mut self, name: impl Into<String>) -> Self {
        self.required_unboxed.push(name.into());
        self
    }

    /// Sets the number of methods per wave.
    #[must_use]
    pub fn with_wave_size(mut self, wave_size: usize) -> Self {
        self.wave_size = wave_size;
        self
    }
}
