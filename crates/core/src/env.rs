//! Names the process environment is consulted under: where the config file
//! lives and which extra log filter directives apply.

/// Configuration file path override
pub const SKRITT_CONFIG: &str = "SKRITT_CONFIG";

/// Optional `EnvFilter` directives layered over the sink table
/// (e.g. `SKRITT_LOG=skritt_core=debug`)
pub const SKRITT_LOG: &str = "SKRITT_LOG";

/// Configuration file looked up in the working directory when
/// `SKRITT_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "skritt.toml";
