//! Run configuration: the operator-facing YAML document and its defaults.

mod parser;
mod types;

pub use parser::{load_run_config, parse_run_config_str, substitute_env_vars, ConfigError};
pub use types::{
    BrokerConfig, ChartConfig, ClusterConfig, DatabaseConfig, LoadGeneratorConfig, ResourceLimits,
    RunConfig, StreamProcessorConfig, TopicConfig, WaitConfig,
};
