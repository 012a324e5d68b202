//! Building blocks the stage controller composes: probes, the readiness
//! waiter, the config resolver and the secret provisioner.

pub mod probe;
pub mod resolver;
pub mod secrets;
pub mod waiter;

pub use probe::{ClusterProbe, JobProbe, ReleaseProbe, ResourceProbe};
pub use resolver::{ConfigResolver, Endpoint};
pub use secrets::{RegistryCredentials, SecretOutcome, SecretProvisioner};
pub use waiter::{ReadinessWaiter, WaitPolicy, WaitReport};
