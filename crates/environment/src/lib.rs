// SPDX-License-Identifier: MIT

//! Environment backend abstraction (spec components C6-C9): a uniform
//! contract for provisioning, exec, file I/O, teardown, and reconnection
//! over local-filesystem, container, and remote-sandbox environments.

pub mod backend;
pub mod confine;
pub mod container;
pub mod local;
pub mod remote;
pub mod spec;

pub use backend::{EnvironmentBackend, EnvironmentError};
pub use container::{ContainerBackend, ContainerRuntimeConfig};
pub use local::LocalBackend;
pub use remote::{RemoteBackend, SandboxClient};
pub use spec::{CommandHandle, EnvironmentContext, EnvironmentSpec, EnvironmentState, StatusReport};
