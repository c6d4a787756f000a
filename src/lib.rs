pub mod config;
pub mod error;
pub mod fixture;
pub mod port;
pub mod repo;
pub mod server;
pub mod supervisor;
pub mod util;

pub use config::{ConfigStore, FixtureConfig, FixtureSettings, SettingsError};
pub use error::FixtureError;
pub use fixture::{proxy_url, FixtureContext, ProxyFixture, TaskData, GIT_REPO_DIRECTORY_ENV};
pub use port::allocate_port;
pub use repo::init_repo;
pub use server::ServerCommand;
pub use supervisor::{
    LaunchSpec, ProcessState, ProcessSupervisor, ReadinessOutcome, ReadinessSignal,
    SupervisedProcess,
};
