//! Infrastructure layer: configuration, repositories (in-memory + Postgres),
//! application services, the signal listener and the job scheduler.

pub mod config;
pub mod error;
pub mod jobs;
pub mod listener;
pub mod realtime;
pub mod repository;
pub mod services;
pub mod signals;


pub use config::AppConfig;
pub use error::{RepositoryError, RepositoryResult};
pub use listener::{ListenerHandle, SignalListener, SignalRouting};
pub use realtime::{RealtimeHub, RealtimeMessage};
pub use services::{Repositories, ServiceError, ServiceResult, Services};
pub use signals::{Signal, SignalBus};
