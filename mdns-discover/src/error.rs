//! Error taxonomy of a discovery run and its mapping onto process exit codes

use std::process::ExitCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors produced by the resolver, the workers and the orchestrator
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The mDNS responder backing the resolver could not be started
    #[error("resolver init failed: {0}")]
    ResolverInit(String),

    /// A browse request for one service type was rejected
    #[error("browse failed for '{service_type}': {reason}")]
    BrowseFailed { service_type: String, reason: String },

    /// The deadline elapsed before a single instance was seen
    #[error("timed out with no results")]
    TimedOutZero,

    /// The catalog handed to the orchestrator was empty
    #[error("no built-in services configured")]
    NoServicesConfigured,

    /// A worker task panicked before reporting
    #[error("worker panicked")]
    WorkerPanicked,

    /// The result channel closed before every worker reported
    #[error("result channel closed after {received} of {expected} reports")]
    ResultChannelClosed { received: usize, expected: usize },

    /// Configuration rejected while loading or validating
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiscoveryError {
    /// Exit status this error maps to when it ends the run
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            DiscoveryError::ResolverInit(_) => ExitStatus::ResolverInit,
            DiscoveryError::BrowseFailed { .. } => ExitStatus::BrowseFailed,
            DiscoveryError::TimedOutZero => ExitStatus::TimedOutZero,
            DiscoveryError::NoServicesConfigured | DiscoveryError::InvalidConfig(_) => {
                ExitStatus::Usage
            }
            DiscoveryError::WorkerPanicked
            | DiscoveryError::ResultChannelClosed { .. }
            | DiscoveryError::Io(_) => ExitStatus::Runtime,
        }
    }
}

/// Process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success = 0,
    Runtime = 1,
    Usage = 2,
    ResolverInit = 3,
    BrowseFailed = 4,
    TimedOutZero = 5,
}

impl ExitStatus {
    /// Failure statuses, most specific first. When an error chain carries more
    /// than one classified error, the earliest status in this list is reported.
    pub const PRECEDENCE: [ExitStatus; 5] = [
        ExitStatus::ResolverInit,
        ExitStatus::BrowseFailed,
        ExitStatus::TimedOutZero,
        ExitStatus::Usage,
        ExitStatus::Runtime,
    ];

    /// Classifies a terminal error by walking its source chain
    pub fn from_error(err: &anyhow::Error) -> Self {
        Self::most_specific(
            err.chain()
                .filter_map(|cause| cause.downcast_ref::<DiscoveryError>())
                .map(DiscoveryError::exit_status),
        )
    }

    /// Picks the status ranked highest in [`ExitStatus::PRECEDENCE`]
    pub fn most_specific(statuses: impl IntoIterator<Item = ExitStatus>) -> Self {
        let found: Vec<ExitStatus> = statuses.into_iter().collect();
        Self::PRECEDENCE
            .into_iter()
            .find(|status| found.contains(status))
            .unwrap_or(ExitStatus::Runtime)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn meaning(self) -> &'static str {
        match self {
            ExitStatus::Success => "Success",
            ExitStatus::Runtime => "Runtime error",
            ExitStatus::Usage => "Usage error",
            ExitStatus::ResolverInit => "Resolver initialization failed",
            ExitStatus::BrowseFailed => "Browse operation failed",
            ExitStatus::TimedOutZero => "Timed out with zero results",
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}
