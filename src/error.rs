use parse_display::Display;
use thiserror::Error;

/// Tags an [`Error::Context`] with which ambient subsystem produced it, so a
/// log line can say *what was being attempted* rather than just *what broke*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("loading workload")]
    WorkloadLoad,
    #[display("loading platform")]
    PlatformLoad,
    #[display("writing simulation.log")]
    SimulationLog,
    #[display("writing jobs.log")]
    JobsLog,
    #[display("writing resources.log")]
    ResourcesLog,
    #[display("writing statistics.json")]
    StatisticsSummary,
    #[display("logging setup")]
    Logging,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind}: {source}")]
    Context {
        kind: ErrorKind,
        #[source]
        source: anyhow::Error,
    },
    #[error("job {job_id}: {reason}")]
    WorkloadValidation { job_id: String, reason: String },
    #[error("resource path {path:?} has no matching child")]
    UnknownChild { path: Vec<String> },
    #[error("resource path {path:?} is already occupied")]
    AlreadyOccupied { path: Vec<String> },
    #[error("resource path {path:?} does not hold the task being reaped")]
    NotPlaced { path: Vec<String> },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A type alias that forces the usage of the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn unknown_child(path: &[String]) -> Self {
        Error::UnknownChild { path: path.to_vec() }
    }

    pub fn already_occupied(path: &[String]) -> Self {
        Error::AlreadyOccupied { path: path.to_vec() }
    }

    pub fn not_placed(path: &[String]) -> Self {
        Error::NotPlaced { path: path.to_vec() }
    }

    pub fn config(msg: impl std::fmt::Display) -> Self {
        Error::Context {
            kind: ErrorKind::Config,
            source: anyhow::anyhow!("{}", msg),
        }
    }
}

/// Attaches an [`ErrorKind`] to any foreign error, the way the teacher's
/// ambient I/O call sites do: `fs::create_dir_all(..).kind(ErrorKind::Config)?`.
pub trait Kind<T> {
    fn kind(self, kind: ErrorKind) -> Result<T>;
}

impl<T, E> Kind<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn kind(self, kind: ErrorKind) -> Result<T> {
        self.map_err(|e| Error::Context {
            kind,
            source: anyhow::Error::new(e),
        })
    }
}
