use std::fmt;

/// Fatal failure of a stage or of engine setup.
///
/// `stage` is the 1-based position of the stage inside its job.
#[derive(Debug)]
pub enum JobError {
    Mapper {
        stage: usize,
        partition: usize,
        source: anyhow::Error,
    },
    Combiner {
        stage: usize,
        partition: usize,
        key: String,
        source: anyhow::Error,
    },
    Reducer {
        stage: usize,
        key: String,
        source: anyhow::Error,
    },
    Config(String),
    Pool(rayon::ThreadPoolBuildError),
}

impl JobError {
    pub fn stage(&self) -> Option<usize> {
        match self {
            JobError::Mapper { stage, .. }
            | JobError::Combiner { stage, .. }
            | JobError::Reducer { stage, .. } => Some(*stage),
            JobError::Config(_) | JobError::Pool(_) => None,
        }
    }

    /// The error raised by user code, if this failure came from a mapper,
    /// combiner or reducer.
    pub fn user_error(&self) -> Option<&anyhow::Error> {
        match self {
            JobError::Mapper { source, .. }
            | JobError::Combiner { source, .. }
            | JobError::Reducer { source, .. } => Some(source),
            JobError::Config(_) | JobError::Pool(_) => None,
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::Mapper { stage, partition, source } => {
                write!(f, "mapper failed in stage {} (partition {}): {:#}", stage, partition, source)
            }
            JobError::Combiner { stage, partition, key, source } => write!(
                f,
                "combiner failed in stage {} (partition {}, key {}): {:#}",
                stage, partition, key, source
            ),
            JobError::Reducer { stage, key, source } => {
                write!(f, "reducer failed in stage {} (key {}): {:#}", stage, key, source)
            }
            JobError::Config(msg) => write!(f, "invalid engine config: {}", msg),
            JobError::Pool(e) => write!(f, "failed to build worker pool: {}", e),
        }
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JobError::Mapper { source, .. }
            | JobError::Combiner { source, .. }
            | JobError::Reducer { source, .. } => Some(&**source),
            JobError::Pool(e) => Some(e),
            JobError::Config(_) => None,
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for JobError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        JobError::Pool(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_stage_and_key() {
        let err = JobError::Reducer {
            stage: 2,
            key: "\"Drama\"".into(),
            source: anyhow::anyhow!("boom"),
        };
        assert_eq!(err.to_string(), "reducer failed in stage 2 (key \"Drama\"): boom");
        assert_eq!(err.stage(), Some(2));
    }
}
