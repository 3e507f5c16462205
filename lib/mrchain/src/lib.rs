pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod exact;
pub mod io;
pub mod jobs;
pub mod runtime;
pub mod stage;
pub mod stats;
pub mod topk;
pub mod utils;
pub mod writer;

pub use api::{combine_fn, map_fn, reduce_fn, Combiner, IdentityMapper, MalformedRecord, Mapper, NoCombiner, Reducer, SumCombiner};
pub use config::EngineConfig;
pub use error::JobError;
pub use exact::ExactSum;
pub use runtime::{Engine, StageOutput};
pub use stage::{Job, JobOutput, Stage, StagePlan};
pub use stats::{JobStats, StageStats};
pub use topk::{majority_vote, top_k_by, EmptyGroup, SortOrder};
pub use writer::{write_output, Sink, TextLineSink, VecSink};
