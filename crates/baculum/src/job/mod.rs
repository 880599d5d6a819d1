pub mod lstat;
pub mod manager;
pub mod restore;
pub mod status;

pub use lstat::FileStat;
pub use manager::{
    FileListType, JobEstimation, JobList, JobManager, JobMode, JobQuery, JobStatusCounts,
    JobTotals, JobsObjectsOverview, JobsOverview, ResultView, StatusBucket,
};
pub use restore::{find_compositional_jobs, Level};
pub use status::{classify, JobStatusGroup};
