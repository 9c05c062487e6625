mod census;
mod collect;
mod config;
mod exif_reader;
mod filename_date;
mod fingerprint;
mod materialize;
mod media;
mod merge;
mod organizer;
mod plan;
mod resolver;
mod scan;

/// `(stage, current, total, current path)`. Advisory only.
pub type ProgressCallback = dyn Fn(&str, u64, u64, &str) + Send + Sync;

pub use census::{count_media_by_folder, FolderMediaCount};
pub use collect::{collect_media, CollectReport};
pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
};
pub use exif_reader::read_capture_date;
pub use filename_date::date_from_filename;
pub use fingerprint::{
    fingerprint_file, fingerprint_reader, ContentIndex, Fingerprint, FingerprintError,
    DEFAULT_BLOCK_SIZE,
};
pub use materialize::{
    materialize, place_file, record_run_log, write_run_log, FileFailure, MaterializeReport,
    PlaceError, Placement, RunLogEntry,
};
pub use media::{classify, MediaFile, MediaKind};
pub use merge::{default_merged_root, merge_trees, DuplicateFile, MergeOptions, MergeReport};
pub use organizer::{
    apply_organize, organize, plan_organize, BucketAssignment, OrganizePlan, OrganizeReport,
    OrganizeStats,
};
pub use plan::{CopyPlan, CopyPlanEntry};
pub use resolver::{DateResolver, DateRule, DateSource, ResolvedDate};
pub use scan::{validate_root, RootError};
