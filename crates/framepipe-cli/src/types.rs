use std::path::PathBuf;

/// Inputs of one `framepipe run` invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub pipeline: PathBuf,
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct RunResult {
    pub pipeline: PathBuf,
    /// `None` on a dry run.
    pub output_dir: Option<PathBuf>,
    pub stages: Vec<String>,
    pub tables: Vec<TableSummary>,
}

#[derive(Debug)]
pub struct TableSummary {
    pub name: String,
    pub rows_in: usize,
    pub cols_in: usize,
    pub rows_out: usize,
    pub cols_out: usize,
    pub output: Option<PathBuf>,
}
