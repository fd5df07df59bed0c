use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

use crate::error::DashboardError;

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), DashboardError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush().map_err(|e| DashboardError::io(path, e))?;
    log::debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DashboardError> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).map_err(|e| DashboardError::io(path, e))?;
    Ok(())
}

/// A set of report files that appear together or not at all.
///
/// Each file is first written next to its destination under a `.partial`
/// name. [`StagedOutput::commit`] renames them into place; dropping the
/// set without committing removes whatever was staged.
#[derive(Default)]
pub struct StagedOutput {
    staged: Vec<(PathBuf, PathBuf)>,
}

impl StagedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn stage(&mut self, path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".partial");
        let tmp = path.with_file_name(name);
        self.staged.push((tmp.clone(), path.to_path_buf()));
        tmp
    }

    pub fn csv<T: Serialize>(&mut self, path: &Path, rows: &[T]) -> Result<(), DashboardError> {
        let tmp = self.stage(path);
        write_csv(&tmp, rows)
    }

    pub fn json<T: Serialize>(&mut self, path: &Path, value: &T) -> Result<(), DashboardError> {
        let tmp = self.stage(path);
        write_json(&tmp, value)
    }

    pub fn commit(mut self) -> Result<(), DashboardError> {
        let staged = std::mem::take(&mut self.staged);
        for (i, (tmp, dest)) in staged.iter().enumerate() {
            if let Err(e) = std::fs::rename(tmp, dest) {
                // Files not yet renamed are cleaned up on drop.
                self.staged = staged[i..].to_vec();
                return Err(DashboardError::io(dest, e));
            }
        }
        log::debug!("Committed {} report files", staged.len());
        Ok(())
    }
}

impl Drop for StagedOutput {
    fn drop(&mut self) {
        for (tmp, _) in &self.staged {
            let _ = std::fs::remove_file(tmp);
        }
    }
}

pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}\n", render_table(rows, max_rows));
}
