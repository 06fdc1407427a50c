//! Annotation/image directory reconciliation.
//!
//! [`DirectoryReconciler`] compares the base names of files in a source
//! directory (e.g. annotations) against those in a destination directory
//! (e.g. images) and removes destination files that have no source
//! counterpart. It can also copy a random subset of paired files into
//! separate output directories, which is handy for carving out a
//! validation split.
//!
//! # Example
//!
//! ```no_run
//! use vidprep::{DirectoryReconciler, VidprepError};
//!
//! let mut reconciler = DirectoryReconciler::new("labels", "images", "txt", "jpg")?;
//! let report = reconciler.delete_orphans()?;
//! println!("removed {} orphan image(s)", report.deleted.len());
//!
//! reconciler.random_copy("val/labels", "val/images", 0.2)?;
//! # Ok::<(), VidprepError>(())
//! ```

use std::{
    collections::BTreeSet,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use rand::{Rng, seq::index::sample};

use crate::error::VidprepError;

/// Collect the base names of the entries in `directory` whose extension is
/// exactly `extension`.
///
/// Each entry name is split on `.`; the entry is kept when the final segment
/// equals `extension` (case-sensitive) and its base name is the remaining
/// segments joined back with `.`. Only immediate entries are considered.
///
/// # Errors
///
/// Returns [`VidprepError::DirectoryList`] if the directory cannot be read.
pub fn compute_name_set<P: AsRef<Path>>(
    directory: P,
    extension: &str,
) -> Result<BTreeSet<String>, VidprepError> {
    let directory = directory.as_ref();
    let list_error = |source| VidprepError::DirectoryList {
        path: directory.to_path_buf(),
        source,
    };

    let mut names = BTreeSet::new();
    for entry in fs::read_dir(directory).map_err(list_error)? {
        let entry = entry.map_err(list_error)?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            log::debug!("Skipping non UTF-8 entry {:?}", entry.path());
            continue;
        };
        if let Some(base_name) = strip_extension(file_name, extension) {
            names.insert(base_name);
        }
    }

    log::debug!(
        "Found {} '.{extension}' name(s) in {}",
        names.len(),
        directory.display(),
    );
    Ok(names)
}

/// Split `file_name` on `.` and return the base name if the last segment is
/// `extension`.
fn strip_extension(file_name: &str, extension: &str) -> Option<String> {
    let mut segments: Vec<&str> = file_name.split('.').collect();
    match segments.pop() {
        Some(last) if last == extension => Some(segments.join(".")),
        _ => None,
    }
}

/// Outcome of [`DirectoryReconciler::delete_orphans`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct DeletionReport {
    /// Files that were removed.
    pub deleted: Vec<PathBuf>,
    /// Orphan files that were already absent from disk.
    pub missing: Vec<PathBuf>,
}

/// Keeps a destination directory in step with a source directory by base
/// name.
///
/// Both name sets are computed once in [`new`](DirectoryReconciler::new).
/// Afterwards only successful deletions change state: each removed file's
/// base name leaves the destination set.
#[derive(Debug, Clone)]
pub struct DirectoryReconciler {
    source_dir: PathBuf,
    destination_dir: PathBuf,
    source_extension: String,
    destination_extension: String,
    source_names: BTreeSet<String>,
    destination_names: BTreeSet<String>,
}

impl DirectoryReconciler {
    /// List both directories and build their name sets.
    ///
    /// # Errors
    ///
    /// Returns [`VidprepError::DirectoryList`] if either directory cannot be
    /// read.
    pub fn new<S, D>(
        source_dir: S,
        destination_dir: D,
        source_extension: &str,
        destination_extension: &str,
    ) -> Result<Self, VidprepError>
    where
        S: AsRef<Path>,
        D: AsRef<Path>,
    {
        let source_dir = source_dir.as_ref().to_path_buf();
        let destination_dir = destination_dir.as_ref().to_path_buf();
        let source_names = compute_name_set(&source_dir, source_extension)?;
        let destination_names = compute_name_set(&destination_dir, destination_extension)?;

        Ok(Self {
            source_dir,
            destination_dir,
            source_extension: source_extension.to_string(),
            destination_extension: destination_extension.to_string(),
            source_names,
            destination_names,
        })
    }

    /// Base names found in the source directory.
    pub fn source_names(&self) -> &BTreeSet<String> {
        &self.source_names
    }

    /// Base names currently believed to exist in the destination directory.
    pub fn destination_names(&self) -> &BTreeSet<String> {
        &self.destination_names
    }

    /// The source directory.
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// The destination directory.
    pub fn destination_dir(&self) -> &Path {
        &self.destination_dir
    }

    /// Extension of source files, without the dot.
    pub fn source_extension(&self) -> &str {
        &self.source_extension
    }

    /// Extension of destination files, without the dot.
    pub fn destination_extension(&self) -> &str {
        &self.destination_extension
    }

    /// Destination base names with no counterpart in the source set.
    pub fn orphans(&self) -> Vec<String> {
        self.destination_names
            .difference(&self.source_names)
            .cloned()
            .collect()
    }

    /// Delete every destination file whose base name is absent from the
    /// source set.
    ///
    /// A file that is already gone is logged and reported in
    /// [`DeletionReport::missing`]; the loop carries on with the next
    /// orphan.
    ///
    /// # Errors
    ///
    /// Returns [`VidprepError::FileDelete`] for any removal failure other
    /// than the file not existing.
    pub fn delete_orphans(&mut self) -> Result<DeletionReport, VidprepError> {
        // Snapshot first: the destination set shrinks as files are removed.
        let candidates = self.orphans();
        log::info!(
            "Deleting {} orphan(s) from {}",
            candidates.len(),
            self.destination_dir.display(),
        );

        let mut report = DeletionReport::default();
        for base_name in candidates {
            let path = join_name(&self.destination_dir, &base_name, &self.destination_extension);
            match fs::remove_file(&path) {
                Ok(()) => {
                    log::debug!("Deleted {}", path.display());
                    self.destination_names.remove(&base_name);
                    report.deleted.push(path);
                }
                Err(error) if error.kind() == ErrorKind::NotFound => {
                    log::warn!("File {} was not found", path.display());
                    report.missing.push(path);
                }
                Err(source) => return Err(VidprepError::FileDelete { path, source }),
            }
        }

        Ok(report)
    }

    /// Copy a random `ratio` of the source names, with their paired
    /// destination files, into `annotation_dir` and `image_dir`.
    ///
    /// `ceil(ratio * source_count)` names are drawn without replacement;
    /// ratios above 1 copy every pair. Returns the selected base names in
    /// the order they were copied.
    ///
    /// # Errors
    ///
    /// - [`VidprepError::InvalidRatio`] if `ratio` is negative or not finite.
    /// - [`VidprepError::FileCopy`] if either file of a selected pair cannot
    ///   be copied (including a missing destination-side file).
    pub fn random_copy<A, I>(
        &self,
        annotation_dir: A,
        image_dir: I,
        ratio: f64,
    ) -> Result<Vec<String>, VidprepError>
    where
        A: AsRef<Path>,
        I: AsRef<Path>,
    {
        self.random_copy_with_rng(&mut rand::thread_rng(), annotation_dir, image_dir, ratio)
    }

    /// Same as [`random_copy`](DirectoryReconciler::random_copy) but draws
    /// the selection from the supplied random number generator.
    pub fn random_copy_with_rng<R, A, I>(
        &self,
        rng: &mut R,
        annotation_dir: A,
        image_dir: I,
        ratio: f64,
    ) -> Result<Vec<String>, VidprepError>
    where
        R: Rng + ?Sized,
        A: AsRef<Path>,
        I: AsRef<Path>,
    {
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(VidprepError::InvalidRatio(ratio));
        }

        let names: Vec<&String> = self.source_names.iter().collect();
        let count = ((ratio * names.len() as f64).ceil() as usize).min(names.len());
        log::info!("Copying {count} of {} pair(s)", names.len());

        let annotation_dir = annotation_dir.as_ref();
        let image_dir = image_dir.as_ref();
        let mut selected = Vec::with_capacity(count);

        for index in sample(rng, names.len(), count) {
            let base_name = names[index];
            let annotation = join_name(&self.source_dir, base_name, &self.source_extension);
            let image = join_name(&self.destination_dir, base_name, &self.destination_extension);

            copy_into(&annotation, annotation_dir)?;
            copy_into(&image, image_dir)?;
            selected.push(base_name.clone());
        }

        Ok(selected)
    }
}

fn join_name(directory: &Path, base_name: &str, extension: &str) -> PathBuf {
    directory.join(format!("{base_name}.{extension}"))
}

/// Copy `file` into `directory`, keeping its file name.
fn copy_into(file: &Path, directory: &Path) -> Result<(), VidprepError> {
    let target = match file.file_name() {
        Some(name) => directory.join(name),
        None => directory.to_path_buf(),
    };
    fs::copy(file, &target).map_err(|source| VidprepError::FileCopy {
        from: file.to_path_buf(),
        to: target.clone(),
        source,
    })?;
    log::debug!("Copied {} -> {}", file.display(), target.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::strip_extension;

    #[test]
    fn strip_extension_keeps_inner_dots() {
        assert_eq!(strip_extension("a.b.txt", "txt").as_deref(), Some("a.b"));
        assert_eq!(strip_extension("frame.txt", "txt").as_deref(), Some("frame"));
    }

    #[test]
    fn strip_extension_is_case_sensitive() {
        assert_eq!(strip_extension("frame.TXT", "txt"), None);
        assert_eq!(strip_extension("frame.jpg", "txt"), None);
    }

    #[test]
    fn strip_extension_literal_split_rules() {
        // A name without dots only matches when it equals the extension.
        assert_eq!(strip_extension("txt", "txt").as_deref(), Some(""));
        assert_eq!(strip_extension("README", "txt"), None);
        // Hidden files split on their leading dot.
        assert_eq!(strip_extension(".txt", "txt").as_deref(), Some(""));
        assert_eq!(strip_extension("frame.", "").as_deref(), Some("frame"));
    }
}
