/// Single-file move primitive shared by organization and restore.
///
/// Moves never overwrite: a destination that already exists is an error. The parent
/// folder of the destination is created when missing. When a rename crosses filesystems
/// the file is copied and the source removed.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while moving one file.
#[derive(Debug, Error)]
pub enum MoveError {
    /// The file to move no longer exists.
    #[error("File not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// Something already occupies the destination.
    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// Failed to create the destination folder.
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// The move itself failed.
    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// Result type for single-file moves.
pub type MoveResult<T> = Result<T, MoveError>;

/// Moves files between folders.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Creates `dir` and its parents if they don't exist yet.
    pub fn ensure_dir(dir: &Path) -> MoveResult<()> {
        if dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(dir).map_err(|e| MoveError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: e,
        })
    }

    /// Moves `source` to `destination`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use foldersort::file_organizer::FileOrganizer;
    /// use std::path::Path;
    ///
    /// let result = FileOrganizer::move_file(
    ///     Path::new("/path/to/base/image.png"),
    ///     Path::new("/path/to/base/Imagens/image.png"),
    /// );
    ///
    /// match result {
    ///     Ok(()) => println!("Moved"),
    ///     Err(e) => eprintln!("Move failed: {}", e),
    /// }
    /// ```
    pub fn move_file(source: &Path, destination: &Path) -> MoveResult<()> {
        if fs::symlink_metadata(source).is_err() {
            return Err(MoveError::SourceMissing(source.to_path_buf()));
        }
        if fs::symlink_metadata(destination).is_ok() {
            return Err(MoveError::DestinationExists(destination.to_path_buf()));
        }

        if let Some(parent) = destination.parent() {
            Self::ensure_dir(parent)?;
        }

        match fs::rename(source, destination) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                Self::copy_then_remove(source, destination)
            }
            Err(e) => Err(MoveError::MoveFailed {
                from: source.to_path_buf(),
                to: destination.to_path_buf(),
                source: e,
            }),
        }
    }

    fn copy_then_remove(source: &Path, destination: &Path) -> MoveResult<()> {
        let failed = |e: io::Error| MoveError::MoveFailed {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            source: e,
        };

        fs::copy(source, destination).map_err(failed)?;
        if let Err(e) = fs::remove_file(source) {
            // Leave the source in place rather than end up with two copies.
            let _ = fs::remove_file(destination);
            return Err(failed(e));
        }
        Ok(())
    }
}
