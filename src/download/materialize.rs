//! Turns deduplicated content items into files on disk.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use super::client::HttpClient;
use super::constants::SHORTCUT_HEADER;
use super::error::DownloadError;
use super::naming::{MimeTable, resolve_file_name, resolve_link_name};
use crate::model::{ContentItem, ItemKind};
use crate::progress::{RunObserver, percent_of};

/// Per-course tally of what the materializer did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeStats {
    /// Files streamed to disk.
    pub downloaded: usize,
    /// Files already present with the declared size.
    pub skipped: usize,
    /// `.url` shortcuts written.
    pub links_written: usize,
    /// Items abandoned after a transport or filesystem error.
    pub failed: usize,
}

impl MaterializeStats {
    /// Number of items accounted for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped + self.links_written + self.failed
    }

    /// Adds another course's tally to this one.
    pub fn absorb(&mut self, other: &Self) {
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.links_written += other.links_written;
        self.failed += other.failed;
    }
}

enum FileOutcome {
    Downloaded(PathBuf, u64),
    AlreadyPresent(PathBuf),
}

/// Downloads files and synthesizes link shortcuts under a course root.
///
/// Items are processed one at a time, in order. Failures are reported and
/// counted, never propagated.
pub struct Materializer<'a> {
    client: &'a HttpClient,
    mime: MimeTable,
    observer: &'a dyn RunObserver,
}

impl<'a> Materializer<'a> {
    #[must_use]
    pub fn new(client: &'a HttpClient, observer: &'a dyn RunObserver) -> Self {
        Self {
            client,
            mime: MimeTable::default(),
            observer,
        }
    }

    /// Replaces the content-type to extension table.
    #[must_use]
    pub fn with_mime_table(mut self, mime: MimeTable) -> Self {
        self.mime = mime;
        self
    }

    /// Materializes `items` (already deduplicated) under `course_root`.
    ///
    /// Progress is reported after every item whatever its outcome.
    #[instrument(skip(self, items), fields(root = %course_root.display(), items = items.len()))]
    pub async fn materialize(&self, course_root: &Path, items: &[ContentItem]) -> MaterializeStats {
        let mut stats = MaterializeStats::default();
        if items.is_empty() {
            self.observer
                .status("  - No downloadable files or links found for this course.");
            return stats;
        }

        self.observer
            .status(&format!("  [Processing {} unique items]", items.len()));

        for (index, item) in items.iter().enumerate() {
            let ordinal = index + 1;
            let folder = item
                .relative_path
                .iter()
                .fold(course_root.to_path_buf(), |path, segment| path.join(segment));

            match item.kind {
                ItemKind::File => {
                    self.observer.status(&format!(
                        "    ({ordinal}) Downloading File: {}",
                        item.display_path()
                    ));
                    match self.materialize_file(&folder, item).await {
                        Ok(FileOutcome::Downloaded(path, bytes)) => {
                            info!(path = %path.display(), bytes, "downloaded");
                            stats.downloaded += 1;
                        }
                        Ok(FileOutcome::AlreadyPresent(path)) => {
                            self.observer.status(&format!(
                                "      - Already downloaded: {}",
                                path.display()
                            ));
                            stats.skipped += 1;
                        }
                        Err(err) => {
                            warn!(url = %item.source_url, error = %err, "file failed");
                            self.observer.status(&format!("      - FAILED: {err}"));
                            stats.failed += 1;
                        }
                    }
                }
                ItemKind::WebLink => {
                    self.observer.status(&format!(
                        "    ({ordinal}) Creating Link: {}",
                        item.display_path()
                    ));
                    match write_shortcut(&folder, item).await {
                        Ok(_) => stats.links_written += 1,
                        Err(err) => {
                            warn!(url = %item.source_url, error = %err, "shortcut failed");
                            self.observer.status(&format!("      - FAILED: {err}"));
                            stats.failed += 1;
                        }
                    }
                }
            }

            self.observer.progress(percent_of(ordinal, items.len()));
        }

        stats
    }

    async fn materialize_file(
        &self,
        folder: &Path,
        item: &ContentItem,
    ) -> Result<FileOutcome, DownloadError> {
        ensure_folder(folder).await?;

        let fetched = self.client.fetch(&item.source_url).await?;
        let file_name = resolve_file_name(&item.display_name, &fetched.hints(), &self.mime);
        let path = folder.join(file_name);

        if let Some(declared) = fetched.content_length
            && let Ok(meta) = tokio::fs::metadata(&path).await
            && meta.is_file()
            && meta.len() == declared
        {
            return Ok(FileOutcome::AlreadyPresent(path));
        }

        let bytes = fetched.stream_to(&path).await?;
        Ok(FileOutcome::Downloaded(path, bytes))
    }
}

/// Renders the two-line shortcut body for `url`.
#[must_use]
pub fn shortcut_body(url: &str) -> String {
    format!("{SHORTCUT_HEADER}\nURL={url}\n")
}

/// Writes (or overwrites) the `.url` shortcut for a web link.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] if the folder or file cannot be written.
pub async fn write_shortcut(folder: &Path, item: &ContentItem) -> Result<PathBuf, DownloadError> {
    ensure_folder(folder).await?;
    let path = folder.join(resolve_link_name(&item.display_name));
    tokio::fs::write(&path, shortcut_body(&item.source_url))
        .await
        .map_err(|e| DownloadError::io(&path, e))?;
    Ok(path)
}

async fn ensure_folder(folder: &Path) -> Result<(), DownloadError> {
    tokio::fs::create_dir_all(folder)
        .await
        .map_err(|e| DownloadError::io(folder, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_shortcut_body_format() {
        assert_eq!(
            shortcut_body("https://example.org/a?b=1"),
            "[InternetShortcut]\nURL=https://example.org/a?b=1\n"
        );
    }

    #[tokio::test]
    async fn test_write_shortcut_creates_folders_and_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("Content").join("Week 1");
        let item = ContentItem::new(
            ItemKind::WebLink,
            "https://example.org/new",
            "Reading: list",
            vec!["Content".into(), "Week 1".into()],
        );
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("Reading_ list.url"), "stale").unwrap();

        let path = write_shortcut(&folder, &item).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "Reading_ list.url");
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[InternetShortcut]\nURL=https://example.org/new\n"
        );
    }

    #[test]
    fn test_stats_absorb_and_total() {
        let mut total = MaterializeStats::default();
        total.absorb(&MaterializeStats {
            downloaded: 2,
            skipped: 1,
            links_written: 3,
            failed: 1,
        });
        total.absorb(&MaterializeStats {
            downloaded: 1,
            ..MaterializeStats::default()
        });
        assert_eq!(total.downloaded, 3);
        assert_eq!(total.total(), 8);
    }
}
