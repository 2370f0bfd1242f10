//! Zip backup of stored image blobs
//!
//! Images live only in the local store, so they are exported as a plain zip
//! archive (one entry per image filename) that can be moved to another
//! device and imported there.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{IMAGE_PREFIX, PersistenceError, PersistenceGateway, image_key};

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Default archive name for a given day (`backup_imagenes_YYYY-MM-DD.zip`)
pub fn default_backup_name(date: NaiveDate) -> String {
    format!("backup_imagenes_{}.zip", date.format("%Y-%m-%d"))
}

/// Pack every stored image into an in-memory zip archive
///
/// Returns the archive and the number of images it holds.
pub async fn pack_images(
    gateway: &dyn PersistenceGateway,
) -> Result<(Vec<u8>, usize), BackupError> {
    let keys = gateway.keys(IMAGE_PREFIX).await?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut count = 0;

    for key in keys {
        let Some(bytes) = gateway.get(&key).await? else {
            continue;
        };
        let filename = key.strip_prefix(IMAGE_PREFIX).unwrap_or(key.as_str());
        writer.start_file(filename, options)?;
        writer.write_all(&bytes)?;
        count += 1;
    }

    let cursor = writer.finish()?;
    Ok((cursor.into_inner(), count))
}

/// Store every file entry of a zip archive as an image blob
///
/// Directory entries are skipped. Existing images with the same filename
/// are replaced.
pub async fn unpack_images(
    gateway: &dyn PersistenceGateway,
    archive: &[u8],
) -> Result<usize, BackupError> {
    // ZipFile is not Send; read everything before the first await
    let entries = read_entries(archive)?;

    let count = entries.len();
    for (name, bytes) in entries {
        gateway.put(&image_key(&name), &bytes).await?;
    }
    Ok(count)
}

fn read_entries(archive: &[u8]) -> Result<Vec<(String, Vec<u8>)>, BackupError> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut entries = Vec::with_capacity(zip.len());

    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        entries.push((file.name().to_string(), bytes));
    }

    Ok(entries)
}

/// Write all images to a zip file. Nothing is written when there are no images.
pub async fn export_images(
    gateway: &dyn PersistenceGateway,
    path: &Path,
) -> Result<usize, BackupError> {
    let (archive, count) = pack_images(gateway).await?;
    if count == 0 {
        log::info!("No images to export");
        return Ok(0);
    }
    tokio::fs::write(path, archive).await?;
    log::info!("Exported {} images to {}", count, path.display());
    Ok(count)
}

/// Import every image from a zip file
pub async fn import_images(
    gateway: &dyn PersistenceGateway,
    path: &Path,
) -> Result<usize, BackupError> {
    let archive = tokio::fs::read(path).await?;
    let count = unpack_images(gateway, &archive).await?;
    log::info!("Imported {} images from {}", count, path.display());
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryGateway;

    #[test]
    fn test_default_backup_name() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 9).unwrap();
        assert_eq!(default_backup_name(date), "backup_imagenes_2024-07-09.zip");
    }

    #[tokio::test]
    async fn test_export_then_import_into_fresh_store() {
        let source = MemoryGateway::new();
        source.put(&image_key("ABC_1.jpg"), b"first").await.unwrap();
        source.put(&image_key("XYZ_2.jpg"), b"second").await.unwrap();
        source.put("workbook/current", b"{}").await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.zip");
        assert_eq!(export_images(&source, &path).await.unwrap(), 2);

        let target = MemoryGateway::new();
        assert_eq!(import_images(&target, &path).await.unwrap(), 2);
        assert_eq!(
            target.get(&image_key("XYZ_2.jpg")).await.unwrap(),
            Some(b"second".to_vec())
        );
        assert_eq!(target.get("workbook/current").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_store_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.zip");

        assert_eq!(export_images(&MemoryGateway::new(), &path).await.unwrap(), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_directories_are_skipped() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.add_directory("fotos/", options).unwrap();
        writer.start_file("fotos/A_1.jpg", options).unwrap();
        writer.write_all(b"img").unwrap();
        let archive = writer.finish().unwrap().into_inner();

        let gateway = MemoryGateway::new();
        assert_eq!(unpack_images(&gateway, &archive).await.unwrap(), 1);
        assert_eq!(gateway.keys(IMAGE_PREFIX).await.unwrap(), vec!["images/fotos/A_1.jpg"]);
    }

    #[test]
    fn test_compressed_entries_read_in_full() {
        let photo = vec![7u8; 256 * 1024];
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer.start_file("B_3.jpg", options).unwrap();
        writer.write_all(&photo).unwrap();
        let archive = writer.finish().unwrap().into_inner();
        assert!(archive.len() < photo.len());

        let entries = read_entries(&archive).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "B_3.jpg");
        assert_eq!(entries[0].1, photo);
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_an_error() {
        let gateway = MemoryGateway::new();
        assert!(matches!(
            unpack_images(&gateway, b"definitely not a zip").await,
            Err(BackupError::Zip(_))
        ));
    }
}
