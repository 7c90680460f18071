//! In-memory ZIP assembly and download delivery.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::photos::PhotoItem;
use super::ExportError;
use crate::utils::safe_filename;

/// Fixed name of the CSV document inside every export archive.
pub const ARCHIVE_CSV_NAME: &str = "riepilogo_spese.csv";

/// Prefix for receipt images inside the archive.
pub const PHOTOS_PREFIX: &str = "photos/";

/// Assemble the export archive fully in memory: the CSV at its fixed
/// top-level name plus each fetched image under `photos/`. Expected
/// volumes are a handful of trips with tens of receipts, so no
/// streaming is needed.
pub fn build_archive(csv: &str, photos: &[PhotoItem]) -> Result<Vec<u8>, ExportError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(ARCHIVE_CSV_NAME, options)?;
    zip.write_all(csv.as_bytes())?;

    for photo in photos {
        zip.start_file(format!("{}{}", PHOTOS_PREFIX, photo.name), options)?;
        zip.write_all(&photo.bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Deliver finished export bytes into the download directory, scrubbing
/// the filename of path separators first. Returns the written path.
pub fn write_download(
    bytes: &[u8],
    filename: &str,
    download_dir: &Path,
) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(download_dir)?;

    let path = download_dir.join(safe_filename(filename));
    fs::write(&path, bytes)?;

    info!(path = %path.display(), size = bytes.len(), "Export written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn entry_names(bytes: Vec<u8>) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        archive.file_names().map(String::from).collect()
    }

    #[test]
    fn test_archive_layout() {
        let photos = vec![
            PhotoItem {
                name: "2024-03-10__Milano/e1.jpg".to_string(),
                bytes: b"AAA".to_vec(),
            },
            PhotoItem {
                name: "2024-03-10__Milano/e2.png".to_string(),
                bytes: b"BBB".to_vec(),
            },
        ];

        let bytes = build_archive("Luogo;Data;Importo;Descrizione\n", &photos).unwrap();

        let mut names = entry_names(bytes);
        names.sort();
        assert_eq!(
            names,
            vec![
                "photos/2024-03-10__Milano/e1.jpg".to_string(),
                "photos/2024-03-10__Milano/e2.png".to_string(),
                "riepilogo_spese.csv".to_string(),
            ]
        );
    }

    #[test]
    fn test_archive_round_trips_content() {
        let photos = vec![PhotoItem {
            name: "2024-03-10__Milano/e1.jpg".to_string(),
            bytes: b"JPEGDATA".to_vec(),
        }];
        let csv = "Luogo;Data;Importo;Descrizione\nMilano;10/03/2024;45,50;Pranzo\n";

        let bytes = build_archive(csv, &photos).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let mut read_csv = String::new();
        archive
            .by_name(ARCHIVE_CSV_NAME)
            .unwrap()
            .read_to_string(&mut read_csv)
            .unwrap();
        assert_eq!(read_csv, csv);

        let mut image = Vec::new();
        archive
            .by_name("photos/2024-03-10__Milano/e1.jpg")
            .unwrap()
            .read_to_end(&mut image)
            .unwrap();
        assert_eq!(image, b"JPEGDATA");
    }

    #[test]
    fn test_archive_without_photos_has_only_csv() {
        let bytes = build_archive("Luogo;Data;Importo;Descrizione\n", &[]).unwrap();
        assert_eq!(entry_names(bytes), vec![ARCHIVE_CSV_NAME.to_string()]);
    }

    #[test]
    fn test_write_download_scrubs_separators() {
        let dir = TempDir::new().unwrap();
        let path = write_download(b"ZIPDATA", "trasferta_A/B_2024-03-10.zip", dir.path()).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "trasferta_A_B_2024-03-10.zip"
        );
        assert_eq!(fs::read(path).unwrap(), b"ZIPDATA");
    }
}
