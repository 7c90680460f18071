//! Trip export pipeline: CSV summary, concurrent receipt download,
//! archive assembly and delivery.
//!
//! The pipeline composes three leaves — photo fetching, the CSV builder
//! and the archive builder — into the user-facing export operations.
//! A failed CSV build or archive assembly aborts the export and is the
//! one user-visible error class; individual photo failures are logged
//! and absorbed so one dead URL cannot spoil a whole export.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::models::Trip;

pub mod archive;
pub mod csv;
pub mod photos;

pub use archive::{build_archive, write_download, ARCHIVE_CSV_NAME, PHOTOS_PREFIX};
pub use csv::build_csv;
pub use photos::{fetch_receipt_images, PhotoFetcher, PhotoItem};

/// Download filename for a multi-trip export.
const SELECTED_TRIPS_FILENAME: &str = "trasferte_selezionate.zip";

/// Download filename for the CSV-only export path.
const CSV_EXPORT_FILENAME: &str = "spese_trasferta.csv";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Nessuna trasferta selezionata")]
    NothingSelected,

    #[error("Esportazione annullata")]
    Cancelled,

    #[error("Errore nella creazione dell'archivio: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Errore di scrittura: {0}")]
    Io(#[from] std::io::Error),
}

/// Export one trip as `trasferta_<location>_<date>.zip`.
pub async fn export_trip<F: PhotoFetcher>(
    fetcher: &F,
    trip: &Trip,
    download_dir: &Path,
    cancel: &CancellationToken,
) -> Result<PathBuf, ExportError> {
    export_archive(
        fetcher,
        std::slice::from_ref(trip),
        &trip.archive_filename(),
        download_dir,
        cancel,
    )
    .await
}

/// Export a caller-filtered selection as `trasferte_selezionate.zip`.
pub async fn export_selected<F: PhotoFetcher>(
    fetcher: &F,
    trips: &[Trip],
    download_dir: &Path,
    cancel: &CancellationToken,
) -> Result<PathBuf, ExportError> {
    export_archive(fetcher, trips, SELECTED_TRIPS_FILENAME, download_dir, cancel).await
}

async fn export_archive<F: PhotoFetcher>(
    fetcher: &F,
    trips: &[Trip],
    filename: &str,
    download_dir: &Path,
    cancel: &CancellationToken,
) -> Result<PathBuf, ExportError> {
    if trips.is_empty() {
        // Never produce a silent empty archive
        return Err(ExportError::NothingSelected);
    }

    let csv = build_csv(trips);
    let photos = fetch_receipt_images(fetcher, trips, cancel).await;
    if cancel.is_cancelled() {
        return Err(ExportError::Cancelled);
    }

    let bytes = build_archive(&csv, &photos)?;
    let path = write_download(&bytes, filename, download_dir)?;
    // The in-memory archive is dropped here; nothing outlives delivery

    info!(
        trips = trips.len(),
        photos = photos.len(),
        "Export complete"
    );
    Ok(path)
}

/// Lighter-weight path: all trips as a bare CSV download, no photo
/// fetching and no archive assembly.
pub fn export_all_csv(trips: &[Trip], download_dir: &Path) -> Result<PathBuf, ExportError> {
    if trips.is_empty() {
        return Err(ExportError::NothingSelected);
    }

    let csv = build_csv(trips);
    write_download(csv.as_bytes(), CSV_EXPORT_FILENAME, download_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::collections::HashMap;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;
    use zip::ZipArchive;

    use crate::models::Expense;

    struct FakePhotoFetcher {
        photos: HashMap<String, Vec<u8>>,
    }

    impl PhotoFetcher for FakePhotoFetcher {
        async fn fetch_photo(&self, url: &str) -> Result<Vec<u8>> {
            self.photos
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unreachable: {url}"))
        }
    }

    fn milano_trip() -> Trip {
        Trip {
            id: "t1".to_string(),
            location: "Milano".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            expenses: vec![
                Expense {
                    id: "e1".to_string(),
                    amount: 45.5,
                    comment: "Pranzo".to_string(),
                    photo_url: Some("https://storage.example/e1.jpg".to_string()),
                    photo_path: None,
                    timestamp: Utc.timestamp_millis_opt(1710070200000).unwrap(),
                },
                Expense {
                    id: "e2".to_string(),
                    amount: 12.0,
                    comment: "Taxi".to_string(),
                    photo_url: Some("https://storage.example/e2.jpg".to_string()),
                    photo_path: None,
                    timestamp: Utc.timestamp_millis_opt(1710073800000).unwrap(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_single_trip_export_layout() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakePhotoFetcher {
            photos: HashMap::from([
                ("https://storage.example/e1.jpg".to_string(), b"AAA".to_vec()),
                ("https://storage.example/e2.jpg".to_string(), b"BBB".to_vec()),
            ]),
        };

        let trip = milano_trip();
        let path = export_trip(&fetcher, &trip, dir.path(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "trasferta_Milano_2024-03-10.zip"
        );

        let bytes = std::fs::read(&path).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "photos/2024-03-10__Milano/e1.jpg".to_string(),
                "photos/2024-03-10__Milano/e2.jpg".to_string(),
                "riepilogo_spese.csv".to_string(),
            ]
        );

        let mut csv = String::new();
        archive
            .by_name(ARCHIVE_CSV_NAME)
            .unwrap()
            .read_to_string(&mut csv)
            .unwrap();
        assert!(csv.contains("Milano;10/03/2024;45,50;Pranzo"));
    }

    #[tokio::test]
    async fn test_unreachable_photo_does_not_abort_export() {
        let dir = TempDir::new().unwrap();
        // Only the first photo is reachable
        let fetcher = FakePhotoFetcher {
            photos: HashMap::from([(
                "https://storage.example/e1.jpg".to_string(),
                b"AAA".to_vec(),
            )]),
        };

        let trip = milano_trip();
        let path = export_trip(&fetcher, &trip, dir.path(), &CancellationToken::new())
            .await
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        // Exactly one photo made it in...
        let photo_entries = archive
            .file_names()
            .filter(|n| n.starts_with(PHOTOS_PREFIX))
            .count();
        assert_eq!(photo_entries, 1);

        // ...while the CSV still lists both expenses
        let mut csv = String::new();
        archive
            .by_name(ARCHIVE_CSV_NAME)
            .unwrap()
            .read_to_string(&mut csv)
            .unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_empty_selection_is_rejected() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakePhotoFetcher {
            photos: HashMap::new(),
        };

        let result =
            export_selected(&fetcher, &[], dir.path(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(ExportError::NothingSelected)));

        // No archive was produced
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_export_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakePhotoFetcher {
            photos: HashMap::new(),
        };

        let cancel = CancellationToken::new();
        cancel.cancel();

        let trip = milano_trip();
        let result = export_trip(&fetcher, &trip, dir.path(), &cancel).await;

        assert!(matches!(result, Err(ExportError::Cancelled)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_csv_only_export() {
        let dir = TempDir::new().unwrap();
        let path = export_all_csv(&[milano_trip()], dir.path()).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "spese_trasferta.csv"
        );
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.starts_with("Luogo;Data;Importo;Descrizione\n"));
        assert_eq!(contents.lines().count(), 3);

        let empty: Vec<Trip> = vec![];
        assert!(matches!(
            export_all_csv(&empty, dir.path()),
            Err(ExportError::NothingSelected)
        ));
    }
}
