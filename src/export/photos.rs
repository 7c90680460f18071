//! Concurrent receipt photo download for export bundles.

use anyhow::Result;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::BackendClient;
use crate::models::Trip;
use crate::utils::file_extension;

/// Maximum in-flight photo downloads.
/// 5 keeps wall-clock export time low without hammering object storage.
const MAX_CONCURRENT: usize = 5;

/// A receipt image ready for archive assembly, tagged with its
/// archive-relative name `<date>__<location>/<expense-id><ext>`.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoItem {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Source of receipt photo bytes. Implemented by the real backend
/// client; tests script their own.
pub trait PhotoFetcher {
    async fn fetch_photo(&self, url: &str) -> Result<Vec<u8>>;
}

impl PhotoFetcher for BackendClient {
    async fn fetch_photo(&self, url: &str) -> Result<Vec<u8>> {
        self.fetch_binary(url).await
    }
}

/// Download every attached receipt photo across the given trips.
///
/// Failures are isolated per image: an unreachable photo is logged and
/// omitted, never aborting its siblings or the export, and never
/// surfacing a per-image notification. Cancellation is honored at each
/// fetch boundary; photos already downloaded are kept.
pub async fn fetch_receipt_images<F: PhotoFetcher>(
    fetcher: &F,
    trips: &[Trip],
    cancel: &CancellationToken,
) -> Vec<PhotoItem> {
    let jobs = photo_jobs(trips);
    debug!(count = jobs.len(), "Fetching receipt photos");

    let mut photos = Vec::with_capacity(jobs.len());
    for chunk in jobs.chunks(MAX_CONCURRENT) {
        if cancel.is_cancelled() {
            break;
        }

        let futures: Vec<_> = chunk
            .iter()
            .map(|(name, url)| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                match fetcher.fetch_photo(url).await {
                    Ok(bytes) => Some(PhotoItem {
                        name: name.clone(),
                        bytes,
                    }),
                    Err(e) => {
                        warn!(url = %url, error = %e, "Receipt photo download failed, omitting from export");
                        None
                    }
                }
            })
            .collect();

        photos.extend(join_all(futures).await.into_iter().flatten());
    }

    photos
}

/// Deterministic (archive name, url) pairs for every expense with a
/// photo, in trip and insertion order.
fn photo_jobs(trips: &[Trip]) -> Vec<(String, String)> {
    trips
        .iter()
        .flat_map(|trip| {
            trip.expenses.iter().filter_map(move |exp| {
                exp.photo_url.as_ref().map(|url| {
                    (
                        format!("{}/{}{}", trip.folder_name(), exp.id, file_extension(url)),
                        url.clone(),
                    )
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::collections::HashMap;

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

    fn expense(id: &str, photo_url: Option<&str>) -> Expense {
        Expense {
            id: id.to_string(),
            amount: 10.0,
            comment: String::new(),
            photo_url: photo_url.map(String::from),
            photo_path: None,
            timestamp: Utc.timestamp_millis_opt(1710070200000).unwrap(),
        }
    }

    fn trip(location: &str, expenses: Vec<Expense>) -> Trip {
        Trip {
            id: format!("trip-{location}"),
            location: location.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            expenses,
        }
    }

    #[test]
    fn test_deterministic_naming() {
        let trips = vec![trip(
            "Milano",
            vec![
                expense("e1", Some("https://storage.example/e1.jpg")),
                expense("e2", Some("https://storage.example/e2.PNG?t=1")),
                expense("e3", None),
            ],
        )];

        let jobs = photo_jobs(&trips);
        assert_eq!(
            jobs,
            vec![
                (
                    "2024-03-10__Milano/e1.jpg".to_string(),
                    "https://storage.example/e1.jpg".to_string()
                ),
                (
                    "2024-03-10__Milano/e2.png".to_string(),
                    "https://storage.example/e2.PNG?t=1".to_string()
                ),
            ]
        );

        // Same snapshot, same names, byte for byte
        assert_eq!(jobs, photo_jobs(&trips));
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let trips = vec![trip(
            "Milano",
            vec![
                expense("e1", Some("https://storage.example/e1.jpg")),
                expense("e2", Some("https://storage.example/e2.jpg")),
                expense("e3", Some("https://storage.example/e3.jpg")),
            ],
        )];

        // Only e1 and e3 are reachable
        let fetcher = FakePhotoFetcher {
            photos: HashMap::from([
                ("https://storage.example/e1.jpg".to_string(), b"AAA".to_vec()),
                ("https://storage.example/e3.jpg".to_string(), b"CCC".to_vec()),
            ]),
        };

        let photos =
            fetch_receipt_images(&fetcher, &trips, &CancellationToken::new()).await;

        assert_eq!(photos.len(), 2);
        assert_eq!(photos[0].name, "2024-03-10__Milano/e1.jpg");
        assert_eq!(photos[0].bytes, b"AAA");
        assert_eq!(photos[1].name, "2024-03-10__Milano/e3.jpg");
    }

    #[tokio::test]
    async fn test_cancelled_before_start_fetches_nothing() {
        let trips = vec![trip(
            "Milano",
            vec![expense("e1", Some("https://storage.example/e1.jpg"))],
        )];
        let fetcher = FakePhotoFetcher {
            photos: HashMap::new(),
        };

        let cancel = CancellationToken::new();
        cancel.cancel();

        let photos = fetch_receipt_images(&fetcher, &trips, &cancel).await;
        assert!(photos.is_empty());
    }
}
