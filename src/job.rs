//! One daily run: discover the day's subdirectories and combine each of them.
//!
//! Two failure boundaries. A discovery failure ends the run before any
//! directory is touched. A combine failure is recorded for that directory and
//! the loop moves on to the next one.

use chrono::{Local, NaiveDate, Utc};
use metrics::counter;
use std::time::Instant;
use tracing::{error, info};

use crate::combine::{combine, CombineOptions, CombineOutcome};
use crate::config::Timezone;
use crate::discover::discover;
use crate::error::{CombineError, DiscoverError};
use crate::partition::{date_prefix, directory_path};
use crate::storage::BlobStore;

#[derive(Debug)]
pub struct DirectoryFailure {
    pub directory: String,
    pub error: CombineError,
}

#[derive(Debug)]
pub struct RunSummary {
    pub date_prefix: String,
    pub combined: Vec<CombineOutcome>,
    pub failed: Vec<DirectoryFailure>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn directories(&self) -> usize {
        self.combined.len() + self.failed.len()
    }
}

/// How a run ended, after both boundaries have been applied.
#[derive(Debug)]
pub enum RunStatus {
    Completed(RunSummary),
    DiscoveryFailed(DiscoverError),
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        match self {
            RunStatus::Completed(summary) => summary.is_success(),
            RunStatus::DiscoveryFailed(_) => false,
        }
    }
}

/// The run date on the configured clock.
pub fn today(timezone: Timezone) -> NaiveDate {
    match timezone {
        Timezone::Utc => Utc::now().date_naive(),
        Timezone::Local => Local::now().date_naive(),
    }
}

/// Combine every subdirectory of `date`'s partition, sequentially.
pub async fn run_for_date(
    store: &dyn BlobStore,
    date: NaiveDate,
    options: &CombineOptions,
) -> Result<RunSummary, DiscoverError> {
    let prefix = date_prefix(date);
    let subdirectories = discover(store, &prefix).await?;

    info!(
        prefix = %prefix,
        directories = subdirectories.len(),
        "Combining CSV files"
    );

    let mut summary = RunSummary {
        date_prefix: prefix.clone(),
        combined: Vec::with_capacity(subdirectories.len()),
        failed: Vec::new(),
    };

    for subdirectory in &subdirectories {
        let directory = directory_path(&prefix, subdirectory);
        match combine(store, &directory, options).await {
            Ok(outcome) => {
                counter!("csvcombine.directories.combined").increment(1);
                summary.combined.push(outcome);
            }
            Err(e) => {
                counter!("csvcombine.directories.failed").increment(1);
                error!(
                    directory = %directory,
                    code = %e.code(),
                    "Failed to combine directory: {}",
                    e
                );
                summary.failed.push(DirectoryFailure {
                    directory,
                    error: e,
                });
            }
        }
    }

    Ok(summary)
}

/// Run for `date` and log the result; never returns an error.
pub async fn run_logged(
    store: &dyn BlobStore,
    date: NaiveDate,
    options: &CombineOptions,
) -> RunStatus {
    let start = Instant::now();
    info!(%date, "Starting daily CSV combination");

    match run_for_date(store, date, options).await {
        Ok(summary) => {
            info!(
                prefix = %summary.date_prefix,
                combined = summary.combined.len(),
                failed = summary.failed.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Run complete"
            );
            RunStatus::Completed(summary)
        }
        Err(e) => {
            error!(code = %e.code(), "Run failed during discovery: {}", e);
            RunStatus::DiscoveryFailed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::OpenDalStore;
    use crate::test_support::FailingStore;
    use crate::ErrorCode;
    use opendal::{services, Operator};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    async fn seeded(files: &[(&str, &str)]) -> OpenDalStore {
        let store = OpenDalStore::new(Operator::new(services::Memory::default()).unwrap().finish());
        for (path, content) in files {
            store.write(path, content.as_bytes().to_vec()).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_combines_every_subdirectory() {
        let store = seeded(&[
            ("2024/01/02/m1/a.csv", "t,v\n1,10\n"),
            ("2024/01/02/m1/b.csv", "t,v\n2,20\n"),
            ("2024/01/02/m2/a.csv", "t,v\n3,30\n"),
            ("2024/01/01/m9/a.csv", "t,v\n0,0\n"),
        ])
        .await;

        let summary = run_for_date(&store, date(), &CombineOptions::default())
            .await
            .unwrap();

        assert!(summary.is_success());
        assert_eq!(summary.date_prefix, "2024/01/02/");
        assert_eq!(summary.directories(), 2);
        assert_eq!(
            store.read("2024/01/02/m1/combined_data.csv").await.unwrap(),
            b"t,v\r\n1,10\r\n2,20\r\n"
        );
        assert_eq!(
            store.read("2024/01/02/m2/combined_data.csv").await.unwrap(),
            b"t,v\r\n3,30\r\n"
        );
        assert!(store.read("2024/01/01/m9/combined_data.csv").await.is_err());
    }

    #[tokio::test]
    async fn test_one_failing_directory_does_not_stop_the_rest() {
        let store = seeded(&[
            ("2024/01/02/m1/a.csv", "t,v\n1,10\n"),
            ("2024/01/02/m2/a.csv", ""),
            ("2024/01/02/m3/a.csv", "t,v\n3,30\n"),
        ])
        .await;

        let summary = run_for_date(&store, date(), &CombineOptions::default())
            .await
            .unwrap();

        assert!(!summary.is_success());
        assert_eq!(summary.combined.len(), 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].directory, "2024/01/02/m2/");
        assert_eq!(summary.failed[0].error.code(), ErrorCode::E105EmptyFile);
        assert!(store.read("2024/01/02/m3/combined_data.csv").await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_day_is_a_successful_no_op() {
        let store = seeded(&[]).await;
        let summary = run_for_date(&store, date(), &CombineOptions::default())
            .await
            .unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.directories(), 0);
    }

    #[tokio::test]
    async fn test_discovery_failure_processes_nothing() {
        let inner = seeded(&[("2024/01/02/m1/a.csv", "t,v\n1,10\n")]).await;
        let store = FailingStore::new(inner.clone()).fail_list();

        let status = run_logged(&store, date(), &CombineOptions::default()).await;
        assert!(!status.is_success());
        assert!(matches!(status, RunStatus::DiscoveryFailed(_)));
        assert!(inner.read("2024/01/02/m1/combined_data.csv").await.is_err());
    }

    #[tokio::test]
    async fn test_read_failure_is_reported_per_directory() {
        let inner = seeded(&[
            ("2024/01/02/m1/a.csv", "t,v\n1,10\n"),
            ("2024/01/02/m2/a.csv", "t,v\n2,20\n"),
        ])
        .await;
        let store = FailingStore::new(inner).fail_read("m1/a.csv");

        let status = run_logged(&store, date(), &CombineOptions::default()).await;
        let RunStatus::Completed(summary) = status else {
            panic!("discovery should succeed");
        };
        assert_eq!(summary.combined.len(), 1);
        assert_eq!(summary.failed[0].error.code(), ErrorCode::E102ReadFailed);
    }
}
