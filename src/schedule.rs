// Daily trigger
//
// Fires the job once per day at `schedule.at`, in UTC or local time, plus an
// optional immediate run at startup. Ctrl+C / SIGTERM stop the loop between
// runs; a run in progress, including the startup run, is allowed to finish.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use crate::combine::CombineOptions;
use crate::config::{ScheduleConfig, Timezone};
use crate::job::{run_logged, today};
use crate::storage::BlobStore;

/// First instant strictly after `now` whose wall-clock time is `at`.
///
/// Days where `at` does not exist (DST gap) are skipped. When `at` is
/// ambiguous the earlier instant is used.
pub fn next_fire_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();
    loop {
        if let Some(candidate) = tz.from_local_datetime(&day.and_time(at)).earliest() {
            if candidate > *now {
                return candidate;
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => return now.clone(),
        }
    }
}

/// Next fire strictly after both `now` and the previous fire.
///
/// The sleep runs on the monotonic clock and may wake a little before the
/// wall clock reaches the fire time; the previous fire keeps that from
/// scheduling the same slot twice.
pub fn next_fire<Tz: TimeZone>(
    now: &DateTime<Tz>,
    last_fire: Option<&DateTime<Tz>>,
    at: NaiveTime,
) -> DateTime<Tz> {
    let base = match last_fire {
        Some(last) if last > now => last,
        _ => now,
    };
    next_fire_after(base, at)
}

/// Sleep length from `now` and the instant it ends at.
fn plan<Tz: TimeZone>(
    now: &DateTime<Tz>,
    last_fire: Option<DateTime<Tz>>,
    at: NaiveTime,
) -> (Duration, DateTime<Utc>) {
    let next = next_fire(now, last_fire.as_ref(), at);
    let wait = next.clone()
        .signed_duration_since(now.clone())
        .to_std()
        .unwrap_or_default();
    (wait, next.with_timezone(&Utc))
}

fn plan_from_clock(
    timezone: Timezone,
    at: NaiveTime,
    last_fire: Option<DateTime<Utc>>,
) -> (Duration, DateTime<Utc>) {
    match timezone {
        Timezone::Utc => plan(&Utc::now(), last_fire, at),
        Timezone::Local => plan(
            &Local::now(),
            last_fire.map(|last| last.with_timezone(&Local)),
            at,
        ),
    }
}

/// Run the daily job until a shutdown signal arrives.
pub async fn run_scheduled(
    store: Arc<dyn BlobStore>,
    schedule: &ScheduleConfig,
    options: &CombineOptions,
) -> Result<()> {
    let at = schedule.time_of_day()?;
    // Registered before the first run so a signal during it is held, not fatal.
    let mut shutdown = Shutdown::install()?;

    if schedule.run_on_startup {
        info!("Running once on startup");
        run_logged(store.as_ref(), today(schedule.timezone), options).await;
    }

    let mut last_fire: Option<DateTime<Utc>> = None;
    loop {
        let (wait, fire_at) = plan_from_clock(schedule.timezone, at, last_fire);
        info!(
            at = %at,
            timezone = ?schedule.timezone,
            next_run = %fire_at,
            sleep_secs = wait.as_secs(),
            "Waiting for next scheduled run"
        );

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                last_fire = Some(fire_at);
                run_logged(store.as_ref(), today(schedule.timezone), options).await;
            }
            _ = shutdown.recv() => {
                info!("Scheduler stopped");
                return Ok(());
            }
        }
    }
}

/// Ctrl+C / SIGTERM listener. Handlers are registered by `install`, and a
/// signal that arrives while nobody is waiting is returned by the next `recv`.
struct Shutdown {
    #[cfg(unix)]
    interrupt: signal::unix::Signal,
    #[cfg(unix)]
    terminate: signal::unix::Signal,
}

impl Shutdown {
    #[cfg(unix)]
    fn install() -> Result<Self> {
        use signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())
                .context("Failed to install Ctrl+C handler")?,
            terminate: signal(SignalKind::terminate())
                .context("Failed to install SIGTERM handler")?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> Result<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => {
                info!("Received Ctrl+C, shutting down...");
            },
            _ = self.terminate.recv() => {
                info!("Received SIGTERM, shutting down...");
            },
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn eleven() -> NaiveTime {
        NaiveTime::from_hms_opt(11, 0, 0).unwrap()
    }

    #[test]
    fn test_fires_later_today() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 8, 30, 0).unwrap();
        let next = next_fire_after(&now, eleven());
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 2, 11, 0, 0).unwrap());

        let (wait, fire_at) = plan(&now, None, eleven());
        assert_eq!(wait, Duration::from_secs(9000));
        assert_eq!(fire_at, next);
    }

    #[test]
    fn test_fires_tomorrow_once_passed() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 11, 0, 0).unwrap();
        let next = next_fire_after(&now, eleven());
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 3, 11, 0, 0).unwrap());

        let late = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            next_fire_after(&late, eleven()),
            Utc.with_ymd_and_hms(2025, 1, 1, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_respects_offset() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        // 10:00 UTC is already 12:00 at +02:00
        let now = Utc
            .with_ymd_and_hms(2024, 6, 1, 10, 0, 0)
            .unwrap()
            .with_timezone(&tz);
        let next = next_fire_after(&now, eleven());
        assert_eq!(
            next.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 6, 2, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_early_wake_does_not_repeat_the_slot() {
        let fired = Utc.with_ymd_and_hms(2024, 1, 2, 11, 0, 0).unwrap();
        // Monotonic sleep ended 100ms before the wall clock reached 11:00
        let woke = fired - chrono::Duration::milliseconds(100);

        assert_eq!(next_fire(&woke, None, eleven()), fired);
        assert_eq!(
            next_fire(&woke, Some(&fired), eleven()),
            Utc.with_ymd_and_hms(2024, 1, 3, 11, 0, 0).unwrap()
        );

        let (wait, _) = plan(&woke, Some(fired), eleven());
        assert_eq!(wait, Duration::from_millis(86_400_100));
    }

    #[test]
    fn test_stale_last_fire_is_ignored() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 8, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2024, 1, 2, 11, 0, 0).unwrap();
        assert_eq!(
            next_fire(&now, Some(&last), eleven()),
            Utc.with_ymd_and_hms(2024, 1, 5, 11, 0, 0).unwrap()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_before_recv_is_held() {
        let mut shutdown = Shutdown::install().unwrap();

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), shutdown.recv())
            .await
            .expect("SIGTERM should be delivered to the installed handler");
    }
}
