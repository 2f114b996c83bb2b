//! Anchor Block Search
//!
//! Locates the first block mined in the current calendar month. The
//! search estimates the boundary height from the tip and the 2-minute
//! block target, then probes windows of headers around the estimate: a
//! window holding only blocks from inside the month moves the start back,
//! one that has seen a block from before the month moves forward. The
//! anchor is the first in-month header following a pre-month one.

use chrono::{DateTime, Utc};
use pot_core::calendar::{month_key, start_of_month};
use pot_rpc::{BlockHeader, DaemonRpc};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Average block interval in seconds
pub const BLOCK_TARGET_SECS: u64 = 120;

/// Windows probed before giving up
pub const MAX_PROBES: u32 = 4;

const WINDOW_SPAN: i64 = 70;
const WINDOW_STEP: i64 = 50;
const TIP_BACKOFF: u64 = 20;

/// Find the first block whose timestamp falls in the month of `now`
pub async fn find_anchor_block(daemon: &dyn DaemonRpc, now: DateTime<Utc>) -> EngineResult<BlockHeader> {
    let month = month_key(now);
    let month_start = start_of_month(now)?.timestamp().max(0) as u64;

    let tip = daemon.get_last_block_header().await?;
    if tip.timestamp < month_start {
        return Err(EngineError::AnchorNotYetProduced { month });
    }

    let blocks_since = (tip.timestamp - month_start) / BLOCK_TARGET_SECS;
    let estimate = tip.height.saturating_sub(blocks_since) as i64;
    let mut start_offset = 0i64;
    let mut end_offset = WINDOW_SPAN;
    let mut seen_before = false;

    for probe in 1..=MAX_PROBES {
        let mut start = (estimate + start_offset).max(0) as u64;
        let end = ((estimate + end_offset).max(0) as u64).min(tip.height);
        if start >= tip.height {
            start = tip.height.saturating_sub(TIP_BACKOFF);
        }

        let mut headers = daemon.get_block_headers_range(start, end).await?;
        headers.sort_by_key(|h| h.height);
        debug!(%month, probe, start, end, headers = headers.len(), "Probing for anchor block");

        for header in headers {
            if header.timestamp < month_start {
                seen_before = true;
            } else if seen_before {
                debug!(%month, height = header.height, hash = %header.hash, "Anchor block found");
                return Ok(header);
            }
        }

        if seen_before {
            start_offset += WINDOW_STEP;
            end_offset += WINDOW_STEP;
        } else {
            start_offset -= WINDOW_STEP;
        }
    }

    Err(EngineError::AnchorNotFound {
        month,
        probes: MAX_PROBES,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pot_rpc::mock::MockDaemon;

    /// 2021-11-01T00:00:00Z
    const MONTH: u64 = 1_635_724_800;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 11, 1, 0, 5, 0).unwrap()
    }

    #[tokio::test]
    async fn test_reference_anchor() {
        let daemon = MockDaemon::new();
        daemon.push_header(2_483_350, 1_635_724_700, "before");
        daemon.push_header(
            2_483_351,
            1_635_724_900,
            "6666666666ec1464d3a02ead5e18644030007a0fc664c0a964d30408821a8bb0",
        );
        daemon.push_header(2_496_780, 1_637_336_695, "tip");

        let anchor = find_anchor_block(&daemon, Utc.with_ymd_and_hms(2021, 11, 20, 0, 0, 0).unwrap())
            .await
            .unwrap();
        assert_eq!(anchor.height, 2_483_351);
        assert_eq!(
            anchor.hash,
            "6666666666ec1464d3a02ead5e18644030007a0fc664c0a964d30408821a8bb0"
        );
        assert_eq!(daemon.range_calls(), vec![(2_483_348, 2_483_418)]);
    }

    #[tokio::test]
    async fn test_window_moves_back() {
        // regular blocks up to the boundary, then twice as fast
        let daemon = MockDaemon::new();
        daemon.extend_chain(1000, 1100, MONTH - 6060, 120);
        daemon.extend_chain(1101, 1200, MONTH + 6000, 60);

        let anchor = find_anchor_block(&daemon, now()).await.unwrap();
        assert_eq!(anchor.height, 1051);
        assert_eq!(
            daemon.range_calls(),
            vec![(1101, 1171), (1051, 1171), (1001, 1171)]
        );
    }

    #[tokio::test]
    async fn test_window_moves_forward() {
        // regular blocks up to the boundary, then twice as slow
        let daemon = MockDaemon::new();
        daemon.extend_chain(0, 1050, MONTH - 1050 * 120 - 60, 120);
        daemon.extend_chain(1051, 1200, MONTH + 60, 240);

        let anchor = find_anchor_block(&daemon, now()).await.unwrap();
        assert_eq!(anchor.height, 1051);
        assert_eq!(
            daemon.range_calls(),
            vec![(902, 972), (952, 1022), (1002, 1072)]
        );
    }

    #[tokio::test]
    async fn test_not_yet_produced() {
        let daemon = MockDaemon::new();
        daemon.push_header(10, MONTH - 1, "last");
        let err = find_anchor_block(&daemon, now()).await.unwrap_err();
        assert!(matches!(err, EngineError::AnchorNotYetProduced { ref month } if month == "2021-11"));
        assert!(daemon.range_calls().is_empty());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_probes() {
        let daemon = MockDaemon::new();
        daemon.extend_chain(1000, 1100, MONTH - 6060, 120);
        daemon.extend_chain(1101, 2000, MONTH + 6000, 60);

        let err = find_anchor_block(&daemon, now()).await.unwrap_err();
        assert!(matches!(err, EngineError::AnchorNotFound { probes: 4, .. }));
        assert_eq!(daemon.range_calls().len(), 4);
    }

    #[tokio::test]
    async fn test_daemon_failure() {
        let daemon = MockDaemon::new();
        daemon.set_offline(true);
        assert!(matches!(
            find_anchor_block(&daemon, now()).await,
            Err(EngineError::Rpc(_))
        ));
    }
}
