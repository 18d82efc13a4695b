//! JSONL intent stream for the `watch` command.
//!
//! One JSON object per line:
//!
//! ```text
//! {"event_id":"evt-1","update_type":"registration"}
//! {"event_id":"evt-1","auto_sync":false}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sheet_sync_reconciler::{EventId, Reconciler, UpdateType};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// A parsed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Sync {
        event_id: EventId,
        update_type: UpdateType,
    },
    SetAutoSync {
        event_id: EventId,
        enabled: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IntentLine {
    event_id: EventId,
    #[serde(default)]
    update_type: Option<UpdateType>,
    #[serde(default)]
    auto_sync: Option<bool>,
}

/// Parse one line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<Intent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let raw: IntentLine = serde_json::from_str(line).context("invalid intent line")?;
    if raw.event_id.as_str().trim().is_empty() {
        bail!("event_id is empty");
    }

    match (raw.auto_sync, raw.update_type) {
        (Some(_), Some(_)) => bail!("auto_sync and update_type are mutually exclusive"),
        (Some(enabled), None) => Ok(Some(Intent::SetAutoSync {
            event_id: raw.event_id,
            enabled,
        })),
        (None, update_type) => Ok(Some(Intent::Sync {
            event_id: raw.event_id,
            update_type: update_type.unwrap_or(UpdateType::Manual),
        })),
    }
}

/// Counts from one [`pump_intents`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    pub accepted: usize,
    pub rejected: usize,
}

/// Forward every intent read from `reader` until EOF.
pub async fn pump_intents<R>(reconciler: &Reconciler, reader: R) -> Result<PumpStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = PumpStats::default();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await.context("failed to read intents")? {
        line_no += 1;
        let intent = match parse_line(&line) {
            Ok(Some(intent)) => intent,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = line_no, error = %format!("{e:#}"), "Rejected intent");
                stats.rejected += 1;
                continue;
            }
        };

        debug!(line = line_no, ?intent, "Forwarding intent");
        match intent {
            Intent::Sync {
                event_id,
                update_type,
            } => reconciler.request_sync(event_id, update_type),
            Intent::SetAutoSync { event_id, enabled } => {
                if let Err(e) = reconciler.set_auto_sync(event_id.clone(), enabled).await {
                    warn!(event_id = %event_id, error = %e, "Auto-sync toggle failed");
                    stats.rejected += 1;
                    continue;
                }
            }
        }
        stats.accepted += 1;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheet_sync_reconciler::memory::{InMemoryEventStore, RecordingSheetClient};
    use sheet_sync_reconciler::{EventView, ReconcilerConfig, RegistrationView, SystemClock};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_parse_sync_line() {
        let intent = parse_line(r#"{"event_id":"evt-1","update_type":"payment"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            intent,
            Intent::Sync {
                event_id: EventId::from("evt-1"),
                update_type: UpdateType::Payment,
            }
        );
    }

    #[test]
    fn test_parse_defaults_to_manual() {
        let intent = parse_line(r#"{"event_id":"evt-1"}"#).unwrap().unwrap();
        assert!(matches!(
            intent,
            Intent::Sync {
                update_type: UpdateType::Manual,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_auto_sync_line() {
        let intent = parse_line(r#"  {"event_id":"evt-2","auto_sync":false}  "#)
            .unwrap()
            .unwrap();
        assert_eq!(
            intent,
            Intent::SetAutoSync {
                event_id: EventId::from("evt-2"),
                enabled: false,
            }
        );
    }

    #[test]
    fn test_skips_blank_and_comments() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("# replayed from backup").unwrap().is_none());
    }

    #[test]
    fn test_rejects_bad_lines() {
        assert!(parse_line("not json").is_err());
        assert!(parse_line(r#"{"event_id":""}"#).is_err());
        assert!(parse_line(r#"{"event_id":"evt-1","update_type":"webhook"}"#).is_err());
        assert!(parse_line(r#"{"event_id":"evt-1","colour":"red"}"#).is_err());
        assert!(
            parse_line(r#"{"event_id":"evt-1","auto_sync":true,"update_type":"manual"}"#).is_err()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_forwards_intents() {
        let store = Arc::new(InMemoryEventStore::new());
        for id in ["evt-1", "evt-2"] {
            store.insert_event(EventView::new(id, format!("Event {id}")));
            store.upsert_registration(RegistrationView::new(
                format!("{id}-reg"),
                id,
                "Ada",
                "ada@example.com",
            ));
        }
        let client = Arc::new(RecordingSheetClient::new());
        let config = ReconcilerConfig {
            health_check_ttl: None,
            task_pacing: Duration::ZERO,
            ..Default::default()
        };
        let reconciler = Reconciler::new(config, store.clone(), client.clone(), Arc::new(SystemClock));
        reconciler.start().unwrap();

        let input = concat!(
            "{\"event_id\":\"evt-1\",\"update_type\":\"registration\"}\n",
            "\n",
            "not json\n",
            "{\"event_id\":\"evt-2\",\"auto_sync\":true}\n",
        );
        let stats = pump_intents(&reconciler, input.as_bytes()).await.unwrap();
        assert_eq!(
            stats,
            PumpStats {
                accepted: 2,
                rejected: 1,
            }
        );

        reconciler.wait_idle().await;
        assert_eq!(client.create_count(), 2);
        reconciler.shutdown().await;
    }
}
