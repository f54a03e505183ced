//! Line-oriented operator console for `rolink bridge`.
//!
//! Each stdin line is either a query keyword or a JSON command body; each
//! answer is one JSON line on stdout.
//!
//! | Line | Answer |
//! |---|---|
//! | `state` | [`BridgeService::state`] |
//! | `sensors` | [`BridgeService::sensors`] |
//! | `health` | [`BridgeService::health`] |
//! | `status` | queues a `status_request`; answers `{"queued": bool}` |
//! | anything else | [`BridgeService::handle_command`] |

use std::sync::Arc;

use rolink_bridge::BridgeService;
use rolink_middleware::ShutdownSignal;
use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// Answer one console line. Blank lines produce no answer.
pub fn answer(service: &BridgeService, line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let answer = match line {
        "state" => to_line(&service.state()),
        "sensors" => to_line(&service.sensors()),
        "health" => to_line(&service.health()),
        "status" => to_line(&json!({ "queued": service.request_status() })),
        body => to_line(&service.handle_command(body)),
    };
    Some(answer)
}

/// Serve stdin until it reaches EOF or `shutdown` fires.
pub async fn run(service: Arc<BridgeService>, shutdown: ShutdownSignal) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) => {
                if let Some(answer) = answer(&service, &line) {
                    println!("{answer}");
                }
            }
            Ok(None) => {
                debug!("console input closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "console input failed");
                break;
            }
        }
    }
}

fn to_line<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| json!({ "status": "error", "message": e.to_string() }).to_string())
}
