//! JSON Lines 宿主：每行一条入站消息，每行一条出站消息
//!
//! 空行跳过；无法解析的行回复一条不带执行日志的 ErrorReport，不会转给 Worker。

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::protocol::{Inbound, Outbound};
use crate::worker::WorkerChannels;

/// 逐行转发到 Worker 并写回回复，直到输入结束、Worker 退出或 shutdown 触发。
/// 返回写出的回复行数。
pub async fn serve_json_lines<R, W>(
    reader: R,
    writer: &mut W,
    channels: &mut WorkerChannels,
    shutdown: &CancellationToken,
) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut replies = 0;

    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line.context("Failed to read input")?,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Inbound>(&line) {
            Ok(message) => {
                if channels.inbound.send(message).is_err() {
                    tracing::warn!("Worker stopped, no longer accepting messages");
                    break;
                }
                match channels.outbound.recv().await {
                    Some(reply) => reply,
                    None => break,
                }
            }
            Err(e) => {
                tracing::warn!("Malformed message: {}", e);
                Outbound::error(format!("Malformed message: {e}"), None)
            }
        };

        let mut json = serde_json::to_string(&reply).context("Failed to encode reply")?;
        json.push('\n');
        writer
            .write_all(json.as_bytes())
            .await
            .context("Failed to write reply")?;
        writer.flush().await.context("Failed to flush output")?;
        replies += 1;
    }

    Ok(replies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendLoader, MockSolverEngine, StaticEngineSource};
    use crate::capability::{CapabilityProbe, CapabilityProfile, StaticDetector};
    use crate::config::AppConfig;
    use crate::worker::{spawn_worker, Worker};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;

    fn channels(shutdown: &CancellationToken) -> WorkerChannels {
        let probe = CapabilityProbe::new(
            Arc::new(StaticDetector(Ok(CapabilityProfile::new(true, false)))),
            Duration::from_secs(1),
        );
        let source = Arc::new(StaticEngineSource::new(Arc::new(MockSolverEngine::new())));
        let worker = Worker::new(AppConfig::default(), BackendLoader::new(source, probe).with_threads(2));
        spawn_worker(worker, shutdown.clone())
    }

    fn parse_lines(output: &[u8]) -> Vec<Value> {
        String::from_utf8(output.to_vec())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_one_reply_per_line_and_malformed_line() {
        let shutdown = CancellationToken::new();
        let mut channels = channels(&shutdown);
        let input = concat!(
            "{\"start\":{\"maxLength\":10,\"populationSize\":20}}\n",
            "{not json\n",
            "\n",
            "\"rungen\"\n",
            "\"finish\"\n",
        );
        let mut output = Vec::new();

        let replies = serve_json_lines(input.as_bytes(), &mut output, &mut channels, &shutdown)
            .await
            .unwrap();
        assert_eq!(replies, 4);

        let lines = parse_lines(&output);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["progress"]["generationsCompleted"], 1);
        assert!(lines[1]["error"]["error"]
            .as_str()
            .unwrap()
            .starts_with("Malformed message"));
        assert!(lines[1]["error"].get("executionLog").is_none());
        assert_eq!(lines[2]["progress"]["generationsCompleted"], 2);
        assert!(lines[3]["success"]["bestSequence"].is_array());
    }

    #[tokio::test]
    async fn test_unknown_command_is_rejected_without_log() {
        let shutdown = CancellationToken::new();
        let mut channels = channels(&shutdown);
        let mut output = Vec::new();

        let replies = serve_json_lines(
            "\"pause\"\n\"rungen\"\n".as_bytes(),
            &mut output,
            &mut channels,
            &shutdown,
        )
        .await
        .unwrap();
        assert_eq!(replies, 2);

        let lines = parse_lines(&output);
        assert!(lines[0]["error"]["error"]
            .as_str()
            .unwrap()
            .starts_with("Malformed message"));
        assert!(lines[1]["error"]["error"]
            .as_str()
            .unwrap()
            .contains("No active session"));
        assert!(lines[1]["error"].get("executionLog").is_none());
    }

    #[tokio::test]
    async fn test_stops_when_cancelled() {
        let shutdown = CancellationToken::new();
        let mut channels = channels(&shutdown);
        shutdown.cancel();
        let mut output = Vec::new();

        let replies = serve_json_lines("\"rungen\"\n".as_bytes(), &mut output, &mut channels, &shutdown)
            .await
            .unwrap();
        assert_eq!(replies, 0);
        assert!(output.is_empty());
    }
}
