//! Stdio transport for the MCP server
//!
//! Newline-delimited JSON-RPC in, newline-delimited responses out. Each frame
//! is handled on its own task so a slow script does not block other calls;
//! a single writer task keeps response lines from interleaving.

use std::sync::Arc;

use sieve_core::mcp::JsonRpcResponse;
use sieve_core::McpServer;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};

pub async fn serve_stdio(server: Arc<McpServer>) -> anyhow::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    run_loop(server, stdin, tokio::io::stdout()).await?;
    Ok(())
}

/// Drive the server until `reader` hits EOF and every in-flight call has
/// answered. Returns the writer.
pub async fn run_loop<R, W>(server: Arc<McpServer>, reader: R, writer: W) -> anyhow::Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
    let writer_task = tokio::spawn(write_responses(rx, writer));

    info!("MCP server listening on stdio");
    let mut lines = reader.lines();
    let mut inflight = JoinSet::new();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    let server = Arc::clone(&server);
                    let tx = tx.clone();
                    inflight.spawn(async move {
                        if let Some(response) = server.handle_line(&line).await {
                            // Writer only goes away on a write error, already logged
                            let _ = tx.send(response);
                        }
                    });
                }
                None => break,
            },
            Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "Request task failed");
                }
            }
        }
    }

    while let Some(joined) = inflight.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Request task failed");
        }
    }
    drop(tx);
    info!("Input closed, shutting down");

    writer_task.await?
}

async fn write_responses<W>(
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
    mut writer: W,
) -> anyhow::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut frame = match serde_json::to_string(&response) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to serialize response");
                continue;
            }
        };
        frame.push('\n');
        writer.write_all(frame.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_sandbox::{Executor, SandboxConfig};

    #[tokio::test]
    async fn test_loop_answers_requests_and_skips_notifications() {
        let root = tempfile::tempdir().unwrap();
        let executor = Executor::new(
            SandboxConfig::default()
                .with_interpreter("sh")
                .with_scope_root(root.path()),
        );
        let server = Arc::new(McpServer::new(Arc::new(executor)));

        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"execute_code","arguments":{"code":"sleep 0.2; echo slow"}}}"#, "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#, "\n",
        );

        let out = run_loop(server, input.as_bytes(), Vec::new()).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        let responses: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(responses.len(), 3);
        let mut ids: Vec<i64> = responses.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);

        let call = responses.iter().find(|r| r["id"] == 2).unwrap();
        assert_eq!(call["result"]["isError"], false);
        assert!(call["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("slow"));
    }
}
