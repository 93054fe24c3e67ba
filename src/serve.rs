//! JSON-lines tool server: one call per input line, one reply per output line.
//!
//! Calls run concurrently, so replies arrive in completion order and carry
//! the caller's `id` for matching.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::tools::{ToolResult, Tools};

#[derive(Debug, Clone, Deserialize)]
pub struct Call {
    #[serde(default)]
    pub id: Value,
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub id: Value,
    pub result: ToolResult,
}

/// Answer calls from `input` until it ends and every call has replied.
///
/// Malformed lines get an error reply with a null id.
pub async fn serve<R, W>(tools: Tools, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Reply>();
    let mut tx = Some(tx);
    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = lines.next_line(), if tx.is_some() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if let Some(tx) = &tx {
                        dispatch(&tools, &line, tx.clone());
                    }
                }
                None => tx = None,
            },
            reply = rx.recv() => {
                let Some(reply) = reply else { break };
                let mut encoded = serde_json::to_vec(&reply)?;
                encoded.push(b'\n');
                output.write_all(&encoded).await?;
                output.flush().await?;
            }
        }
    }
    Ok(())
}

fn dispatch(tools: &Tools, line: &str, replies: mpsc::UnboundedSender<Reply>) {
    let call = match serde_json::from_str::<Call>(line) {
        Ok(call) => call,
        Err(e) => {
            log::debug!("malformed call: {}", e);
            let _ = replies.send(Reply {
                id: Value::Null,
                result: ToolResult::error(format!("malformed call: {}", e)),
            });
            return;
        }
    };
    let tools = tools.clone();
    tokio::spawn(async move {
        let result = tools.call(&call.tool, call.arguments).await;
        let _ = replies.send(Reply {
            id: call.id,
            result,
        });
    });
}
