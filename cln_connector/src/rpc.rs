use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use xerror::node::NodeError;

/// Minimal JSON-RPC client for the lightningd unix socket. One connection
/// per call; lightningd replies with a single JSON object per request.
#[derive(Clone)]
pub struct ClnRpc {
    socket_path: PathBuf,
    next_id: Arc<AtomicU64>,
}

impl ClnRpc {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// `timeout == None` waits as long as the node does; payments can take
    /// tens of seconds and `waitinvoice` up to an hour.
    pub async fn call(
        &self,
        method: &str,
        params: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, NodeError> {
        match timeout {
            Some(t) => tokio::time::timeout(t, self.call_inner(method, params))
                .await
                .map_err(|_| NodeError::Unavailable)?,
            None => self.call_inner(method, params).await,
        }
    }

    async fn call_inner(&self, method: &str, params: Value) -> Result<Value, NodeError> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|_| NodeError::Unavailable)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let payload = serde_json::to_vec(&request)
            .map_err(|e| NodeError::BadResponse(e.to_string()))?;
        stream
            .write_all(&payload)
            .await
            .map_err(|_| NodeError::Unavailable)?;

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream
                .read(&mut chunk)
                .await
                .map_err(|_| NodeError::Unavailable)?;
            if n == 0 {
                return Err(NodeError::BadResponse("connection closed mid-response".into()));
            }
            buf.extend_from_slice(&chunk[..n]);

            let mut iter = serde_json::Deserializer::from_slice(&buf).into_iter::<Value>();
            match iter.next() {
                Some(Ok(response)) => return unpack(response),
                Some(Err(e)) if e.is_eof() => continue,
                Some(Err(e)) => return Err(NodeError::BadResponse(e.to_string())),
                None => continue,
            }
        }
    }
}

fn unpack(response: Value) -> Result<Value, NodeError> {
    if let Some(err) = response.get("error").filter(|e| !e.is_null()) {
        return Err(NodeError::Rpc {
            code: err.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown node error")
                .to_string(),
        });
    }
    Ok(response.get("result").cloned().unwrap_or(Value::Null))
}

/// Amount fields come back either as a bare integer (`msatoshi`) or as a
/// `"123msat"` string (`amount_msat`), depending on the node version.
pub fn msat_value(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim_end_matches("msat").parse::<i64>().ok(),
        _ => None,
    }
}
