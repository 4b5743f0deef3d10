//! Newline-delimited JSON-RPC transports: a child process's stdio, or any
//! async reader/writer pair.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use super::types::{JsonRpcRequest, JsonRpcResponse};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for the response carrying the same id.
    async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse>;

    /// Send a notification (no response expected).
    async fn notify(&self, request: &JsonRpcRequest) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Newline-delimited JSON-RPC over any writer/reader pair.
pub struct LineTransport<W, R> {
    // Request and response share one lock so a call is a single exchange.
    io: Mutex<(W, BufReader<R>)>,
    // Set while a message is being written. Still set afterwards means the
    // write was cut short and the peer holds a partial line.
    writing: AtomicBool,
}

impl<W, R> LineTransport<W, R>
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncRead + Unpin + Send,
{
    pub fn new(writer: W, reader: R) -> Self {
        Self {
            io: Mutex::new((writer, BufReader::new(reader))),
            writing: AtomicBool::new(false),
        }
    }

    async fn write_message(&self, writer: &mut W, request: &JsonRpcRequest) -> Result<()> {
        if self.writing.load(Ordering::SeqCst) {
            bail!("MCP connection is unusable: an earlier message was interrupted mid-write");
        }
        let mut json = serde_json::to_string(request)?;
        json.push('\n');

        self.writing.store(true, Ordering::SeqCst);
        writer
            .write_all(json.as_bytes())
            .await
            .context("Failed to write to MCP server")?;
        writer.flush().await.context("Failed to flush MCP server input")?;
        self.writing.store(false, Ordering::SeqCst);
        Ok(())
    }
}

async fn read_response<R: AsyncRead + Unpin>(reader: &mut BufReader<R>, id: i64) -> Result<JsonRpcResponse> {
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader
            .read_line(&mut line)
            .await
            .context("Failed to read from MCP server")?;
        if bytes == 0 {
            bail!("MCP server closed connection");
        }

        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            continue;
        }

        match serde_json::from_str::<JsonRpcResponse>(trimmed) {
            Ok(response) if response.answers(id) => return Ok(response),
            // Notifications, server requests, and responses to abandoned calls.
            Ok(_) => tracing::trace!("Skipping unrelated MCP message: {}", trimmed),
            Err(e) => tracing::debug!("Ignoring unparseable MCP line: {}", e),
        }
    }
}

#[async_trait]
impl<W, R> Transport for LineTransport<W, R>
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncRead + Unpin + Send,
{
    async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let id = request
            .id
            .context("JSON-RPC request without id cannot expect a response")?;
        let mut io = self.io.lock().await;
        let (writer, reader) = &mut *io;
        self.write_message(writer, request).await?;
        read_response(reader, id).await
    }

    async fn notify(&self, request: &JsonRpcRequest) -> Result<()> {
        let mut io = self.io.lock().await;
        self.write_message(&mut io.0, request).await
    }

    /// Shut down the write half; the server sees end of input.
    async fn close(&self) -> Result<()> {
        let mut io = self.io.lock().await;
        io.0.shutdown().await.context("Failed to close MCP connection")
    }
}

/// Transport for a locally spawned MCP server.
pub struct StdioTransport {
    program: String,
    process: Mutex<Child>,
    lines: LineTransport<ChildStdin, ChildStdout>,
}

impl StdioTransport {
    /// Spawn the server process. Its stderr is inherited so server logs stay visible.
    pub fn spawn(command: &[String]) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            bail!("MCP server command cannot be empty");
        };

        let mut process = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn MCP server: {}", program))?;

        let stdin = process
            .stdin
            .take()
            .context("Failed to capture MCP server stdin")?;
        let stdout = process
            .stdout
            .take()
            .context("Failed to capture MCP server stdout")?;

        tracing::info!("MCP server process started: {}", program);

        Ok(Self {
            program: program.clone(),
            process: Mutex::new(process),
            lines: LineTransport::new(stdin, stdout),
        })
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        self.lines.send(request).await
    }

    async fn notify(&self, request: &JsonRpcRequest) -> Result<()> {
        self.lines.notify(request).await
    }

    async fn close(&self) -> Result<()> {
        let mut process = self.process.lock().await;
        if let Err(e) = process.kill().await {
            tracing::warn!("Failed to kill MCP server {}: {}", self.program, e);
        }
        tracing::info!("MCP server process terminated: {}", self.program);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn empty_command_fails() {
        let err = StdioTransport::spawn(&[]).err().unwrap();
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[tokio::test]
    async fn missing_program_fails() {
        let result = StdioTransport::spawn(&["nonexistent_mcp_server_12345".to_string()]);
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn skips_unrelated_lines_until_matching_id() {
        // `sh` plays a server that logs noise, answers a stale id, then the real one.
        let script = r#"read line; echo 'starting up'; echo '{"jsonrpc":"2.0","method":"notifications/message"}'; echo '{"jsonrpc":"2.0","id":1,"result":{"stale":true}}'; echo '{"jsonrpc":"2.0","id":2,"result":{"ok":true}}'"#;
        let transport = StdioTransport::spawn(&[
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
        ])
        .unwrap();

        let response = transport
            .send(&JsonRpcRequest::new(2, "ping"))
            .await
            .unwrap();
        assert_eq!(response.result.unwrap()["ok"], true);
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn interrupted_write_makes_later_requests_fail() {
        // The peer never reads, so a request larger than the pipe blocks mid-write.
        let (client, _server) = tokio::io::duplex(16);
        let (read_half, write_half) = tokio::io::split(client);
        let transport = LineTransport::new(write_half, read_half);

        let request = JsonRpcRequest::new(1, "resources/read")
            .with_params(serde_json::json!({"uri": "ui://snapshot/accessibility"}));
        let cut = tokio::time::timeout(Duration::from_millis(50), transport.send(&request)).await;
        assert!(cut.is_err());

        let err = transport
            .send(&JsonRpcRequest::new(2, "resources/list"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("interrupted mid-write"));
        let err = transport
            .notify(&JsonRpcRequest::notification("notifications/initialized"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("interrupted mid-write"));
    }

    #[tokio::test]
    async fn abandoned_read_leaves_the_connection_usable() {
        let (client, server) = tokio::io::duplex(4096);
        let (read_half, write_half) = tokio::io::split(client);
        let transport = LineTransport::new(write_half, read_half);
        let (server_read, mut server_write) = tokio::io::split(server);
        let mut server_lines = BufReader::new(server_read).lines();

        let waiting = tokio::time::timeout(
            Duration::from_millis(50),
            transport.send(&JsonRpcRequest::new(1, "resources/list")),
        )
        .await;
        assert!(waiting.is_err());
        assert!(server_lines.next_line().await.unwrap().unwrap().contains("\"id\":1"));

        // The late answer to 1 is skipped; 2 gets its own.
        server_write
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"late\":true}}\n{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"ok\":true}}\n")
            .await
            .unwrap();
        let response = transport
            .send(&JsonRpcRequest::new(2, "resources/list"))
            .await
            .unwrap();
        assert_eq!(response.result.unwrap()["ok"], true);
    }
}
