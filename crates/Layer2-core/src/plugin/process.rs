//! Process Adapter - 외부 바이너리 플러그인
//!
//! stdio JSON 프로토콜을 말하는 OS 바이너리를 ToolPlugin으로 감쌉니다.
//!
//! 프로토콜:
//! - Introspection: `<binary> --introspect`
//!   stdout → JSON descriptor 한 개 (설치 시 한 번만 호출)
//! - Execution: `<binary> --execute '<json-args>'`
//!   stderr → newline 단위 {"progress":0.5,"message":"..."}
//!   stdout → 터미널 JSON 결과 객체 한 개
//!
//! 실행 상태: NotStarted → Spawned → (StreamingProgress)* →
//! Terminated | TimedOut | Cancelled

use super::cache::CachedProcessPlugin;
use super::context::ExecutionContext;
use super::traits::{ArgValues, PluginDescriptor, RunOutcome, ToolPlugin};
use async_trait::async_trait;
use fieldkit_foundation::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Introspection 플래그
pub const INTROSPECT_FLAG: &str = "--introspect";

/// 실행 플래그
pub const EXECUTE_FLAG: &str = "--execute";

/// run_timeout 미설정 시 사용하는 사실상 무제한 데드라인
const NO_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

// ============================================================================
// ProcessRuntimeConfig - 프로세스 실행 파라미터
// ============================================================================

/// 프로세스 플러그인 실행 설정
///
/// introspection 타임아웃은 일반 실행 타임아웃과 별개입니다
/// (introspection은 즉시 끝나야 정상).
#[derive(Debug, Clone)]
pub struct ProcessRuntimeConfig {
    /// 실행 타임아웃 (None = 무제한)
    pub run_timeout: Option<Duration>,

    /// introspection 타임아웃
    pub introspect_timeout: Duration,

    /// 취소 시 SIGTERM 후 강제 종료까지의 유예
    pub kill_grace: Duration,
}

impl Default for ProcessRuntimeConfig {
    fn default() -> Self {
        Self {
            run_timeout: None,
            introspect_timeout: Duration::from_secs(10),
            kill_grace: Duration::from_secs(5),
        }
    }
}

// ============================================================================
// 프로토콜 메시지
// ============================================================================

/// stderr로 스트리밍되는 진행률 이벤트
#[derive(Debug, Deserialize)]
struct ProgressEvent {
    progress: f64,
    #[serde(default)]
    message: String,
}

// ============================================================================
// ProcessPlugin - 어댑터
// ============================================================================

/// stdio 프로토콜 바이너리를 감싸는 Plugin Adapter
///
/// descriptor는 설치 시점에 캐시된 것을 사용하며, run마다 introspection을
/// 반복하지 않습니다.
pub struct ProcessPlugin {
    binary: PathBuf,
    descriptor: PluginDescriptor,
    runtime: ProcessRuntimeConfig,
}

impl ProcessPlugin {
    /// 새 어댑터 생성
    pub fn new(
        binary: impl Into<PathBuf>,
        descriptor: PluginDescriptor,
        runtime: ProcessRuntimeConfig,
    ) -> Self {
        Self {
            binary: binary.into(),
            descriptor,
            runtime,
        }
    }

    /// 캐시 항목에서 복원
    pub fn from_cache(entry: &CachedProcessPlugin, runtime: ProcessRuntimeConfig) -> Self {
        Self::new(
            entry.binary_path.clone(),
            entry.descriptor.clone(),
            runtime,
        )
    }

    /// 바이너리 경로
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    // ========================================================================
    // Introspection (설치 시 1회)
    // ========================================================================

    /// `<binary> --introspect`를 실행해 descriptor를 얻음
    pub async fn introspect(binary: &Path, timeout: Duration) -> Result<PluginDescriptor> {
        debug!("Introspecting {:?}", binary);

        let output = tokio::time::timeout(
            timeout,
            Command::new(binary)
                .arg(INTROSPECT_FLAG)
                .stdin(Stdio::null())
                .output(),
        )
        .await
        .map_err(|_| {
            Error::Protocol(format!(
                "'{} {}' timed out after {}s",
                binary.display(),
                INTROSPECT_FLAG,
                timeout.as_secs()
            ))
        })?
        .map_err(|e| {
            Error::Protocol(format!("cannot run '{}': {}", binary.display(), e))
        })?;

        if !output.status.success() {
            return Err(Error::Protocol(format!(
                "'{} {}' exited {}: {}",
                binary.display(),
                INTROSPECT_FLAG,
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let descriptor: PluginDescriptor =
            serde_json::from_slice(&output.stdout).map_err(|e| {
                Error::Protocol(format!(
                    "'{}' returned invalid introspection JSON: {}",
                    binary.display(),
                    e
                ))
            })?;

        descriptor.validate()?;
        Ok(descriptor)
    }

    // ========================================================================
    // 실행
    // ========================================================================

    async fn run_binary(&self, args: &ArgValues, ctx: &ExecutionContext) -> Result<RunOutcome> {
        // 시작 전 취소: 프로세스를 띄우지 않음
        if ctx.is_cancelled() {
            return Ok(RunOutcome::cancelled("Cancelled by user"));
        }

        let payload = serde_json::to_string(&serde_json::Value::Object(args.clone()))?;

        let mut child = Command::new(&self.binary)
            .arg(EXECUTE_FLAG)
            .arg(&payload)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Protocol(format!("cannot run '{}': {}", self.binary.display(), e))
            })?;

        debug!("Spawned process plugin '{}'", self.descriptor.name);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("child stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("child stderr not captured".to_string()))?;

        // 터미널 stdout은 별도 태스크로 수집
        let stdout_task = tokio::spawn(async move {
            let mut buf = String::new();
            let mut reader = BufReader::new(stdout);
            let _ = reader.read_to_string(&mut buf).await;
            buf
        });

        let mut stderr_lines = BufReader::new(stderr).lines();
        let cancel = ctx.cancel_token();
        let deadline =
            tokio::time::Instant::now() + self.runtime.run_timeout.unwrap_or(NO_TIMEOUT);
        let mut raw_stderr: Vec<String> = Vec::new();

        // StreamingProgress: 진행률 / 취소 / 타임아웃을 동시에 감시
        loop {
            tokio::select! {
                line = stderr_lines.next_line() => match line {
                    Ok(Some(line)) => {
                        match serde_json::from_str::<ProgressEvent>(&line) {
                            Ok(event) => ctx.progress(event.progress, &event.message),
                            // JSON이 아닌 stderr는 진단용으로 보관
                            Err(_) => raw_stderr.push(line),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("stderr read error from '{}': {}", self.descriptor.name, e);
                        break;
                    }
                },
                _ = cancel.cancelled() => {
                    self.terminate(&mut child).await;
                    stdout_task.abort();
                    debug!("Process plugin '{}' cancelled", self.descriptor.name);
                    return Ok(RunOutcome::cancelled("Cancelled by user"));
                }
                _ = tokio::time::sleep_until(deadline) => {
                    self.terminate(&mut child).await;
                    stdout_task.abort();
                    return Ok(self.timeout_outcome());
                }
            }
        }

        // stderr EOF 이후에도 종료까지 취소/타임아웃 감시 유지
        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                self.terminate(&mut child).await;
                stdout_task.abort();
                return Ok(RunOutcome::cancelled("Cancelled by user"));
            }
            _ = tokio::time::sleep_until(deadline) => {
                self.terminate(&mut child).await;
                stdout_task.abort();
                return Ok(self.timeout_outcome());
            }
        };

        let stdout_text = stdout_task.await.unwrap_or_default();
        debug!(
            "Process plugin '{}' terminated with {:?}",
            self.descriptor.name,
            status.code()
        );

        Ok(self.parse_terminal(&stdout_text, &raw_stderr, status.code()))
    }

    /// 터미널 stdout JSON 파싱
    ///
    /// 파싱 불가능한 출력은 원본을 data에 실은 Failure가 됩니다 —
    /// 절대 에러로 전파하지 않습니다.
    fn parse_terminal(
        &self,
        stdout_text: &str,
        raw_stderr: &[String],
        exit_code: Option<i32>,
    ) -> RunOutcome {
        let trimmed = stdout_text.trim();

        // 전체가 객체 하나인 경우가 정상. 로그가 섞였으면 마지막 줄 시도.
        let parsed = serde_json::from_str::<RunOutcome>(trimmed).or_else(|e| {
            trimmed
                .lines()
                .last()
                .map(|last| serde_json::from_str::<RunOutcome>(last.trim()))
                .unwrap_or(Err(e))
        });

        match parsed {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "Process plugin '{}' protocol violation: {}",
                    self.descriptor.name, e
                );
                RunOutcome::failure(format!(
                    "'{}' returned no parseable result (exit code {})",
                    self.descriptor.name,
                    exit_code.map_or("unknown".to_string(), |c| c.to_string())
                ))
                .with_data("raw_stdout", stdout_text)
                .with_data("raw_stderr", raw_stderr.join("\n"))
                .with_data("exit_code", exit_code.unwrap_or(-1))
            }
        }
    }

    fn timeout_outcome(&self) -> RunOutcome {
        let secs = self.runtime.run_timeout.unwrap_or(NO_TIMEOUT).as_secs();
        RunOutcome::failure(format!(
            "'{}' timed out after {}s",
            self.descriptor.name, secs
        ))
        .with_data("timed_out", true)
    }

    /// 자식 프로세스 종료: SIGTERM → 유예 대기 → 강제 종료
    ///
    /// 반환 시점에는 자식이 더 이상 실행 중이지 않습니다.
    async fn terminate(&self, child: &mut Child) {
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                unsafe {
                    libc::kill(pid as i32, libc::SIGTERM);
                }
                if tokio::time::timeout(self.runtime.kill_grace, child.wait())
                    .await
                    .is_ok()
                {
                    return;
                }
                warn!(
                    "Process plugin '{}' ignored SIGTERM, killing",
                    self.descriptor.name
                );
            }
        }

        let _ = child.kill().await;
    }
}

#[async_trait]
impl ToolPlugin for ProcessPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        self.descriptor.clone()
    }

    async fn run(&self, args: ArgValues, ctx: &ExecutionContext) -> Result<RunOutcome> {
        self.run_binary(&args, ctx).await
    }
}
