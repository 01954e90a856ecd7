//! # LaTeX 컴파일러
//!
//! 외부 명령(기본값: texlive 컨테이너의 latexmk)을 임시 작업 디렉토리에서 실행합니다.
//! 변형 폴더에는 직접 쓰지 않으므로, 실패하거나 시간 초과가 나도
//! 이전에 만들어진 `main.pdf`는 그대로 남습니다.
//!
//! 명령 인자의 자리표시자:
//! - `{dir}`: 임시 작업 디렉토리 경로
//! - `{timeout}`: 제한 시간(초). 컨테이너 안의 명령을 `timeout`으로 감쌀 때 씁니다.
//!   `docker` CLI를 죽여도 컨테이너는 계속 돌기 때문입니다.

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

const SOURCE_FILE: &str = "main.tex";
const OUTPUT_FILE: &str = "main.pdf";
const WORKDIR_PLACEHOLDER: &str = "{dir}";
const TIMEOUT_PLACEHOLDER: &str = "{timeout}";
/// 프로세스가 끝난 뒤 파이프에 남은 출력을 기다리는 시간
const DRAIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Compiled { pdf: Vec<u8> },
    Failed { log: String },
}

#[async_trait]
pub trait DocumentCompiler: Send + Sync {
    async fn compile(&self, markup: &str) -> CompileOutcome;
}

#[derive(Debug, Clone)]
pub struct ProcessCompiler {
    command: Vec<String>,
    timeout: Duration,
}

/// stdout과 stderr를 도착 순서대로 모으는 버퍼
type OutputBuffer = Arc<Mutex<Vec<u8>>>;

impl ProcessCompiler {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    async fn run(&self, markup: &str) -> io::Result<CompileOutcome> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty compiler command"))?;

        // drop 시점에 디렉토리째 삭제됨
        let workdir = tempfile::tempdir()?;
        tokio::fs::write(workdir.path().join(SOURCE_FILE), markup).await?;

        let dir = workdir.path().to_string_lossy();
        // 컨테이너 안의 제한이 바깥보다 먼저 걸리지 않도록 올림
        let limit_secs = self.timeout.as_secs() + u64::from(self.timeout.subsec_nanos() > 0);
        let limit = limit_secs.max(1).to_string();

        let mut command = Command::new(program);
        command
            .args(args.iter().map(|a| {
                a.replace(WORKDIR_PLACEHOLDER, &dir)
                    .replace(TIMEOUT_PLACEHOLDER, &limit)
            }))
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let output: OutputBuffer = Arc::default();
        let readers = vec![
            drain(child.stdout.take(), output.clone()),
            drain(child.stderr.take(), output.clone()),
        ];

        let waited = tokio::time::timeout(self.timeout, child.wait()).await;
        let status = match waited {
            Ok(status) => status?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill timed out compiler: {}", e);
                }
                finish(readers).await;
                return Ok(CompileOutcome::Failed {
                    log: format!(
                        "Compilation timed out after {}s\n{}",
                        self.timeout.as_secs_f32(),
                        collected(&output)
                    ),
                });
            }
        };

        finish(readers).await;
        let log = collected(&output);

        if !status.success() {
            return Ok(CompileOutcome::Failed {
                log: format!("Compiler exited with {}\n{}", status, log),
            });
        }

        match tokio::fs::read(workdir.path().join(OUTPUT_FILE)).await {
            Ok(pdf) => Ok(CompileOutcome::Compiled { pdf }),
            Err(_) => Ok(CompileOutcome::Failed {
                log: format!("Compiler finished but produced no {}\n{}", OUTPUT_FILE, log),
            }),
        }
    }
}

/// 파이프를 끝까지 읽어 버퍼에 덧붙이는 태스크를 띄웁니다.
/// 시간 초과로 중단되어도 그때까지 읽은 내용은 버퍼에 남습니다.
fn drain<R>(pipe: Option<R>, sink: OutputBuffer) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut pipe) = pipe else { return };
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    lock(&sink).extend_from_slice(&chunk[..n]);
                }
            }
        }
    })
}

/// 손자 프로세스가 파이프를 잡고 있으면 EOF가 오지 않으므로 잠깐만 기다리고 멈춥니다.
async fn finish(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        let abort = reader.abort_handle();
        if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
            abort.abort();
        }
    }
}

fn collected(output: &OutputBuffer) -> String {
    String::from_utf8_lossy(&lock(output)).into_owned()
}

fn lock(buffer: &OutputBuffer) -> MutexGuard<'_, Vec<u8>> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl DocumentCompiler for ProcessCompiler {
    async fn compile(&self, markup: &str) -> CompileOutcome {
        match self.run(markup).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Failed to run compiler: {}", e);
                CompileOutcome::Failed {
                    log: format!("Failed to run compiler: {}", e),
                }
            }
        }
    }
}
