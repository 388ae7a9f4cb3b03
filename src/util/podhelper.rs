//! Remote exec helper
//!
//! Fetches the tenant kubeconfig by exec'ing into the tenant control-plane
//! pod, polling until it answers or a deadline passes.

use crate::config::ExecConfig;
use crate::domain::ports::PodExecutor;
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::AttachParams;
use kube::{Api, Client};
use tokio::io::AsyncReadExt;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info};

/// Pod executor over the `kube` websocket exec API
#[derive(Clone)]
pub struct KubePodExecutor {
    client: Client,
}

impl KubePodExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodExecutor for KubePodExecutor {
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
    ) -> Result<Vec<u8>> {
        let exec_error = |reason: String| Error::Exec {
            namespace: namespace.to_string(),
            pod: pod.to_string(),
            reason,
        };

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = AttachParams::default().container(container);
        let mut attached = pods.exec(pod, command.to_vec(), &params).await?;

        let stdout_reader = attached.stdout();
        let stderr_reader = attached.stderr();
        let read_stdout = async {
            let mut buf = Vec::new();
            if let Some(mut reader) = stdout_reader {
                reader.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        };
        let read_stderr = async {
            let mut buf = Vec::new();
            if let Some(mut reader) = stderr_reader {
                reader.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        };
        let (stdout, stderr) = tokio::join!(read_stdout, read_stderr);
        let (stdout, stderr) = (
            stdout.map_err(|e| exec_error(e.to_string()))?,
            stderr.map_err(|e| exec_error(e.to_string()))?,
        );

        let status = match attached.take_status() {
            Some(status) => status.await,
            None => None,
        };
        attached
            .join()
            .await
            .map_err(|e| exec_error(e.to_string()))?;

        if let Some(status) = status {
            if status.status.as_deref() == Some("Failure") {
                let reason = status
                    .message
                    .unwrap_or_else(|| String::from_utf8_lossy(&stderr).into_owned());
                return Err(exec_error(reason));
            }
        }

        Ok(stdout)
    }
}

/// Read the tenant kubeconfig out of the tenant control-plane pod.
///
/// Tries immediately, then every `poll_interval` until `timeout` has
/// passed. Each attempt is also bounded by the remaining time.
pub async fn get_vcluster_config(executor: &dyn PodExecutor, config: &ExecConfig) -> Result<Vec<u8>> {
    let deadline = Instant::now() + config.timeout;
    let mut printed_waiting = false;
    let mut last_error = String::from("no attempt finished");

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let attempt = executor.exec(
            &config.namespace,
            &config.pod,
            &config.container,
            &config.command,
        );

        match timeout(remaining, attempt).await {
            Ok(Ok(out)) => return Ok(out),
            Ok(Err(e)) => {
                if !printed_waiting {
                    info!("Waiting for vcluster to come up...");
                    printed_waiting = true;
                }
                debug!(pod = %config.pod, error = %e, "Observed error");
                last_error = e.to_string();
            }
            Err(_) => {
                last_error = "exec did not complete".to_string();
                break;
            }
        }

        if Instant::now() + config.poll_interval > deadline {
            break;
        }
        sleep(config.poll_interval).await;
    }

    Err(Error::Timeout {
        operation: "wait for vcluster".to_string(),
        duration: config.timeout,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` calls, then prints a kubeconfig
    struct FlakyExecutor {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PodExecutor for FlakyExecutor {
        async fn exec(
            &self,
            namespace: &str,
            pod: &str,
            _container: &str,
            _command: &[String],
        ) -> Result<Vec<u8>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(Error::Exec {
                    namespace: namespace.to_string(),
                    pod: pod.to_string(),
                    reason: "container not found".to_string(),
                });
            }
            Ok(b"apiVersion: v1\nkind: Config\n".to_vec())
        }
    }

    fn exec_config() -> ExecConfig {
        ExecConfig {
            namespace: "tenant-a".to_string(),
            pod: "vcluster-0".to_string(),
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_retries() {
        let executor = FlakyExecutor {
            failures: 3,
            calls: AtomicUsize::new(0),
        };

        let out = get_vcluster_config(&executor, &exec_config()).await.unwrap();
        assert!(out.starts_with(b"apiVersion"));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_with_wrapped_error() {
        let executor = FlakyExecutor {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
        };

        let err = get_vcluster_config(&executor, &exec_config()).await.unwrap_err();
        assert_matches!(
            &err,
            Error::Timeout { operation, last_error, .. }
                if operation == "wait for vcluster" && last_error.contains("container not found")
        );
        // Immediate attempt plus one every 2s within the 10s deadline
        assert_eq!(executor.calls.load(Ordering::SeqCst), 6);
    }
}
