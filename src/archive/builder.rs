//! Archive builder - walks selected resources and streams them into one archive

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;

use super::naming::{directory_prefix, file_entry_path};
use super::types::{
    ArchiveEntry, BuildError, BuildReport, BuildResult, SkipStage, SkippedNode,
};
use super::writer::{join_writer, spawn_writer};
use crate::config::BuildConfig;
use crate::disk::{DiskClient, UpstreamError};

/// One pending node of the traversal
#[derive(Debug, Clone)]
struct NodeJob {
    /// Index of the selected path this node descends from
    root: usize,
    path: String,
    prefix: String,
    depth: usize,
}

enum NodeOutcome {
    File,
    Directory {
        job: NodeJob,
        resolved_path: String,
        child_prefix: String,
        children: Vec<String>,
    },
    Skipped(SkippedNode),
    WriterClosed,
    Cancelled,
}

/// State shared by every node task of one build
struct NodeContext {
    client: DiskClient,
    public_key: String,
    entries: mpsc::Sender<ArchiveEntry>,
    requests: Semaphore,
    cancel: CancellationToken,
}

impl NodeContext {
    fn skip(&self, path: &str, stage: SkipStage, reason: String) -> NodeOutcome {
        warn!(
            "node_skipped: key={} path={} stage={} error={}",
            self.public_key, path, stage, reason
        );
        NodeOutcome::Skipped(SkippedNode {
            path: path.to_string(),
            stage,
            reason,
        })
    }
}

/// Running node tasks, each remembered by the path it works on
struct NodeTasks {
    set: JoinSet<NodeOutcome>,
    paths: HashMap<Id, String>,
}

impl NodeTasks {
    fn new() -> Self {
        Self {
            set: JoinSet::new(),
            paths: HashMap::new(),
        }
    }

    fn spawn<F>(&mut self, path: String, task: F)
    where
        F: Future<Output = NodeOutcome> + Send + 'static,
    {
        let handle = self.set.spawn(task);
        self.paths.insert(handle.id(), path);
    }

    fn abort_all(&mut self) {
        self.set.abort_all();
    }

    /// Next finished node; a task that panicked comes back as a skipped node
    async fn next(&mut self) -> Option<NodeOutcome> {
        let joined = self.set.join_next_with_id().await?;
        Some(match joined {
            Ok((id, outcome)) => {
                self.paths.remove(&id);
                outcome
            }
            Err(e) => {
                let path = self.paths.remove(&e.id()).unwrap_or_default();
                error!("node_task_failed: path={} error={}", path, e);
                NodeOutcome::Skipped(SkippedNode {
                    path,
                    stage: SkipStage::Internal,
                    reason: e.to_string(),
                })
            }
        })
    }
}

pub struct ArchiveBuilder {
    client: DiskClient,
    config: BuildConfig,
}

impl ArchiveBuilder {
    pub fn new(config: BuildConfig) -> BuildResult<Self> {
        let client = DiskClient::new(&config).map_err(|e| BuildError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Build an archive of `selected_paths` under the share identified by `public_key`.
    ///
    /// Individual resources that cannot be resolved or downloaded are left out and listed
    /// in [`BuildReport::skipped`]; only an empty selection, a limit breach, cancellation
    /// or an archive write failure fail the build.
    pub async fn build(&self, public_key: &str, selected_paths: &[String]) -> BuildResult<BuildReport> {
        self.build_with_cancel(public_key, selected_paths, CancellationToken::new())
            .await
    }

    /// Same as [`ArchiveBuilder::build`], abandoned as soon as `cancel` fires
    pub async fn build_with_cancel(
        &self,
        public_key: &str,
        selected_paths: &[String],
        cancel: CancellationToken,
    ) -> BuildResult<BuildReport> {
        if selected_paths.is_empty() {
            return Err(BuildError::Input("no resources selected".to_string()));
        }
        if public_key.trim().is_empty() {
            return Err(BuildError::Input("public key must not be empty".to_string()));
        }

        info!(
            "build_start: roots={} format={} concurrency={}",
            selected_paths.len(),
            self.config.format,
            self.config.max_concurrent_requests
        );
        let started = Instant::now();

        let work = self.run(public_key, selected_paths, cancel.clone());
        let result = match self.config.build_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => {
                    cancel.cancel();
                    Err(BuildError::TimedOut)
                }
            },
            None => work.await,
        };

        match &result {
            Ok(report) => info!(
                "build_finish: entries={} skipped={} bytes={} elapsed_ms={}",
                report.entries.len(),
                report.skipped.len(),
                report.archive.len(),
                started.elapsed().as_millis()
            ),
            Err(e) => error!(
                "build_failed: error={} elapsed_ms={}",
                e,
                started.elapsed().as_millis()
            ),
        }
        result
    }

    async fn run(
        &self,
        public_key: &str,
        selected_paths: &[String],
        cancel: CancellationToken,
    ) -> BuildResult<BuildReport> {
        let concurrency = self.config.max_concurrent_requests.max(1);
        let (sender, receiver) = mpsc::channel(concurrency * 2);
        let writer = spawn_writer(self.config.format, receiver);

        let ctx = Arc::new(NodeContext {
            client: self.client.clone(),
            public_key: public_key.to_string(),
            entries: sender,
            requests: Semaphore::new(concurrency),
            cancel: cancel.clone(),
        });

        let mut tasks = NodeTasks::new();
        let mut visited: Vec<HashSet<String>> = vec![HashSet::new(); selected_paths.len()];
        let mut skipped: Vec<SkippedNode> = Vec::new();
        let mut scheduled = 0usize;
        let mut writer_closed = false;

        for (root, path) in selected_paths.iter().enumerate() {
            visited[root].insert(path.clone());
            let job = NodeJob {
                root,
                path: path.clone(),
                prefix: String::new(),
                depth: 0,
            };
            self.schedule(&mut tasks, &ctx, job, &mut scheduled)?;
        }

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(BuildError::Cancelled);
                }
                outcome = tasks.next() => outcome,
            };
            let Some(outcome) = outcome else {
                break;
            };

            match outcome {
                NodeOutcome::File => {}
                NodeOutcome::Skipped(node) => skipped.push(node),
                NodeOutcome::Cancelled => {
                    tasks.abort_all();
                    return Err(BuildError::Cancelled);
                }
                NodeOutcome::WriterClosed => {
                    writer_closed = true;
                    tasks.abort_all();
                    break;
                }
                NodeOutcome::Directory {
                    job,
                    resolved_path,
                    child_prefix,
                    children,
                } => {
                    let depth = job.depth + 1;
                    if !children.is_empty() && depth > self.config.max_depth {
                        warn!(
                            "depth_limit: path={} depth={} max={}",
                            job.path, depth, self.config.max_depth
                        );
                        return Err(BuildError::LimitExceeded {
                            limit: "max_depth",
                            max: self.config.max_depth,
                        });
                    }

                    let seen = &mut visited[job.root];
                    seen.insert(resolved_path);
                    for child in children {
                        if !seen.insert(child.clone()) {
                            warn!(
                                "node_skipped: key={} path={} stage={} error=already visited under {}",
                                public_key,
                                child,
                                SkipStage::Cycle,
                                job.path
                            );
                            skipped.push(SkippedNode {
                                path: child,
                                stage: SkipStage::Cycle,
                                reason: format!("already visited under {}", job.path),
                            });
                            continue;
                        }
                        let child_job = NodeJob {
                            root: job.root,
                            path: child,
                            prefix: child_prefix.clone(),
                            depth,
                        };
                        self.schedule(&mut tasks, &ctx, child_job, &mut scheduled)?;
                    }
                }
            }
        }

        // Last sender goes away here; the writer finalizes once it has drained the queue
        drop(ctx);
        let written = join_writer(writer).await;
        if writer_closed {
            return Err(written.err().unwrap_or_else(|| {
                BuildError::ArchiveWrite("archive writer stopped early".to_string())
            }));
        }
        let written = written?;

        Ok(BuildReport {
            format: self.config.format,
            archive: written.archive,
            entries: written.entries,
            skipped,
        })
    }

    fn schedule(
        &self,
        tasks: &mut NodeTasks,
        ctx: &Arc<NodeContext>,
        job: NodeJob,
        scheduled: &mut usize,
    ) -> BuildResult<()> {
        if *scheduled >= self.config.max_nodes {
            warn!(
                "node_limit: path={} max={}",
                job.path, self.config.max_nodes
            );
            return Err(BuildError::LimitExceeded {
                limit: "max_nodes",
                max: self.config.max_nodes,
            });
        }
        *scheduled += 1;
        debug!(
            "node_scheduled: path={} prefix={} depth={}",
            job.path, job.prefix, job.depth
        );
        tasks.spawn(job.path.clone(), process_node(ctx.clone(), job));
        Ok(())
    }
}

/// Resolve one node; a file is downloaded and written, a directory writes its marker
/// and hands its children back to the coordinator.
async fn process_node(ctx: Arc<NodeContext>, job: NodeJob) -> NodeOutcome {
    if ctx.cancel.is_cancelled() {
        return NodeOutcome::Cancelled;
    }

    let node = {
        let Ok(_permit) = ctx.requests.acquire().await else {
            return NodeOutcome::Cancelled;
        };
        match ctx.client.resolve(&ctx.public_key, &job.path).await {
            Ok(node) => node,
            Err(e) => return ctx.skip(&job.path, SkipStage::Resolve, e.to_string()),
        }
    };

    if node.is_dir() {
        let child_prefix = directory_prefix(&job.prefix, &node.name);
        if ctx
            .entries
            .send(ArchiveEntry::directory(child_prefix.clone()))
            .await
            .is_err()
        {
            return NodeOutcome::WriterClosed;
        }
        return NodeOutcome::Directory {
            resolved_path: node.path,
            child_prefix,
            children: node.children,
            job,
        };
    }

    let href = {
        let Ok(_permit) = ctx.requests.acquire().await else {
            return NodeOutcome::Cancelled;
        };
        match ctx.client.download_link(&ctx.public_key, &job.path).await {
            Ok(Some(href)) => href,
            Ok(None) => {
                return ctx.skip(
                    &job.path,
                    SkipStage::DownloadLink,
                    "no download link returned".to_string(),
                )
            }
            Err(e) => return ctx.skip(&job.path, SkipStage::DownloadLink, e.to_string()),
        }
    };

    let bytes = {
        let Ok(_permit) = ctx.requests.acquire().await else {
            return NodeOutcome::Cancelled;
        };
        match ctx.client.fetch_bytes(&href, &ctx.cancel).await {
            Ok(bytes) => bytes,
            Err(UpstreamError::Cancelled) => return NodeOutcome::Cancelled,
            Err(e) => return ctx.skip(&job.path, SkipStage::Fetch, e.to_string()),
        }
    };

    let entry_path = file_entry_path(&job.prefix, &node.name);
    debug!(
        "node_downloaded: path={} entry={} bytes={}",
        job.path,
        entry_path,
        bytes.len()
    );
    if ctx
        .entries
        .send(ArchiveEntry::file(entry_path, bytes))
        .await
        .is_err()
    {
        return NodeOutcome::WriterClosed;
    }
    NodeOutcome::File
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn explode() -> NodeOutcome {
        panic!("resolver blew up")
    }

    #[tokio::test]
    async fn panicked_node_task_is_reported_as_skipped() {
        let mut tasks = NodeTasks::new();
        tasks.spawn("/broken".to_string(), explode());
        tasks.spawn("/fine.txt".to_string(), async { NodeOutcome::File });

        let mut files = 0;
        let mut skipped = Vec::new();
        while let Some(outcome) = tasks.next().await {
            match outcome {
                NodeOutcome::File => files += 1,
                NodeOutcome::Skipped(node) => skipped.push(node),
                _ => panic!("unexpected node outcome"),
            }
        }

        assert_eq!(files, 1);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].path, "/broken");
        assert_eq!(skipped[0].stage, SkipStage::Internal);
        assert!(skipped[0].reason.contains("panicked"));
        assert!(tasks.paths.is_empty());
    }
}
