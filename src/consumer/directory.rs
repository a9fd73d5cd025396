//! Incremental persistence of published fronts.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::Consume;
use crate::error::ConsumerError;
use crate::observed::AlgorithmObservedData;

type Formatter<S> = Box<dyn Fn(&S) -> String + Send + Sync>;

/// Writes every received solution set to a directory.
///
/// The n-th set (counting from 0) produces two tab-separated files:
///
/// - `FUN{n}.tsv`: one line of objective values per solution
/// - `VAR{n}.tsv`: one line per solution, rendered by the formatter
///
/// The directory is created on first use.
pub struct DirectoryOutput<S> {
    dir: PathBuf,
    format: Formatter<S>,
    counter: AtomicU64,
}

impl<S> DirectoryOutput<S> {
    /// Writes into `dir`, rendering solutions with `format`.
    pub fn new(dir: impl Into<PathBuf>, format: impl Fn(&S) -> String + Send + Sync + 'static) -> Self {
        Self {
            dir: dir.into(),
            format: Box::new(format),
            counter: AtomicU64::new(0),
        }
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of sets written so far.
    pub fn written(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl DirectoryOutput<Vec<usize>> {
    /// Writes permutations as tab-separated indices.
    pub fn permutations(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, |perm: &Vec<usize>| join_tab(perm.iter()))
    }
}

fn join_tab<T: ToString>(values: impl Iterator<Item = T>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join("\t")
}

#[async_trait]
impl<S: Send + Sync + 'static> Consume<S> for DirectoryOutput<S> {
    async fn on_data(&self, data: Arc<AlgorithmObservedData<S>>) -> Result<(), ConsumerError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut fun = String::new();
        let mut var = String::new();
        for candidate in data.solutions() {
            fun.push_str(&join_tab(candidate.objectives().iter()));
            fun.push('\n');
            var.push_str(&(self.format)(candidate.solution()));
            var.push('\n');
        }

        let n = self.counter.load(Ordering::Relaxed);
        tokio::fs::write(self.dir.join(format!("FUN{n}.tsv")), fun).await?;
        tokio::fs::write(self.dir.join(format!("VAR{n}.tsv")), var).await?;
        self.counter.fetch_add(1, Ordering::Relaxed);

        debug!(
            dir = %self.dir.display(),
            index = n,
            generation = data.generation(),
            solutions = data.len(),
            "front written"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "directory-output"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Candidate;

    fn front(generation: usize, rows: Vec<(Vec<usize>, Vec<f64>)>) -> Arc<AlgorithmObservedData<Vec<usize>>> {
        let solutions = rows
            .into_iter()
            .map(|(perm, objs)| {
                let mut c = Candidate::new(perm);
                c.set_evaluation(Ok(objs), 0);
                c
            })
            .collect();
        Arc::new(AlgorithmObservedData::new(generation, 0, 0, 0, solutions))
    }

    #[tokio::test]
    async fn test_writes_numbered_files() {
        let tmp = tempfile::tempdir().unwrap();
        let out = DirectoryOutput::permutations(tmp.path().join("fronts"));

        let first = vec![(vec![0, 1, 2], vec![3.0, 4.5]), (vec![2, 1, 0], vec![4.0, 1.0])];
        out.on_data(front(1, first)).await.unwrap();
        out.on_data(front(2, vec![(vec![1, 0, 2], vec![2.0, 2.0])])).await.unwrap();

        let dir = tmp.path().join("fronts");
        let fun0 = std::fs::read_to_string(dir.join("FUN0.tsv")).unwrap();
        let var0 = std::fs::read_to_string(dir.join("VAR0.tsv")).unwrap();
        assert_eq!(fun0, "3\t4.5\n4\t1\n");
        assert_eq!(var0, "0\t1\t2\n2\t1\t0\n");
        let fun1 = std::fs::read_to_string(dir.join("FUN1.tsv")).unwrap();
        assert_eq!(fun1, "2\t2\n");
        assert_eq!(out.written(), 2);
    }

    #[tokio::test]
    async fn test_io_error_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();
        let out = DirectoryOutput::permutations(&blocker);

        let err = out.on_data(front(1, Vec::new())).await.unwrap_err();
        assert_eq!(err.as_label(), "consumer_io");
        assert_eq!(out.written(), 0);
    }
}
