//! Parallel ingestion of records into chunk files plus a merged index.
//!
//! An [`Ingestor`] validates the output target, opens one shared
//! [`ChunkWriter`] under `<output>/<chunk_dir>`, and runs one scoped thread
//! per worker. Each worker pulls records from a shared cursor (or its own
//! partition), appends them through the writer, and records the placements in
//! a worker-local table persisted under `<output>/.workers`. Once every worker
//! has succeeded the tables are merged into `<output>/index.csv`; if any worker
//! fails the run fails and nothing is merged.

mod source;

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use ulid::Ulid;

use self::source::{partition, SharedSource};
use crate::{
    chunk::ChunkWriter,
    error::{Error, IoResultExt, Result},
    index::{read_worker_table, write_worker_table, Index, IndexBuilder},
    logging::{chunkdex_log, verbose_level},
    option::IngestOptions,
    record::Record,
};

/// Result of a successful ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Merged index of every ingested record.
    pub index: Index,
    /// Where the merged index was persisted.
    pub index_path: PathBuf,
    /// Directory holding the chunk files; index chunk names are relative to it.
    pub chunk_root: PathBuf,
}

/// Drives parallel workers through one chunk family.
#[derive(Debug, Clone, Default)]
pub struct Ingestor {
    options: IngestOptions,
}

impl Ingestor {
    /// Create an ingestor with the given options.
    pub fn new(options: IngestOptions) -> Self {
        Self { options }
    }

    /// Options the ingestor runs with.
    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Ingest records pulled from one cursor shared by all workers.
    pub fn ingest<I>(&self, output: impl AsRef<Path>, records: I) -> Result<IngestOutcome>
    where
        I: IntoIterator<Item = Record>,
        I::IntoIter: Send,
    {
        let source = SharedSource::new(records.into_iter());
        let source = &source;
        let workers = self.options.worker_count.resolve();
        self.run(
            output.as_ref(),
            (0..workers).map(|_| move || source.next()).collect(),
        )
    }

    /// Ingest a materialized list split into one contiguous partition per worker.
    pub fn ingest_partitioned(
        &self,
        output: impl AsRef<Path>,
        records: Vec<Record>,
    ) -> Result<IngestOutcome> {
        let workers = self.options.worker_count.resolve();
        self.run(
            output.as_ref(),
            partition(records, workers)
                .into_iter()
                .map(|part| {
                    let mut part = part.into_iter();
                    move || part.next()
                })
                .collect(),
        )
    }

    /// Ingest raw items mapped to records by `transform`.
    ///
    /// Items are fetched under the cursor lock; `transform` runs outside it.
    pub fn ingest_with<I, F>(
        &self,
        output: impl AsRef<Path>,
        items: I,
        transform: F,
    ) -> Result<IngestOutcome>
    where
        I: IntoIterator,
        I::IntoIter: Send,
        F: Fn(I::Item) -> Record + Sync,
    {
        let source = SharedSource::new(items.into_iter());
        let source = &source;
        let transform = &transform;
        let workers = self.options.worker_count.resolve();
        self.run(
            output.as_ref(),
            (0..workers)
                .map(|_| move || source.next().map(transform))
                .collect(),
        )
    }

    fn run<P>(&self, output: &Path, pullers: Vec<P>) -> Result<IngestOutcome>
    where
        P: FnMut() -> Option<Record> + Send,
    {
        self.check_preconditions(output)?;

        fs::create_dir_all(output).at(output)?;
        let chunk_root = self.options.chunk_root(output);
        let writer = ChunkWriter::open(
            &chunk_root,
            self.options.chunk_size_bytes,
            self.options.sync_policy,
        )?;
        let worker_dir = self.options.worker_dir(output);
        fs::create_dir_all(&worker_dir).at(&worker_dir)?;

        let start_level = if self.options.verbose {
            log::Level::Info
        } else {
            log::Level::Debug
        };
        chunkdex_log!(
            start_level,
            "ingest_start",
            "output={} workers={} chunk_size_bytes={} dtype={}",
            output.display(),
            pullers.len(),
            self.options.chunk_size_bytes,
            self.options.element_dtype
        );

        let abort = AtomicBool::new(false);
        let ctx = WorkerContext {
            writer: &writer,
            options: &self.options,
            worker_dir: &worker_dir,
            abort: &abort,
        };
        let results = ctx.run_all(pullers);

        let mut tables = Vec::with_capacity(results.len());
        let mut failure: Option<Error> = None;
        for result in results {
            match result {
                Ok(path) => tables.push(path),
                Err(Error::Aborted) => {
                    failure.get_or_insert(Error::Aborted);
                }
                Err(err) => {
                    if failure.as_ref().map_or(true, |f| matches!(f, Error::Aborted)) {
                        failure = Some(err);
                    }
                }
            }
        }
        if let Some(err) = failure {
            self.cleanup(&worker_dir, &tables);
            return Err(err);
        }

        let index_path = self.options.index_path(output);
        let merged = writer.finish().and_then(|()| {
            let index = self.merge(&tables)?;
            index.save(&index_path)?;
            Ok(index)
        });
        self.cleanup(&worker_dir, &tables);
        let index = merged?;

        chunkdex_log!(
            log::Level::Debug,
            "merge_finish",
            "index={} rows={} chunks={}",
            index_path.display(),
            index.len(),
            index.chunk_names().len()
        );

        Ok(IngestOutcome {
            index,
            index_path,
            chunk_root,
        })
    }

    fn check_preconditions(&self, output: &Path) -> Result<()> {
        if self.options.use_compression {
            return Err(Error::UnsupportedOption("write-side compression"));
        }
        match fs::symlink_metadata(output) {
            Ok(meta) if meta.is_file() => {
                return Err(Error::InvalidTarget(output.to_path_buf()));
            }
            Ok(_) => return Err(Error::TargetAlreadyExists(output.to_path_buf())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(Error::io(output, err)),
        }
        IndexBuilder::new(self.options.metadata_columns.as_deref())?;
        Ok(())
    }

    /// Concatenate worker tables in worker order.
    fn merge(&self, tables: &[PathBuf]) -> Result<Index> {
        let loaded = tables
            .iter()
            .map(|path| read_worker_table(path))
            .collect::<Result<Vec<_>>>()?;
        Index::concat(loaded)
    }

    /// Best-effort removal of worker-local tables; failures are only logged.
    fn cleanup(&self, worker_dir: &Path, tables: &[PathBuf]) {
        let level = verbose_level(self.options.verbose);
        for path in tables {
            if let Err(err) = fs::remove_file(path) {
                chunkdex_log!(level, "cleanup_failed", "path={} error={}", path.display(), err);
            }
        }
        if let Err(err) = fs::remove_dir(worker_dir) {
            chunkdex_log!(
                level,
                "cleanup_failed",
                "path={} error={}",
                worker_dir.display(),
                err
            );
        }
    }
}

/// State every worker of one run borrows.
struct WorkerContext<'a> {
    writer: &'a ChunkWriter,
    options: &'a IngestOptions,
    worker_dir: &'a Path,
    abort: &'a AtomicBool,
}

/// Raises the abort flag if the worker thread unwinds.
struct AbortOnPanic<'a>(&'a AtomicBool);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.store(true, Ordering::SeqCst);
        }
    }
}

impl WorkerContext<'_> {
    /// Run one scoped thread per puller and collect their table paths in worker order.
    fn run_all<P>(&self, pullers: Vec<P>) -> Vec<Result<PathBuf>>
    where
        P: FnMut() -> Option<Record> + Send,
    {
        thread::scope(|scope| {
            let handles: Vec<_> = pullers
                .into_iter()
                .enumerate()
                .map(|(id, pull)| {
                    let spawned = thread::Builder::new()
                        .name(format!("chunkdex-ingest-{id}"))
                        .spawn_scoped(scope, move || {
                            let _guard = AbortOnPanic(self.abort);
                            let result = self.run_worker(id, pull);
                            if let Err(err) = &result {
                                if !matches!(err, Error::Aborted) {
                                    self.abort.store(true, Ordering::SeqCst);
                                    chunkdex_log!(
                                        log::Level::Error,
                                        "worker_failed",
                                        "worker={} error={}",
                                        id,
                                        err
                                    );
                                }
                            }
                            result
                        });
                    if spawned.is_err() {
                        self.abort.store(true, Ordering::SeqCst);
                    }
                    (id, spawned)
                })
                .collect();

            handles
                .into_iter()
                .map(|(id, spawned)| match spawned {
                    Ok(handle) => handle.join().unwrap_or(Err(Error::WorkerPanicked(id))),
                    Err(err) => Err(Error::io(self.worker_dir, err)),
                })
                .collect()
        })
    }

    fn run_worker<P>(&self, id: usize, mut pull: P) -> Result<PathBuf>
    where
        P: FnMut() -> Option<Record>,
    {
        let mut table = IndexBuilder::new(self.options.metadata_columns.as_deref())?;
        loop {
            if self.abort.load(Ordering::SeqCst) {
                return Err(Error::Aborted);
            }
            let Some(record) = pull() else {
                break;
            };
            if record.dtype() != self.options.element_dtype {
                return Err(Error::DTypeMismatch {
                    expected: self.options.element_dtype,
                    actual: record.dtype(),
                });
            }
            let placement = self.writer.write(record.bytes())?;
            let (_, shape, _, metadata) = record.into_parts();
            table.push(placement, shape, &metadata)?;
        }

        // one table per worker; the id prefix keeps names distinct
        let path = self
            .worker_dir
            .join(format!("{id:04}-{}.parquet", Ulid::new()));
        let rows = table.len();
        write_worker_table(&path, &table.finish())?;
        chunkdex_log!(
            log::Level::Debug,
            "worker_finish",
            "worker={} rows={} table={}",
            id,
            rows,
            path.display()
        );
        Ok(path)
    }
}
