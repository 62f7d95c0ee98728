//! Batch conversion: input directory of class XML → Markdown pages.
//!
//! Pass one lists, filters and parses every input and builds the class
//! hierarchy. Pass two renders and writes pages on blocking worker tasks,
//! bounded by the configured concurrency. A file that fails is recorded in
//! the summary and never stops the batch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

use classref_l10n::{Localizer, LookupStats, TranslationCatalog};
use classref_markdown::{LocalPages, RenderContext};
use classref_shared::{ClassDoc, ClassrefError, ConvertConfig, Layout, Result};

use crate::hierarchy::ClassHierarchy;

// ---------------------------------------------------------------------------
// Summary & progress
// ---------------------------------------------------------------------------

/// A file that could not be converted.
#[derive(Debug)]
pub struct FileError {
    /// Input (or output) file the error belongs to.
    pub path: PathBuf,
    pub error: ClassrefError,
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Pages written.
    pub processed: usize,
    /// Input file names skipped by the exclude list.
    pub skipped: Vec<String>,
    /// Files that failed to parse, render or write.
    pub errors: Vec<FileError>,
    /// Lookup outcomes summed over every written page.
    pub stats: LookupStats,
    /// The abort flag stopped the run early.
    pub aborted: bool,
    /// Paths of the written pages.
    pub written: Vec<PathBuf>,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Progress callback for reporting batch status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a page is written.
    fn file_converted(&self, class_name: &str, current: usize, total: usize);
    /// Called when a file fails.
    fn file_failed(&self, error: &FileError);
    /// Called when the batch completes.
    fn done(&self, summary: &BatchSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_converted(&self, _class_name: &str, _current: usize, _total: usize) {}
    fn file_failed(&self, _error: &FileError) {}
    fn done(&self, _summary: &BatchSummary) {}
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Batch converter holding the shared, read-only run state.
#[derive(Debug)]
pub struct Converter {
    config: Arc<ConvertConfig>,
    localizer: Arc<Localizer>,
    docs_url: Url,
    abort: Arc<AtomicBool>,
}

impl Converter {
    /// Validate the configuration and load the catalog, if one is set.
    ///
    /// A catalog that cannot be loaded fails the whole run.
    pub fn new(config: ConvertConfig) -> Result<Self> {
        config.validate()?;
        let catalog = match &config.catalog {
            Some(path) => Some(TranslationCatalog::load(path, config.use_fuzzy_entries)?),
            None => {
                info!("no catalog configured, only string overrides apply");
                None
            }
        };
        let localizer = Localizer::new(catalog, config.strings.clone());
        Self::with_localizer(config, localizer)
    }

    /// Use an already built localizer.
    pub fn with_localizer(config: ConvertConfig, localizer: Localizer) -> Result<Self> {
        config.validate()?;
        let docs_url = config.docs_base_url()?;
        Ok(Self {
            config: Arc::new(config),
            localizer: Arc::new(localizer),
            docs_url,
            abort: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag checked between files. Setting it lets in-flight files finish
    /// and starts no new ones.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Convert every input file.
    #[instrument(skip_all, fields(input = %self.config.input_dir.display(), lang = %self.config.lang))]
    pub async fn run(&self, progress: &dyn ProgressReporter) -> Result<BatchSummary> {
        let start = Instant::now();
        let mut summary = BatchSummary::default();

        // --- Phase 1: List & filter inputs ---
        progress.phase("Listing input files");
        let inputs = list_inputs(&self.config.input_dir)?;
        let mut to_parse = Vec::new();
        for path in inputs {
            let file_name = file_name_of(&path);
            if self.config.is_excluded(&file_name) {
                debug!(file = %file_name, "excluded");
                summary.skipped.push(file_name);
            } else {
                to_parse.push(path);
            }
        }
        info!(
            files = to_parse.len(),
            skipped = summary.skipped.len(),
            "input files listed"
        );

        // --- Phase 2: Parse ---
        progress.phase("Parsing class reference");
        let abort = Arc::clone(&self.abort);
        let parsed = tokio::task::spawn_blocking(move || parse_all(to_parse, &abort))
            .await
            .map_err(|e| ClassrefError::validation(format!("parse task failed: {e}")))?;

        let mut classes: Vec<ClassDoc> = Vec::new();
        let mut names: HashSet<String> = HashSet::new();
        for (path, result) in parsed.results {
            match result {
                Ok(class) if !names.insert(class.name.clone()) => {
                    let error = FileError {
                        error: ClassrefError::malformed(format!(
                            "duplicate class name '{}'",
                            class.name
                        ))
                        .with_path(&path),
                        path,
                    };
                    warn!(%error, "file skipped");
                    progress.file_failed(&error);
                    summary.errors.push(error);
                }
                Ok(class) => classes.push(class),
                Err(error) => {
                    let error = FileError { path, error };
                    warn!(%error, "file skipped");
                    progress.file_failed(&error);
                    summary.errors.push(error);
                }
            }
        }
        summary.aborted = parsed.aborted;

        // --- Phase 3: Hierarchy ---
        let hierarchy = ClassHierarchy::build(&classes);
        for class in &mut classes {
            hierarchy.enrich(class);
        }
        let pages = Arc::new(hierarchy.local_pages(self.config.layout));

        // --- Phase 4: Render & write ---
        if !summary.aborted {
            progress.phase("Writing Markdown");
            std::fs::create_dir_all(&self.config.output_dir)
                .map_err(|e| ClassrefError::io(&self.config.output_dir, e))?;
            self.render_all(classes, pages, &mut summary, progress).await;
        }

        summary.elapsed = start.elapsed();
        info!(
            processed = summary.processed,
            errors = summary.errors.len(),
            skipped = summary.skipped.len(),
            fuzzy = summary.stats.fuzzy,
            aborted = summary.aborted,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "batch complete"
        );
        progress.done(&summary);
        Ok(summary)
    }

    async fn render_all(
        &self,
        classes: Vec<ClassDoc>,
        pages: Arc<LocalPages>,
        summary: &mut BatchSummary,
        progress: &dyn ProgressReporter,
    ) {
        let total = classes.len();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();

        for class in classes {
            let job = RenderJob {
                class,
                config: Arc::clone(&self.config),
                localizer: Arc::clone(&self.localizer),
                pages: Arc::clone(&pages),
                docs_url: self.docs_url.clone(),
            };
            let semaphore = Arc::clone(&semaphore);
            let abort = Arc::clone(&self.abort);

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                if abort.load(Ordering::SeqCst) {
                    return None;
                }
                let name = job.class.name.clone();
                let result = tokio::task::spawn_blocking(move || job.run())
                    .await
                    .map_err(|e| ClassrefError::validation(format!("render task failed: {e}")))
                    .and_then(|r| r);
                Some((name, result))
            });
        }

        let mut current = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some((name, Ok((path, stats))))) => {
                    current += 1;
                    summary.processed += 1;
                    summary.stats += stats;
                    debug!(class = %name, path = %path.display(), "page written");
                    progress.file_converted(&name, current, total);
                    summary.written.push(path);
                }
                Ok(Some((name, Err(error)))) => {
                    let error = FileError {
                        path: error_path(&error).unwrap_or_else(|| PathBuf::from(&name)),
                        error,
                    };
                    warn!(%error, "file skipped");
                    progress.file_failed(&error);
                    summary.errors.push(error);
                }
                Ok(None) => summary.aborted = true,
                Err(e) => {
                    let error = FileError {
                        path: PathBuf::new(),
                        error: ClassrefError::validation(format!("worker task failed: {e}")),
                    };
                    warn!(%error, "file skipped");
                    summary.errors.push(error);
                }
            }
        }
    }
}

/// Run a batch with the given configuration.
pub async fn run(config: ConvertConfig, progress: &dyn ProgressReporter) -> Result<BatchSummary> {
    Converter::new(config)?.run(progress).await
}

// ---------------------------------------------------------------------------
// Per-file work
// ---------------------------------------------------------------------------

struct RenderJob {
    class: ClassDoc,
    config: Arc<ConvertConfig>,
    localizer: Arc<Localizer>,
    pages: Arc<LocalPages>,
    docs_url: Url,
}

impl RenderJob {
    /// Render the page and write it. Returns the written path and the
    /// page's lookup statistics.
    fn run(self) -> Result<(PathBuf, LookupStats)> {
        let config = &self.config;
        let mut ctx = RenderContext::new(
            &self.localizer,
            config.lang.clone(),
            self.docs_url.clone(),
            config.similarity_threshold,
        )
        .with_frontmatter(config.frontmatter);
        if config.layout == Layout::Hierarchy {
            ctx = ctx.with_local_pages(&self.pages);
        }

        let markdown = classref_markdown::render(&self.class, &mut ctx);

        let relative = self
            .pages
            .relative_path(&self.class.name)
            .unwrap_or_else(|| PathBuf::from(format!("{}.md", self.class.name)));
        let path = config.output_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ClassrefError::write(parent, e))?;
        }
        std::fs::write(&path, markdown).map_err(|e| ClassrefError::write(&path, e))?;

        Ok((path, ctx.stats()))
    }
}

struct ParseOutcome {
    results: Vec<(PathBuf, Result<ClassDoc>)>,
    aborted: bool,
}

fn parse_all(paths: Vec<PathBuf>, abort: &AtomicBool) -> ParseOutcome {
    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        if abort.load(Ordering::SeqCst) {
            info!("abort requested, stopping before {}", path.display());
            return ParseOutcome {
                results,
                aborted: true,
            };
        }
        let result = classref_xml::load_file(&path);
        results.push((path, result));
    }
    ParseOutcome {
        results,
        aborted: false,
    }
}

/// `*.xml` files directly inside `dir`, sorted by name.
fn list_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| ClassrefError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ClassrefError::io(dir, e))?.path();
        let is_xml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if is_xml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn error_path(error: &ClassrefError) -> Option<PathBuf> {
    match error {
        ClassrefError::Write { path, .. } | ClassrefError::Io { path, .. } => Some(path.clone()),
        ClassrefError::MalformedDoc { path, .. } => path.clone(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use classref_l10n::CatalogEntry;
    use classref_shared::AppConfig;

    const GOOD_A: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<class name="Alpha" inherits="Object">
	<brief_description>First class.</brief_description>
	<description>Alpha description.</description>
</class>
"#;

    const BROKEN: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<class name="Beta">
	<brief_description>Never closed.
"#;

    const GOOD_C: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<class name="Gamma" inherits="Alpha">
	<brief_description>Third class.</brief_description>
</class>
"#;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("classref-{tag}-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_inputs(dir: &Path, files: &[(&str, &str)]) {
        for (name, content) in files {
            std::fs::write(dir.join(name), content).unwrap();
        }
    }

    fn config(input: &Path, output: &Path) -> ConvertConfig {
        let mut config = ConvertConfig::from(&AppConfig::default());
        config.input_dir = input.to_path_buf();
        config.output_dir = output.to_path_buf();
        config.catalog = None;
        config
    }

    fn markdown_files(dir: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut stack = vec![dir.to_path_buf()];
        while let Some(d) = stack.pop() {
            for entry in std::fs::read_dir(&d).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().is_some_and(|e| e == "md") {
                    found.push(path);
                }
            }
        }
        found.sort();
        found
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<String>>,
        converted: Mutex<usize>,
        failed: Mutex<usize>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.lock().unwrap().push(name.to_string());
        }
        fn file_converted(&self, _class_name: &str, _current: usize, _total: usize) {
            *self.converted.lock().unwrap() += 1;
        }
        fn file_failed(&self, _error: &FileError) {
            *self.failed.lock().unwrap() += 1;
        }
        fn done(&self, _summary: &BatchSummary) {}
    }

    #[tokio::test]
    async fn malformed_file_is_recorded_and_skipped() {
        let input = temp_dir("in");
        let output = temp_dir("out");
        write_inputs(
            &input,
            &[("A.xml", GOOD_A), ("B.xml", BROKEN), ("C.xml", GOOD_C)],
        );

        let progress = RecordingProgress::default();
        let summary = run(config(&input, &output), &progress).await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].path.ends_with("B.xml"));
        assert!(summary.errors[0].to_string().contains("B.xml"));
        assert!(!summary.aborted);

        let written = markdown_files(&output);
        assert_eq!(written.len(), 2);
        assert!(output.join("Alpha.md").is_file());
        assert!(output.join("Gamma.md").is_file());
        assert_eq!(*progress.converted.lock().unwrap(), 2);
        assert_eq!(*progress.failed.lock().unwrap(), 1);

        let _ = std::fs::remove_dir_all(&input);
        let _ = std::fs::remove_dir_all(&output);
    }

    #[tokio::test]
    async fn unwritable_page_is_recorded_and_others_still_written() {
        let input = temp_dir("in");
        let output = temp_dir("out");
        write_inputs(&input, &[("A.xml", GOOD_A), ("C.xml", GOOD_C)]);
        // A directory where Gamma's page should go makes its write fail.
        std::fs::create_dir_all(output.join("Gamma.md")).unwrap();

        let progress = RecordingProgress::default();
        let summary = run(config(&input, &output), &progress).await.unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(matches!(summary.errors[0].error, ClassrefError::Write { .. }));
        assert_eq!(summary.errors[0].path, output.join("Gamma.md"));
        assert!(!summary.aborted);
        assert_eq!(summary.written, vec![output.join("Alpha.md")]);
        assert!(output.join("Alpha.md").is_file());
        assert_eq!(*progress.failed.lock().unwrap(), 1);

        let _ = std::fs::remove_dir_all(&input);
        let _ = std::fs::remove_dir_all(&output);
    }

    #[tokio::test]
    async fn excluded_file_is_never_parsed_or_written() {
        let input = temp_dir("in");
        let output = temp_dir("out");
        // The excluded file is malformed; parsing it would record an error.
        write_inputs(&input, &[("A.xml", GOOD_A), ("B.xml", BROKEN)]);

        let mut config = config(&input, &output);
        config.exclude = vec!["B".into()];
        let summary = run(config, &SilentProgress).await.unwrap();

        assert_eq!(summary.processed, 1);
        assert!(summary.errors.is_empty());
        assert_eq!(summary.skipped, vec!["B.xml"]);
        assert_eq!(markdown_files(&output), vec![output.join("Alpha.md")]);

        let _ = std::fs::remove_dir_all(&input);
        let _ = std::fs::remove_dir_all(&output);
    }

    #[tokio::test]
    async fn sequential_and_parallel_runs_match() {
        let input = temp_dir("in");
        write_inputs(&input, &[("A.xml", GOOD_A), ("C.xml", GOOD_C)]);

        let mut outputs = Vec::new();
        for concurrency in [1, 4] {
            let output = temp_dir("out");
            let mut config = config(&input, &output);
            config.concurrency = concurrency;
            run(config, &SilentProgress).await.unwrap();
            outputs.push(std::fs::read_to_string(output.join("Gamma.md")).unwrap());
            let _ = std::fs::remove_dir_all(&output);
        }
        assert_eq!(outputs[0], outputs[1]);
        // Gamma's chain runs through the indexed Alpha.
        assert!(outputs[0].contains("[Alpha]("));
        assert!(outputs[0].contains("[Object]("));

        let _ = std::fs::remove_dir_all(&input);
    }

    #[tokio::test]
    async fn hierarchy_layout_nests_pages() {
        let input = temp_dir("in");
        let output = temp_dir("out");
        write_inputs(&input, &[("A.xml", GOOD_A), ("C.xml", GOOD_C)]);

        let mut config = config(&input, &output);
        config.layout = Layout::Hierarchy;
        let summary = run(config, &SilentProgress).await.unwrap();

        assert_eq!(summary.processed, 2);
        assert!(output.join("Alpha.md").is_file());
        let gamma = std::fs::read_to_string(output.join("Alpha").join("Gamma.md")).unwrap();
        assert!(gamma.contains("[Alpha](../Alpha.md)"));
        let alpha = std::fs::read_to_string(output.join("Alpha.md")).unwrap();
        assert!(alpha.contains("[Gamma](Alpha/Gamma.md)"));

        let _ = std::fs::remove_dir_all(&input);
        let _ = std::fs::remove_dir_all(&output);
    }

    #[tokio::test]
    async fn catalog_translations_are_applied_and_counted() {
        let input = temp_dir("in");
        let output = temp_dir("out");
        write_inputs(&input, &[("A.xml", GOOD_A)]);

        let catalog = TranslationCatalog::from_entries([CatalogEntry {
            source: "Alpha description.".into(),
            translation: "阿尔法描述。".into(),
            is_fuzzy: false,
        }]);
        let localizer = Localizer::new(Some(catalog), BTreeMap::new());
        let converter = Converter::with_localizer(config(&input, &output), localizer).unwrap();
        let summary = converter.run(&SilentProgress).await.unwrap();

        assert_eq!(summary.stats.exact, 1);
        let page = std::fs::read_to_string(output.join("Alpha.md")).unwrap();
        assert!(page.contains("阿尔法描述。"));

        let _ = std::fs::remove_dir_all(&input);
        let _ = std::fs::remove_dir_all(&output);
    }

    #[tokio::test]
    async fn abort_before_start_writes_nothing() {
        let input = temp_dir("in");
        let output = temp_dir("out");
        write_inputs(&input, &[("A.xml", GOOD_A), ("C.xml", GOOD_C)]);

        let converter = Converter::new(config(&input, &output)).unwrap();
        converter.abort_handle().store(true, Ordering::SeqCst);
        let summary = converter.run(&SilentProgress).await.unwrap();

        assert!(summary.aborted);
        assert_eq!(summary.processed, 0);
        assert!(markdown_files(&output).is_empty());

        let _ = std::fs::remove_dir_all(&input);
        let _ = std::fs::remove_dir_all(&output);
    }

    #[tokio::test]
    async fn missing_catalog_fails_the_run() {
        let input = temp_dir("in");
        let mut config = config(&input, &input.join("out"));
        config.catalog = Some(input.join("missing.po"));

        let err = run(config, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, ClassrefError::CatalogLoad { .. }));

        let _ = std::fs::remove_dir_all(&input);
    }

    #[tokio::test]
    async fn missing_input_dir_is_io_error() {
        let root = temp_dir("in");
        let config = config(&root.join("nope"), &root.join("out"));
        let err = run(config, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, ClassrefError::Io { .. }));
        let _ = std::fs::remove_dir_all(&root);
    }
}
