use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::{ThreadPool, prelude::*};
use std::{
    any::Any,
    panic::{AssertUnwindSafe, catch_unwind},
    path::PathBuf,
    time::Instant,
};

use crate::{
    actions::{Action, ActionContext, FilterAction, ModifierAction},
    common::errors::{ActionError, ActionResult},
    item::Item,
};

/// Result of running the pipeline on one item.
#[derive(Debug)]
pub enum Outcome {
    Passed,
    /// Rejected by the named filter.
    Rejected(&'static str),
    /// The resource could not be loaded.
    Discarded(ActionError),
    /// A filter or modifier failed after the resource was loaded.
    Failed(ActionError),
}

impl Outcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub passed: usize,
    pub rejected: usize,
    pub discarded: usize,
    pub failed: usize,
}

impl Counts {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Rejected(_) => self.rejected += 1,
            Outcome::Discarded(_) => self.discarded += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.rejected + self.discarded + self.failed
    }
}

#[derive(Debug, Default)]
pub struct Report {
    /// Surviving items in input order.
    pub survivors: Vec<Item>,
    /// Every item that did not survive, with the reason.
    pub dropped: Vec<(PathBuf, Outcome)>,
    pub counts: Counts,
}

#[derive(Debug)]
pub struct Pipeline {
    filters: Vec<FilterAction>,
    modifiers: Vec<ModifierAction>,
    ctx: ActionContext,
    fail_fast: bool,
    unload_survivors: bool,
    progress: bool,
}

impl Pipeline {
    /// Split actions into filters and modifiers.
    ///
    /// Filters are stable-sorted by priority, modifiers keep declaration order.
    pub fn new(actions: impl IntoIterator<Item = Action>, ctx: ActionContext) -> Self {
        let mut filters = Vec::new();
        let mut modifiers = Vec::new();
        for action in actions {
            match action {
                Action::Filter(filter) => filters.push(filter),
                Action::Modifier(modifier) => modifiers.push(modifier),
            }
        }
        filters.sort_by_key(FilterAction::priority);
        Self {
            filters,
            modifiers,
            ctx,
            fail_fast: false,
            unload_survivors: false,
            progress: false,
        }
    }

    /// Abort the run on the first filter or modifier failure.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Release each survivor's decoded image once its modifiers ran.
    pub fn unload_survivors(mut self, unload: bool) -> Self {
        self.unload_survivors = unload;
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn filters(&self) -> &[FilterAction] {
        &self.filters
    }

    pub fn modifiers(&self) -> &[ModifierAction] {
        &self.modifiers
    }

    /// Check every modifier's precondition. Must pass before any item is touched.
    pub fn validate(&self) -> ActionResult<()> {
        self.modifiers.iter().try_for_each(ModifierAction::validate)
    }

    /// Run filters then modifiers on one item.
    ///
    /// Rejected and failed items are discarded before returning.
    pub fn process(&self, item: &mut Item) -> Outcome {
        let outcome = self.process_inner(item);
        match &outcome {
            Outcome::Passed => {
                if self.unload_survivors {
                    item.unload();
                }
            }
            Outcome::Rejected(filter) => {
                debug!("{:?} rejected by {}", item.path(), filter);
                item.discard();
            }
            Outcome::Discarded(err) => {
                debug!("{:?} discarded: {}", item.path(), err);
                item.discard();
            }
            Outcome::Failed(err) => {
                warn!("{:?} failed: {}", item.path(), err);
                item.discard();
            }
        }
        outcome
    }

    fn process_inner(&self, item: &mut Item) -> Outcome {
        for filter in &self.filters {
            match guarded(filter.name(), item, |item| filter.passes(item, &self.ctx)) {
                Ok(true) => {}
                Ok(false) => return Outcome::Rejected(filter.name()),
                Err(err) => return classify(item, err),
            }
        }
        for modifier in &self.modifiers {
            if let Err(err) = guarded(modifier.name(), item, |item| modifier.apply(item)) {
                return classify(item, err);
            }
        }
        Outcome::Passed
    }

    /// Validate, then process every item on `pool`.
    ///
    /// With `fail_fast` the first failed item aborts the run and its error is
    /// returned. Load failures never abort.
    pub fn run(&self, items: Vec<Item>, pool: &ThreadPool) -> Result<Report> {
        self.validate().context("precondition check failed")?;

        let start_time = Instant::now();
        let bar = self.progress_bar(items.len())?;

        let results: ActionResult<Vec<(Item, Outcome)>> = pool.install(|| {
            items
                .into_par_iter()
                .map(|mut item| {
                    let outcome = self.process(&mut item);
                    bar.inc(1);
                    match outcome {
                        Outcome::Failed(err) if self.fail_fast => Err(err),
                        outcome => Ok((item, outcome)),
                    }
                })
                .collect()
        });
        bar.finish_and_clear();
        let results = results.context("run aborted")?;

        let mut report = Report::default();
        for (item, outcome) in results {
            report.counts.record(&outcome);
            if outcome.is_passed() {
                report.survivors.push(item);
            } else {
                report.dropped.push((item.path().to_path_buf(), outcome));
            }
        }

        let counts = report.counts;
        info!(
            duration = &*format!("{:?}", start_time.elapsed());
            "Processed {} items: {} passed, {} rejected, {} discarded, {} failed",
            counts.total(),
            counts.passed,
            counts.rejected,
            counts.discarded,
            counts.failed
        );
        Ok(report)
    }

    fn progress_bar(&self, len: usize) -> Result<ProgressBar> {
        if !self.progress {
            return Ok(ProgressBar::hidden());
        }
        let bar = ProgressBar::new(len as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}]")
                .context("invalid progress template")?,
        );
        Ok(bar)
    }
}

/// Run one action, turning a panic in the raster or OCR backend into an error
/// for this item only.
fn guarded<T>(
    action: &'static str,
    item: &mut Item,
    f: impl FnOnce(&mut Item) -> ActionResult<T>,
) -> ActionResult<T> {
    let path = item.path().to_path_buf();
    catch_unwind(AssertUnwindSafe(|| f(item))).unwrap_or_else(|payload| {
        Err(ActionError::Panicked {
            action,
            path,
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A failure while loading takes the item out quietly; anything else is a
/// real failure.
fn classify(item: &Item, err: ActionError) -> Outcome {
    match err {
        ActionError::Load { .. } | ActionError::Discarded(_) => Outcome::Discarded(err),
        _ if item.is_discarded() => Outcome::Discarded(err),
        _ => Outcome::Failed(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actions::{FilterKind, parse_actions},
        common::build_worker_pool,
        grammar::Bounds,
        workflow::processors::ocr::TextExtractor,
    };
    use image::DynamicImage;
    use std::{
        path::Path,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    struct NoText;

    impl TextExtractor for NoText {
        fn extract_text(&self, _: &DynamicImage, _: Option<&str>, _: u8) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    fn ctx() -> ActionContext {
        ActionContext::new(Arc::new(NoText))
    }

    fn item_at(dir: &Path, name: &str, loader: crate::item::Loader) -> Item {
        let path = dir.join(name);
        std::fs::write(&path, vec![0u8; 64]).unwrap();
        Item::with_loader(path, loader).unwrap()
    }

    fn load_10x20(_: &Path) -> anyhow::Result<DynamicImage> {
        Ok(DynamicImage::new_rgb8(10, 20))
    }

    fn load_1x1(_: &Path) -> anyhow::Result<DynamicImage> {
        Ok(DynamicImage::new_rgb8(1, 1))
    }

    fn load_broken(_: &Path) -> anyhow::Result<DynamicImage> {
        anyhow::bail!("corrupt")
    }

    static LOADS: AtomicUsize = AtomicUsize::new(0);

    fn load_counting(_: &Path) -> anyhow::Result<DynamicImage> {
        LOADS.fetch_add(1, Ordering::SeqCst);
        Ok(DynamicImage::new_rgb8(1, 1))
    }

    #[test]
    fn filters_are_sorted_by_priority_stably() {
        let actions = parse_actions(&["txt:foo", "w:1,", "sz:1,", "h:1,", "fn:*.png"]).unwrap();
        let pipeline = Pipeline::new(actions, ctx());
        let names: Vec<_> = pipeline.filters().iter().map(FilterAction::name).collect();
        assert_eq!(names, vec!["Size", "Filename", "Width", "Height", "Text"]);
    }

    #[test]
    fn modifiers_keep_declaration_order() {
        let actions = parse_actions(&["inv", "w:1,", "fl:h", "rs:5|5"]).unwrap();
        let pipeline = Pipeline::new(actions, ctx());
        let names: Vec<_> = pipeline.modifiers().iter().map(ModifierAction::name).collect();
        assert_eq!(names, vec!["Invert", "Flip", "Resize"]);
    }

    #[test]
    fn cheap_filter_rejects_before_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = item_at(dir.path(), "a.png", load_counting);
        let actions = vec![
            Action::Filter(FilterAction::new(FilterKind::Width(Bounds::new(Some(1), None)))),
            Action::Filter(FilterAction::new(FilterKind::Size(Bounds::new(Some(1 << 20), None)))),
        ];
        let before = LOADS.load(Ordering::SeqCst);
        let outcome = Pipeline::new(actions, ctx()).process(&mut item);
        assert!(matches!(outcome, Outcome::Rejected("Size")));
        assert_eq!(LOADS.load(Ordering::SeqCst), before);
        assert!(item.is_discarded());
    }

    #[test]
    fn survivors_are_modified() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = item_at(dir.path(), "a.png", load_10x20);
        let pipeline = Pipeline::new(parse_actions(&["w:5,", "rot:90"]).unwrap(), ctx());
        assert!(pipeline.process(&mut item).is_passed());
        let image = item.data().unwrap();
        assert_eq!((image.width(), image.height()), (20, 10));
    }

    #[test]
    fn load_failure_discards() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = item_at(dir.path(), "a.png", load_broken);
        let pipeline = Pipeline::new(parse_actions(&["inv"]).unwrap(), ctx());
        assert!(matches!(pipeline.process(&mut item), Outcome::Discarded(_)));
        assert!(item.is_discarded());
    }

    #[test]
    fn run_reports_counts_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![
            item_at(dir.path(), "a.png", load_10x20),
            item_at(dir.path(), "b.png", load_broken),
            item_at(dir.path(), "c.png", load_10x20),
            item_at(dir.path(), "d.jpg", load_10x20),
        ];
        let pool = build_worker_pool(Some(2)).unwrap();
        let pipeline = Pipeline::new(parse_actions(&["fn:*.png", "inv"]).unwrap(), ctx())
            .unload_survivors(true);
        let report = pipeline.run(items, &pool).unwrap();

        let names: Vec<_> = report
            .survivors
            .iter()
            .map(|i| i.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
        assert!(report.survivors.iter().all(|i| !i.is_loaded()));
        assert_eq!(
            report.counts,
            Counts {
                passed: 2,
                rejected: 1,
                discarded: 1,
                failed: 0
            }
        );
        assert_eq!(report.dropped.len(), 2);
    }

    #[test]
    fn failed_precondition_stops_before_processing() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![item_at(dir.path(), "a.png", load_10x20)];
        let missing = dir.path().join("missing");
        let token = format!("s:{}", missing.display());
        let pipeline = Pipeline::new(parse_actions(&["inv", token.as_str()]).unwrap(), ctx());
        assert!(pipeline.validate().is_err());
        let pool = build_worker_pool(Some(1)).unwrap();
        assert!(pipeline.run(items, &pool).is_err());
    }

    struct BrokenOcr;

    impl TextExtractor for BrokenOcr {
        fn extract_text(&self, _: &DynamicImage, _: Option<&str>, _: u8) -> anyhow::Result<String> {
            anyhow::bail!("engine crashed")
        }
    }

    #[test]
    fn failure_isolated_unless_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        let pool = build_worker_pool(Some(2)).unwrap();
        let make_items = || {
            vec![
                item_at(dir.path(), "a.png", load_10x20),
                item_at(dir.path(), "b.png", load_10x20),
            ]
        };
        let actions = parse_actions(&["txt:hello"]).unwrap();
        let broken = ActionContext::new(Arc::new(BrokenOcr));

        let pipeline = Pipeline::new(actions.clone(), broken.clone());
        let report = pipeline.run(make_items(), &pool).unwrap();
        assert_eq!(report.counts.failed, 2);
        assert!(report.survivors.is_empty());
        assert!(matches!(report.dropped[0].1, Outcome::Failed(ActionError::Extract { .. })));

        let pipeline = Pipeline::new(actions, broken).fail_fast(true);
        assert!(pipeline.run(make_items(), &pool).is_err());
    }

    #[test]
    fn oversized_result_fails_only_that_item() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![
            item_at(dir.path(), "a.png", load_10x20),
            item_at(dir.path(), "b.png", load_1x1),
        ];
        let pool = build_worker_pool(Some(2)).unwrap();
        let pipeline = Pipeline::new(parse_actions(&["sc:2000", "gb:2"]).unwrap(), ctx());
        let report = pipeline.run(items, &pool).unwrap();

        assert_eq!(report.counts.passed, 1);
        assert_eq!(report.counts.failed, 1);
        assert!(report.survivors[0].path().ends_with("b.png"));
        let (path, outcome) = &report.dropped[0];
        assert!(path.ends_with("a.png"));
        assert!(matches!(
            outcome,
            Outcome::Failed(ActionError::TooLarge { action: "Scale", .. })
        ));
    }

    struct PanickyOcr;

    impl TextExtractor for PanickyOcr {
        fn extract_text(
            &self,
            image: &DynamicImage,
            _: Option<&str>,
            _: u8,
        ) -> anyhow::Result<String> {
            if image.width() == 10 {
                panic!("backend blew up");
            }
            Ok("hello".to_string())
        }
    }

    #[test]
    fn panic_in_backend_fails_only_that_item() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![
            item_at(dir.path(), "a.png", load_10x20),
            item_at(dir.path(), "b.png", load_1x1),
        ];
        let pool = build_worker_pool(Some(2)).unwrap();
        let pipeline = Pipeline::new(
            parse_actions(&["txt:hello"]).unwrap(),
            ActionContext::new(Arc::new(PanickyOcr)),
        );
        let report = pipeline.run(items, &pool).unwrap();

        assert_eq!(report.survivors.len(), 1);
        assert!(report.survivors[0].path().ends_with("b.png"));
        match &report.dropped[0].1 {
            Outcome::Failed(ActionError::Panicked { action, message, .. }) => {
                assert_eq!(*action, "Text");
                assert_eq!(message, "backend blew up");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
