//! Event capture for simulation analysis.
//!
//! A `tracing` subscriber that turns structured events into per-target
//! column tables. Each event is one row; each field becomes a column the
//! first time it appears. Tables convert to polars DataFrames for analysis
//! and can be written to parquet.
//!
//! ```ignore
//! // In simulation code:
//! tracing::info!(target: "choice", step, agent_id, item_id, price);
//!
//! // In a test:
//! let (_, log) = instrument::capture(|| engine.run_step(3));
//! let choices = log.table("choice").unwrap();
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::{Event, Id, Metadata, Subscriber};

// === VALUES ===

/// A single captured field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    UInt(u64),
    Int(i64),
    Float(f64),
    Flag(bool),
    Text(String),
}

/// Homogeneous column storage. The first value seen fixes the type.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    UInt(Vec<u64>),
    Int(Vec<i64>),
    Float(Vec<f64>),
    Flag(Vec<bool>),
    Text(Vec<String>),
}

impl Values {
    /// Empty column of the value's type, back-filled to `rows` defaults.
    fn filled_for(value: &FieldValue, rows: usize) -> Self {
        match value {
            FieldValue::UInt(_) => Values::UInt(vec![0; rows]),
            FieldValue::Int(_) => Values::Int(vec![0; rows]),
            FieldValue::Float(_) => Values::Float(vec![0.0; rows]),
            FieldValue::Flag(_) => Values::Flag(vec![false; rows]),
            FieldValue::Text(_) => Values::Text(vec![String::new(); rows]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Values::UInt(v) => v.len(),
            Values::Int(v) => v.len(),
            Values::Float(v) => v.len(),
            Values::Flag(v) => v.len(),
            Values::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a value. Integers widen into float columns; any other
    /// mismatch is dropped and the row gets a default on padding.
    fn push(&mut self, value: FieldValue) {
        match (self, value) {
            (Values::UInt(v), FieldValue::UInt(x)) => v.push(x),
            (Values::Int(v), FieldValue::Int(x)) => v.push(x),
            (Values::Float(v), FieldValue::Float(x)) => v.push(x),
            (Values::Float(v), FieldValue::UInt(x)) => v.push(x as f64),
            (Values::Float(v), FieldValue::Int(x)) => v.push(x as f64),
            (Values::Flag(v), FieldValue::Flag(x)) => v.push(x),
            (Values::Text(v), FieldValue::Text(x)) => v.push(x),
            _ => {}
        }
    }

    fn pad_to(&mut self, rows: usize) {
        let missing = rows.saturating_sub(self.len());
        if missing == 0 {
            return;
        }
        match self {
            Values::UInt(v) => v.extend(std::iter::repeat_n(0, missing)),
            Values::Int(v) => v.extend(std::iter::repeat_n(0, missing)),
            Values::Float(v) => v.extend(std::iter::repeat_n(0.0, missing)),
            Values::Flag(v) => v.extend(std::iter::repeat_n(false, missing)),
            Values::Text(v) => v.extend(std::iter::repeat_n(String::new(), missing)),
        }
    }
}

// === TABLES ===

/// Rows of events sharing one target. All columns always have `rows` values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    columns: BTreeMap<String, Values>,
    rows: usize,
}

impl EventTable {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column(&self, name: &str) -> Option<&Values> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Append one row. Columns absent from `fields` get defaults.
    pub fn push_row(&mut self, fields: Vec<(String, FieldValue)>) {
        let rows = self.rows;
        for (name, value) in fields {
            let column = self
                .columns
                .entry(name)
                .or_insert_with(|| Values::filled_for(&value, rows));
            // Repeated field names within one event keep the first value.
            if column.len() == rows {
                column.push(value);
            }
        }
        self.rows += 1;
        for column in self.columns.values_mut() {
            column.pad_to(self.rows);
        }
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let columns: Vec<Column> = self
            .columns
            .iter()
            .map(|(name, values)| match values {
                Values::UInt(v) => Column::new(name.into(), v),
                Values::Int(v) => Column::new(name.into(), v),
                Values::Float(v) => Column::new(name.into(), v),
                Values::Flag(v) => Column::new(name.into(), v),
                Values::Text(v) => Column::new(name.into(), v),
            })
            .collect();
        DataFrame::new(columns)
    }
}

/// All captured tables, keyed by tracing target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    pub tables: BTreeMap<String, EventTable>,
}

impl EventLog {
    pub fn table(&self, target: &str) -> Option<&EventTable> {
        self.tables.get(target)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn to_dataframes(&self) -> BTreeMap<String, DataFrame> {
        self.tables
            .iter()
            .filter_map(|(name, table)| table.to_dataframe().ok().map(|df| (name.clone(), df)))
            .collect()
    }
}

thread_local! {
    static LOG: RefCell<EventLog> = RefCell::default();
}

// === SUBSCRIBER ===

#[derive(Default)]
struct FieldCollector {
    fields: Vec<(String, FieldValue)>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: FieldValue) {
        self.fields.push((field.name().to_string(), value));
    }
}

impl Visit for FieldCollector {
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, FieldValue::UInt(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, FieldValue::Int(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, FieldValue::Float(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, FieldValue::Flag(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, FieldValue::Text(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, FieldValue::Text(format!("{:?}", value)));
    }
}

/// Collects info-and-above events into the thread-local [`EventLog`].
/// Spans are ignored.
pub struct EventSubscriber;

impl Subscriber for EventSubscriber {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.is_event() && *metadata.level() <= tracing::Level::INFO
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let target = event.metadata().target().to_string();
        LOG.with(|log| {
            log.borrow_mut()
                .tables
                .entry(target)
                .or_default()
                .push_row(collector.fields);
        });
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Install [`EventSubscriber`] as the global default. Later calls are no-ops.
pub fn install_subscriber() {
    let _ = tracing::subscriber::set_global_default(EventSubscriber);
}

/// Take everything captured on this thread.
pub fn drain() -> EventLog {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

/// Discard everything captured on this thread.
pub fn clear() {
    LOG.with(|log| *log.borrow_mut() = EventLog::default());
}

/// Run `f` with a scoped [`EventSubscriber`] and return its output together
/// with the events it emitted. Anything captured earlier is discarded.
pub fn capture<T>(f: impl FnOnce() -> T) -> (T, EventLog) {
    clear();
    let out = tracing::subscriber::with_default(EventSubscriber, f);
    (out, drain())
}

// === PARQUET ===

/// Write each DataFrame to `{dir}/{name}.parquet`. Target names containing
/// `::` are flattened to `__`.
pub fn write_parquet(dfs: &mut BTreeMap<String, DataFrame>, dir: &Path) -> PolarsResult<()> {
    std::fs::create_dir_all(dir)?;
    for (name, df) in dfs.iter_mut() {
        let path = dir.join(format!("{}.parquet", name.replace("::", "__")));
        let file = std::fs::File::create(&path)?;
        ParquetWriter::new(file).finish(df)?;
    }
    Ok(())
}

fn slug(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(60)
        .collect()
}

/// Captures events for the lifetime of a run and writes them to parquet
/// on drop, under `{parent}/{MonDD_HH_MM}_{name}/` with a `_ready` marker.
///
/// ```ignore
/// let mut run = instrument::RunRecorder::new("data/sweeps", "burger_ped");
/// engine.run_ped_sweep("burger", &[-0.2, 0.2]);
/// let dfs = run.frames();
/// ```
pub struct RunRecorder {
    run_dir: PathBuf,
    frames: Option<BTreeMap<String, DataFrame>>,
}

impl RunRecorder {
    pub fn new(parent: impl Into<PathBuf>, name: &str) -> Self {
        let stamp = chrono::Local::now().format("%b%d_%H_%M");
        let run_dir = parent.into().join(format!("{}_{}", stamp, slug(name)));
        clear();
        install_subscriber();
        Self {
            run_dir,
            frames: None,
        }
    }

    /// DataFrames captured so far. The first call drains the thread-local
    /// log; later calls return the cached frames.
    pub fn frames(&mut self) -> &BTreeMap<String, DataFrame> {
        self.frames.get_or_insert_with(|| drain().to_dataframes())
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }
}

impl Drop for RunRecorder {
    fn drop(&mut self) {
        let mut frames = self
            .frames
            .take()
            .unwrap_or_else(|| drain().to_dataframes());
        if frames.is_empty() {
            return;
        }
        if let Err(e) = write_parquet(&mut frames, &self.run_dir) {
            eprintln!("RunRecorder({}): parquet write failed: {}", self.run_dir.display(), e);
            return;
        }
        if let Err(e) = std::fs::File::create(self.run_dir.join("_ready")) {
            eprintln!("RunRecorder({}): marker write failed: {}", self.run_dir.display(), e);
        }
    }
}
