// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::sync::Arc;

use aggregations::{AveragerConfig, RecordSchema, WindowAverager, WindowRecord};
use avg_cache::{AggregationCache, AggregationRequest};
use core_types::{AppConfig, ProgressScope, ProgressSink};
use expr::{CompiledExpr, FieldSchema, compile};
use table_source::{Row, TableSource};

use crate::analysis::{Analysis, analyze};
use crate::error::{PipelineError, Result};
use crate::settings::{Averaging, Field, PlotRequest, SeriesConfig, SourceKey};

/// Samples of one expression over the rows of a source that pass its prefilter.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprColumn {
    pub expression: String,
    /// Unit of the column the expression names, `"?"` for derived expressions.
    pub unit: String,
    pub values: Vec<f64>,
}

/// Everything evaluated in one pass over a source.
#[derive(Debug, Clone)]
pub struct SourceData {
    pub key: SourceKey,
    pub title: String,
    /// Raw table rows, or averaged records when the source is averaged.
    pub rows_read: u64,
    pub cached: bool,
    pub prefilter: Option<String>,
    columns: Vec<ExprColumn>,
}

impl SourceData {
    pub fn column(&self, expression: &str) -> Option<&ExprColumn> {
        self.columns.iter().find(|c| c.expression == expression)
    }

    pub fn columns(&self) -> &[ExprColumn] {
        &self.columns
    }

    /// Rows that passed the prefilter.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// x, y and z samples of one series after adjustments and its own cut.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesData {
    pub x: Option<Vec<f64>>,
    pub y: Option<Vec<f64>>,
    pub z: Option<Vec<f64>>,
}

impl SeriesData {
    pub fn axis(&self, axis: char) -> Option<&[f64]> {
        match axis {
            'x' => self.x.as_deref(),
            'y' => self.y.as_deref(),
            'z' => self.z.as_deref(),
            _ => None,
        }
    }
}

/// Evaluated expressions of a whole [`PlotRequest`], addressable per series.
#[derive(Debug, Clone)]
pub struct PreparedData {
    series: Vec<SeriesConfig>,
    sources: Vec<SourceData>,
    series_source: Vec<usize>,
}

impl PreparedData {
    pub fn series(&self) -> &[SeriesConfig] {
        &self.series
    }

    pub fn sources(&self) -> &[SourceData] {
        &self.sources
    }

    pub fn source_of(&self, series: usize) -> Option<&SourceData> {
        self.series_source.get(series).map(|&idx| &self.sources[idx])
    }

    pub fn column(&self, series: usize, field: Field) -> Option<&ExprColumn> {
        let expression = self.series.get(series)?.expression(field)?;
        self.source_of(series)?.column(expression)
    }

    pub fn unit(&self, series: usize, field: Field) -> Option<&str> {
        self.column(series, field).map(|c| c.unit.as_str())
    }

    /// Samples for series `series`: adjustment arrays replace the base arrays, then the
    /// series' own cut masks all three.
    pub fn series_data(&self, series: usize) -> Result<SeriesData> {
        if series >= self.series.len() {
            return Err(PipelineError::UnknownSeries(series));
        }
        let pick = |base: Field, adjust: Field| {
            self.column(series, adjust)
                .or_else(|| self.column(series, base))
                .map(|c| c.values.clone())
        };
        let mut data = SeriesData {
            x: pick(Field::X, Field::XAdjust),
            y: pick(Field::Y, Field::YAdjust),
            z: pick(Field::Z, Field::ZAdjust),
        };
        if let Some(cut) = self.column(series, Field::Cut).filter(|c| !c.values.is_empty()) {
            // NaN counts as true, matching expression truthiness
            let keep: Vec<bool> = cut.values.iter().map(|v| *v != 0.0).collect();
            for values in [&mut data.x, &mut data.y, &mut data.z].into_iter().flatten() {
                let mut flags = keep.iter();
                values.retain(|_| flags.next().copied().unwrap_or(false));
            }
        }
        Ok(data)
    }

    /// Histogram, profile or passthrough result for series `series`, according to its mode.
    pub fn analyze(&self, series: usize) -> Result<Analysis> {
        let data = self.series_data(series)?;
        analyze(&self.series[series], &data)
    }
}

/// Series reading the same source with the same averaging.
struct SourceGroup {
    key: SourceKey,
    expressions: Vec<String>,
    cuts: Vec<String>,
    uncut: bool,
}

impl SourceGroup {
    fn new(key: SourceKey) -> Self {
        Self {
            key,
            expressions: Vec::new(),
            cuts: Vec::new(),
            uncut: false,
        }
    }

    fn add(&mut self, series: &SeriesConfig) {
        for (_, expr) in series.expressions() {
            if !self.expressions.iter().any(|e| e == expr) {
                self.expressions.push(expr.to_string());
            }
        }
        match series.cut.as_deref() {
            Some(cut) if !self.cuts.iter().any(|c| c == cut) => self.cuts.push(cut.to_string()),
            Some(_) => {}
            None => self.uncut = true,
        }
    }

    /// Cuts to OR into a prefilter; none when any series wants every row.
    fn joined_cuts(&self) -> &[String] {
        if self.uncut { &[] } else { &self.cuts }
    }
}

fn group_series(request: &PlotRequest) -> (Vec<SourceGroup>, Vec<usize>) {
    let mut groups: Vec<SourceGroup> = Vec::new();
    let mut series_source = Vec::with_capacity(request.series().len());
    for series in request.series() {
        let key = series.source_key();
        let idx = match groups.iter().position(|g| g.key == key) {
            Some(idx) => idx,
            None => {
                groups.push(SourceGroup::new(key));
                groups.len() - 1
            }
        };
        groups[idx].add(series);
        series_source.push(idx);
    }
    (groups, series_source)
}

/// Compiled expressions of one group plus the buffers they fill.
struct Evaluator {
    identifier: String,
    exprs: Vec<CompiledExpr>,
    prefilter: Option<CompiledExpr>,
    values: Vec<Vec<f64>>,
}

impl Evaluator {
    fn new(group: &SourceGroup, schema: &FieldSchema) -> Result<Self> {
        let exprs = group
            .expressions
            .iter()
            .map(|e| compile(e, schema))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let cuts = group
            .joined_cuts()
            .iter()
            .map(|c| compile(c, schema))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let prefilter = CompiledExpr::any_of(cuts);
        for expr in &exprs {
            log::debug!("{}: compiled {:?} reading {:?}", group.key, expr.source(), expr.fields());
        }
        if let Some(filter) = &prefilter {
            log::debug!("{}: joined cuts {}", group.key, filter.source());
        }
        Ok(Self {
            identifier: group.key.identifier.clone(),
            values: vec![Vec::new(); exprs.len()],
            exprs,
            prefilter,
        })
    }

    fn push(&mut self, row: &[f64]) -> Result<()> {
        let identifier = &self.identifier;
        let fail = |error: expr::EvalError| PipelineError::RowEval {
            identifier: identifier.clone(),
            error,
        };
        if let Some(filter) = &self.prefilter {
            if !filter.eval_bool(row).map_err(fail)? {
                return Ok(());
            }
        }
        for (expr, out) in self.exprs.iter().zip(self.values.iter_mut()) {
            out.push(expr.eval_f64(row).map_err(fail)?);
        }
        Ok(())
    }

    fn finish(self, source: &TableSource) -> (Option<String>, Vec<ExprColumn>) {
        let prefilter = self.prefilter.map(|f| f.source().to_string());
        let columns = self
            .exprs
            .iter()
            .zip(self.values)
            .map(|(expr, values)| ExprColumn {
                expression: expr.source().to_string(),
                unit: source.column_unit(expr.source()).to_string(),
                values,
            })
            .collect();
        (prefilter, columns)
    }
}

/// Reads sources, averaging through the cache where requested, and evaluates every
/// expression of a [`PlotRequest`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: AppConfig,
    cache: AggregationCache,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        let cache = AggregationCache::from_config(&config);
        Self { config, cache }
    }

    pub fn with_cache(mut self, cache: AggregationCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &AggregationCache {
        &self.cache
    }

    /// Evaluate all expressions of `request`, one pass per distinct source. Progress is
    /// reset first, split evenly across sources and forced to 1 at the end.
    pub fn prepare(&self, request: &PlotRequest, progress: &dyn ProgressSink) -> Result<PreparedData> {
        progress.reset();
        let (groups, series_source) = group_series(request);
        let span = 1.0 / groups.len().max(1) as f64;

        let mut sources = Vec::with_capacity(groups.len());
        for (idx, group) in groups.iter().enumerate() {
            log::debug!("processing source {}", group.key);
            let base = idx as f64 * span;
            let scope = ProgressScope::new(progress, base, span, 0);
            let source = TableSource::open(self.config.datadir(), &group.key.identifier)?;
            let data = match &group.key.averaging {
                None => self.read_raw(&source, group, scope)?,
                Some(averaging) => self.read_averaged(&source, group, averaging, scope)?,
            };
            log::debug!(
                "{}: {} rows read, {} kept",
                group.key,
                data.rows_read,
                data.len()
            );
            progress.report(base + span);
            sources.push(data);
        }
        progress.report(1.0);

        Ok(PreparedData {
            series: request.series().to_vec(),
            sources,
            series_source,
        })
    }

    fn read_raw(
        &self,
        source: &TableSource,
        group: &SourceGroup,
        mut scope: ProgressScope<'_>,
    ) -> Result<SourceData> {
        let mut eval = Evaluator::new(group, &FieldSchema::for_columns(source.columns()))?;
        scope.set_total_rows(source.row_count());
        let stride = self.config.progress_stride.max(1);
        let mut read = 0u64;
        for row in source.rows()? {
            let row: Row = row?;
            eval.push(row.values())?;
            read += 1;
            if read % stride == 0 {
                scope.rows_done(read);
            }
        }
        scope.complete();
        let (prefilter, columns) = eval.finish(source);
        Ok(SourceData {
            key: group.key.clone(),
            title: source.title().to_string(),
            rows_read: read,
            cached: false,
            prefilter,
            columns,
        })
    }

    fn read_averaged(
        &self,
        source: &TableSource,
        group: &SourceGroup,
        averaging: &Averaging,
        mut scope: ProgressScope<'_>,
    ) -> Result<SourceData> {
        let columns: Arc<[String]> = Arc::from(source.columns());
        let schema = RecordSchema::new(Arc::clone(&columns));
        let mut eval = Evaluator::new(group, &schema.field_schema())?;
        let weight = match &averaging.weight {
            Some(w) => compile(w, &FieldSchema::for_columns(source.columns()))?,
            None => CompiledExpr::constant(1.0),
        };
        let config = AveragerConfig {
            window: averaging.window,
            shift: averaging.shift,
            time_field: self.config.time_field.clone(),
            progress_stride: self.config.progress_stride,
        };
        let request = AggregationRequest::new(&group.key.identifier, averaging.window, averaging.shift)
            .with_time_field(&config.time_field)
            .with_weight(averaging.weight.as_deref())
            .with_cuts(group.joined_cuts());

        scope.set_total_rows(source.row_count());
        let stream = self.cache.get_or_compute(&request, &schema, scope, |scope| {
            let rows = source.rows()?;
            Ok(WindowAverager::new(rows, columns, &config, weight)?.with_progress(scope))
        })?;
        let cached = stream.is_cached();
        let mut read = 0u64;
        for record in stream {
            let record: WindowRecord = record?;
            eval.push(record.as_row())?;
            read += 1;
        }
        let (prefilter, columns) = eval.finish(source);
        Ok(SourceData {
            key: group.key.clone(),
            title: source.title().to_string(),
            rows_read: read,
            cached,
            prefilter,
            columns,
        })
    }
}
