// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::collections::HashMap;
use std::error::Error;
use std::path::Path;
use std::sync::Mutex;

use avg_cache::AggregationCache;
use core_types::{AppConfig, AtomicProgress, NoProgress};
use expr::ExprError;
use histogram::StatValue;
use pipeline::{Analysis, Field, Pipeline, PipelineError, PlotRequest};
use table_source::{SourceError, TableMeta, TableWriter};

type TestResult = Result<(), Box<dyn Error>>;

const RUN: &str = "run.parquet:/raw/run";

fn approx_eq(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "expected {a} ~= {b} within {tol}");
}

/// 100 rows one second apart: `v = t % 10`, `flag` set on even seconds.
fn write_run(dir: &Path) -> Result<(), Box<dyn Error>> {
    let meta = TableMeta::new("/raw/run", &["time", "v", "flag"])
        .with_title("test run")
        .with_units(&["s", "V", ""]);
    let mut writer = TableWriter::create(&dir.join("run.parquet"), &meta)?;
    let rows: Vec<[f64; 3]> = (0..100)
        .map(|t| [t as f64, (t % 10) as f64, if t % 2 == 0 { 1.0 } else { 0.0 }])
        .collect();
    writer.write_rows(&rows)?;
    writer.finish()?;
    Ok(())
}

fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn request(pairs: &[(&str, &str)]) -> PlotRequest {
    PlotRequest::from_settings(&settings(pairs)).unwrap()
}

fn pipeline(datadir: &Path) -> Pipeline {
    Pipeline::new(AppConfig::default().with_datadir(datadir))
}

#[test]
fn histogram_of_a_cut_series() -> TestResult {
    let data = tempfile::tempdir()?;
    write_run(data.path())?;
    let request = request(&[
        ("s0", RUN),
        ("m0", "h1"),
        ("x0", "v"),
        ("x0b", "0,10,10"),
        ("c0", "flag"),
        ("sb0", "nm"),
    ]);
    let progress = AtomicProgress::new();
    let prepared = pipeline(data.path()).prepare(&request, &progress)?;
    assert!(progress.is_done());

    let source = &prepared.sources()[0];
    assert_eq!(source.rows_read, 100);
    assert_eq!(source.len(), 50);
    assert_eq!(source.prefilter.as_deref(), Some("(flag)"));
    assert_eq!(source.title, "test run");
    assert_eq!(prepared.unit(0, Field::X), Some("V"));

    let Analysis::Hist1d {
        histogram, stats, shown, ..
    } = prepared.analyze(0)?
    else {
        panic!("expected a 1D histogram");
    };
    assert_eq!(
        histogram.contents,
        vec![10.0, 0.0, 10.0, 0.0, 10.0, 0.0, 10.0, 0.0, 10.0, 0.0]
    );
    approx_eq(stats.n, 50.0, 0.0);
    approx_eq(stats.mean, 4.5, 1e-12);
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0], ("N", StatValue::Scalar(50.0)));
    Ok(())
}

#[test]
fn series_sharing_a_source_apply_their_own_cuts() -> TestResult {
    let data = tempfile::tempdir()?;
    write_run(data.path())?;
    let request = request(&[
        ("s0", RUN),
        ("m0", "xy"),
        ("x0", "time"),
        ("y0", "v"),
        ("c0", "v > 5"),
        ("s1", RUN),
        ("m1", "xy"),
        ("x1", "time"),
        ("y1", "v"),
        ("x1a", "time / 60"),
    ]);
    let prepared = pipeline(data.path()).prepare(&request, &NoProgress)?;
    assert_eq!(prepared.sources().len(), 1);
    let source = &prepared.sources()[0];
    // the second series has no cut, so nothing is prefiltered
    assert_eq!(source.prefilter, None);
    assert_eq!(source.len(), 100);
    assert_eq!(prepared.unit(0, Field::X), Some("s"));
    assert_eq!(prepared.unit(1, Field::XAdjust), Some("?"));

    let cut = prepared.series_data(0)?;
    let (x, y) = (cut.x.unwrap(), cut.y.unwrap());
    assert_eq!(x.len(), 40);
    assert_eq!(y.len(), 40);
    assert!(y.iter().all(|v| *v > 5.0));
    assert_eq!(&x[..4], &[6.0, 7.0, 8.0, 9.0]);
    assert!(cut.z.is_none());

    let adjusted = prepared.series_data(1)?;
    let x = adjusted.x.unwrap();
    assert_eq!(x.len(), 100);
    approx_eq(x[30], 0.5, 1e-12);

    assert!(matches!(
        prepared.series_data(2),
        Err(PipelineError::UnknownSeries(2))
    ));
    Ok(())
}

#[test]
fn averaged_source_is_cached_between_requests() -> TestResult {
    let data = tempfile::tempdir()?;
    let cache = tempfile::tempdir()?;
    write_run(data.path())?;
    let config = AppConfig::default()
        .with_datadir(data.path())
        .with_cachedir(cache.path());
    let pipeline = Pipeline::new(config);
    let request = request(&[
        ("s0", RUN),
        ("m0", "xy"),
        ("x0", "time"),
        ("y0", "rate"),
        ("z0", "v"),
        ("rw0", "10s"),
    ]);

    let first = pipeline.prepare(&request, &NoProgress)?;
    assert!(!first.sources()[0].cached);
    let series = first.series_data(0)?;
    let (x, y, z) = (series.x.unwrap(), series.y.unwrap(), series.z.unwrap());
    // the trailing window [90, 100) is never closed
    assert_eq!(x, vec![5.0, 15.0, 25.0, 35.0, 45.0, 55.0, 65.0, 75.0, 85.0]);
    assert!(y.iter().all(|r| *r == 1.0));
    assert!(z.iter().all(|v| *v == 4.5));
    assert_eq!(first.unit(0, Field::Y), Some("?"));

    let progress = AtomicProgress::new();
    let second = pipeline.prepare(&request, &progress)?;
    assert!(second.sources()[0].cached);
    assert!(progress.is_done());
    assert_eq!(second.series_data(0)?, first.series_data(0)?);
    Ok(())
}

#[test]
fn disabled_cache_leaves_no_entry() -> TestResult {
    let data = tempfile::tempdir()?;
    let scratch = tempfile::tempdir()?;
    write_run(data.path())?;
    let pipeline = pipeline(data.path())
        .with_cache(AggregationCache::new(None).with_scratch_dir(scratch.path()));
    let request = request(&[
        ("s0", RUN),
        ("m0", "h1"),
        ("x0", "count"),
        ("rw0", "20"),
        ("rs0", "0.5"),
    ]);

    let prepared = pipeline.prepare(&request, &NoProgress)?;
    assert!(!prepared.sources()[0].cached);
    let x = prepared.series_data(0)?.x.unwrap();
    assert!(x.iter().all(|c| *c == 20.0));

    let leftovers: Vec<String> = std::fs::read_dir(scratch.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".parquet") || name.ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty(), "unexpected cache files {leftovers:?}");
    Ok(())
}

#[test]
fn joint_histogram_and_profile() -> TestResult {
    let data = tempfile::tempdir()?;
    write_run(data.path())?;
    let request = request(&[
        ("s0", RUN),
        ("m0", "h2"),
        ("x0", "v"),
        ("y0", "flag"),
        ("x0b", "0,10,10"),
        ("y0b", "0,2,2"),
        ("sb0", "nc"),
        ("s1", RUN),
        ("m1", "p"),
        ("x1", "v"),
        ("y1", "2 * v"),
        ("x1b", "0,10,5"),
    ]);
    let prepared = pipeline(data.path()).prepare(&request, &NoProgress)?;

    let Analysis::Hist2d {
        histogram, shown, ..
    } = prepared.analyze(0)?
    else {
        panic!("expected a 2D histogram");
    };
    approx_eq(histogram.total(), 100.0, 0.0);
    // odd values of v always have flag == 0
    assert_eq!(histogram.contents[0][1], 10.0);
    assert_eq!(histogram.contents[1][1], 0.0);
    assert_eq!(shown.iter().map(|(name, _)| *name).collect::<Vec<_>>(), vec!["N", "cov"]);

    let Analysis::Profile { bins, .. } = prepared.analyze(1)? else {
        panic!("expected a profile");
    };
    assert_eq!(bins.len(), 5);
    // bin [2, 4) holds v = 2 and v = 3 equally often
    assert_eq!(bins[1].mean, Some(5.0));
    assert_eq!(bins[1].std, Some(1.0));
    assert_eq!(bins[1].count, 20);
    Ok(())
}

#[test]
fn auto_binning_uses_sturges_rule() -> TestResult {
    let data = tempfile::tempdir()?;
    write_run(data.path())?;
    let request = request(&[("s0", RUN), ("m0", "h1"), ("x0", "time")]);
    let prepared = pipeline(data.path()).prepare(&request, &NoProgress)?;
    let Analysis::Hist1d { histogram, .. } = prepared.analyze(0)? else {
        panic!("expected a 1D histogram");
    };
    // 1 + floor(log2(100))
    assert_eq!(histogram.binning.len(), 7);
    approx_eq(histogram.total(), 100.0, 0.0);
    Ok(())
}

#[test]
fn rejects_unsafe_and_unknown_inputs() -> TestResult {
    let data = tempfile::tempdir()?;
    write_run(data.path())?;
    let pipeline = pipeline(data.path());

    let unsafe_expr = request(&[("s0", RUN), ("m0", "h1"), ("x0", "__import__('os')")]);
    assert!(matches!(
        pipeline.prepare(&unsafe_expr, &NoProgress),
        Err(PipelineError::Expr(ExprError::Unsafe { .. }))
    ));

    let missing = request(&[("s0", "nope.parquet:/raw/run"), ("m0", "h1"), ("x0", "v")]);
    assert!(matches!(
        pipeline.prepare(&missing, &NoProgress),
        Err(PipelineError::Source(SourceError::NotFound { .. }))
    ));

    // synthetic fields only exist on averaged rows
    let raw_rate = request(&[("s0", RUN), ("m0", "h1"), ("x0", "rate")]);
    match pipeline.prepare(&raw_rate, &NoProgress) {
        Err(PipelineError::RowEval { identifier, error }) => {
            assert_eq!(identifier, RUN);
            assert!(error.to_string().contains("rate"));
        }
        other => panic!("expected a row evaluation error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn progress_is_split_across_sources() -> TestResult {
    let data = tempfile::tempdir()?;
    write_run(data.path())?;
    let request = request(&[
        ("s0", RUN),
        ("m0", "h1"),
        ("x0", "v"),
        ("s1", RUN),
        ("m1", "h1"),
        ("x1", "v"),
        ("rw1", "10"),
    ]);
    let seen = Mutex::new(Vec::new());
    let sink = |v: f64| seen.lock().unwrap().push(v);
    let prepared = pipeline(data.path()).prepare(&request, &sink)?;
    assert_eq!(prepared.sources().len(), 2);

    let seen = seen.into_inner().unwrap();
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "not monotonic: {seen:?}");
    assert!(seen.contains(&0.5));
    assert_eq!(seen.last(), Some(&1.0));
    Ok(())
}
