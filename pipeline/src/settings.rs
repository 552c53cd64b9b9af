// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use aggregations::{check_shift, parse_window};
use histogram::{BinSpec, StatsSelection};

use crate::error::{PipelineError, Result};

/// Series slots recognized in a settings map (`s0` .. `s9`).
pub const MAX_SERIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Xy,
    Hist1d,
    Hist2d,
    Profile,
    Map,
}

impl Mode {
    /// Axes whose expressions must be present for this mode.
    pub fn required_axes(self) -> &'static [Field] {
        match self {
            Mode::Hist1d => &[Field::X],
            Mode::Xy | Mode::Hist2d | Mode::Profile | Mode::Map => &[Field::X, Field::Y],
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "xy" => Ok(Mode::Xy),
            "h1" => Ok(Mode::Hist1d),
            "h2" => Ok(Mode::Hist2d),
            "p" => Ok(Mode::Profile),
            "map" => Ok(Mode::Map),
            other => Err(format!("unknown mode {other:?}")),
        }
    }
}

/// Per-series expression slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    X,
    Y,
    Z,
    Cut,
    XAdjust,
    YAdjust,
    ZAdjust,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::X,
        Field::Y,
        Field::Z,
        Field::Cut,
        Field::XAdjust,
        Field::YAdjust,
        Field::ZAdjust,
    ];

    /// Settings key for slot `n`, e.g. `x3` or `y3a`.
    pub fn key(self, n: usize) -> String {
        match self {
            Field::X => format!("x{n}"),
            Field::Y => format!("y{n}"),
            Field::Z => format!("z{n}"),
            Field::Cut => format!("c{n}"),
            Field::XAdjust => format!("x{n}a"),
            Field::YAdjust => format!("y{n}a"),
            Field::ZAdjust => format!("z{n}a"),
        }
    }

    pub fn axis(self) -> char {
        match self {
            Field::X | Field::XAdjust => 'x',
            Field::Y | Field::YAdjust => 'y',
            Field::Z | Field::ZAdjust => 'z',
            Field::Cut => 'c',
        }
    }
}

/// Window averaging applied to a source before expressions are evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Averaging {
    pub window: f64,
    pub shift: f64,
    /// `None` weights every row by 1.
    pub weight: Option<String>,
}

/// A table together with its averaging parameters. Series with equal keys are read in
/// one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceKey {
    pub identifier: String,
    pub averaging: Option<Averaging>,
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.averaging {
            Some(avg) => write!(
                f,
                "{} (window {}, shift {}, weight {})",
                self.identifier,
                avg.window,
                avg.shift,
                avg.weight.as_deref().unwrap_or("1")
            ),
            None => f.write_str(&self.identifier),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesConfig {
    /// Slot number `N` of the `sN`, `mN`, ... keys.
    pub slot: usize,
    pub source: String,
    pub mode: Mode,
    pub name: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    pub z: Option<String>,
    pub cut: Option<String>,
    pub x_adjust: Option<String>,
    pub y_adjust: Option<String>,
    pub z_adjust: Option<String>,
    pub averaging: Option<Averaging>,
    pub x_bins: BinSpec,
    pub y_bins: BinSpec,
    pub stats: StatsSelection,
}

impl SeriesConfig {
    pub fn expression(&self, field: Field) -> Option<&str> {
        match field {
            Field::X => self.x.as_deref(),
            Field::Y => self.y.as_deref(),
            Field::Z => self.z.as_deref(),
            Field::Cut => self.cut.as_deref(),
            Field::XAdjust => self.x_adjust.as_deref(),
            Field::YAdjust => self.y_adjust.as_deref(),
            Field::ZAdjust => self.z_adjust.as_deref(),
        }
    }

    /// Every expression the series needs evaluated, in [`Field::ALL`] order.
    pub fn expressions(&self) -> impl Iterator<Item = (Field, &str)> + '_ {
        Field::ALL
            .into_iter()
            .filter_map(|field| self.expression(field).map(|expr| (field, expr)))
    }

    pub fn source_key(&self) -> SourceKey {
        SourceKey {
            identifier: self.source.clone(),
            averaging: self.averaging.clone(),
        }
    }

    /// Legend label: the configured name, else the plotted expressions.
    pub fn label(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        [self.x.as_deref(), self.y.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" vs ")
    }
}

/// Validated plot settings: one record per active series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotRequest {
    series: Vec<SeriesConfig>,
}

struct Settings<'a>(&'a HashMap<String, String>);

impl<'a> Settings<'a> {
    /// Trimmed value; empty counts as unset.
    fn get(&self, key: &str) -> Option<&'a str> {
        self.0.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    fn owned(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    fn bins(&self, key: &str) -> Result<BinSpec> {
        match self.get(key) {
            Some(spec) => BinSpec::parse(spec).map_err(|err| PipelineError::settings(key, err)),
            None => Ok(BinSpec::Auto),
        }
    }

    fn averaging(&self, n: usize) -> Result<Option<Averaging>> {
        let window_key = format!("rw{n}");
        let Some(window) = self.get(&window_key) else {
            return Ok(None);
        };
        let window = parse_window(window).map_err(|err| PipelineError::settings(&window_key, err))?;

        let shift_key = format!("rs{n}");
        let shift = match self.get(&shift_key) {
            Some(raw) => raw
                .parse::<f64>()
                .map_err(|_| PipelineError::settings(&shift_key, format!("{raw:?} is not a number")))?,
            None => 1.0,
        };
        let shift = check_shift(shift).map_err(|err| PipelineError::settings(&shift_key, err))?;

        let weight = self.get(&format!("rc{n}")).filter(|w| *w != "1").map(str::to_string);
        Ok(Some(Averaging {
            window,
            shift,
            weight,
        }))
    }

    fn series(&self, n: usize) -> Result<Option<SeriesConfig>> {
        let (Some(source), Some(mode_raw)) = (self.get(&format!("s{n}")), self.get(&format!("m{n}")))
        else {
            return Ok(None);
        };
        let mode_key = format!("m{n}");
        let mode = mode_raw
            .parse::<Mode>()
            .map_err(|reason| PipelineError::settings(&mode_key, reason))?;

        let config = SeriesConfig {
            slot: n,
            source: source.to_string(),
            mode,
            name: self.owned(&format!("n{n}")),
            x: self.owned(&Field::X.key(n)),
            y: self.owned(&Field::Y.key(n)),
            z: self.owned(&Field::Z.key(n)),
            cut: self.owned(&Field::Cut.key(n)),
            x_adjust: self.owned(&Field::XAdjust.key(n)),
            y_adjust: self.owned(&Field::YAdjust.key(n)),
            z_adjust: self.owned(&Field::ZAdjust.key(n)),
            averaging: self.averaging(n)?,
            x_bins: self.bins(&format!("x{n}b"))?,
            y_bins: self.bins(&format!("y{n}b"))?,
            stats: self
                .get(&format!("sb{n}"))
                .map(StatsSelection::parse)
                .unwrap_or_default(),
        };
        for field in mode.required_axes() {
            if config.expression(*field).is_none() {
                return Err(PipelineError::settings(
                    &field.key(n),
                    format!("required for mode {mode_raw}"),
                ));
            }
        }
        Ok(Some(config))
    }
}

impl PlotRequest {
    /// Parse raw settings. Keys the aggregation core does not use (plot options, fits,
    /// axis labels) are ignored.
    pub fn from_settings(settings: &HashMap<String, String>) -> Result<Self> {
        let settings = Settings(settings);
        let mut series = Vec::new();
        for n in 0..MAX_SERIES {
            if let Some(config) = settings.series(n)? {
                series.push(config);
            }
        }
        Ok(Self { series })
    }

    pub fn new(series: Vec<SeriesConfig>) -> Self {
        Self { series }
    }

    pub fn series(&self) -> &[SeriesConfig] {
        &self.series
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_active_series_only() {
        let request = PlotRequest::from_settings(&settings(&[
            ("s0", "data.parquet:/raw"),
            ("m0", "h1"),
            ("x0", " mu_rate "),
            ("x0b", "0,10,5"),
            ("sb0", "nmscu"),
            ("s1", "other.parquet:/raw"),
            ("x1", "time"),
            ("s2", "data.parquet:/raw"),
            ("m2", "xy"),
            ("x2", "time"),
            ("y2", "mu_rate"),
            ("c2", ""),
            ("o2color", "red"),
        ]))
        .unwrap();
        let series = request.series();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].slot, 0);
        assert_eq!(series[0].x.as_deref(), Some("mu_rate"));
        assert_eq!(
            series[0].x_bins,
            BinSpec::Range {
                lo: 0.0,
                hi: 10.0,
                count: 5
            }
        );
        assert_eq!(series[0].stats.kinds().len(), 5);
        assert_eq!(series[1].slot, 2);
        assert_eq!(series[1].cut, None);
        assert_eq!(series[1].stats, StatsSelection::default());
        assert_eq!(series[1].averaging, None);
    }

    #[test]
    fn parses_averaging() {
        let request = PlotRequest::from_settings(&settings(&[
            ("s0", "data.parquet:/raw"),
            ("m0", "xy"),
            ("x0", "time"),
            ("y0", "rate"),
            ("rw0", "5m"),
            ("rs0", "0.5"),
            ("rc0", "1"),
        ]))
        .unwrap();
        assert_eq!(
            request.series()[0].averaging,
            Some(Averaging {
                window: 300.0,
                shift: 0.5,
                weight: None
            })
        );
    }

    #[test]
    fn rejects_bad_values_by_key() {
        let base = [("s0", "t.parquet:/raw"), ("x0", "time"), ("y0", "v")];
        let cases: [(&[(&str, &str)], &str); 8] = [
            (&[("m0", "pie")], "m0"),
            (&[("m0", "xy"), ("rw0", "-3")], "rw0"),
            (&[("m0", "xy"), ("rw0", "60"), ("rs0", "1.5")], "rs0"),
            (&[("m0", "xy"), ("rw0", "60"), ("rs0", "half")], "rs0"),
            (&[("m0", "h1"), ("x0b", "2.5")], "x0b"),
            (&[("m0", "h1"), ("x0b", "0, 1, 1e17")], "x0b"),
            (&[("m0", "h2"), ("y0b", "2000000")], "y0b"),
            (&[("m0", "h2"), ("y0", "")], "y0"),
        ];
        for (extra, expected) in cases {
            let mut pairs = base.to_vec();
            pairs.extend_from_slice(extra);
            match PlotRequest::from_settings(&settings(&pairs)) {
                Err(PipelineError::Settings { key, .. }) => assert_eq!(key, expected),
                other => panic!("expected settings error for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn series_sharing_parameters_share_a_source_key() {
        let request = PlotRequest::from_settings(&settings(&[
            ("s0", "t.parquet:/raw"),
            ("m0", "h1"),
            ("x0", "v"),
            ("s1", "t.parquet:/raw"),
            ("m1", "h1"),
            ("x1", "2*v"),
            ("s2", "t.parquet:/raw"),
            ("m2", "h1"),
            ("x2", "v"),
            ("rw2", "10"),
        ]))
        .unwrap();
        let keys: Vec<SourceKey> = request.series().iter().map(SeriesConfig::source_key).collect();
        assert_eq!(keys[0], keys[1]);
        assert_ne!(keys[0], keys[2]);
        assert_eq!(request.series()[1].label(), "2*v");
    }
}
