//! Feature catalog: the variable set exported for offline modeling.
//!
//! Every feature family is one transform parameterized over a list of
//! periods. Column order is declared here once and is the external row
//! contract: `DDMMYYYY, target, H, L, C, <features>`.

use serde::{Deserialize, Serialize};

use crate::domain::BarField;
use crate::error::FeatureError;
use crate::graph::{GraphBuilder, RollingStat, SeriesRef};
use crate::normalize::Normalization;
use crate::record::{Column, FeatureSet, RecordAssembler};

/// A named period, e.g. `Fastest = 20` for the MMI family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub label: String,
    pub period: usize,
}

impl Tier {
    pub fn new(label: &str, period: usize) -> Self {
        Self {
            label: label.to_string(),
            period,
        }
    }
}

/// Which column set to export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSchema {
    /// The legacy variable file, column for column.
    #[default]
    Classic,
    /// Classic plus z-score companions and ranked ATR tiers.
    Extended,
}

/// Window lengths for every feature family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub schema: FeatureSchema,
    /// Trailing window of the rank and z-score normalizers.
    pub normalization_period: usize,
    /// ATR period of the log-price volatility denominator.
    pub volatility_period: usize,
    /// Long reference window for variance, ATR and drift baselines.
    pub baseline_period: usize,
    pub fast_periods: Vec<usize>,
    pub cubic_periods: Vec<usize>,
    pub trend_fast: usize,
    pub trend_slow: usize,
    pub variance_fast: usize,
    pub variance_mid: usize,
    pub atr_fast: usize,
    pub atr_mid: usize,
    pub band_fast: usize,
    pub extreme_period: usize,
    pub target_atr_period: usize,
    pub target_scale: f64,
    pub mmi_tiers: Vec<Tier>,
    pub hurst_tiers: Vec<Tier>,
    pub atr_tiers: Vec<Tier>,
    /// ATR periods exported percentile-ranked by the extended schema.
    pub ranked_atr_tiers: Vec<Tier>,
    /// Slower MMI tiers the extended schema exports raw.
    pub extended_mmi_tiers: Vec<Tier>,
    /// Slower Hurst tiers the extended schema exports raw.
    pub extended_hurst_tiers: Vec<Tier>,
    /// Super smoother period of the `MMI{label}Smooth` columns.
    pub smooth_period: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            schema: FeatureSchema::Classic,
            normalization_period: 50,
            volatility_period: 7,
            baseline_period: 100,
            fast_periods: vec![3, 5, 10],
            cubic_periods: vec![10, 25, 50],
            trend_fast: 20,
            trend_slow: 100,
            variance_fast: 10,
            variance_mid: 20,
            atr_fast: 10,
            atr_mid: 20,
            band_fast: 20,
            extreme_period: 10,
            target_atr_period: 100,
            target_scale: 100.0,
            mmi_tiers: vec![Tier::new("Faster", 50), Tier::new("Fastest", 20)],
            hurst_tiers: vec![
                Tier::new("Mod", 100),
                Tier::new("Fast", 50),
                Tier::new("Faster", 20),
            ],
            atr_tiers: vec![
                Tier::new("Week", 7),
                Tier::new("Fast", 25),
                Tier::new("Mod", 100),
                Tier::new("Slow", 250),
            ],
            ranked_atr_tiers: vec![
                Tier::new("3", 3),
                Tier::new("5", 5),
                Tier::new("10", 10),
                Tier::new("Fast", 25),
            ],
            extended_mmi_tiers: vec![Tier::new("Mod", 200), Tier::new("Fast", 100)],
            extended_hurst_tiers: vec![Tier::new("Slow", 200)],
            smooth_period: 10,
        }
    }
}

/// Precision of the target column.
pub const TARGET_PRECISION: usize = 3;
/// Precision of every other numeric column.
pub const FEATURE_PRECISION: usize = 5;

/// Ordered column list under construction.
#[derive(Default)]
struct Columns(Vec<Column>);

impl Columns {
    fn push(&mut self, name: impl Into<String>, series: SeriesRef) {
        self.0.push(Column {
            name: name.into(),
            series,
            precision: FEATURE_PRECISION,
        });
    }
}

/// Declare the feature graph for `config` and the record layout reading it.
pub fn build(config: &FeatureConfig) -> Result<FeatureSet, FeatureError> {
    use crate::graph::RollingStat::{
        Highest, LinearFit, Lowest, Mean, MeannessIndex, Moment, PolyFit,
    };

    let mut b = GraphBuilder::new();
    let norm = config.normalization_period;
    let base = config.baseline_period;
    let rank = |b: &mut GraphBuilder, x| b.normalize(x, norm, Normalization::PercentRank);
    let zscore = |b: &mut GraphBuilder, x| b.normalize(x, norm, Normalization::ZScore);

    let high = b.bar(BarField::High);
    let low = b.bar(BarField::Low);
    let close = b.bar(BarField::Close);
    let price = b.mean_price();
    let ln_p = b.ln(price);
    let ln_h = b.ln(high);
    let ln_l = b.ln(low);
    let ln_c = b.ln(close);
    let dln_c = b.change(ln_c, 1);

    let tr = b.true_range(high, low, close);
    let tr_log = b.true_range(ln_h, ln_l, ln_c);
    let atr = |b: &mut GraphBuilder, n| b.rolling(tr, n, Mean);
    let atr_log = b.rolling(tr_log, config.volatility_period, Mean);
    let atr_log_base = b.rolling(tr_log, base, Mean);
    let vol_scaled = |b: &mut GraphBuilder, x| b.div(x, atr_log);
    let band_width = |b: &mut GraphBuilder, n| {
        let var = b.rolling(price, n, Moment(2));
        let sd = b.sqrt(var);
        let avg = b.rolling(price, n, Mean);
        let ratio = b.div(sd, avg);
        b.ln(ratio)
    };
    let var_ratio = |b: &mut GraphBuilder, fast, slow| {
        let num = b.rolling(ln_p, fast, Moment(2));
        let den = b.rolling(ln_p, slow, Moment(2));
        b.div(num, den)
    };
    let atr_ratio = |b: &mut GraphBuilder, fast, slow| {
        let num = atr(b, fast);
        let den = atr(b, slow);
        b.div(num, den)
    };

    let mut cols = Columns::default();
    cols.push("H", high);
    cols.push("L", low);
    cols.push("C", close);

    let velocity: Vec<_> = config
        .fast_periods
        .iter()
        .map(|&f| {
            let fit = b.rolling(ln_p, f, LinearFit);
            vol_scaled(&mut b, fit)
        })
        .collect();
    for (&f, &v) in config.fast_periods.iter().zip(&velocity) {
        cols.push(format!("velocity{f}N"), rank(&mut b, v));
    }
    let accel: Vec<_> = config
        .fast_periods
        .iter()
        .map(|&f| {
            let fit = b.rolling(ln_p, f, PolyFit(2));
            vol_scaled(&mut b, fit)
        })
        .collect();
    for (&f, &a) in config.fast_periods.iter().zip(&accel) {
        cols.push(format!("accel{f}N"), rank(&mut b, a));
    }
    for &c in &config.cubic_periods {
        let fit = b.rolling(ln_p, c, PolyFit(3));
        let x = vol_scaled(&mut b, fit);
        cols.push(format!("cubic{c}N"), rank(&mut b, x));
    }

    let dln_var = b.rolling(dln_c, base, Moment(2));
    let dln_sd = b.sqrt(dln_var);
    for &f in &config.fast_periods {
        let diff = b.change(dln_c, f);
        let m = b.div(diff, dln_sd);
        cols.push(format!("mom{f}N"), rank(&mut b, m));
    }
    for &f in &config.fast_periods {
        let sma = b.rolling(close, f, Mean);
        let ratio = b.div(close, sma);
        let dev = b.ln(ratio);
        let x = vol_scaled(&mut b, dev);
        cols.push(format!("closeDevMA{f}N"), rank(&mut b, x));
    }
    // The legacy deviations subtract the volatility-scaled fit (velocity,
    // accel) from the raw log price rather than the fit itself. The mixed
    // units are kept so the columns match existing variable files.
    for (&f, &v) in config.fast_periods.iter().zip(&velocity) {
        let dev = b.sub(ln_p, v);
        let x = vol_scaled(&mut b, dev);
        cols.push(format!("linDev{f}N"), rank(&mut b, x));
    }
    let mut quad_dev = Vec::with_capacity(config.fast_periods.len());
    for (&f, &a) in config.fast_periods.iter().zip(&accel) {
        let dev = b.sub(ln_p, a);
        let x = vol_scaled(&mut b, dev);
        let n = rank(&mut b, x);
        quad_dev.push(n);
        cols.push(format!("quadDev{f}N"), n);
    }
    // Legacy file exports the quadratic deviation under the cubicDev names.
    // Kept as an alias so existing consumers see the same values.
    for (&f, &series) in config.fast_periods.iter().zip(&quad_dev) {
        cols.push(format!("cubicDev{f}N"), series);
    }

    let drift_base = b.rolling(dln_c, base, Moment(1));
    for &f in &config.fast_periods {
        let drift = b.rolling(dln_c, f, Moment(1));
        let diff = b.sub(drift, drift_base);
        let x = b.div(diff, atr_log_base);
        cols.push(format!("apc{f}N"), rank(&mut b, x));
    }
    let pvr: Vec<_> = config
        .fast_periods
        .iter()
        .map(|&f| var_ratio(&mut b, f, base))
        .collect();
    for (&f, &x) in config.fast_periods.iter().zip(&pvr) {
        cols.push(format!("priceVarRat{f}N"), rank(&mut b, x));
    }
    for (&f, &x) in config.fast_periods.iter().zip(&pvr) {
        let d = b.change(x, f);
        cols.push(format!("deltaPVR{f}N"), rank(&mut b, d));
    }
    let atr_rat: Vec<_> = config
        .fast_periods
        .iter()
        .map(|&f| atr_ratio(&mut b, f, base))
        .collect();
    for (&f, &x) in config.fast_periods.iter().zip(&atr_rat) {
        cols.push(format!("atrRat{f}N"), rank(&mut b, x));
    }
    for (&f, &x) in config.fast_periods.iter().zip(&atr_rat) {
        let d = b.change(x, f);
        cols.push(format!("deltaATRrat{f}N"), rank(&mut b, d));
    }
    let widths: Vec<_> = config
        .fast_periods
        .iter()
        .map(|&f| band_width(&mut b, f))
        .collect();
    for (&f, &x) in config.fast_periods.iter().zip(&widths) {
        cols.push(format!("bWdith{f}N"), rank(&mut b, x));
    }
    for (&f, &x) in config.fast_periods.iter().zip(&widths) {
        let d = b.change(x, f);
        cols.push(format!("deltabWidth{f}N"), rank(&mut b, d));
    }

    let meanness = |b: &mut GraphBuilder, n| {
        let raw = b.rolling(price, n, MeannessIndex);
        b.scale(raw, 0.01)
    };
    let mmi_tiers: Vec<_> = config
        .mmi_tiers
        .iter()
        .map(|t| (t.label.as_str(), meanness(&mut b, t.period)))
        .collect();
    for &(label, mmi) in &mmi_tiers {
        cols.push(format!("MMI{label}N"), rank(&mut b, mmi));
    }
    if let Some(&(label, mmi)) = mmi_tiers.last() {
        for &f in &config.fast_periods {
            let d = b.change(mmi, f);
            cols.push(format!("deltaMMI{label}{f}N"), rank(&mut b, d));
        }
    }
    for tier in &config.hurst_tiers {
        let h = b.rolling(price, tier.period, RollingStat::HurstExponent);
        cols.push(format!("Hurst{}", tier.label), h);
    }

    let range = b.sub(high, low);
    let from_low = b.sub(close, low);
    let ibs = b.div(from_low, range);
    cols.push("ibsOneN", rank(&mut b, ibs));

    let lp_fast = b.low_pass(price, config.trend_fast);
    let lp_slow = b.low_pass(price, config.trend_slow);
    let trend = b.sub(lp_fast, lp_slow);
    let prev_close = b.lag(close, 1);
    let c2c_ratio = b.div(close, prev_close);
    let c2c = b.ln(c2c_ratio);
    let hh = b.rolling(high, config.extreme_period, Highest);
    let high_dist = b.div(hh, close);
    let ll = b.rolling(low, config.extreme_period, Lowest);
    let low_dist = b.div(ll, close);
    let slow_ratio = b.div(close, lp_slow);
    let trend_dev_slow = b.ln(slow_ratio);
    let fast_ratio = b.div(close, lp_fast);
    let trend_dev_fast = b.ln(fast_ratio);
    let pvr_slow = var_ratio(&mut b, config.variance_mid, base);
    let pvr_fast = var_ratio(&mut b, config.variance_fast, config.variance_mid);
    let atr_slow = atr_ratio(&mut b, config.atr_mid, base);
    let atr_fast = atr_ratio(&mut b, config.atr_fast, config.atr_mid);
    let bw_slow = band_width(&mut b, base);
    let bw_fast = band_width(&mut b, config.band_fast);

    let ranked = [
        ("trendNorm", trend),
        ("ctoCNorm", c2c),
        ("highDistNorm", high_dist),
        ("lowDistNorm", low_dist),
        ("trendDevSlowNorm", trend_dev_slow),
        ("trendDevFastNorm", trend_dev_fast),
        ("priceVRSNorm", pvr_slow),
        ("priceVRFNorm", pvr_fast),
        ("atrRatSlowNorm", atr_slow),
        ("atrRatFastNorm", atr_fast),
        ("bWidthSlowNorm", bw_slow),
        ("bWidthFastNorm", bw_fast),
    ];
    for (name, x) in ranked {
        cols.push(name, rank(&mut b, x));
    }
    for tier in &config.atr_tiers {
        let x = atr(&mut b, tier.period);
        cols.push(format!("ATR{}", tier.label), x);
    }

    if config.schema == FeatureSchema::Extended {
        let scored = [
            ("trendZscore", trend),
            ("priceVRSZscore", pvr_slow),
            ("priceVRFZscore", pvr_fast),
            ("atrRatSlowZscore", atr_slow),
            ("atrRatFastZscore", atr_fast),
            ("bWidthSlowZscore", bw_slow),
            ("bWidthFastZscore", bw_fast),
            ("ctoCZscore", c2c),
            ("highDistZscore", high_dist),
            ("lowDistZscore", low_dist),
            ("trendDevSlowZscore", trend_dev_slow),
            ("trendDevFastZscore", trend_dev_fast),
        ];
        for (name, x) in scored {
            cols.push(name, zscore(&mut b, x));
        }
        for tier in &config.ranked_atr_tiers {
            let x = atr(&mut b, tier.period);
            cols.push(format!("ATR{}N", tier.label), rank(&mut b, x));
        }
        let slow_mmi: Vec<_> = config
            .extended_mmi_tiers
            .iter()
            .map(|t| (t.label.as_str(), meanness(&mut b, t.period)))
            .collect();
        for &(label, mmi) in &slow_mmi {
            cols.push(format!("MMI{label}"), mmi);
        }
        for &(label, mmi) in slow_mmi.iter().chain(&mmi_tiers) {
            cols.push(
                format!("MMI{label}Smooth"),
                b.smooth(mmi, config.smooth_period),
            );
        }
        for tier in &config.extended_hurst_tiers {
            let h = b.rolling(price, tier.period, RollingStat::HurstExponent);
            cols.push(format!("Hurst{}", tier.label), h);
        }
    }

    let close_change = b.change(close, 1);
    let target_atr = atr(&mut b, config.target_atr_period);
    let scaled = b.div(close_change, target_atr);
    let target = b.scale(scaled, config.target_scale);
    b.name("target", target)?;

    for col in &cols.0 {
        b.name(&col.name, col.series)?;
        b.require_history(col.series, 2);
    }
    let graph = b.build()?;
    let assembler = RecordAssembler::new(
        Column {
            name: "target".to_string(),
            series: target,
            precision: TARGET_PRECISION,
        },
        cols.0,
    );
    Ok(FeatureSet::new(graph, assembler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::{Duration, NaiveDate};

    const CLASSIC_HEADER: &str = "DDMMYYYY,target,H,L,C,velocity3N,velocity5N,velocity10N,\
accel3N,accel5N,accel10N,cubic10N,cubic25N,cubic50N,mom3N,mom5N,mom10N,\
closeDevMA3N,closeDevMA5N,closeDevMA10N,linDev3N,linDev5N,linDev10N,\
quadDev3N,quadDev5N,quadDev10N,cubicDev3N,cubicDev5N,cubicDev10N,\
apc3N,apc5N,apc10N,priceVarRat3N,priceVarRat5N,priceVarRat10N,\
deltaPVR3N,deltaPVR5N,deltaPVR10N,atrRat3N,atrRat5N,atrRat10N,\
deltaATRrat3N,deltaATRrat5N,deltaATRrat10N,bWdith3N,bWdith5N,bWdith10N,\
deltabWidth3N,deltabWidth5N,deltabWidth10N,MMIFasterN,MMIFastestN,\
deltaMMIFastest3N,deltaMMIFastest5N,deltaMMIFastest10N,\
HurstMod,HurstFast,HurstFaster,ibsOneN,trendNorm,ctoCNorm,highDistNorm,\
lowDistNorm,trendDevSlowNorm,trendDevFastNorm,priceVRSNorm,priceVRFNorm,\
atrRatSlowNorm,atrRatFastNorm,bWidthSlowNorm,bWidthFastNorm,\
ATRWeek,ATRFast,ATRMod,ATRSlow";

    #[test]
    fn classic_header_matches_legacy_layout() {
        let set = build(&FeatureConfig::default()).unwrap();
        assert_eq!(set.assembler().header().join(","), CLASSIC_HEADER);
        assert_eq!(set.assembler().header().len(), 75);
    }

    #[test]
    fn extended_schema_appends_companions() {
        let config = FeatureConfig {
            schema: FeatureSchema::Extended,
            ..FeatureConfig::default()
        };
        let set = build(&config).unwrap();
        let header = set.assembler().header();
        assert_eq!(header.len(), 75 + 12 + 4 + 7);
        assert!(header.join(",").starts_with(CLASSIC_HEADER));
        assert_eq!(header[75], "trendZscore");
        assert_eq!(
            header[87..].join(","),
            "ATR3N,ATR5N,ATR10N,ATRFastN,MMIMod,MMIFast,MMIModSmooth,MMIFastSmooth,\
MMIFasterSmooth,MMIFastestSmooth,HurstSlow"
        );
    }

    #[test]
    fn extended_companions_reuse_classic_series() {
        let config = FeatureConfig {
            schema: FeatureSchema::Extended,
            ..FeatureConfig::default()
        };
        let set = build(&config).unwrap();
        let g = set.graph();
        let key = |name: &str| g.key(g.lookup(name).unwrap());
        assert_eq!(key("ATRFastN"), format!("rank({},50)", key("ATRFast")));
        assert_eq!(
            key("MMIFastestSmooth"),
            "smooth((mmi(price,20) * 0.01),10)"
        );
        assert_eq!(key("MMIMod"), "(mmi(price,200) * 0.01)");
        assert_eq!(key("HurstSlow"), "hurst(price,200)");
    }

    fn drifting_bars(n: usize) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2019, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| {
                let t = i as f64;
                let close = 100.0 + 0.05 * t + 3.0 * (t / 9.0).sin();
                let open = close - 0.4 * (t / 4.0).cos();
                let high = open.max(close) + 0.6 + 0.2 * (t / 3.0).sin().abs();
                let low = open.min(close) - 0.5 - 0.2 * (t / 5.0).cos().abs();
                Bar::new(base + Duration::days(i as i64), open, high, low, close)
            })
            .collect()
    }

    #[test]
    fn deviations_subtract_the_scaled_fit() {
        // linDev = (lnP - linfit(lnP)/ATRlog) / ATRlog, quadDev likewise
        // with the quadratic fit.
        let mut legacy = GraphBuilder::new();
        let (h, l, c) = (
            legacy.bar(BarField::High),
            legacy.bar(BarField::Low),
            legacy.bar(BarField::Close),
        );
        let price = legacy.mean_price();
        let ln_p = legacy.ln(price);
        let (ln_h, ln_l, ln_c) = (legacy.ln(h), legacy.ln(l), legacy.ln(c));
        let tr_log = legacy.true_range(ln_h, ln_l, ln_c);
        let atr7 = legacy.rolling(tr_log, 7, RollingStat::Mean);
        let mut expected = Vec::new();
        for stat in [RollingStat::LinearFit, RollingStat::PolyFit(2)] {
            let fit = legacy.rolling(ln_p, 3, stat);
            let scaled = legacy.div(fit, atr7);
            let dev = legacy.sub(ln_p, scaled);
            let x = legacy.div(dev, atr7);
            expected.push(legacy.normalize(x, 50, Normalization::PercentRank));
        }
        let mut legacy = legacy.build().unwrap();

        let mut set = build(&FeatureConfig::default()).unwrap();
        let lin = set.graph().lookup("linDev3N").unwrap();
        let quad = set.graph().lookup("quadDev3N").unwrap();
        let mut defined = 0;
        for bar in drifting_bars(200) {
            legacy.push_bar(&bar).unwrap();
            set.advance(&bar).unwrap();
            for (ours, theirs) in [(lin, expected[0]), (quad, expected[1])] {
                let (a, b) = (set.graph().value(ours, 0).unwrap(), legacy.value(theirs, 0).unwrap());
                assert!(a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan()), "{a} vs {b}");
                defined += usize::from(!a.is_nan());
            }
        }
        assert!(defined > 200, "deviation ranks should be defined after warm-up");
    }

    #[test]
    fn cubic_deviation_aliases_quadratic_deviation() {
        let set = build(&FeatureConfig::default()).unwrap();
        let g = set.graph();
        for f in [3, 5, 10] {
            assert_eq!(
                g.lookup(&format!("cubicDev{f}N")).unwrap(),
                g.lookup(&format!("quadDev{f}N")).unwrap()
            );
        }
    }

    #[test]
    fn shared_subexpressions_are_declared_once() {
        let set = build(&FeatureConfig::default()).unwrap();
        let g = set.graph();
        let velocity = g.lookup("velocity5N").unwrap();
        let lin_dev = g.lookup("linDev5N").unwrap();
        let scaled_fit = "(linfit(ln(price),5) / mean(tr(ln(high),ln(low),ln(close)),7))";
        assert_eq!(g.key(velocity), format!("rank({scaled_fit},50)"));
        assert!(g.key(lin_dev).contains(&format!("(ln(price) - {scaled_fit})")));
        let before = g.node_count();
        let again = build(&FeatureConfig::default()).unwrap();
        assert_eq!(again.graph().node_count(), before);
    }

    #[test]
    fn periods_follow_configuration() {
        let config = FeatureConfig {
            fast_periods: vec![4, 8],
            mmi_tiers: vec![Tier::new("Quick", 30)],
            ..FeatureConfig::default()
        };
        let set = build(&config).unwrap();
        let header = set.assembler().header();
        assert!(header.contains(&"velocity8N".to_string()));
        assert!(header.contains(&"deltaMMIQuick4N".to_string()));
        assert!(!header.contains(&"velocity3N".to_string()));
    }

    #[test]
    fn config_round_trips_through_serde_defaults() {
        let config: FeatureConfig = serde_json::from_str(r#"{"normalization_period": 30}"#).unwrap();
        assert_eq!(config.normalization_period, 30);
        assert_eq!(config.fast_periods, vec![3, 5, 10]);
        assert_eq!(config.schema, FeatureSchema::Classic);
    }
}
