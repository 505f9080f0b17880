//! Parameter sweep behaviour on a synthetic walk.

use chrono::NaiveDate;
use proptest::prelude::*;
use pivotlab_core::domain::{Bar, PriceSeries};
use pivotlab_core::StrategyConfig;
use pivotlab_runner::data_loader::dataset_hash;
use pivotlab_runner::sweep::export_sweep_csv;
use pivotlab_runner::{run_on_series, ParamGrid, ParamSweep, RankMetric};

fn walk(n: usize) -> PriceSeries {
    let base = NaiveDate::from_ymd_opt(2023, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut price = 100.0_f64;
    let bars = (0..n)
        .map(|i| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let change = ((state >> 33) % 200) as f64 / 100.0 - 1.0;
            let open = price;
            price = (price + change * 1.2).max(10.0);
            Bar::new(
                base + chrono::Duration::days(i as i64),
                open,
                open.max(price) + 0.6,
                open.min(price) - 0.6,
                price,
            )
        })
        .collect();
    PriceSeries::new(bars).unwrap()
}

fn grid() -> ParamGrid {
    ParamGrid::default()
        .with_axis("ema_period", vec![10.0, 20.0, 0.0])
        .with_axis("atr_k", vec![1.5, 2.5])
}

#[test]
fn parallel_and_sequential_agree() {
    let series = walk(300);
    let hash = dataset_hash(series.bars());
    let base = StrategyConfig::default();

    let par = ParamSweep::new(&series, &hash, "walk")
        .sweep(&grid(), &base)
        .unwrap();
    let seq = ParamSweep::new(&series, &hash, "walk")
        .with_parallelism(false)
        .sweep(&grid(), &base)
        .unwrap();

    assert_eq!(par, seq);
    assert_eq!(par.rows.len(), 4);
    assert_eq!(par.rejected, 2);
}

#[test]
fn sweep_rows_match_single_runs() {
    let series = walk(250);
    let hash = dataset_hash(series.bars());
    let results = ParamSweep::new(&series, &hash, "walk")
        .sweep(&grid(), &StrategyConfig::default())
        .unwrap();

    for row in &results.rows {
        let mut config = StrategyConfig::default();
        for (name, &value) in &row.params {
            config.set_numeric(name, value).unwrap();
        }
        let single = run_on_series(&config, &series, &hash, "walk").unwrap();
        assert_eq!(single.run_id, row.run_id);
        assert_eq!(single.metrics, row.metrics);
    }
}

#[test]
fn ranking_is_best_first_and_top_truncates() {
    let series = walk(300);
    let hash = dataset_hash(series.bars());
    let results = ParamSweep::new(&series, &hash, "walk")
        .sweep(&grid(), &StrategyConfig::default())
        .unwrap();

    for metric in [RankMetric::Sharpe, RankMetric::MaxDrawdown, RankMetric::WinRate] {
        let ranked = results.ranked(metric);
        for pair in ranked.windows(2) {
            assert!(metric.value(&pair[0].metrics) >= metric.value(&pair[1].metrics));
        }
    }
    assert_eq!(results.top(RankMetric::Cagr, 2).len(), 2);
    assert_eq!(results.top(RankMetric::Cagr, 99).len(), 4);

    let csv = export_sweep_csv(&results, RankMetric::Sharpe).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "rank,run_id,atr_k,ema_period,total_return,cagr,sharpe,max_drawdown,win_rate,profit_factor,trades"
    );
    assert_eq!(lines.count(), 4);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Valid + rejected always accounts for every grid point.
    #[test]
    fn grid_points_are_all_accounted_for(
        emas in prop::collection::vec(0u32..30, 1..4),
        ks in prop::collection::vec(-1.0..4.0_f64, 1..4),
    ) {
        let grid = ParamGrid::default()
            .with_axis("ema_period", emas.iter().map(|&e| e as f64).collect())
            .with_axis("atr_k", ks);
        let (configs, rejected) = grid.generate_configs(&StrategyConfig::default());
        prop_assert_eq!(configs.len() + rejected, grid.size());
        for (_, config) in &configs {
            prop_assert!(config.validate().is_ok());
        }
    }
}
