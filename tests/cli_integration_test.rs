//! CLI integration tests.
//!
//! Tests cover:
//! - Engine config loading (defaults, INI file, store override, invalid values)
//! - Argument parsing of trade commands and quantity selection
//! - Text and JSON output of store commands against an on-disk store
//! - Score, fscore, plan and validate over CSV inputs

mod common;

use clap::Parser;
use common::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;
use tradegate::cli::{self, Cli};
use tradegate::domain::config::EngineConfig;
use tradegate::domain::desk::SellQuantity;
use tradegate::domain::error::TradegateError;
use tradegate::domain::journal::CloseTarget;

const OBSERVATIONS: &str = "\
symbol,observed_at,rsi,macd_histogram,bb_position,price_vs_sma50,sentiment,sentiment_samples,volume_ratio,price_change_pct,news_positive,news_negative,fund_flow_net,fund_flow_gross
PTT,2024-03-01 10:00,20,0.5,0,1.06,0.9,12,3,5,10,0,90,100
AOT,2024-03-01 10:00,50,,,,,,1,0.5,,,,
";

const QUOTES: &str = "\
symbol,price,volatility,sector
PTT,35,0.3,Energy
AOT,62,0.2,Transport
";

const STATEMENTS: &str = "\
symbol,period,revenue,net_income,operating_cash_flow,total_assets,total_liabilities,current_assets,current_liabilities,shares_outstanding,gross_margin,asset_turnover,long_term_debt,total_equity
PTT,2023Q3,1000,80,100,2000,900,600,400,100,0.30,0.50,450,1100
PTT,2023Q4,1100,120,150,2000,800,700,400,100,0.32,0.55,400,1200
";

fn run_args(args: &[&str]) -> Result<String, TradegateError> {
    let cli = Cli::try_parse_from(args).unwrap();
    let mut out = Vec::new();
    cli::execute(&cli, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

fn with_store<'a>(store: &'a Path, rest: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec!["tradegate", "--store", store.to_str().unwrap()];
    args.extend_from_slice(rest);
    args
}

mod config_loading {
    use super::*;

    #[test]
    fn no_file_means_defaults() {
        let config = cli::load_engine(None, None).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn store_override_wins_over_file() {
        let dir = TempDir::new().unwrap();
        let ini = write_file(
            dir.path(),
            "tradegate.ini",
            "[store]\npath = from-file.db\n\n[portfolio]\ninitial_cash = 250000\n",
        );
        let config = cli::load_engine(Some(&ini), None).unwrap();
        assert_eq!(config.store.path, Path::new("from-file.db"));
        assert!((config.initial_cash - 250_000.0).abs() < 1e-9);

        let overridden = cli::load_engine(Some(&ini), Some(Path::new("other.db"))).unwrap();
        assert_eq!(overridden.store.path, Path::new("other.db"));
    }

    #[test]
    fn invalid_weights_rejected() {
        let dir = TempDir::new().unwrap();
        let ini = write_file(dir.path(), "bad.ini", "[weights]\ntechnical = 0.9\n");
        assert!(matches!(
            cli::load_engine(Some(&ini), None),
            Err(TradegateError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn bad_signal_rule_points_at_the_error() {
        let dir = TempDir::new().unwrap();
        let ini = write_file(dir.path(), "rules.ini", "[signals]\nbuy = ABOVE(composite 60)\n");
        let err = run_args(&["tradegate", "-c", ini.to_str().unwrap(), "validate"]).unwrap_err();
        assert!(matches!(err, TradegateError::ConfigInvalid { .. }));
        let shown = err.to_string();
        assert!(shown.contains("ABOVE(composite 60)\n"), "{}", shown);
        assert!(shown.contains('^'), "{}", shown);
    }

    #[test]
    fn missing_file_is_config_parse_error() {
        assert!(matches!(
            cli::load_engine(Some(Path::new("/nonexistent/tradegate.ini")), None),
            Err(TradegateError::ConfigParse { .. })
        ));
    }
}

mod argument_handling {
    use super::*;

    #[test]
    fn sell_needs_exactly_one_quantity() {
        assert_eq!(cli::sell_quantity(Some(10), None, false).unwrap(), SellQuantity::Shares(10));
        assert_eq!(cli::sell_quantity(None, None, true).unwrap(), SellQuantity::All);
        assert!(cli::sell_quantity(None, None, false).is_err());
        assert!(cli::sell_quantity(Some(10), Some(500.0), false).is_err());
    }

    #[test]
    fn close_needs_symbol_or_id() {
        assert_eq!(
            cli::close_target(Some("PTT"), None).unwrap(),
            CloseTarget::Symbol("PTT".to_string())
        );
        assert_eq!(cli::close_target(None, Some(3)).unwrap(), CloseTarget::Id(3));
        assert!(cli::close_target(None, None).is_err());
        assert!(cli::close_target(Some("PTT"), Some(3)).is_err());
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["tradegate", "winrate", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn bad_context_json_is_input_error() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("book.db");
        let err = run_args(&with_store(
            &store,
            &["buy", "PTT", "5000", "--price", "35.5", "--context", "{not json"],
        ))
        .unwrap_err();
        assert!(matches!(err, TradegateError::Input { .. }));
    }
}

mod store_commands {
    use super::*;

    #[test]
    fn buy_then_status_in_text_and_json() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("book.db");

        let out = run_args(&with_store(
            &store,
            &[
                "buy", "ptt", "5000", "--price", "35.5", "--strategy", "breakout", "--context",
                r#"{"composite": 72.5}"#,
            ],
        ))
        .unwrap();
        assert!(out.starts_with("Bought 140 PTT shares at 35.50"), "{}", out);
        assert!(out.contains("cash 95030.00"), "{}", out);

        let out = run_args(&with_store(&store, &["--json", "status"])).unwrap();
        let status: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(status["valuation"]["cash"].as_f64(), Some(95_030.0));
        assert_eq!(status["open_entries"][0]["strategy"], "breakout");
        assert_eq!(status["open_entries"][0]["signal_context"]["composite"], 72.5);
    }

    #[test]
    fn sell_close_and_stats() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("book.db");
        run_args(&with_store(&store, &["buy", "PTT", "5000", "--price", "35.5"])).unwrap();
        let out = run_args(&with_store(&store, &["sell", "PTT", "--price", "36", "--shares", "83"]))
            .unwrap();
        assert!(out.contains("journal #1"), "{}", out);
        assert!(out.contains("holding 57 at avg 35.50"), "{}", out);

        let out = run_args(&with_store(
            &store,
            &["close", "PTT", "--price", "38", "--lessons", "took profit early"],
        ))
        .unwrap();
        assert!(out.contains("WIN"), "{}", out);
        assert!(out.contains("pnl +184.00"), "{}", out);
        assert!(out.contains("lessons: took profit early"), "{}", out);

        let err = run_args(&with_store(&store, &["close", "PTT", "--price", "38"])).unwrap_err();
        assert!(matches!(err, TradegateError::NotFound { .. }));

        let out = run_args(&with_store(&store, &["--json", "winrate"])).unwrap();
        let stats: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(stats["total_trades"], 1);
        assert_eq!(stats["profit_factor"], "inf");

        let out = run_args(&with_store(&store, &["history", "--limit", "5"])).unwrap();
        assert_eq!(out.lines().filter(|l| l.starts_with('#')).count(), 1);
    }

    #[test]
    fn selling_everything_settles_the_entry() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("book.db");
        run_args(&with_store(&store, &["buy", "PTT", "5000", "--price", "35.5"])).unwrap();
        let out = run_args(&with_store(&store, &["sell", "PTT", "--price", "38", "--all"])).unwrap();
        assert!(out.contains("position closed"), "{}", out);
        assert!(out.contains("CLOSED exit 38.00 pnl +350.00"), "{}", out);

        let err = run_args(&with_store(&store, &["close", "--id", "1", "--price", "38"])).unwrap_err();
        assert!(matches!(err, TradegateError::NotFound { .. }));
    }

    #[test]
    fn check_buy_and_report_with_quotes() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("book.db");
        let quotes = write_file(dir.path(), "quotes.csv", QUOTES);
        let quotes = quotes.to_str().unwrap();
        run_args(&with_store(&store, &["buy", "PTT", "14000", "--price", "35"])).unwrap();

        let out = run_args(&with_store(
            &store,
            &["--json", "check-buy", "PTT", "3000", "--quotes", quotes],
        ))
        .unwrap();
        let verdict: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(verdict["status"], "REDUCED");
        assert!((verdict["adjusted_amount"].as_f64().unwrap() - 1_000.0).abs() < 1e-6);

        let out = run_args(&with_store(&store, &["report", "--quotes", quotes])).unwrap();
        assert!(out.contains("sector Energy"), "{}", out);

        let out = run_args(&with_store(&store, &["snapshot", "--quotes", quotes])).unwrap();
        assert!(out.starts_with("Snapshot "), "{}", out);
    }

    #[test]
    fn lessons_on_unknown_entry_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("book.db");
        let err = run_args(&with_store(&store, &["lessons", "7", "never traded"])).unwrap_err();
        assert!(matches!(err, TradegateError::NotFound { .. }));
    }
}

mod market_commands {
    use super::*;

    #[test]
    fn score_classifies_from_csv() {
        let dir = TempDir::new().unwrap();
        let obs = write_file(dir.path(), "obs.csv", OBSERVATIONS);
        let out = run_args(&[
            "tradegate",
            "--json",
            "score",
            "ptt",
            "--observations",
            obs.to_str().unwrap(),
        ])
        .unwrap();
        let evaluations: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(evaluations.as_array().unwrap().len(), 1);
        assert_eq!(evaluations[0]["symbol"], "PTT");
        assert_eq!(evaluations[0]["signal"]["action"], "BUY");
    }

    #[test]
    fn fscore_from_statements() {
        let dir = TempDir::new().unwrap();
        let st = write_file(dir.path(), "st.csv", STATEMENTS);
        let out = run_args(&["tradegate", "fscore", "PTT", "--statements", st.to_str().unwrap()]).unwrap();
        assert!(out.starts_with("PTT grade "), "{}", out);
        assert!(out.contains("F-Score"), "{}", out);
    }

    #[test]
    fn plan_over_csv_inputs() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("book.db");
        let obs = write_file(dir.path(), "obs.csv", OBSERVATIONS);
        let quotes = write_file(dir.path(), "quotes.csv", QUOTES);
        let out = run_args(&with_store(
            &store,
            &[
                "--json",
                "plan",
                "--observations",
                obs.to_str().unwrap(),
                "--quotes",
                quotes.to_str().unwrap(),
            ],
        ))
        .unwrap();
        let plan: Value = serde_json::from_str(&out).unwrap();
        let items = plan["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        let ptt = items.iter().find(|i| i["symbol"] == "PTT").unwrap();
        assert_eq!(ptt["step"]["step"], "order");
        assert_eq!(ptt["step"]["shares"], 285);
        let aot = items.iter().find(|i| i["symbol"] == "AOT").unwrap();
        assert_eq!(aot["step"]["step"], "signal");
    }

    #[test]
    fn plan_without_observations_fails() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("book.db");
        let err = run_args(&with_store(&store, &["plan"])).unwrap_err();
        assert!(matches!(err, TradegateError::Input { .. }));
    }

    #[test]
    fn validate_lists_rules() {
        let out = run_args(&["tradegate", "validate"]).unwrap();
        assert!(out.contains("BUY"), "{}", out);
        assert!(out.trim_end().ends_with("Configuration is valid."), "{}", out);
    }
}
