mod common;

use std::fs;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use whaleflow::analysis::{align, correlate, AlignedPoint, CorrelationMethod};
use whaleflow::models::{PriceSource, TransferKind, ValuedTransfer, WhaleTransactionSet, NATIVE_ASSET_ID};
use whaleflow::storage::{
    read_whale_transactions, write_aligned_series, write_correlation_report,
    write_metrics_snapshot, write_whale_transactions,
};

fn transfer(signature: &str, kind: TransferKind, usd: i64, day: u32) -> ValuedTransfer {
    let timestamp = Utc.with_ymd_and_hms(2024, 3, day, 8, 30, 0).unwrap();
    let (asset_id, asset_symbol) = match kind {
        TransferKind::Native => (NATIVE_ASSET_ID.to_string(), None),
        TransferKind::Token => ("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(), Some("USDC".to_string())),
    };
    ValuedTransfer {
        wallet: "WalletA".into(),
        kind,
        amount: Decimal::from(usd),
        usd_value: Decimal::from(usd),
        from: "WalletA".into(),
        to: "WalletB".into(),
        timestamp,
        date: timestamp.date_naive(),
        signature: signature.into(),
        asset_id,
        asset_symbol,
        price_source: PriceSource::Stablecoin,
    }
}

#[test]
fn test_whale_csv_columns_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let set = WhaleTransactionSet::from_discovered(vec![
        transfer("sig-native", TransferKind::Native, 200, 1),
        transfer("sig-token", TransferKind::Token, 900, 2),
    ]);

    let path = write_whale_transactions(&dir.path().join("processed"), &set).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "wallet,type,amount,usd_value,from,to,timestamp,date,signature,token_address,token_symbol"
    );
    assert_eq!(
        lines.next().unwrap(),
        "WalletA,token,900,900,WalletA,WalletB,2024-03-02T08:30:00Z,2024-03-02,sig-token,EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v,USDC"
    );

    let rows = read_whale_transactions(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].kind, TransferKind::Native);
    assert_eq!(rows[1].token_address, "SOL");
    assert_eq!(rows[1].token_symbol, "");
    assert_eq!(rows[1].timestamp(), Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()));
}

#[test]
fn test_aligned_outputs_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let processed = dir.path().join("processed");
    let results = dir.path().join("results");

    let index = common::price_index(&[("2024-03-01", 100), ("2024-03-02", 120), ("2024-03-03", 90)]);
    let set = WhaleTransactionSet::from_discovered(vec![
        transfer("s1", TransferKind::Native, 1_000, 1),
        transfer("s2", TransferKind::Native, 500, 1),
        transfer("s3", TransferKind::Token, 4_000, 2),
        transfer("s4", TransferKind::Token, 700, 3),
    ]);

    let aligned = align(index.points(), &set.daily_volume());
    assert_eq!(
        aligned[0],
        AlignedPoint {
            date: common::date("2024-03-01"),
            price: Decimal::from(100),
            usd_value: Decimal::from(1_500),
        }
    );

    let outputs = write_aligned_series(&processed, &results, &aligned).unwrap();
    let merged = fs::read_to_string(&outputs.merged).unwrap();
    assert_eq!(
        merged,
        "date,price,usd_value\n2024-03-01,100,1500\n2024-03-02,120,4000\n2024-03-03,90,700\n"
    );
    assert_eq!(
        fs::read_to_string(&outputs.whale).unwrap().lines().next(),
        Some("date,usd_value")
    );

    let r = correlate(&aligned, CorrelationMethod::Pearson).unwrap();
    let report = write_correlation_report(&results, CorrelationMethod::Pearson, r).unwrap();
    let text = fs::read_to_string(report).unwrap();
    assert!(text.starts_with("Pearson correlation between price and whale volume: 0."));
    assert!(text.ends_with('\n'));
}

#[test]
fn test_metrics_snapshot_refreshed_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results");

    let early = "# TYPE whaleflow_whale_transfers_total counter\nwhaleflow_whale_transfers_total 2\n";
    let path = write_metrics_snapshot(&results, early).unwrap();
    assert_eq!(path, results.join("metrics.prom"));
    assert_eq!(fs::read_to_string(&path).unwrap(), early);

    let late = format!("{early}# TYPE whaleflow_aligned_days gauge\nwhaleflow_aligned_days 1\n");
    write_metrics_snapshot(&results, &late).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), late);
}
