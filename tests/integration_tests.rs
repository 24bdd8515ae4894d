use cherrypick::core::Pipeline;
use cherrypick::utils::error::PickError;
use cherrypick::{CherryPickPipeline, LocalStorage, PickEngine, TomlConfig};
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;

/// 產生 16x24 的目標盤 CSV；`cells` 為 (孔位, 儲存格內容)
fn layout_384(corner: &str, cells: &[(&str, &str)]) -> String {
    let cells: HashMap<&str, &str> = cells.iter().copied().collect();
    let mut out = String::from(corner);
    for column in 1..=24 {
        out.push_str(&format!(",{}", column));
    }
    out.push('\n');
    for row in 0..16u8 {
        let label = (b'A' + row) as char;
        out.push(label);
        for column in 1..=24 {
            let well = format!("{}{}", label, column);
            let cell = cells.get(well.as_str()).copied().unwrap_or("");
            if cell.contains(',') {
                out.push_str(&format!(",\"{}\"", cell));
            } else {
                out.push_str(&format!(",{}", cell));
            }
        }
        out.push('\n');
    }
    out
}

fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read_lines(dir: &Path, relative: &str) -> Vec<String> {
    std::fs::read_to_string(dir.join(relative))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn engine_for(dir: &TempDir, config: TomlConfig) -> PickEngine<CherryPickPipeline<LocalStorage>> {
    let storage = LocalStorage::new(dir.path().to_string_lossy().into_owned());
    let pipeline = CherryPickPipeline::new(storage, config).unwrap();
    PickEngine::new(pipeline)
}

const SINGLE_WELL_CONFIG: &str = r#"
[[building_blocks]]
id = "I"
dispense_volume_ul = 5

[source]
mode = "explicit"

[[source.plates]]
id = "Source1"
wells = [{ well = "A1", block = "I", volume_ul = 50 }]

[output]
output_path = "out"
"#;

#[tokio::test]
async fn test_three_draws_from_one_source_well() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "target_plate_layouts/Synthesis1.csv",
        &layout_384("", &[("B1", "I"), ("B2", "I"), ("B3", "I")]),
    );
    let config = TomlConfig::from_toml_str(SINGLE_WELL_CONFIG).unwrap();
    config.validate_config().unwrap();

    let output = engine_for(&dir, config).run().await.unwrap();
    assert_eq!(output, "out");

    let lines = read_lines(dir.path(), "out/step1.csv");
    assert_eq!(
        lines,
        vec![
            "Source Barcode,Source Well,Destination Barcode,Destination Well,Volume",
            "Source1,A1,Synthesis1,B1,5",
            "Source1,A1,Synthesis1,B2,5",
            "Source1,A1,Synthesis1,B3,5",
        ]
    );

    let report: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("out/report.json")).unwrap()).unwrap();
    assert_eq!(report["source_usage"][0]["remaining"], 35_000);
    assert_eq!(report["source_usage"][0]["withdrawn"], 15_000);
}

#[tokio::test]
async fn test_eleventh_request_exhausts_stock_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let wells: Vec<String> = (1..=11).map(|c| format!("B{}", c)).collect();
    let cells: Vec<(&str, &str)> = wells.iter().map(|w| (w.as_str(), "I")).collect();
    write(dir.path(), "target_plate_layouts/Synthesis1.csv", &layout_384("", &cells));
    let config = TomlConfig::from_toml_str(SINGLE_WELL_CONFIG).unwrap();

    let err = engine_for(&dir, config).run().await.unwrap_err();

    match &err {
        PickError::BlockNotFoundError { block, destination, .. } => {
            assert_eq!(block.as_str(), "I");
            assert_eq!(destination.as_deref(), Some("Synthesis1:B11"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("Synthesis1:B11"));
    assert!(!dir.path().join("out").exists());
}

#[tokio::test]
async fn test_default_run_over_multiple_layouts() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "target_plate_layouts/batch_a/first.csv",
        &layout_384("Synthesis1", &[("A1", "I1, M1, T1"), ("A2", "I2, M1, T2"), ("P24", "I1")]),
    );
    write(
        dir.path(),
        "target_plate_layouts/batch_b/second.csv",
        &layout_384("", &[("C3", "I10, M2, T1")]),
    );
    let config = TomlConfig::from_toml_str("[output]\noutput_path = \"results\"\n").unwrap();

    engine_for(&dir, config).run().await.unwrap();

    let step1 = read_lines(dir.path(), "results/step1.csv");
    let step2 = read_lines(dir.path(), "results/step2.csv");
    assert_eq!(step1.len(), 1 + 7);
    assert_eq!(step2.len(), 1 + 3);
    assert!(step1.iter().skip(1).all(|l| l.ends_with(",1")));
    assert!(step1.iter().any(|l| l.contains(",second,C3,")));

    // 單一來源盤，I/M/T 各佔一個區帶
    let source = read_lines(dir.path(), "results/source_Source1.csv");
    assert_eq!(source.len(), 17);
    assert_eq!(source[1].split(',').take(4).collect::<Vec<_>>(), vec!["A", "I1", "I2", "I10"]);
    assert!(source[6].starts_with("F,M1,M2,"));
    assert!(source[11].starts_with("K,T1,T2,"));
    assert!(!dir.path().join("results/source_Source2.csv").exists());
}

#[tokio::test]
async fn test_repeated_runs_produce_identical_files() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "target_plate_layouts/Synthesis1.csv",
        &layout_384("", &[("A1", "I1, M3"), ("B1", "I2, M3, T4"), ("H12", "M3")]),
    );

    let mut outputs = Vec::new();
    for run in ["run1", "run2"] {
        let config = TomlConfig::from_toml_str(&format!("[output]\noutput_path = \"{}\"\n", run)).unwrap();
        engine_for(&dir, config).run().await.unwrap();
        outputs.push((
            std::fs::read(dir.path().join(run).join("step1.csv")).unwrap(),
            std::fs::read(dir.path().join(run).join("step2.csv")).unwrap(),
        ));
    }

    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn test_dry_run_plan_writes_nothing() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "target_plate_layouts/Synthesis1.csv",
        &layout_384("", &[("A1", "I1")]),
    );
    let config = TomlConfig::from_toml_str("[output]\noutput_path = \"out\"\n").unwrap();

    let result = engine_for(&dir, config).plan().await.unwrap();

    assert_eq!(result.plan.len(), 1);
    assert_eq!(result.destination_plates, vec!["Synthesis1"]);
    assert!(!dir.path().join("out").exists());
}

#[tokio::test]
async fn test_unknown_block_in_layout_is_rejected() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "target_plate_layouts/Synthesis1.csv",
        &layout_384("", &[("D4", "I1, Z9")]),
    );
    let storage = LocalStorage::new(dir.path().to_string_lossy().into_owned());
    let pipeline = CherryPickPipeline::new(storage, TomlConfig::default()).unwrap();

    let err = pipeline.extract().await.unwrap_err();

    match err {
        PickError::UnknownBuildingBlockError { block, plate, well } => {
            assert_eq!(block, "Z9");
            assert_eq!(plate, "Synthesis1");
            assert_eq!(well, "D4");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_layout_directory() {
    let dir = TempDir::new().unwrap();
    let err = engine_for(&dir, TomlConfig::default()).run().await.unwrap_err();
    assert!(matches!(err, PickError::NoLayoutsError { .. }));
}

#[tokio::test]
async fn test_nanoliter_output_and_ungrouped_order() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "target_plate_layouts/Synthesis1.csv",
        &layout_384("", &[("A1", "M1"), ("A2", "I1"), ("A3", "M1")]),
    );
    let config = TomlConfig::from_toml_str(
        r#"
[output]
output_path = "out"
volume_unit = "nl"
group_by_source_plate = false
write_report = false
"#,
    )
    .unwrap();

    engine_for(&dir, config).run().await.unwrap();

    let lines = read_lines(dir.path(), "out/step1.csv");
    let destinations: Vec<&str> = lines.iter().skip(1).map(|l| l.split(',').nth(3).unwrap()).collect();
    assert_eq!(destinations, vec!["A1", "A2", "A3"]);
    assert!(lines.iter().skip(1).all(|l| l.ends_with(",1000")));
    assert!(!dir.path().join("out/report.json").exists());
}

#[tokio::test]
async fn test_configured_well_capacity_rejects_overfilled_destination() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "target_plate_layouts/Synthesis1.csv",
        &layout_384("", &[("A1", "I1, M1"), ("B2", "I1, M1, T1")]),
    );

    // 預設不檢查容量
    let unchecked = TomlConfig::from_toml_str("[output]\noutput_path = \"open\"\n").unwrap();
    engine_for(&dir, unchecked).run().await.unwrap();

    let config = TomlConfig::from_toml_str(
        "[target]\nwell_capacity_ul = 2\n\n[output]\noutput_path = \"capped\"\n",
    )
    .unwrap();
    let err = engine_for(&dir, config).run().await.unwrap_err();

    assert!(matches!(err, PickError::DestinationOverflowError { .. }));
    assert!(err.to_string().contains("B2"));
    assert!(!dir.path().join("capped").exists());
}
