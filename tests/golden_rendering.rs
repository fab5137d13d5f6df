use std::fs;
use std::path::PathBuf;

use cardshot::export::plan_card;
use cardshot::rendering::split_cards;
use cardshot::software::{SoftwareRasterizer, SoftwareTarget};
use cardshot::{ExportConfig, Exporter, SplitMode, SplitPosition, SplitSettings};

fn golden_path(name: &str) -> PathBuf {
    let mut p = PathBuf::from("tests/goldens/expected");
    p.push(name);
    p
}

fn fixture_cards() -> Vec<String> {
    let note = fs::read_to_string("tests/goldens/pages/note.html").expect("read fixture");
    split_cards(&note)
}

#[test]
fn fixture_splits_into_three_cards() {
    let cards = fixture_cards();
    assert_eq!(cards.len(), 3);
    assert!(cards[1].starts_with("<h2>Systems</h2>"));
    assert!(cards[2].starts_with("<h2>Writing</h2>"));
}

fn rule_config() -> ExportConfig {
    ExportConfig {
        scale: 1.0,
        settle_delay_ms: 0,
        split: SplitSettings {
            mode: SplitMode::HorizontalRule,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn golden_plan_matches_fixture() {
    let cards = fixture_cards();
    let config = rule_config();
    let target = SoftwareTarget::from_html(&cards[1], &config).expect("layout");
    let plan = plan_card(&target, &config).expect("plan");

    let expected_path = golden_path("note-card-2.plan.json");
    if std::env::var("UPDATE_GOLDENS").is_ok() {
        fs::write(&expected_path, serde_json::to_string_pretty(&plan).expect("encode plan")).expect("write golden");
        println!("Updated golden: {:?}", expected_path);
        return;
    }

    let exp = fs::read_to_string(&expected_path).expect("unable to read golden");
    let expected: Vec<SplitPosition> = serde_json::from_str(&exp).expect("golden is a plan");
    assert_eq!(plan, expected);
}

#[tokio::test]
async fn golden_slices_match_fixture() {
    let cards = fixture_cards();
    let config = rule_config();
    let exporter = Exporter::new(config).expect("valid config");
    let mut target = SoftwareTarget::from_html(&cards[1], exporter.config()).expect("layout");
    let artifact = exporter
        .export(&mut target, &SoftwareRasterizer, "note-card-2")
        .await
        .expect("export");

    // two rules, three slices
    assert_eq!(
        artifact.entries(),
        vec!["note-card-2_1.png", "note-card-2_2.png", "note-card-2_3.png"]
    );

    // Digest the archive so the golden covers slice bytes and entry order
    let digest = artifact.sha256_hex();
    let expected_path = golden_path("note-card-2.sha256");
    if std::env::var("UPDATE_GOLDENS").is_ok() {
        fs::create_dir_all("tests/goldens/expected").ok();
        fs::write(&expected_path, &digest).expect("write golden");
        println!("Updated golden: {:?}", expected_path);
        return;
    }

    if !expected_path.exists() {
        println!(
            "No golden at {:?}; run with UPDATE_GOLDENS=1 to create it. Skipping.",
            expected_path
        );
        return;
    }

    let exp = fs::read_to_string(&expected_path).expect("unable to read golden");
    assert_eq!(digest, exp.trim());
}
