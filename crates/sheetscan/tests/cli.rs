#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::prelude::*;
use sheetscan::core::{GrayImage, MmRect, RasterParams};
use sheetscan::recognize::{AnswerBox, Checkbox, QObject, Question, Questionnaire};
use sheetscan::scan::ScanConfig;
use sheetscan::{SurveyDefinition, SurveyLayout};
use std::path::Path;

const PX_PER_MM: f64 = 2.0;
const DPI: f64 = PX_PER_MM * 25.4;
const SURVEY_ID: u32 = 1234;

fn fill(img: &mut GrayImage, r: MmRect) {
    img.fill_rect(
        r.x * PX_PER_MM,
        r.y * PX_PER_MM,
        (r.x + r.width) * PX_PER_MM,
        (r.y + r.height) * PX_PER_MM,
        0,
    );
}

fn print_code(img: &mut GrayImage, layout: &SurveyLayout, x: f64, y: f64, value: u32) {
    let d = &layout.defs;
    for i in 0..d.codebox_length {
        if value >> (d.codebox_length - 1 - i) & 1 == 1 {
            let cx = x + i as f64 * d.codebox_step;
            fill(img, MmRect::new(cx, y, d.codebox_step, d.codebox_height));
        }
    }
}

fn draw_page(layout: &SurveyLayout, page_number: u32) -> GrayImage {
    let mut img = GrayImage::white(
        (layout.paper_width * PX_PER_MM) as usize,
        (layout.paper_height * PX_PER_MM) as usize,
    );
    let d = &layout.defs;
    let (w, h) = layout.corner_mark_extent();
    for (cx, cy) in [
        (d.corner_mark_left, d.corner_mark_top),
        (d.corner_mark_left + w, d.corner_mark_top),
        (d.corner_mark_left, d.corner_mark_top + h),
        (d.corner_mark_left + w, d.corner_mark_top + h),
    ] {
        fill(&mut img, MmRect::new(cx - 1.5, cy - 1.5, 3.0, 3.0));
    }
    let pattern = d.corner_boxes[page_number as usize - 1];
    for (on, rect) in pattern
        .0
        .iter()
        .zip(sheetscan::recognize::corner_box_rects(layout))
    {
        if *on {
            fill(&mut img, rect);
        }
    }
    if layout.page_carries_codes(page_number) {
        let pos = layout.survey_id_pos;
        print_code(&mut img, layout, pos.first_x, pos.y, SURVEY_ID >> 16);
        print_code(&mut img, layout, pos.second_x, pos.y, SURVEY_ID & 0xffff);
        let q = layout.questionnaire_id_pos;
        print_code(&mut img, layout, q.x, q.y, 3);
    }
    img
}

fn save_png(img: &GrayImage, path: &Path) {
    let luma = image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
        .expect("buffer size");
    luma.save(path).expect("save png");
}

fn write_fixture(dir: &Path) -> std::path::PathBuf {
    let layout = SurveyLayout::a4(SURVEY_ID, 1);
    let mut ticked = draw_page(&layout, 1);
    fill(&mut ticked, MmRect::new(41.0, 61.0, 1.5, 1.5));
    save_png(&ticked, &dir.join("sheet1.png"));
    save_png(&GrayImage::white(420, 594), &dir.join("blank.png"));

    let config = ScanConfig {
        survey: SurveyDefinition {
            layout,
            questionnaire: Questionnaire {
                title: "Feedback".to_string(),
                qobjects: vec![QObject::Question(Question {
                    id: "1".to_string(),
                    title: "Attended?".to_string(),
                    boxes: vec![AnswerBox::Checkbox(Checkbox::new(
                        "yes",
                        1,
                        MmRect::new(40.0, 60.0, 3.5, 3.5),
                    ))],
                })],
            },
        },
        raster: RasterParams::default(),
        dpi: DPI,
        sheets: vec![vec!["sheet1.png".to_string()], vec!["blank.png".to_string()]],
        output_path: Some("out.json".to_string()),
    };
    let path = dir.join("scan.json");
    config.write_json(&path).expect("write config");
    path
}

#[test]
fn cli_writes_report_for_every_sheet() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixture(dir.path());

    Command::cargo_bin("sheetscan")
        .expect("binary")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("recognized 1/2 sheets"));

    let raw = std::fs::read_to_string(dir.path().join("out.json")).expect("report");
    let report: serde_json::Value = serde_json::from_str(&raw).expect("json");
    let sheets = report["sheets"].as_array().expect("sheets");
    assert_eq!(sheets.len(), 2);

    assert_eq!(sheets[0]["valid"], true);
    assert_eq!(sheets[0]["survey_id"], SURVEY_ID);
    assert_eq!(sheets[0]["questionnaire_id"], 3);
    assert_eq!(sheets[0]["boxes"][0]["data"]["state"], true);

    assert_eq!(sheets[1]["valid"], false);
    assert!(sheets[1]["failure"].is_object());
}

#[test]
fn cli_output_flag_overrides_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixture(dir.path());
    let output = dir.path().join("custom.json");

    Command::cargo_bin("sheetscan")
        .expect("binary")
        .args(["--log-level", "warn", "--config"])
        .arg(&config)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    assert!(output.exists());
    assert!(!dir.path().join("out.json").exists());
}

#[test]
fn cli_fails_on_missing_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    Command::cargo_bin("sheetscan")
        .expect("binary")
        .arg("--config")
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure();
}

#[test]
fn cli_rejects_invalid_layout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixture(dir.path());
    let mut json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&config).expect("read")).expect("json");
    json["layout"]["page_count"] = 0.into();
    std::fs::write(&config, json.to_string()).expect("write");

    Command::cargo_bin("sheetscan")
        .expect("binary")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("page"));
}
