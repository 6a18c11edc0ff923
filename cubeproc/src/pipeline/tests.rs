use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use common::float_ext::FloatExt;
use common::log_setup::init_test_tracing;
use strum::IntoEnumIterator;

use super::*;
use crate::cube::{ImageCube, KELVIN};
use crate::noise::NoiseMethod;
use crate::testing::engine::RecordingEngine;
use crate::testing::{cube_header, noise_cube};

const SHAPE: (usize, usize, usize) = (12, 12, 4);
const IMAGED: [&str; 4] = ["ngc1", "ngc2", "m1a", "m1b"];
const WITH_SINGLE_DISH: [&str; 3] = ["ngc1", "m1a", "m1b"];

/// Two single targets, a two-part mosaic `m1`, one line and one continuum
/// product, two interferometric configurations and one feathered one.
/// Only the 12m configuration has imaging; `ngc2` has no single-dish data.
fn catalog() -> StaticCatalog {
    let mut catalog = StaticCatalog {
        targets: ["ngc1", "ngc2", "m1a", "m1b", "m1"].map(String::from).to_vec(),
        mosaics: BTreeMap::from([("m1".to_string(), vec!["m1a".to_string(), "m1b".to_string()])]),
        line_products: vec!["co21".to_string()],
        cont_products: vec!["cont".to_string()],
        interf_configs: vec!["12m".to_string(), "7m".to_string()],
        imaging_root: PathBuf::from("img"),
        postprocess_root: PathBuf::from("pp"),
        ..StaticCatalog::default()
    }
    .with_feather("12m+tp", "12m");
    for target in IMAGED {
        catalog = catalog.with_imaging(target, "12m", "co21");
    }
    for target in WITH_SINGLE_DISH {
        catalog = catalog.with_single_dish(target, "co21", format!("sd/{target}_co21.fits"));
    }
    catalog
}

fn full_config() -> PipelineConfig {
    PipelineConfig {
        interf_configs: ListFilter::only(["12m"]),
        no_cont: true,
        stages: StageToggles::all(),
        ..PipelineConfig::default()
    }
}

/// Raw imaging and single-dish files for every imaged target.
fn populated_engine(catalog: &StaticCatalog) -> RecordingEngine {
    let engine = RecordingEngine::new();
    let (nx, ny, nchan) = SHAPE;
    for (seed, target) in IMAGED.into_iter().enumerate() {
        engine.insert(
            catalog.imaging_path(target, "12m", "co21", Artifact::Original),
            noise_cube("orig", SHAPE, 1.0, 100 + seed as u64),
        );
        engine.insert(
            catalog.imaging_path(target, "12m", "co21", Artifact::PrimaryBeam),
            ImageCube::filled(cube_header("pb", nx, ny, nchan), 0.8),
        );
    }
    for target in WITH_SINGLE_DISH {
        let header = cube_header("sd", nx, ny, nchan).with_brightness_unit(KELVIN);
        engine.insert(
            format!("sd/{target}_co21.fits"),
            ImageCube::filled(header, 0.05),
        );
    }
    engine
}

fn triple_stages(report: &RunReport) -> Vec<(String, Stage)> {
    report
        .items
        .iter()
        .map(|item| (item.triple.to_string(), item.stage))
        .collect()
}

// ---------------------------------------------------------------------------
// Stages and applicability
// ---------------------------------------------------------------------------

#[test]
fn test_stage_names_and_order() {
    let names: Vec<&str> = Stage::iter().map(Stage::name).collect();
    assert_eq!(
        names,
        vec![
            "stage",
            "pbcorr",
            "round",
            "sd-prep",
            "weight",
            "mosaic-convolve",
            "mosaic-align",
            "mosaic-combine",
            "feather",
            "compress",
            "convert",
            "export",
        ]
    );
    assert_eq!("mosaic-combine".parse::<Stage>().unwrap(), Stage::MosaicCombine);
    assert!(Stage::Round < Stage::Feather);
    assert!(Stage::MosaicAlign.is_mosaic_stage());
    assert!(!Stage::Compress.is_mosaic_stage());
}

#[test]
fn test_feather_gate_holds_for_every_combination() {
    for has_imaging in [false, true] {
        for config_type in [ConfigType::Interferometric, ConfigType::Feathered] {
            let gates = Gates {
                has_imaging,
                has_single_dish: false,
                is_mosaic: false,
                config_type,
            };
            assert!(!Stage::Feather.applies_to(&gates));
            if config_type == ConfigType::Feathered {
                assert!(!gates.passes_feather_gate());
                for stage in Stage::iter() {
                    assert!(!stage.applies_to(&gates), "{stage} ran for {gates:?}");
                }
            }
        }
    }

    // Same property through the planner: ngc2 has no single-dish data and is
    // not a mosaic, whatever the product.
    let config = PipelineConfig {
        stages: StageToggles::all(),
        ..PipelineConfig::default()
    };
    let plan = plan(&config, &catalog()).unwrap();
    for product in ["co21", "cont"] {
        assert!(plan.stages_for("ngc2", product, "12m+tp").is_empty());
        for config in ["12m", "7m"] {
            assert!(!plan.stages_for("ngc2", product, config).contains(&Stage::Feather));
        }
    }
}

#[test]
fn test_applicability_table() {
    let gates = |has_imaging, has_single_dish, is_mosaic, config_type| Gates {
        has_imaging,
        has_single_dish,
        is_mosaic,
        config_type,
    };
    let applicable = |gates: Gates| -> Vec<Stage> {
        Stage::iter().filter(|stage| stage.applies_to(&gates)).collect()
    };
    use ConfigType::{Feathered, Interferometric};

    let tail = [Stage::Compress, Stage::Convert, Stage::Export];
    let single = [Stage::Stage, Stage::Pbcorr, Stage::Round];
    assert_eq!(
        applicable(gates(true, false, false, Interferometric)),
        [&single[..], &tail[..]].concat()
    );
    assert_eq!(
        applicable(gates(true, true, false, Interferometric)),
        [&single[..], &[Stage::SdPrep][..], &tail[..]].concat()
    );
    assert_eq!(
        applicable(gates(true, true, false, Feathered)),
        [&[Stage::Feather][..], &tail[..]].concat()
    );
    let mosaic = [
        &[
            Stage::Weight,
            Stage::MosaicConvolve,
            Stage::MosaicAlign,
            Stage::MosaicCombine,
        ][..],
        &tail[..],
    ]
    .concat();
    assert_eq!(applicable(gates(false, false, true, Interferometric)), mosaic);
    assert_eq!(applicable(gates(false, false, true, Feathered)), mosaic);
    assert!(applicable(gates(false, true, false, Interferometric)).is_empty());
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn test_list_filter() {
    let items: Vec<String> = ["a", "b", "c", "d", "e"].map(String::from).to_vec();

    let range = ListFilter {
        first: Some("b".to_string()),
        last: Some("d".to_string()),
        ..ListFilter::default()
    };
    assert_eq!(range.apply(&items), vec!["b", "c", "d"]);
    assert_eq!(ListFilter::only(["e", "a"]).apply(&items), vec!["a", "e"]);
    assert_eq!(ListFilter::skip(["b", "c"]).apply(&items), vec!["a", "d", "e"]);

    let combined = ListFilter {
        first: Some("b".to_string()),
        skip: vec!["c".to_string()],
        ..ListFilter::default()
    };
    assert_eq!(combined.apply(&items), vec!["b", "d", "e"]);
    assert_eq!(ListFilter::default().apply(&items), items);
    assert!(ListFilter::default().is_empty());

    let err = ListFilter::only(["z"]).check("targets", &items).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownFilterEntry { field: "only", .. }));
    assert!(err.to_string().contains("'z'"));
    // Skipping something absent is harmless.
    assert!(ListFilter::skip(["z"]).check("targets", &items).is_ok());
}

#[test]
fn test_stage_toggles() {
    let all = StageToggles::all();
    assert_eq!(all.enabled().count(), 12);
    assert_eq!(StageToggles::default().enabled().count(), 0);

    let mut some = StageToggles::only(&[Stage::Feather, Stage::Pbcorr]);
    assert_eq!(some.enabled().collect::<Vec<_>>(), vec![Stage::Pbcorr, Stage::Feather]);
    some.set(Stage::Pbcorr, false);
    assert!(!some.is_enabled(Stage::Pbcorr));
    assert!(!some.sd_prep && some.feather);
}

#[test]
fn test_config_from_yaml() {
    let config = PipelineConfig::from_yaml_str(
        r#"
targets:
  only: [ngc1]
line_products:
  skip: [co10]
no_cont: true
stages:
  pbcorr: true
  mosaic_combine: true
dry_run: true
feather_method: apodize
overrides:
  pixel_padding: 3.0
  noise_method: chauvmad
  grid:
    ra_ctr_deg: 150.0
"#,
    )
    .unwrap();

    assert_eq!(config.targets.only, vec!["ngc1"]);
    assert_eq!(config.line_products.skip, vec!["co10"]);
    assert!(config.no_cont && !config.no_line);
    assert_eq!(
        config.stages.enabled().collect::<Vec<_>>(),
        vec![Stage::Pbcorr, Stage::MosaicCombine]
    );
    assert!(config.dry_run);
    assert_eq!(config.feather_method, FeatherMethod::Apodize);
    assert_eq!(config.overrides.pixel_padding, 3.0);
    assert_eq!(config.overrides.noise_method, NoiseMethod::ChauvenetMad);
    assert_eq!(config.overrides.grid.ra_ctr_deg, Some(150.0));
    assert_eq!(config.overrides.grid.dec_ctr_deg, None);
    // Untouched overrides keep their defaults.
    assert!(config.overrides.scale_weights_by_noise);
    assert_eq!(config.overrides.max_axis_pixels, 10_000);
}

#[test]
fn test_config_rejects_bad_overrides() {
    let err = PipelineConfig::from_yaml_str("overrides:\n  pixel_padding: -1.0\n").unwrap_err();
    assert!(err.to_string().contains("pixel_padding"));

    let err = PipelineConfig::from_yaml_str("feather_method: blend\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));

    let err = PipelineConfig::from_file(Path::new("postprocess.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Format { .. }));
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[test]
fn test_feather_configs_keep_declared_order() {
    let catalog = StaticCatalog::from_yaml_str(
        r#"
interf_configs: [12m, 7m]
feather_configs:
  - { feather: 7m+tp, interf: 7m }
  - { feather: 12m+tp, interf: 12m }
"#,
    )
    .unwrap();
    assert_eq!(catalog.feather_configs(), vec!["7m+tp", "12m+tp"]);
    assert_eq!(catalog.interf_config_for_feather("7m+tp").as_deref(), Some("7m"));

    let through_7m = ListFilter {
        last: Some("7m+tp".to_string()),
        ..ListFilter::default()
    };
    assert_eq!(through_7m.apply(&catalog.feather_configs()), vec!["7m+tp"]);
}

#[test]
fn test_artifact_file_names() {
    let name = |artifact| artifact_file_name("ngc1", "12m", "co21", artifact);
    assert_eq!(name(Artifact::Original), "ngc1_12m_co21.image");
    assert_eq!(name(Artifact::PrimaryBeam), "ngc1_12m_co21.pb");
    assert_eq!(name(Artifact::PbcorrRound), "ngc1_12m_co21_pbcorr_round.image");
    assert_eq!(name(Artifact::ImportedSingleDish), "ngc1_12m_co21_singledish_import.image");
    assert_eq!(name(Artifact::PreppedSingleDish), "ngc1_12m_co21_singledish.image");
    assert_eq!(name(Artifact::TrimmedPb), "ngc1_12m_co21_trimmed.pb");
    assert_eq!(name(Artifact::PbcorrTrimmedKFits), "ngc1_12m_co21_pbcorr_trimmed_k.fits");
    assert_eq!(name(Artifact::TrimmedPbFits), "ngc1_12m_co21_trimmed_pb.fits");
}

#[test]
fn test_static_catalog_from_yaml() {
    let catalog = StaticCatalog::from_yaml_str(
        r#"
targets: [ngc1, m1a, m1b, m1]
mosaics:
  m1: [m1a, m1b]
line_products: [co21]
interf_configs: [12m]
feather_configs:
  - { feather: 12m+tp, interf: 12m }
single_dish:
  ngc1:
    co21: sd/ngc1_co21.fits
imaging:
  - { target: ngc1, config: 12m, product: co21 }
imaging_root: /data/imaging
postprocess_root: /data/post
"#,
    )
    .unwrap();

    assert_eq!(catalog.feather_configs(), vec!["12m+tp"]);
    assert_eq!(catalog.interf_config_for_feather("12m+tp").as_deref(), Some("12m"));
    assert_eq!(catalog.interf_config_for_feather("7m+tp"), None);
    assert_eq!(
        catalog.mosaic_parts("m1"),
        Some(vec!["m1a".to_string(), "m1b".to_string()])
    );
    assert_eq!(catalog.mosaic_parts("ngc1"), None);
    assert_eq!(
        catalog.single_dish_file("ngc1", "co21"),
        Some(PathBuf::from("sd/ngc1_co21.fits"))
    );
    assert!(catalog.has_imaging("ngc1", "12m", "co21"));
    assert!(!catalog.has_imaging("m1a", "12m", "co21"));
    assert_eq!(
        catalog.artifact_path("ngc1", "12m", "co21", Artifact::Pbcorr),
        PathBuf::from("/data/post/ngc1/ngc1_12m_co21_pbcorr.image")
    );
    assert_eq!(
        catalog.imaging_path("ngc1", "12m", "co21", Artifact::Original),
        PathBuf::from("/data/imaging/ngc1/ngc1_12m_co21.image")
    );
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

#[test]
fn test_plan_orders_parts_before_mosaics() {
    let plan = plan(&full_config(), &catalog()).unwrap();
    assert_eq!(plan.len(), 53);

    let mosaic_flags: Vec<bool> = plan.iter().map(|(t, _)| t.gates.is_mosaic).collect();
    let first_mosaic = mosaic_flags.iter().position(|&m| m).unwrap();
    assert_eq!(first_mosaic, 53 - 14);
    assert!(mosaic_flags[first_mosaic..].iter().all(|&m| m));

    // Stage-major within each phase.
    let stages: Vec<Stage> = plan.iter().map(|(_, stage)| stage).collect();
    assert!(stages[..first_mosaic].windows(2).all(|w| w[0] <= w[1]));
    assert!(stages[first_mosaic..].windows(2).all(|w| w[0] <= w[1]));

    assert_eq!(
        plan.stages_for("ngc1", "co21", "12m"),
        vec![
            Stage::Stage,
            Stage::Pbcorr,
            Stage::Round,
            Stage::SdPrep,
            Stage::Compress,
            Stage::Convert,
            Stage::Export
        ]
    );
    assert_eq!(
        plan.stages_for("ngc1", "co21", "12m+tp"),
        vec![Stage::Feather, Stage::Compress, Stage::Convert, Stage::Export]
    );
    assert_eq!(plan.stages_for("m1", "co21", "12m+tp")[0], Stage::Weight);
    assert!(plan.stages_for("ngc2", "co21", "12m+tp").is_empty());

    let ngc1_feathered = plan
        .triples
        .iter()
        .find(|p| p.triple.to_string() == "ngc1/co21/12m+tp")
        .unwrap();
    assert_eq!(ngc1_feathered.imaging_config.as_deref(), Some("12m"));
    assert!(ngc1_feathered.gates.has_imaging);
    assert_eq!(
        plan.triples.iter().find(|p| p.triple.target == "m1").unwrap().mosaic_parts,
        vec!["m1a", "m1b"]
    );
}

#[test]
fn test_plan_applies_filters_and_toggles() {
    let catalog = catalog();

    let config = PipelineConfig {
        targets: ListFilter {
            first: Some("ngc2".to_string()),
            last: Some("m1a".to_string()),
            ..ListFilter::default()
        },
        stages: StageToggles::only(&[Stage::Pbcorr, Stage::Feather]),
        ..full_config()
    };
    let plan = plan(&config, &catalog).unwrap();
    let targets: Vec<&str> = plan.triples.iter().map(|p| p.triple.target.as_str()).collect();
    assert_eq!(targets, vec!["ngc2", "m1a", "m1a"]);
    assert!(plan
        .iter()
        .all(|(_, stage)| stage == Stage::Pbcorr || stage == Stage::Feather));

    let config = PipelineConfig {
        mosaic_targets: ListFilter::skip(["m1"]),
        ..full_config()
    };
    let plan_without_mosaic = super::plan(&config, &catalog).unwrap();
    assert!(plan_without_mosaic.triples.iter().all(|p| !p.gates.is_mosaic));
    assert_eq!(plan_without_mosaic.len(), 53 - 14);

    let config = PipelineConfig {
        no_line: true,
        ..full_config()
    };
    assert!(super::plan(&config, &catalog).unwrap().is_empty());

    let config = PipelineConfig {
        feather_configs: ListFilter::only(["7m+tp"]),
        ..full_config()
    };
    let err = super::plan(&config, &catalog).unwrap_err();
    assert!(err.to_string().contains("7m+tp"));
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[test]
fn test_dry_run_makes_no_engine_calls() {
    init_test_tracing("info");
    let catalog = catalog();

    let dry = PipelineConfig {
        dry_run: true,
        ..full_config()
    };
    let dry_engine = populated_engine(&catalog);
    let dry_report = Orchestrator::new(&dry, &catalog, &dry_engine).run().unwrap();
    assert_eq!(dry_engine.total_calls(), 0);
    assert_eq!(dry_report.count(|o| *o == StageOutcome::DryRun), dry_report.items.len());

    let live = full_config();
    let live_engine = populated_engine(&catalog);
    let live_report = Orchestrator::new(&live, &catalog, &live_engine).run().unwrap();
    assert!(live_engine.total_calls() > 0);
    assert_eq!(triple_stages(&dry_report), triple_stages(&live_report));
}

#[test]
fn test_live_run_produces_every_artifact() {
    init_test_tracing("info");
    let catalog = catalog();
    let engine = populated_engine(&catalog);
    let report = Orchestrator::new(&full_config(), &catalog, &engine).run().unwrap();

    assert!(
        report.is_success(),
        "{:?}",
        report.failures().collect::<Vec<_>>()
    );
    assert_eq!(report.count(|o| *o == StageOutcome::Executed), 53);

    assert_eq!(engine.calls("copy_dropdeg"), 8);
    assert_eq!(engine.calls("feather"), 3);
    // Mosaics have no primary beam of their own to export.
    assert_eq!(engine.calls("export_fits"), 16);

    let path = |target: &str, config: &str, artifact| {
        catalog.artifact_path(target, config, "co21", artifact)
    };
    for config in ["12m", "12m+tp"] {
        for part in ["m1a", "m1b"] {
            assert!(engine.contains(&path(part, config, Artifact::Weight)));
            assert!(engine.contains(&path(part, config, Artifact::LinmosAligned)));
        }
        assert!(engine.contains(&path("m1", config, Artifact::PbcorrTrimmedKFits)));
        assert!(!engine.contains(&path("m1", config, Artifact::TrimmedPbFits)));
    }
    assert!(engine.contains(&path("ngc1", "12m+tp", Artifact::TrimmedPbFits)));

    let prepped = engine.get(&path("ngc1", "12m", Artifact::PreppedSingleDish)).unwrap();
    assert_eq!(prepped.header().brightness_unit, "Jy/beam");

    let mosaic = engine.get(&path("m1", "12m", Artifact::PbcorrTrimmedK)).unwrap();
    assert_eq!(mosaic.header().brightness_unit, KELVIN);
    let common = mosaic.header().beam_major_arcsec().unwrap();
    assert!(common.within(13.0f64.sqrt(), 1e-9));

    let weight_sum = engine.get(&path("m1", "12m", Artifact::Weight)).unwrap();
    assert!(weight_sum.data().iter().all(|&w| w > 0.0));
}

#[test]
fn test_single_dish_prep_regrids_from_separate_import() {
    let catalog = catalog();
    let engine = populated_engine(&catalog);
    let report = Orchestrator::new(&full_config(), &catalog, &engine).run().unwrap();
    assert!(report.is_success(), "{:?}", report.failures().collect::<Vec<_>>());

    let regrids = engine.regrids();
    assert!(!regrids.is_empty());
    for (input, output) in &regrids {
        assert_ne!(input, output);
    }

    let imported = catalog.artifact_path("ngc1", "12m", "co21", Artifact::ImportedSingleDish);
    let prepped = catalog.artifact_path("ngc1", "12m", "co21", Artifact::PreppedSingleDish);
    assert!(regrids.contains(&(imported.clone(), prepped.clone())));
    assert!(engine.contains(&imported));
    assert!(engine.contains(&prepped));
}

#[test]
fn test_failure_is_isolated_to_its_triple() {
    let catalog = catalog();
    let mut engine = populated_engine(&catalog);
    engine.fail_writes_to(catalog.artifact_path("m1a", "12m", "co21", Artifact::Pbcorr));

    let report = Orchestrator::new(&full_config(), &catalog, &engine).run().unwrap();

    assert!(matches!(
        report.outcome("m1a", "co21", "12m", Stage::Pbcorr),
        Some(StageOutcome::Failed(message)) if message.contains("Injected failure")
    ));
    for stage in [Stage::Round, Stage::SdPrep, Stage::Export] {
        assert_eq!(
            report.outcome("m1a", "co21", "12m", stage),
            Some(&StageOutcome::SkippedUpstream)
        );
    }
    // The feathered part fails on its own for lack of input.
    assert!(matches!(
        report.outcome("m1a", "co21", "12m+tp", Stage::Feather),
        Some(StageOutcome::Failed(message)) if message.contains("does not exist")
    ));
    // Both mosaics depend on a failed part.
    for config in ["12m", "12m+tp"] {
        assert_eq!(
            report.outcome("m1", "co21", config, Stage::Weight),
            Some(&StageOutcome::SkippedUpstream)
        );
    }
    // Unrelated triples are untouched.
    for (target, config) in [("ngc1", "12m"), ("ngc1", "12m+tp"), ("ngc2", "12m"), ("m1b", "12m+tp")] {
        assert_eq!(
            report.outcome(target, "co21", config, Stage::Export),
            Some(&StageOutcome::Executed)
        );
    }
    assert_eq!(report.failures().count(), 2);
}

#[test]
fn test_missing_input_stops_before_any_transform() {
    let catalog = catalog().with_imaging("ngc2", "7m", "co21");
    let config = PipelineConfig {
        targets: ListFilter::only(["ngc2"]),
        interf_configs: ListFilter::only(["7m"]),
        feather_configs: ListFilter::skip(["12m+tp"]),
        no_cont: true,
        stages: StageToggles::all(),
        ..PipelineConfig::default()
    };
    let engine = RecordingEngine::new();
    let report = Orchestrator::new(&config, &catalog, &engine).run().unwrap();

    let Some(StageOutcome::Failed(message)) = report.outcome("ngc2", "co21", "7m", Stage::Stage)
    else {
        panic!("staging should fail: {report:?}");
    };
    assert!(message.contains("ngc2_7m_co21.image"));
    assert!(message.contains("does not exist"));
    assert_eq!(report.count(|o| *o == StageOutcome::SkippedUpstream), 5);
    assert_eq!(engine.total_calls(), 1);
    assert_eq!(engine.calls("copy_dropdeg"), 0);
}

#[test]
fn test_apodized_feather_uses_interferometric_primary_beam() {
    let catalog = catalog();
    let config = PipelineConfig {
        feather_method: FeatherMethod::Apodize,
        ..full_config()
    };
    let plan = plan(&config, &catalog).unwrap();
    let engine = RecordingEngine::new();
    let orchestrator = Orchestrator::new(&config, &catalog, &engine);

    let planned = plan
        .triples
        .iter()
        .find(|p| p.triple.to_string() == "ngc1/co21/12m+tp")
        .unwrap();
    let action = orchestrator.resolve(planned, Stage::Feather).unwrap();
    let StageAction::Feather {
        interferometer,
        single_dish,
        apodize_with,
        output,
    } = &action
    else {
        panic!("unexpected action {action:?}");
    };
    assert_eq!(interferometer, &PathBuf::from("pp/ngc1/ngc1_12m_co21_pbcorr_round.image"));
    assert_eq!(single_dish, &PathBuf::from("pp/ngc1/ngc1_12m_co21_singledish.image"));
    assert_eq!(apodize_with.as_deref(), Some(Path::new("pp/ngc1/ngc1_12m_co21.pb")));
    assert_eq!(output, &PathBuf::from("pp/ngc1/ngc1_12m+tp_co21_pbcorr_round.image"));
    assert_eq!(action.inputs().len(), 3);
    assert_eq!(engine.total_calls(), 0);
}

#[test]
fn test_mosaic_weights_come_from_paired_primary_beams() {
    let catalog = catalog();
    let config = full_config();
    let plan = plan(&config, &catalog).unwrap();
    let engine = RecordingEngine::new();
    let orchestrator = Orchestrator::new(&config, &catalog, &engine);

    let planned = plan
        .triples
        .iter()
        .find(|p| p.triple.to_string() == "m1/co21/12m+tp")
        .unwrap();
    let StageAction::Weight { parts } = orchestrator.resolve(planned, Stage::Weight).unwrap()
    else {
        panic!("expected weight action");
    };
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].pb, PathBuf::from("pp/m1a/m1a_12m_co21.pb"));
    assert_eq!(
        parts[0].noise_source,
        Some(PathBuf::from("pp/m1a/m1a_12m+tp_co21_pbcorr_round.image"))
    );
    assert_eq!(parts[1].output, PathBuf::from("pp/m1b/m1b_12m+tp_co21_weight.image"));
}
