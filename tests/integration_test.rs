//! Integration test: config load, training pipeline, inference, context and stores.

use approx::assert_abs_diff_eq;
use sleepytics::{
    config::{AppConfig, TrainingConfig},
    context::AppContext,
    dataset::{generate_sample_data, HealthRecord, SleepDisorder},
    features::{to_matrix, ScalerState, Vocabulary, FEATURE_DIM},
    inference::predict_one,
    insights::SleepAdvice,
    storage::{AlcoholIntake, CaffeineIntake, SecureStore, SleepLogEntry, StoreError, UserAccount},
    training::{TrainedArtifact, TrainingPipeline},
    SleepyticsError,
};
use chrono::{NaiveDate, NaiveTime};
use std::path::Path;
use std::sync::{Arc, OnceLock};

fn training_config() -> TrainingConfig {
    TrainingConfig {
        n_trees: 60,
        ..TrainingConfig::default()
    }
}

/// One shared artifact trained on the seeded sample data.
fn artifact() -> Arc<TrainedArtifact> {
    static ARTIFACT: OnceLock<Arc<TrainedArtifact>> = OnceLock::new();
    ARTIFACT
        .get_or_init(|| {
            let data = generate_sample_data(500, 42);
            let outcome = TrainingPipeline::new(training_config()).train(&data).unwrap();
            Arc::new(outcome.artifact)
        })
        .clone()
}

fn person(id: &str) -> HealthRecord {
    HealthRecord {
        id: id.into(),
        gender: "Female".into(),
        age: 34,
        occupation: "Teacher".into(),
        sleep_duration: 7.5,
        sleep_quality: 7,
        physical_activity: 60,
        stress_level: 4,
        bmi_category: "Normal".into(),
        blood_pressure: "120/80".into(),
        heart_rate: 70,
        daily_steps: 8000,
        sleep_disorder: None,
    }
}

fn insomnia_like() -> HealthRecord {
    HealthRecord {
        sleep_duration: 4.3,
        sleep_quality: 3,
        stress_level: 9,
        blood_pressure: "125/82".into(),
        ..person("held-out-insomnia")
    }
}

fn memory_context(config: AppConfig) -> AppContext {
    AppContext::new(config, SecureStore::open_in_memory(b"test-secret").unwrap())
}

fn test_app_config() -> AppConfig {
    AppConfig {
        dataset_paths: Vec::new(),
        artifact_path: None,
        training: TrainingConfig {
            n_trees: 20,
            sample_rows: 200,
            ..TrainingConfig::default()
        },
        ..AppConfig::default()
    }
}

#[test]
fn config_load_default() {
    let c = AppConfig::load(Path::new("nonexistent.json"));
    assert_eq!(c.training.seed, 42);
    assert_abs_diff_eq!(c.training.test_fraction, 0.2);
    assert_eq!(c.training.n_trees, 100);
}

#[test]
fn insomnia_pattern_is_recognised() {
    let artifact = artifact();
    assert!(artifact.accuracy() > 0.75, "accuracy {}", artifact.accuracy());

    let result = predict_one(&artifact, &insomnia_like()).unwrap();
    assert_eq!(result.disorder, SleepDisorder::Insomnia);
    let p = result.probability_of(SleepDisorder::Insomnia);
    assert!(p > result.probability_of(SleepDisorder::SleepApnea));
    assert!(p > result.probability_of(SleepDisorder::None));
}

#[test]
fn predictions_are_deterministic_distributions() {
    let artifact = artifact();
    for record in generate_sample_data(40, 99) {
        let first = predict_one(&artifact, &record).unwrap();
        assert_eq!(predict_one(&artifact, &record).unwrap(), first);
        assert_abs_diff_eq!(first.probabilities.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
        assert!(first.probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
        assert_eq!(first.confidence(), first.probabilities.iter().copied().fold(0.0, f64::max));
    }
}

#[test]
fn same_seed_trains_same_model() {
    let data = generate_sample_data(120, 8);
    let cfg = TrainingConfig {
        n_trees: 10,
        ..TrainingConfig::default()
    };
    let a = TrainingPipeline::new(cfg.clone()).train(&data).unwrap();
    let b = TrainingPipeline::new(cfg).train(&data).unwrap();
    assert_eq!(a.artifact.model(), b.artifact.model());
    assert_eq!(a.artifact.scaler(), b.artifact.scaler());
    assert_eq!(a.report, b.report);
}

#[test]
fn encoded_and_scaled_width_is_stable() {
    let artifact = artifact();
    for record in generate_sample_data(25, 3) {
        let encoded = artifact.vocabulary().transform(&record).unwrap();
        assert_eq!(encoded.dim(), FEATURE_DIM);
        assert_eq!(artifact.scaler().transform(encoded.as_slice()).unwrap().len(), FEATURE_DIM);
    }
}

#[test]
fn scaled_training_matrix_is_standardized() {
    let data = generate_sample_data(300, 11);
    let vocab = Vocabulary::fit(&data).unwrap();
    let rows: Vec<_> = data.iter().map(|r| vocab.transform(r).unwrap()).collect();
    let x = to_matrix(&rows).unwrap();
    let scaler = ScalerState::fit(&x).unwrap();
    let z = scaler.transform_matrix(&x).unwrap();
    for col in z.columns() {
        assert_abs_diff_eq!(col.mean().unwrap(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(col.std(0.0), 1.0, epsilon = 1e-9);
    }
}

#[test]
fn malformed_input_is_reported_not_guessed() {
    let artifact = artifact();
    let bad_bp = HealthRecord {
        blood_pressure: "120-80".into(),
        ..person("bp")
    };
    assert!(matches!(
        predict_one(&artifact, &bad_bp),
        Err(SleepyticsError::InvalidBloodPressure(_))
    ));

    let unseen = HealthRecord {
        occupation: "Astronaut".into(),
        ..person("occ")
    };
    assert!(matches!(
        predict_one(&artifact, &unseen),
        Err(SleepyticsError::UnseenCategory { column: "Occupation", .. })
    ));
}

#[test]
fn concurrent_predictions_agree() {
    let artifact = artifact();
    let expected = predict_one(&artifact, &insomnia_like()).unwrap();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let artifact = Arc::clone(&artifact);
            std::thread::spawn(move || predict_one(&artifact, &insomnia_like()).unwrap())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), expected);
    }
}

#[test]
fn single_class_dataset_publishes_nothing() {
    let ctx = memory_context(test_app_config());
    let data: Vec<HealthRecord> = generate_sample_data(60, 2)
        .into_iter()
        .map(|mut r| {
            r.sleep_disorder = Some("None".into());
            r
        })
        .collect();
    assert!(matches!(ctx.retrain(&data), Err(SleepyticsError::InsufficientData(_))));
    assert!(ctx.current_artifact().is_none());
    assert!(matches!(
        ctx.predict(&UserAccount { username: "u".into(), is_admin: false }, person("x")),
        Err(SleepyticsError::NoArtifact)
    ));
}

#[test]
fn artifact_persists_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("artifact.json");
    let artifact = artifact();
    artifact.save(&path).unwrap();
    let loaded = TrainedArtifact::load(&path).unwrap();
    assert_eq!(loaded.vocabulary(), artifact.vocabulary());
    assert_eq!(
        predict_one(&loaded, &insomnia_like()).unwrap(),
        predict_one(&artifact, &insomnia_like()).unwrap()
    );
}

#[test]
fn context_logs_predictions_for_admins_only() {
    let ctx = memory_context(test_app_config());
    ctx.store().ensure_admin("admin", "admin123").unwrap();
    let admin = ctx.login("admin", "admin123").unwrap().unwrap();
    let alice = ctx.create_account(&admin, "alice", "pw", false).unwrap();
    assert!(ctx.login("alice", "nope").unwrap().is_none());

    ctx.ensure_artifact().unwrap();
    let result = ctx.predict(&alice, insomnia_like()).unwrap();

    let logs = ctx.prediction_logs(&admin, None).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].user, "alice");
    assert_eq!(logs[0].prediction, result.disorder);
    assert_eq!(logs[0].probabilities, result.probabilities);
    assert_eq!(logs[0].input, insomnia_like());

    assert!(matches!(
        ctx.prediction_logs(&alice, None),
        Err(SleepyticsError::Store(StoreError::Unauthorized(_)))
    ));
    assert!(matches!(
        ctx.create_account(&alice, "mallory", "pw", true),
        Err(SleepyticsError::Store(StoreError::Unauthorized(_)))
    ));
}

#[test]
fn retrain_swaps_without_disturbing_snapshots() {
    let ctx = Arc::new(memory_context(test_app_config()));
    let first = ctx.ensure_artifact().unwrap();
    let before = predict_one(&first, &insomnia_like()).unwrap();

    let runtime = tokio::runtime::Builder::new_multi_thread().build().unwrap();
    let data = generate_sample_data(150, 77);
    let retrained = runtime
        .block_on(Arc::clone(&ctx).retrain_async(data))
        .unwrap();

    let live = ctx.current_artifact().unwrap();
    assert!(Arc::ptr_eq(&live, &retrained.artifact));
    assert!(!Arc::ptr_eq(&live, &first));
    // the old snapshot still answers exactly as before
    assert_eq!(predict_one(&first, &insomnia_like()).unwrap(), before);
}

#[test]
fn storage_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    {
        let store = SecureStore::open(&path, b"test-secret").unwrap();
        store.create_user("carol", "pw", true).unwrap();
    }
    let store = SecureStore::open(&path, b"test-secret").unwrap();
    let user = store.authenticate("carol", "pw").unwrap().unwrap();
    assert!(user.is_admin);
}

#[test]
fn anyone_can_sign_up_as_a_regular_user() {
    let ctx = memory_context(test_app_config());
    let bob = ctx.sign_up("bob", "pw").unwrap();
    assert!(!bob.is_admin);
    assert_eq!(ctx.login("bob", "pw").unwrap(), Some(bob.clone()));
    assert!(matches!(
        ctx.sign_up("bob", "other"),
        Err(SleepyticsError::Store(StoreError::DuplicateUser(_)))
    ));
    assert!(matches!(
        ctx.sign_up("", "pw"),
        Err(SleepyticsError::Store(StoreError::InvalidAccount(_)))
    ));
    assert!(matches!(
        ctx.list_users(&bob),
        Err(SleepyticsError::Store(StoreError::Unauthorized(_)))
    ));
}

fn diary_night(day: u32, bed_hour: u32, quality: u32, stress: u32) -> SleepLogEntry {
    SleepLogEntry {
        date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
        bedtime: NaiveTime::from_hms_opt(bed_hour, 15, 0).unwrap(),
        wake_time: NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
        sleep_duration: 5.0 + quality as f64 / 4.0,
        sleep_quality: quality,
        stress_level: stress,
        mood: quality.max(1),
        dream_recall: day % 2 == 0,
        medications: Vec::new(),
        alcohol_intake: AlcoholIntake::None,
        caffeine_intake: CaffeineIntake::High,
        screen_time_minutes: 60,
        notes: String::new(),
    }
}

#[test]
fn sleep_diary_feeds_personal_insights() {
    let ctx = memory_context(test_app_config());
    let carol = ctx.sign_up("carol", "pw").unwrap();
    let dave = ctx.sign_up("dave", "pw").unwrap();
    assert_eq!(ctx.sleep_insights(&carol).unwrap(), None);

    for day in 1..=8 {
        let (quality, stress) = if day <= 5 { (3, 9) } else { (8, 2) };
        let bed_hour = if day % 2 == 0 { 21 } else { 23 };
        ctx.log_sleep(&carol, diary_night(day, bed_hour, quality, stress)).unwrap();
    }
    ctx.log_sleep(&dave, diary_night(1, 22, 9, 1)).unwrap();

    let mut bad = diary_night(9, 22, 7, 3);
    bad.stress_level = 11;
    assert!(matches!(ctx.log_sleep(&carol, bad), Err(SleepyticsError::InvalidEntry(_))));
    assert_eq!(ctx.sleep_log(&carol).unwrap().len(), 8);

    let insights = ctx.sleep_insights(&carol).unwrap().unwrap();
    assert_eq!(insights.entries, 8);
    assert_abs_diff_eq!(insights.avg_sleep_quality, (5.0 * 3.0 + 3.0 * 8.0) / 8.0);
    assert_abs_diff_eq!(insights.correlations[1][2].unwrap(), -1.0, epsilon = 1e-9);
    assert_eq!(
        insights.recommendations,
        vec![
            SleepAdvice::ConsultSpecialist,
            SleepAdvice::ManageStress,
            SleepAdvice::AdjustSleepWakeCycle
        ]
    );

    let dave_insights = ctx.sleep_insights(&dave).unwrap().unwrap();
    assert_eq!(dave_insights.entries, 1);
    assert!(dave_insights.recommendations.is_empty());
}

#[test]
fn csv_with_blank_no_disorder_cells_trains() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    let mut writer = csv::Writer::from_path(&path).unwrap();
    for mut record in generate_sample_data(80, 21) {
        if record.sleep_disorder.as_deref() == Some("None") {
            record.sleep_disorder = Some(String::new());
        }
        writer.serialize(&record).unwrap();
    }
    writer.flush().unwrap();

    let data = sleepytics::dataset::load_dataset(&[path]).unwrap();
    assert!(data.iter().any(|r| r.sleep_disorder.as_deref() == Some("")));
    let outcome = TrainingPipeline::new(TrainingConfig {
        n_trees: 10,
        ..TrainingConfig::default()
    })
    .train(&data)
    .unwrap();
    assert!(outcome.report.metrics_for(SleepDisorder::None).support > 0);
}
