//! Seeded synthetic dataset used when no dataset files are available.

use super::{HealthRecord, SleepDisorder};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const OCCUPATIONS: [&str; 8] = [
    "Software Engineer",
    "Doctor",
    "Nurse",
    "Teacher",
    "Lawyer",
    "Engineer",
    "Accountant",
    "Salesperson",
];

const GENDERS: [&str; 2] = ["Male", "Female"];
const BMI_CATEGORIES: [&str; 3] = ["Normal", "Overweight", "Obese"];

/// Labelling rule of the synthetic data: short sleep under high stress is
/// insomnia, otherwise obesity past 50 is sleep apnea.
pub fn synthetic_label(sleep_duration: f64, stress_level: u32, bmi_category: &str, age: u32) -> SleepDisorder {
    if sleep_duration < 5.5 && stress_level > 7 {
        SleepDisorder::Insomnia
    } else if bmi_category == "Obese" && age > 50 {
        SleepDisorder::SleepApnea
    } else {
        SleepDisorder::None
    }
}

pub fn generate_sample_data(n: usize, seed: u64) -> Vec<HealthRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let gender = GENDERS.choose(&mut rng).copied().unwrap_or("Male");
            let age = rng.gen_range(18..80);
            let occupation = OCCUPATIONS.choose(&mut rng).copied().unwrap_or("Engineer");
            let sleep_duration: f64 = rng.gen_range(4.0..10.0);
            let sleep_quality = rng.gen_range(1..=10);
            let physical_activity = rng.gen_range(0..=100);
            let stress_level = rng.gen_range(1..=10);
            let bmi_category = BMI_CATEGORIES.choose(&mut rng).copied().unwrap_or("Normal");
            let systolic: u32 = rng.gen_range(90..=180);
            let diastolic: u32 = rng.gen_range(60..=120);
            let heart_rate = rng.gen_range(50..120);
            let daily_steps = rng.gen_range(1000..=15000);

            let label = synthetic_label(sleep_duration, stress_level, bmi_category, age);
            HealthRecord {
                id: format!("P{}", i + 1000),
                gender: gender.to_string(),
                age,
                occupation: occupation.to_string(),
                sleep_duration,
                sleep_quality,
                physical_activity,
                stress_level,
                bmi_category: bmi_category.to_string(),
                blood_pressure: format!("{systolic}/{diastolic}"),
                heart_rate,
                daily_steps,
                sleep_disorder: Some(match label {
                    SleepDisorder::None => "None".to_string(),
                    other => other.label().to_string(),
                }),
            }
        })
        .collect()
}
