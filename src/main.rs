//! Sleepytics entrypoint.
//!
//! Commands:
//! - `train` — train on the configured dataset, print the holdout report, persist the artifact
//! - `predict` — answer JSON-line prediction requests from stdin, then exit
//! - `serve` — like `predict`, but keeps running and retrains on a schedule (Ctrl+C to stop)
//! - `logs [YYYY-MM-DD]` — print the prediction log and class distribution (admin)
//! - `add-user <name> [--admin]` — create an account, password from `SLEEPYTICS_NEW_PASSWORD` (admin)
//! - `sign-up <name>` — self-register a regular account, password from `SLEEPYTICS_NEW_PASSWORD`
//! - `log-sleep` — append JSON-line sleep diary entries from stdin for the session user
//! - `insights` — averages, correlations and advice from the session user's diary

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sleepytics::{
    config::AppConfig,
    context::AppContext,
    dataset::HealthRecord,
    inference::PredictionResult,
    insights::SleepInsights,
    logging::StructuredLogger,
    storage::{SleepLogEntry, UserAccount},
};
use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Serialize)]
struct PredictionResponse {
    record_id: String,
    prediction: &'static str,
    probabilities: BTreeMap<&'static str, f64>,
    recommended_actions: &'static [&'static str],
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    record_id: Option<String>,
    error: String,
}

/// One answer line on stdout.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Reply {
    Prediction(PredictionResponse),
    Error(ErrorResponse),
}

#[derive(Serialize)]
struct InsightsResponse<'a> {
    #[serde(flatten)]
    insights: &'a SleepInsights,
    advice: Vec<&'static str>,
}

#[derive(Serialize)]
struct LogLine<'a> {
    time: String,
    user: &'a str,
    prediction: &'static str,
    highest_probability: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Request {
    Wrapped { record: HealthRecord },
    Bare(HealthRecord),
}

impl Request {
    fn into_record(self) -> HealthRecord {
        match self {
            Request::Wrapped { record } | Request::Bare(record) => record,
        }
    }
}

fn respond(result: &PredictionResult, record_id: String) -> PredictionResponse {
    let probabilities = sleepytics::SleepDisorder::ALL
        .iter()
        .map(|d| (d.label(), result.probability_of(*d)))
        .collect();
    PredictionResponse {
        record_id,
        prediction: result.label(),
        probabilities,
        recommended_actions: result.disorder.recommended_actions(),
    }
}

/// Answer one request line. Failures become error replies so the caller can re-prompt.
/// Blocks on the store; async callers go through [`answer`].
fn reply_for(ctx: &AppContext, user: &UserAccount, line: &str) -> Reply {
    let record = match serde_json::from_str::<Request>(line) {
        Ok(req) => req.into_record(),
        Err(e) => {
            return Reply::Error(ErrorResponse {
                record_id: None,
                error: format!("malformed request: {e}"),
            })
        }
    };
    let record_id = record.id.clone();
    match ctx.predict(user, record) {
        Ok(result) => Reply::Prediction(respond(&result, record_id)),
        Err(e) => {
            warn!(record_id = %record_id, error = %e, "prediction rejected");
            Reply::Error(ErrorResponse {
                record_id: Some(record_id),
                error: e.to_string(),
            })
        }
    }
}

/// [`reply_for`] on the blocking pool, serialized as one output line.
async fn answer(ctx: Arc<AppContext>, user: UserAccount, line: String) -> Result<String, BoxError> {
    let reply = tokio::task::spawn_blocking(move || reply_for(&ctx, &user, &line)).await?;
    let mut json = serde_json::to_string(&reply)?;
    json.push('\n');
    Ok(json)
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn session_user(ctx: &AppContext) -> Result<UserAccount, BoxError> {
    let username = env_or("SLEEPYTICS_USER", "admin");
    let password = std::env::var("SLEEPYTICS_PASSWORD").map_err(|_| "SLEEPYTICS_PASSWORD is not set")?;
    ctx.login(&username, &password)?
        .ok_or_else(|| format!("invalid credentials for {username:?}").into())
}

fn run_train(ctx: &AppContext) -> Result<(), BoxError> {
    let dataset = ctx.load_dataset()?;
    let retrained = ctx.retrain(&dataset)?;
    eprintln!("{}", retrained.report);
    StructuredLogger::emit_json(&retrained.report, &mut std::io::stdout().lock())?;
    Ok(())
}

fn run_predict(ctx: &AppContext) -> Result<(), BoxError> {
    let user = session_user(ctx)?;
    ctx.ensure_artifact()?;
    let mut out = std::io::stdout().lock();
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if !line.trim().is_empty() {
            StructuredLogger::emit_json(&reply_for(ctx, &user, &line), &mut out)?;
        }
    }
    Ok(())
}

fn run_serve(ctx: Arc<AppContext>) -> Result<(), BoxError> {
    let user = session_user(&ctx)?;
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        if ctx.current_artifact().is_none() {
            let dataset = ctx.load_dataset()?;
            Arc::clone(&ctx).retrain_async(dataset).await?;
        }

        let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
        if let Err(e) = ctrlc::set_handler(move || {
            let _ = stop_tx.send(true);
        }) {
            warn!(error = %e, "could not install Ctrl+C handler");
        }

        let serving = {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
                let mut out = tokio::io::stdout();
                while let Ok(Some(line)) = lines.next_line().await {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let written = async {
                        let json = answer(Arc::clone(&ctx), user.clone(), line).await?;
                        out.write_all(json.as_bytes()).await?;
                        out.flush().await?;
                        Ok::<(), BoxError>(())
                    }
                    .await;
                    if let Err(e) = written {
                        warn!(error = %e, "failed to answer request");
                        break;
                    }
                }
                info!("request stream closed");
            })
        };

        let interval_secs = ctx.config().service.retrain_interval_secs;
        info!(interval_secs, "serving (Ctrl+C to stop)");
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.tick().await;
        let mut cycle: u64 = 0;
        loop {
            tokio::select! {
                Ok(()) = stop_rx.changed() => break,
                _ = ticker.tick(), if interval_secs > 0 => {
                    cycle += 1;
                    let result = match ctx.load_dataset() {
                        Ok(dataset) => Arc::clone(&ctx).retrain_async(dataset).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = result {
                        warn!(cycle, error = %e, "scheduled retrain failed; keeping current artifact");
                    }
                }
                else => break,
            }
        }
        serving.abort();
        info!("Sleepytics stopping");
        Ok::<(), BoxError>(())
    })
}

fn run_logs(ctx: &AppContext, day: Option<&str>) -> Result<(), BoxError> {
    let admin = session_user(ctx)?;
    let day = day.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d")).transpose()?;
    let mut out = std::io::stdout().lock();
    for entry in ctx.prediction_logs(&admin, day)? {
        let line = LogLine {
            time: entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            user: &entry.user,
            prediction: entry.prediction.label(),
            highest_probability: entry.highest_probability() * 100.0,
        };
        StructuredLogger::emit_json(&line, &mut out)?;
    }
    let distribution: BTreeMap<&str, usize> = ctx
        .prediction_distribution(&admin, day)?
        .into_iter()
        .map(|(d, n)| (d.label(), n))
        .collect();
    StructuredLogger::emit_json(&distribution, &mut out)?;
    Ok(())
}

fn run_add_user(ctx: &AppContext, args: &[String]) -> Result<(), BoxError> {
    let admin = session_user(ctx)?;
    let username = args.first().ok_or("usage: add-user <name> [--admin]")?;
    let is_admin = args.iter().any(|a| a == "--admin");
    let password = std::env::var("SLEEPYTICS_NEW_PASSWORD").map_err(|_| "SLEEPYTICS_NEW_PASSWORD is not set")?;
    let account = ctx.create_account(&admin, username, &password, is_admin)?;
    StructuredLogger::emit_json(&account, &mut std::io::stdout().lock())?;
    Ok(())
}

fn run_sign_up(ctx: &AppContext, args: &[String]) -> Result<(), BoxError> {
    let username = args.first().ok_or("usage: sign-up <name>")?;
    let password = std::env::var("SLEEPYTICS_NEW_PASSWORD").map_err(|_| "SLEEPYTICS_NEW_PASSWORD is not set")?;
    let account = ctx.sign_up(username, &password)?;
    StructuredLogger::emit_json(&account, &mut std::io::stdout().lock())?;
    Ok(())
}

fn run_log_sleep(ctx: &AppContext) -> Result<(), BoxError> {
    let user = session_user(ctx)?;
    let mut out = std::io::stdout().lock();
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let logged = serde_json::from_str::<SleepLogEntry>(&line)
            .map_err(|e| format!("malformed entry: {e}"))
            .and_then(|entry| ctx.log_sleep(&user, entry).map_err(|e| e.to_string()));
        match logged {
            Ok(entry) => StructuredLogger::emit_json(&entry, &mut out)?,
            Err(error) => StructuredLogger::emit_json(&ErrorResponse { record_id: None, error }, &mut out)?,
        }
    }
    Ok(())
}

fn run_insights(ctx: &AppContext) -> Result<(), BoxError> {
    let user = session_user(ctx)?;
    let mut out = std::io::stdout().lock();
    match ctx.sleep_insights(&user)? {
        Some(insights) => {
            let advice = insights.recommendations.iter().map(|a| a.message()).collect();
            StructuredLogger::emit_json(&InsightsResponse { insights: &insights, advice }, &mut out)?;
        }
        None => StructuredLogger::emit_json(
            &serde_json::json!({ "message": "Start tracking your sleep to get personalized insights" }),
            &mut out,
        )?,
    }
    Ok(())
}

fn main() -> Result<(), BoxError> {
    let config_path = std::env::var("SLEEPYTICS_CONFIG_PATH")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let config = AppConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(data_dir = ?config.data_dir, "Sleepytics starting");

    let secret = match std::env::var("SLEEPYTICS_STORE_SECRET") {
        Ok(s) => s,
        Err(_) => {
            warn!("SLEEPYTICS_STORE_SECRET not set; using placeholder device secret");
            "device-secret-placeholder".to_string()
        }
    };
    let ctx = Arc::new(AppContext::open(config, secret.as_bytes())?);

    let admin_password = std::env::var("SLEEPYTICS_ADMIN_PASSWORD").unwrap_or_else(|_| {
        warn!("SLEEPYTICS_ADMIN_PASSWORD not set; bootstrap admin uses the default password");
        "admin123".to_string()
    });
    if ctx.store().ensure_admin("admin", &admin_password)? {
        info!("bootstrap admin account created");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("serve");
    match command {
        "train" => run_train(&ctx),
        "predict" => run_predict(&ctx),
        "serve" => run_serve(ctx),
        "logs" => run_logs(&ctx, args.get(1).map(String::as_str)),
        "add-user" => run_add_user(&ctx, &args[1..]),
        "sign-up" => run_sign_up(&ctx, &args[1..]),
        "log-sleep" => run_log_sleep(&ctx),
        "insights" => run_insights(&ctx),
        other => Err(format!(
            "unknown command {other:?}; expected train, predict, serve, logs, add-user, sign-up, log-sleep or insights"
        )
        .into()),
    }
}
