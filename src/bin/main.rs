// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use checkin_runner::config::Settings;
use checkin_runner::notify::Notifier;
use clap::Parser;

#[derive(Debug, clap::Parser)]
#[command(long_about = None)]
struct Args {
    /// TOML file with the settings, overridden by environment and flags
    #[arg(long)]
    config: Option<std::path::PathBuf>,
    /// Class identifier, as in /student/course/<id>/punchs
    #[arg(long, env = "CHECKIN_CLASS_ID")]
    class_id: Option<String>,
    /// Full session cookie, including remember_student_xxx
    #[arg(long, env = "CHECKIN_COOKIE", hide_env_values = true)]
    cookie: Option<String>,
    /// Latitude reported with the check-in, in degrees
    #[arg(long, env = "CHECKIN_LAT", allow_hyphen_values = true)]
    lat: Option<String>,
    /// Longitude reported with the check-in, in degrees
    #[arg(long, env = "CHECKIN_LNG", allow_hyphen_values = true)]
    lng: Option<String>,
    /// Accuracy radius reported with the check-in, in m
    #[arg(long, env = "CHECKIN_ACC")]
    acc: Option<String>,
    /// PushPlus token, no notification is sent if missing
    #[arg(long, env = "CHECKIN_PUSHPLUS_TOKEN", hide_env_values = true)]
    pushplus_token: Option<String>,
    /// Scheme and host of the check-in site
    #[arg(long, env = "CHECKIN_BASE_URL")]
    base_url: Option<String>,
    /// Endpoint of the push service
    #[arg(long)]
    notify_url: Option<String>,
    /// Timeout of the requests to the check-in site, in s
    #[arg(long)]
    request_timeout: Option<f64>,
    /// Timeout of the notification request, in s
    #[arg(long)]
    notify_timeout: Option<f64>,
    /// Pause between a submission and its verification, in s
    #[arg(long)]
    verify_delay: Option<f64>,
    /// Also notify the tasks that could not be verified as signed
    #[arg(long, default_value_t = false)]
    notify_failures: bool,
}

impl Args {
    fn settings(&self) -> Settings {
        Settings {
            class_id: self.class_id.clone(),
            cookie: self.cookie.clone(),
            lat: self.lat.clone(),
            lng: self.lng.clone(),
            acc: self.acc.clone(),
            pushplus_token: self.pushplus_token.clone(),
            base_url: self.base_url.clone(),
            notify_url: self.notify_url.clone(),
            request_timeout: self.request_timeout,
            notify_timeout: self.notify_timeout,
            verify_delay: self.verify_delay,
            notify_failures: self.notify_failures.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    log::info!(
        "check-in run started at {}",
        checkin_runner::notify::timestamp()
    );

    // no request is issued before the configuration is complete
    let file_settings = match &args.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    let config = file_settings.merge(args.settings()).validate()?;

    let portal = checkin_runner::portal::HttpPortal::new(&config)?;
    let notifier = checkin_runner::notify::PushPlus::from_config(&config)?;
    let runner = checkin_runner::runner::CheckinRunner::new(
        &config,
        &portal,
        notifier.as_ref().map(|x| x as &dyn Notifier),
    );

    if let Err(err) = runner.run().await {
        log::error!("run aborted: {}", err);
    }

    log::info!("check-in run finished");
    Ok(())
}
