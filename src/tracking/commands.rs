//! Line-oriented host command surface.
//!
//! The headless binary reads these from stdin; embedders with their own
//! event loop can call [`dispatch`] directly.

use std::{str::FromStr, sync::Arc, time::Duration};

use crate::{collector::HttpCollector, geocode::GeocodeCache};

use super::{LifecycleEvent, LifecycleSender, TrackingController};

#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    Login(String),
    Logout,
    Foreground,
    Background,
    Suspend,
    Start {
        user_id: String,
        interval: Option<Duration>,
    },
    Stop,
    Status,
    Where {
        latitude: f64,
        longitude: f64,
    },
    History(String),
    Latest(String),
    Quit,
}

impl FromStr for HostCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or_else(|| "empty command".to_string())?;
        let args: Vec<&str> = parts.collect();

        let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("login", [user]) => HostCommand::Login((*user).to_string()),
            ("logout", []) => HostCommand::Logout,
            ("fg" | "foreground", []) => HostCommand::Foreground,
            ("bg" | "background", []) => HostCommand::Background,
            ("suspend", []) => HostCommand::Suspend,
            ("start", [user]) => HostCommand::Start {
                user_id: (*user).to_string(),
                interval: None,
            },
            ("start", [user, interval_ms]) => {
                let ms: u64 = interval_ms
                    .parse()
                    .map_err(|_| format!("invalid interval '{interval_ms}'"))?;
                HostCommand::Start {
                    user_id: (*user).to_string(),
                    interval: Some(Duration::from_millis(ms)),
                }
            }
            ("stop", []) => HostCommand::Stop,
            ("status", []) => HostCommand::Status,
            ("where", [lat, lon]) => HostCommand::Where {
                latitude: parse_coordinate(lat)?,
                longitude: parse_coordinate(lon)?,
            },
            ("history", [user]) => HostCommand::History((*user).to_string()),
            ("latest", [user]) => HostCommand::Latest((*user).to_string()),
            ("quit" | "exit", []) => HostCommand::Quit,
            _ => return Err(format!("unrecognized command '{}'", line.trim())),
        };
        Ok(command)
    }
}

fn parse_coordinate(raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("invalid coordinate '{raw}'"))
}

pub struct CommandContext {
    pub controller: TrackingController,
    pub lifecycle: LifecycleSender,
    pub geocode: Arc<GeocodeCache>,
    pub collector: Arc<HttpCollector>,
}

/// Run one command and produce the line to show the operator.
pub async fn dispatch(ctx: &CommandContext, command: HostCommand) -> Result<String, String> {
    match command {
        HostCommand::Login(user) => emit(ctx, LifecycleEvent::SessionChanged(Some(user))).await,
        HostCommand::Logout => emit(ctx, LifecycleEvent::SessionChanged(None)).await,
        HostCommand::Foreground => emit(ctx, LifecycleEvent::Foregrounded).await,
        HostCommand::Background => emit(ctx, LifecycleEvent::Backgrounded).await,
        HostCommand::Suspend => emit(ctx, LifecycleEvent::Suspended).await,
        HostCommand::Start { user_id, interval } => ctx
            .controller
            .try_start(&user_id, interval)
            .await
            .map(|()| format!("tracking {user_id}"))
            .map_err(|e| e.to_string()),
        HostCommand::Stop => {
            ctx.controller.stop().await;
            Ok("stopped".into())
        }
        HostCommand::Status => {
            serde_json::to_string(&ctx.controller.status().current()).map_err(|e| e.to_string())
        }
        HostCommand::Where {
            latitude,
            longitude,
        } => Ok(ctx.geocode.resolve_address(latitude, longitude).await),
        HostCommand::History(user_id) => {
            let records = ctx
                .collector
                .history_for_user(&user_id)
                .await
                .map_err(|e| e.to_string())?;
            if records.is_empty() {
                return Ok(format!("no data for {user_id}"));
            }
            serde_json::to_string(&records).map_err(|e| e.to_string())
        }
        HostCommand::Latest(user_id) => {
            match ctx
                .collector
                .latest_for_user(&user_id)
                .await
                .map_err(|e| e.to_string())?
            {
                Some(record) => serde_json::to_string(&record).map_err(|e| e.to_string()),
                None => Ok(format!("no data for {user_id}")),
            }
        }
        HostCommand::Quit => Ok("bye".into()),
    }
}

async fn emit(ctx: &CommandContext, event: LifecycleEvent) -> Result<String, String> {
    let label = format!("{event:?}");
    if ctx.lifecycle.emit(event).await {
        Ok(format!("queued {label}"))
    } else {
        Err("lifecycle listener is not running".into())
    }
}
