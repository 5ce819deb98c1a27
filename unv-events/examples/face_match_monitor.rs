//! Face-match and alarm monitor
//!
//! Subscribes to a UNV recorder's event stream and logs every alarm and
//! face-match it pushes, keeping the lease alive until Ctrl+C.
//!
//! Configuration comes from the environment:
//!
//! ```text
//! UNV_HOST=192.168.1.105 UNV_USERNAME=admin UNV_PASSWORD=secret \
//! UNV_CALLBACK_HOST=192.168.1.50 UNV_CALLBACK_PORT=9000 \
//! UNV_LOG_MODE=development cargo run --example face_match_monitor
//! ```

use unv_events::logging::{self, LoggingMode};
use unv_events::{EventSession, SessionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("UNV_LOG_MODE").is_ok() {
        logging::init_logging_from_env()?;
    } else {
        logging::init_logging(LoggingMode::Development)?;
    }

    let config = SessionConfig::from_env()?;
    println!("📡 UNV event monitor");
    println!("   Device:   {}", config.device_host);
    println!(
        "   Callback: {}:{} (listening on {})",
        config.callback_host, config.callback_port, config.listen_addr
    );

    let mut session = EventSession::new(config)?;

    session.on_alarm(|alarm| {
        tracing::info!(
            alarm_type = alarm.alarm_type.as_deref().unwrap_or("-"),
            source = alarm.alarm_src_id.as_deref().unwrap_or("-"),
            related = alarm.related_id.as_deref().unwrap_or("-"),
            "Alarm"
        );
    });

    session.on_person_match(|event| {
        if event.faces.is_empty() {
            tracing::info!("Face match with no face details");
        }
        for face in &event.faces {
            let similarity = face
                .similarity
                .map(|s| format!("{s:.1}%"))
                .unwrap_or_else(|| "-".to_string());
            tracing::info!(
                person = face.person_name.as_deref().unwrap_or("Unknown"),
                %similarity,
                channel = face.channel_id.as_deref().unwrap_or("-"),
                related = face.related_id.as_deref().unwrap_or("-"),
                "Face match"
            );
        }
    });

    // Print every status change as it happens
    let mut status = session.watch_status();
    let status_task = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            println!("ℹ️  {}", *status.borrow_and_update());
        }
    });

    match session.start().await {
        Ok(subscription) => {
            if let Some(id) = subscription.id {
                println!("✅ Subscribed, lease {id} for {}s", subscription.duration_seconds);
            }
        }
        Err(e) => {
            // The keepalive loop keeps retrying on its own schedule
            println!("⚠️  Initial subscribe failed: {e}");
        }
    }

    println!("Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    println!("\n🛑 Shutting down...");
    session.shutdown().await?;
    status_task.abort();

    Ok(())
}
