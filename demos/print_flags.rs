use flagcache::*;
use log::kv::Key;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Info level logging helps to inspect the flag resolution process.
    // Use the default Warning level to avoid too detailed logging in your application.
    log::set_max_level(LevelFilter::Info);
    log::set_logger(&PrintLog {}).unwrap();

    let client = Client::builder(Source::Remote)
        .default_flags([("welcome", false), ("search", false)])
        .fetcher(|| async {
            // stands in for a call to your flag backend
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(FlagMap::from([
                ("welcome".to_owned(), Value::Bool(true)),
                ("search".to_owned(), Value::Bool(false)),
            ]))
        })
        .build()
        .unwrap();

    let is_welcome_enabled = client.get_value("welcome", false);
    println!("welcome before the fetch settles: {is_welcome_enabled}");

    client
        .wait_for_ready(Duration::from_secs(5))
        .await
        .unwrap();

    let is_welcome_enabled = client.get_value("welcome", false);
    println!("welcome after the fetch settled: {is_welcome_enabled}");

    let panel = DebugPanel::new(&client).show(true);
    panel.toggle("search");
    print!("{}", panel.render());
}

// Example log implementation.
pub struct PrintLog {}

impl Log for PrintLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.target().contains("flagcache")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        let event_id = record
            .key_values()
            .get(Key::from("event_id"))
            .map(|id| id.to_string())
            .unwrap_or_default();
        println!("{level} [{event_id}] {}", record.args());
    }

    fn flush(&self) {}
}
