use crate::CliContext;
use crate::render;
use lobbyscope_core::context::AppConfigExt;
use lobbyscope_core::stats::{CacheLookup, StatsRecord};
use std::io::Write;

pub fn show_roster(ctx: &CliContext) {
    render::print_view(&ctx.tracker.view());
}

/// Cache key for `name`: the account behind it if the lobby knows it as a nick.
fn stats_key(name: &str, ctx: &CliContext) -> String {
    ctx.tracker
        .view()
        .player(name)
        .and_then(|p| p.account.clone())
        .unwrap_or_else(|| name.to_string())
}

pub async fn show_stats(name: &str, ctx: &CliContext) {
    let key = stats_key(name, ctx);
    let lookup = ctx.tracker.cache().resolve(&key).await;
    print_lookup(&key, &lookup);
}

pub async fn refresh_stats(name: &str, ctx: &CliContext) {
    let key = stats_key(name, ctx);
    ctx.tracker.cache().invalidate(&key);
    let lookup = ctx.tracker.cache().resolve(&key).await;
    print_lookup(&key, &lookup);
}

pub fn clear_cache(ctx: &CliContext) {
    let count = ctx.tracker.cache().len();
    ctx.tracker.cache().clear();
    println!("Cleared {count} cached players");
}

pub fn show_settings(ctx: &CliContext) {
    let config = &ctx.config;
    let path = match &ctx.config_path {
        Some(path) => path.display().to_string(),
        None => lobbyscope_core::AppConfig::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|e| format!("unknown ({e})")),
    };

    println!("{:<16} {}", "Config file", path);
    println!("{:<16} {}", "Log file", config.log_path);
    println!("{:<16} {:?}", "Grammar", config.grammar);
    println!("{:<16} {}", "Late-join rules", config.late_join_rules.len());
    println!("{:<16} {}", "Workers", config.cache.workers);
    println!("{:<16} {}s", "Fresh TTL", config.cache.fresh_ttl_secs);
    println!("{:<16} {}s", "Failure backoff", config.cache.failure_backoff_secs);
    println!("{:<16} {:?}", "Stale policy", config.cache.stale_policy);
    println!("{:<16} {}", "Known nicks", config.known_nicks.len());
    println!(
        "{:<16} {}",
        "API key",
        if config.provider.api_key.is_empty() { "not set" } else { "set" }
    );
}

pub fn exit() {
    let _ = writeln!(std::io::stdout(), "quitting...");
    let _ = std::io::stdout().flush();
}

fn print_lookup(name: &str, lookup: &CacheLookup) {
    match lookup {
        CacheLookup::Fresh(record) => print_record(record, ""),
        CacheLookup::Stale(record) => print_record(record, " (stale)"),
        CacheLookup::Pending => println!("{name}: still loading"),
        CacheLookup::Failed(e) => println!("{name}: {e}"),
    }
}

fn print_record(record: &StatsRecord, suffix: &str) {
    let fetched = record
        .fetched_at
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S");
    match &record.stats {
        Some(stats) => println!(
            "{}: level {:.2}, fkdr {:.2}, wlr {:.2}, winstreak {} (fetched {fetched}){suffix}",
            record.player,
            stats.level,
            stats.kdr,
            stats.wlr,
            stats
                .winstreak
                .map(|ws| ws.to_string())
                .unwrap_or_else(|| "hidden".to_string()),
        ),
        None => println!("{}: no profile, probably nicked{suffix}", record.player),
    }
}
