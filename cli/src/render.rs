//! Plain text rendering of the session view.

use lobbyscope_core::session::SessionPhase;
use lobbyscope_core::tracker::{PlayerView, StatsStatus, ViewModel};
use std::fmt::Write;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const NAME_WIDTH: usize = 18;

fn phase_label(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Idle => "Idle",
        SessionPhase::Lobby => "In lobby",
        SessionPhase::InGame => "In game",
        SessionPhase::PostGame => "Game over",
    }
}

/// `*` marks party members; a denicked name shows its account.
fn display_name(player: &PlayerView) -> String {
    let marker = if player.in_party { "*" } else { "" };
    match &player.account {
        Some(account) => format!("{marker}{} ({account})", player.name),
        None => format!("{marker}{}", player.name),
    }
}

fn player_row(player: &PlayerView) -> String {
    let note = match &player.stats {
        StatsStatus::Resolved(_) => "",
        StatsStatus::Stale(_) => "(refreshing)",
        StatsStatus::Unresolved => "(loading)",
        StatsStatus::Failed(_) => "(error)",
    };

    let cells = match player.stats.record() {
        Some(record) => match &record.stats {
            Some(stats) => format!(
                "{:>7.2} {:>7.2} {:>7.2} {:>5}",
                stats.level,
                stats.kdr,
                stats.wlr,
                stats
                    .winstreak
                    .map(|ws| ws.to_string())
                    .unwrap_or_else(|| "?".to_string()),
            ),
            None => format!("{:>7}", "nick"),
        },
        None => format!("{:>7} {:>7} {:>7} {:>5}", "-", "-", "-", "-"),
    };

    format!("{:<NAME_WIDTH$} {cells} {note}", display_name(player))
        .trim_end()
        .to_string()
}

/// Header line plus one row per player, ranked by level.
pub fn format_view(view: &ViewModel) -> String {
    let mut out = String::new();

    let _ = write!(out, "{}", phase_label(view.phase));
    if let Some(me) = &view.local_player {
        let _ = write!(out, " | {me}");
    }
    let _ = write!(out, " | {} players", view.players.len());
    if view.party.len() > 1 {
        let _ = write!(out, " | party: {}", view.party.join(", "));
    }
    if !view.log_healthy {
        let _ = write!(out, " | log unavailable");
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "{:<NAME_WIDTH$} {:>7} {:>7} {:>7} {:>5}",
        "Player", "Level", "FKDR", "WLR", "WS"
    );
    let _ = writeln!(out, "{}", "-".repeat(NAME_WIDTH + 32));

    for player in view.ranked() {
        let _ = writeln!(out, "{}", player_row(player));
    }
    out
}

pub fn print_view(view: &ViewModel) {
    print!("{}", format_view(view));
}

/// Print the table every time a new view revision is published.
pub fn spawn_printer(mut views: watch::Receiver<Arc<ViewModel>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_revision = 0;
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            if view.revision == last_revision {
                continue;
            }
            last_revision = view.revision;
            println!();
            print_view(&view);
        }
    })
}
