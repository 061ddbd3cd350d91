use std::collections::VecDeque;
use std::time::SystemTime;

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
    Other(String),
}

impl MatchStatus {
    /// Maps the upstream spellings onto one logical state. Unknown values are
    /// carried through verbatim.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" | "TIMED" => MatchStatus::Scheduled,
            "LIVE" | "IN_PLAY" => MatchStatus::Live,
            "FINISHED" => MatchStatus::Finished,
            _ => MatchStatus::Other(raw.trim().to_string()),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, MatchStatus::Live)
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, MatchStatus::Scheduled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TeamRef {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiveStats {
    pub minute: Option<u32>,
    pub goals_total: Option<u32>,
    pub last_goal_minute: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub label: String,
    pub reason: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub id: String,
    pub competition: Option<String>,
    pub home: TeamRef,
    pub away: TeamRef,
    /// Raw `utcDate` as sent by the API.
    pub kickoff: Option<String>,
    pub status: MatchStatus,
    pub score: Score,
    pub live: Option<LiveStats>,
    pub strategies: Vec<Strategy>,
}

impl Match {
    pub fn has_strategies(&self) -> bool {
        !self.strategies.is_empty()
    }
}

/// Rolling goals-for averages; a window the backend leaves out stays `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TeamStats {
    pub last5: Option<f64>,
    pub last10: Option<f64>,
    pub season: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T> {
    Idle,
    Loading,
    Loaded(T),
    Failed(String),
}

impl<T> FetchState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            FetchState::Loaded(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Home,
    Away,
}

/// Identifies one opening of a detail panel. Results carrying an older
/// ticket are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DetailTicket {
    pub match_id: String,
    pub epoch: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailPanel {
    pub ticket: DetailTicket,
    pub home_team: TeamRef,
    pub away_team: TeamRef,
    pub home: FetchState<TeamStats>,
    pub away: FetchState<TeamStats>,
}

impl DetailPanel {
    pub fn slot(&self, side: Side) -> &FetchState<TeamStats> {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    fn slot_mut(&mut self, side: Side) -> &mut FetchState<TeamStats> {
        match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.home.is_loading() || self.away.is_loading()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchFilter {
    All,
    Live,
    Scheduled,
    WithStrategy,
}

impl MatchFilter {
    pub const ALL: [MatchFilter; 4] = [
        MatchFilter::All,
        MatchFilter::Live,
        MatchFilter::Scheduled,
        MatchFilter::WithStrategy,
    ];

    pub fn next(self) -> Self {
        match self {
            MatchFilter::All => MatchFilter::Live,
            MatchFilter::Live => MatchFilter::Scheduled,
            MatchFilter::Scheduled => MatchFilter::WithStrategy,
            MatchFilter::WithStrategy => MatchFilter::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MatchFilter::All => "All",
            MatchFilter::Live => "Live",
            MatchFilter::Scheduled => "Upcoming",
            MatchFilter::WithStrategy => "With strategy",
        }
    }

    pub fn accepts(self, m: &Match) -> bool {
        match self {
            MatchFilter::All => true,
            MatchFilter::Live => m.status.is_live(),
            MatchFilter::Scheduled => m.status.is_scheduled(),
            MatchFilter::WithStrategy => m.has_strategies(),
        }
    }
}

/// Order-preserving subsequence of `matches` accepted by `filter`.
pub fn filter_matches(matches: &[Match], filter: MatchFilter) -> Vec<&Match> {
    matches.iter().filter(|m| filter.accepts(m)).collect()
}

#[derive(Debug, Clone)]
pub enum Delta {
    SetMatches(Vec<Match>),
    FetchFailed(String),
    SetTeamStats {
        ticket: DetailTicket,
        side: Side,
        result: Result<TeamStats, String>,
    },
    Log(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCommand {
    RefreshNow,
    FetchTeamStats {
        ticket: DetailTicket,
        side: Side,
        team_id: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub matches: Vec<Match>,
    pub filter: MatchFilter,
    pub selected: usize,
    pub detail: Option<DetailPanel>,
    pub config_warning: Option<String>,
    pub error_banner: Option<String>,
    pub last_refresh: Option<SystemTime>,
    pub refresh_count: u64,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
    next_epoch: u64,
    outbox: Vec<ProviderCommand>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            matches: Vec::with_capacity(32),
            filter: MatchFilter::All,
            selected: 0,
            detail: None,
            config_warning: None,
            error_banner: None,
            last_refresh: None,
            refresh_count: 0,
            logs: VecDeque::with_capacity(MAX_LOGS),
            help_overlay: false,
            next_epoch: 0,
            outbox: Vec::new(),
        }
    }

    pub fn filtered_matches(&self) -> Vec<&Match> {
        filter_matches(&self.matches, self.filter)
    }

    pub fn selected_match(&self) -> Option<&Match> {
        self.filtered_matches().get(self.selected).copied()
    }

    pub fn expanded_id(&self) -> Option<&str> {
        self.detail.as_ref().map(|panel| panel.ticket.match_id.as_str())
    }

    pub fn set_filter(&mut self, filter: MatchFilter) {
        if self.filter == filter {
            return;
        }
        let selected_id = self.selected_match().map(|m| m.id.clone());
        self.filter = filter;
        self.restore_selection(selected_id);
    }

    pub fn cycle_filter(&mut self) {
        self.set_filter(self.filter.next());
    }

    pub fn select_next(&mut self) {
        let total = self.filtered_matches().len();
        if total == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + 1) % total;
    }

    pub fn select_prev(&mut self) {
        let total = self.filtered_matches().len();
        if total == 0 {
            self.selected = 0;
            return;
        }
        if self.selected == 0 {
            self.selected = total - 1;
        } else {
            self.selected -= 1;
        }
    }

    pub fn clamp_selection(&mut self) {
        let total = self.filtered_matches().len();
        if total == 0 {
            self.selected = 0;
        } else if self.selected >= total {
            self.selected = total - 1;
        }
    }

    /// Clicking the expanded row collapses it; clicking any other row moves
    /// the single detail panel there.
    pub fn toggle_expanded(&mut self, match_id: &str) {
        if self.expanded_id() == Some(match_id) {
            self.collapse();
            return;
        }
        let Some(m) = self.matches.iter().find(|m| m.id == match_id).cloned() else {
            self.push_log(format!("[WARN] Unknown match {match_id}"));
            return;
        };
        self.open_panel(&m);
    }

    pub fn toggle_selected(&mut self) {
        let Some(id) = self.selected_match().map(|m| m.id.clone()) else {
            self.push_log("[INFO] No match selected");
            return;
        };
        self.toggle_expanded(&id);
    }

    pub fn collapse(&mut self) {
        self.detail = None;
    }

    pub fn dismiss_error(&mut self) {
        self.error_banner = None;
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    /// Commands queued by view interactions, in the order they were raised.
    pub fn take_commands(&mut self) -> Vec<ProviderCommand> {
        std::mem::take(&mut self.outbox)
    }

    fn open_panel(&mut self, m: &Match) {
        self.next_epoch += 1;
        let ticket = DetailTicket {
            match_id: m.id.clone(),
            epoch: self.next_epoch,
        };
        let mut panel = DetailPanel {
            ticket: ticket.clone(),
            home_team: m.home.clone(),
            away_team: m.away.clone(),
            home: FetchState::Idle,
            away: FetchState::Idle,
        };
        for (side, team) in [(Side::Home, &m.home), (Side::Away, &m.away)] {
            let slot = panel.slot_mut(side);
            match team.id.as_deref() {
                Some(team_id) => {
                    *slot = FetchState::Loading;
                    self.outbox.push(ProviderCommand::FetchTeamStats {
                        ticket: ticket.clone(),
                        side,
                        team_id: team_id.to_string(),
                    });
                }
                None => *slot = FetchState::Failed("no team id".to_string()),
            }
        }
        self.detail = Some(panel);
    }

    fn restore_selection(&mut self, selected_id: Option<String>) {
        if let Some(id) = selected_id
            && let Some(pos) = self.filtered_matches().iter().position(|m| m.id == id)
        {
            self.selected = pos;
            return;
        }
        self.clamp_selection();
    }

    // Every refresh hands us new match objects, so an open panel is either
    // reopened against the new reference or closed.
    fn reconcile_detail(&mut self) {
        let Some(panel) = self.detail.take() else {
            return;
        };
        let current = self
            .matches
            .iter()
            .find(|m| m.id == panel.ticket.match_id)
            .cloned();
        match current {
            Some(m) => self.open_panel(&m),
            None => self.push_log(format!(
                "[INFO] Match {} left the list, detail closed",
                panel.ticket.match_id
            )),
        }
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetMatches(matches) => {
            let selected_id = state.selected_match().map(|m| m.id.clone());
            tracing::debug!(count = matches.len(), "match list replaced");
            state.matches = matches;
            state.last_refresh = Some(SystemTime::now());
            state.refresh_count += 1;
            state.error_banner = None;
            state.restore_selection(selected_id);
            state.reconcile_detail();
        }
        Delta::FetchFailed(err) => {
            tracing::warn!(error = %err, "match fetch failed");
            state.push_log(format!("[WARN] Match fetch failed: {err}"));
            state.error_banner = Some(err);
        }
        Delta::SetTeamStats {
            ticket,
            side,
            result,
        } => {
            let current = state
                .detail
                .as_ref()
                .is_some_and(|panel| panel.ticket == ticket);
            if !current {
                tracing::debug!(match_id = %ticket.match_id, epoch = ticket.epoch, "stale stats dropped");
                state.push_log(format!(
                    "[INFO] Dropped stale stats for match {}",
                    ticket.match_id
                ));
                return;
            }
            if let Err(err) = &result {
                state.push_log(format!("[WARN] Team stats error: {err}"));
            }
            if let Some(panel) = state.detail.as_mut() {
                *panel.slot_mut(side) = match result {
                    Ok(stats) => FetchState::Loaded(stats),
                    Err(err) => FetchState::Failed(err),
                };
            }
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_spellings_collapse() {
        assert_eq!(MatchStatus::from_raw("IN_PLAY"), MatchStatus::Live);
        assert_eq!(MatchStatus::from_raw("LIVE"), MatchStatus::Live);
        assert_eq!(MatchStatus::from_raw("TIMED"), MatchStatus::Scheduled);
        assert_eq!(MatchStatus::from_raw("scheduled"), MatchStatus::Scheduled);
        assert_eq!(
            MatchStatus::from_raw("POSTPONED"),
            MatchStatus::Other("POSTPONED".to_string())
        );
    }

    #[test]
    fn filter_cycle_visits_every_filter() {
        let mut seen = Vec::new();
        let mut filter = MatchFilter::All;
        for _ in 0..MatchFilter::ALL.len() {
            seen.push(filter);
            filter = filter.next();
        }
        assert_eq!(filter, MatchFilter::All);
        assert_eq!(seen, MatchFilter::ALL.to_vec());
    }

    #[test]
    fn push_log_is_bounded() {
        let mut state = AppState::new();
        for i in 0..(MAX_LOGS + 25) {
            state.push_log(format!("line {i}"));
        }
        assert_eq!(state.logs.len(), MAX_LOGS);
        assert_eq!(state.logs.front().map(String::as_str), Some("line 25"));
    }
}
