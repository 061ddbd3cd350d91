use scoutlay_terminal::state::{
    AppState, Delta, DetailTicket, FetchState, Match, MatchFilter, MatchStatus, ProviderCommand,
    Score, Side, TeamRef, TeamStats, apply_delta,
};

fn sample(id: &str, raw_status: &str) -> Match {
    Match {
        id: id.to_string(),
        competition: None,
        home: TeamRef {
            id: Some(format!("{id}-h")),
            name: format!("Home {id}"),
        },
        away: TeamRef {
            id: Some(format!("{id}-a")),
            name: format!("Away {id}"),
        },
        kickoff: None,
        status: MatchStatus::from_raw(raw_status),
        score: Score::default(),
        live: None,
        strategies: Vec::new(),
    }
}

fn stats(avg: f64) -> TeamStats {
    TeamStats {
        last5: Some(avg),
        last10: Some(avg),
        season: Some(avg),
    }
}

fn board_with(matches: Vec<Match>) -> AppState {
    let mut state = AppState::new();
    apply_delta(&mut state, Delta::SetMatches(matches));
    state
}

fn stats_tickets(commands: &[ProviderCommand]) -> Vec<(DetailTicket, Side, String)> {
    commands
        .iter()
        .filter_map(|cmd| match cmd {
            ProviderCommand::FetchTeamStats {
                ticket,
                side,
                team_id,
            } => Some((ticket.clone(), *side, team_id.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn refresh_replaces_list_wholesale() {
    let mut state = board_with(vec![sample("a", "LIVE"), sample("b", "LIVE")]);
    apply_delta(
        &mut state,
        Delta::SetMatches(vec![sample("c", "LIVE"), sample("d", "TIMED")]),
    );
    let ids: Vec<&str> = state.filtered_matches().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["c", "d"]);
    assert_eq!(state.refresh_count, 2);
    assert!(state.last_refresh.is_some());
}

#[test]
fn fetch_failure_keeps_previous_matches() {
    let mut state = board_with(vec![sample("a", "LIVE")]);
    apply_delta(&mut state, Delta::FetchFailed("http 502: upstream down".to_string()));
    assert_eq!(state.matches.len(), 1);
    assert_eq!(state.error_banner.as_deref(), Some("http 502: upstream down"));
    assert!(state.logs.iter().any(|l| l.starts_with("[WARN]")));

    state.dismiss_error();
    assert!(state.error_banner.is_none());
}

#[test]
fn successful_refresh_clears_error_banner() {
    let mut state = board_with(vec![sample("a", "LIVE")]);
    apply_delta(&mut state, Delta::FetchFailed("timeout".to_string()));
    apply_delta(&mut state, Delta::SetMatches(vec![sample("a", "LIVE")]));
    assert!(state.error_banner.is_none());
}

#[test]
fn toggling_same_match_twice_collapses() {
    let mut state = board_with(vec![sample("a", "LIVE"), sample("b", "LIVE")]);
    state.toggle_expanded("a");
    assert_eq!(state.expanded_id(), Some("a"));
    state.toggle_expanded("a");
    assert_eq!(state.expanded_id(), None);
}

#[test]
fn expanding_another_match_replaces_the_panel() {
    let mut state = board_with(vec![sample("a", "LIVE"), sample("b", "LIVE")]);
    state.toggle_expanded("a");
    state.toggle_expanded("b");
    assert_eq!(state.expanded_id(), Some("b"));
    let panel = state.detail.as_ref().expect("panel open");
    assert_eq!(panel.home_team.name, "Home b");
}

#[test]
fn expansion_queues_home_and_away_stats_fetches() {
    let mut state = board_with(vec![sample("a", "LIVE")]);
    state.toggle_expanded("a");

    let panel = state.detail.as_ref().expect("panel open");
    assert!(panel.home.is_loading());
    assert!(panel.away.is_loading());

    let fetches = stats_tickets(&state.take_commands());
    assert_eq!(fetches.len(), 2);
    assert_eq!(fetches[0].1, Side::Home);
    assert_eq!(fetches[0].2, "a-h");
    assert_eq!(fetches[1].1, Side::Away);
    assert_eq!(fetches[1].2, "a-a");
    assert!(state.take_commands().is_empty());
}

#[test]
fn team_without_id_fails_without_fetching() {
    let mut m = sample("a", "LIVE");
    m.away.id = None;
    let mut state = board_with(vec![m]);
    state.toggle_expanded("a");

    let fetches = stats_tickets(&state.take_commands());
    assert_eq!(fetches.len(), 1);
    let panel = state.detail.as_ref().expect("panel open");
    assert!(matches!(panel.away, FetchState::Failed(_)));
}

#[test]
fn stats_apply_to_the_open_panel() {
    let mut state = board_with(vec![sample("a", "LIVE")]);
    state.toggle_expanded("a");
    let fetches = stats_tickets(&state.take_commands());

    apply_delta(
        &mut state,
        Delta::SetTeamStats {
            ticket: fetches[0].0.clone(),
            side: Side::Home,
            result: Ok(stats(1.5)),
        },
    );
    let panel = state.detail.as_ref().expect("panel open");
    assert_eq!(panel.home.loaded(), Some(&stats(1.5)));
    assert!(panel.away.is_loading());

    apply_delta(
        &mut state,
        Delta::SetTeamStats {
            ticket: fetches[1].0.clone(),
            side: Side::Away,
            result: Err("http 404".to_string()),
        },
    );
    let panel = state.detail.as_ref().expect("panel open");
    assert_eq!(panel.away, FetchState::Failed("http 404".to_string()));
    assert!(!panel.is_loading());
}

#[test]
fn late_stats_after_collapse_are_dropped() {
    let mut state = board_with(vec![sample("a", "LIVE")]);
    state.toggle_expanded("a");
    let fetches = stats_tickets(&state.take_commands());
    state.collapse();

    apply_delta(
        &mut state,
        Delta::SetTeamStats {
            ticket: fetches[0].0.clone(),
            side: Side::Home,
            result: Ok(stats(2.0)),
        },
    );
    assert!(state.detail.is_none());
    assert!(state.logs.iter().any(|l| l.contains("stale")));
}

#[test]
fn late_stats_after_refresh_do_not_reach_the_new_panel() {
    let mut state = board_with(vec![sample("a", "LIVE")]);
    state.toggle_expanded("a");
    let old = stats_tickets(&state.take_commands());

    apply_delta(&mut state, Delta::SetMatches(vec![sample("a", "LIVE")]));
    assert_eq!(state.expanded_id(), Some("a"));
    let new = stats_tickets(&state.take_commands());
    assert_eq!(new.len(), 2);
    assert_ne!(old[0].0, new[0].0);

    apply_delta(
        &mut state,
        Delta::SetTeamStats {
            ticket: old[0].0.clone(),
            side: Side::Home,
            result: Ok(stats(9.9)),
        },
    );
    let panel = state.detail.as_ref().expect("panel reopened");
    assert!(panel.home.is_loading());

    apply_delta(
        &mut state,
        Delta::SetTeamStats {
            ticket: new[0].0.clone(),
            side: Side::Home,
            result: Ok(stats(1.0)),
        },
    );
    let panel = state.detail.as_ref().expect("panel reopened");
    assert_eq!(panel.home.loaded(), Some(&stats(1.0)));
}

#[test]
fn late_stats_after_reexpanding_same_match_are_dropped() {
    let mut state = board_with(vec![sample("a", "LIVE"), sample("b", "LIVE")]);
    state.toggle_expanded("a");
    let first = stats_tickets(&state.take_commands());
    state.toggle_expanded("a");
    state.toggle_expanded("a");
    let _ = state.take_commands();

    apply_delta(
        &mut state,
        Delta::SetTeamStats {
            ticket: first[0].0.clone(),
            side: Side::Home,
            result: Ok(stats(3.0)),
        },
    );
    let panel = state.detail.as_ref().expect("panel open");
    assert!(panel.home.is_loading());
}

#[test]
fn refresh_without_expanded_match_closes_panel() {
    let mut state = board_with(vec![sample("a", "LIVE"), sample("b", "LIVE")]);
    state.toggle_expanded("a");
    let _ = state.take_commands();

    apply_delta(&mut state, Delta::SetMatches(vec![sample("b", "LIVE")]));
    assert!(state.detail.is_none());
    assert!(state.take_commands().is_empty());
}

#[test]
fn selection_follows_match_across_refresh() {
    let mut state = board_with(vec![sample("a", "LIVE"), sample("b", "LIVE"), sample("c", "LIVE")]);
    state.select_next();
    state.select_next();
    assert_eq!(state.selected_match().map(|m| m.id.as_str()), Some("c"));

    apply_delta(
        &mut state,
        Delta::SetMatches(vec![sample("c", "LIVE"), sample("a", "LIVE")]),
    );
    assert_eq!(state.selected_match().map(|m| m.id.as_str()), Some("c"));
    assert_eq!(state.selected, 0);
}

#[test]
fn selection_is_clamped_when_list_shrinks() {
    let mut state = board_with(vec![sample("a", "LIVE"), sample("b", "LIVE"), sample("c", "LIVE")]);
    state.select_prev();
    assert_eq!(state.selected, 2);
    apply_delta(&mut state, Delta::SetMatches(vec![sample("x", "LIVE")]));
    assert_eq!(state.selected, 0);
}

#[test]
fn filter_change_keeps_cursor_on_visible_match() {
    let mut state = board_with(vec![sample("a", "TIMED"), sample("b", "LIVE")]);
    state.select_next();
    state.set_filter(MatchFilter::Live);
    assert_eq!(state.selected_match().map(|m| m.id.as_str()), Some("b"));

    state.set_filter(MatchFilter::Scheduled);
    assert_eq!(state.selected_match().map(|m| m.id.as_str()), Some("a"));
}

#[test]
fn toggle_selected_uses_filtered_row() {
    let mut state = board_with(vec![sample("a", "TIMED"), sample("b", "LIVE")]);
    state.set_filter(MatchFilter::Live);
    state.toggle_selected();
    assert_eq!(state.expanded_id(), Some("b"));
}

#[test]
fn toggle_on_empty_board_is_a_no_op() {
    let mut state = AppState::new();
    state.toggle_selected();
    assert!(state.detail.is_none());
    assert!(state.take_commands().is_empty());
}
