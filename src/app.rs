use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};

use crossterm::event::{KeyCode, KeyEvent};

use crate::config::{AppConfig, missing_base_warning};
use crate::feed::{MatchSource, ProviderHandle, ProviderOptions, spawn_provider};
use crate::scout_fetch::ApiClient;
use crate::state::{self, AppState, MatchFilter, ProviderCommand, apply_delta};

pub struct App {
    pub state: AppState,
    pub should_quit: bool,
    provider: Option<ProviderHandle>,
    rx: Option<Receiver<state::Delta>>,
}

impl App {
    /// Starts polling when an API base is configured; otherwise the board
    /// comes up empty with a configuration warning and never fetches.
    pub fn start(config: &AppConfig) -> Self {
        let Some(base) = config.api_base.as_deref() else {
            return Self::offline(missing_base_warning());
        };
        match ApiClient::new(base, config.request_timeout) {
            Ok(client) => {
                let mut app = Self::with_source(Arc::new(client), ProviderOptions::from_config(config));
                app.state
                    .push_log(format!("[INFO] Polling {base} every {}s", config.poll_interval.as_secs()));
                app
            }
            Err(err) => Self::offline(format!("{err:#}")),
        }
    }

    pub fn with_source<S>(source: Arc<S>, options: ProviderOptions) -> Self
    where
        S: MatchSource + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let provider = spawn_provider(source, options, tx);
        Self {
            state: AppState::new(),
            should_quit: false,
            provider: Some(provider),
            rx: Some(rx),
        }
    }

    pub fn offline(warning: String) -> Self {
        tracing::warn!(%warning, "polling disabled");
        let mut state = AppState::new();
        state.push_log(format!("[WARN] {warning}"));
        state.config_warning = Some(warning);
        Self {
            state,
            should_quit: false,
            provider: None,
            rx: None,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.provider.as_ref().is_some_and(ProviderHandle::is_running)
    }

    /// Applies every pending delta and forwards the commands they (or key
    /// presses) queued. Returns how many deltas were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        if let Some(rx) = &self.rx {
            while let Ok(delta) = rx.try_recv() {
                apply_delta(&mut self.state, delta);
                applied += 1;
            }
        }
        self.flush_commands();
        applied
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Enter | KeyCode::Char(' ') => self.state.toggle_selected(),
            KeyCode::Esc => self.state.collapse(),
            KeyCode::Char('f') | KeyCode::Tab => self.state.cycle_filter(),
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                self.state.set_filter(MatchFilter::ALL[idx]);
            }
            KeyCode::Char('r') => self.request_refresh(),
            KeyCode::Char('x') => self.state.dismiss_error(),
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            _ => {}
        }
        self.flush_commands();
    }

    pub fn shutdown(&mut self) {
        if let Some(mut provider) = self.provider.take() {
            provider.stop();
        }
        self.rx = None;
    }

    fn request_refresh(&mut self) {
        let Some(provider) = &self.provider else {
            self.state.push_log("[INFO] Refresh unavailable");
            return;
        };
        if provider.send(ProviderCommand::RefreshNow) {
            self.state.push_log("[INFO] Refresh requested");
        } else {
            self.state.push_log("[WARN] Refresh request failed");
        }
    }

    fn flush_commands(&mut self) {
        let commands = self.state.take_commands();
        let Some(provider) = &self.provider else {
            return;
        };
        for cmd in commands {
            if !provider.send(cmd) {
                self.state.push_log("[WARN] Provider unavailable");
                break;
            }
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}
