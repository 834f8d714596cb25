//! Launcher login stage machine
//!
//! Scene-driven: from the launcher main menu, open the avatar menu, then
//! react to whatever account state shows up - the login form, an
//! already-logged-in account (log it out first), or the logout
//! confirmation chain - until credentials are submitted and the game
//! client window appears. Every wait is bounded; the distinct terminal
//! outcomes (invalid credentials, client never appeared) are separate
//! error variants because callers must not retry them the same way.

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::accounts::Credentials;
use crate::config::Settings;
use crate::control::{locate_once, sleep_ms, Desktop, Panel, Point, Rect, WindowCache};
use crate::vision::templates::names;
use crate::vision::{SceneClassifier, TemplateStore};

use super::visibility::ensure_launcher_visible;

pub const MAIN_MENU: &str = "main_menu";
pub const LOGIN_MENU: &str = "login_menu";
pub const ACCOUNT_IS_LOGIN: &str = "account_is_login";
pub const ACCOUNT_LOGOUT: &str = "account_logout";
pub const ACCOUNT_LOGOUT_CONFIRM: &str = "account_logout_conf";

/// Why a login attempt ended without launching the game.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LoginError {
    /// The launcher showed its credential-error indicator. Never retry.
    #[error("launcher rejected the credentials")]
    InvalidCredentials,
    /// Credentials were accepted but the client window never appeared.
    #[error("game client window did not appear within {0:?}")]
    GameStartTimeout(Duration),
    /// The avatar menu produced no login/logout/add-account action; the
    /// scene detection is probably off, so do not launch on stale state.
    #[error("no login progress was made after opening the account menu")]
    NoProgress,
    #[error("launcher window is not available")]
    LauncherUnavailable,
    #[error("launcher main menu never appeared")]
    MainMenuNotFound,
    /// A template the flow cannot work without never matched.
    #[error("required template '{0}' not matched on screen")]
    TemplateNotFound(String),
}

/// Drives one login attempt against the launcher.
pub struct LoginFlow<'a> {
    settings: &'a Settings,
    classifier: &'a SceneClassifier,
    templates: &'a mut TemplateStore,
    desktop: &'a mut Desktop,
    launcher: WindowCache,
}

impl<'a> LoginFlow<'a> {
    pub fn new(
        settings: &'a Settings,
        classifier: &'a SceneClassifier,
        templates: &'a mut TemplateStore,
        desktop: &'a mut Desktop,
    ) -> Self {
        let launcher = WindowCache::new(settings.windows.launcher_titles.clone());
        Self {
            settings,
            classifier,
            templates,
            desktop,
            launcher,
        }
    }

    /// Log the account in and wait until the game client window exists.
    pub fn run(&mut self, creds: &Credentials) -> Result<(), LoginError> {
        if !ensure_launcher_visible(self.desktop, &mut self.launcher, Duration::from_secs(3)) {
            return Err(LoginError::LauncherUnavailable);
        }

        if !self.wait_for_scene(MAIN_MENU, 10, 200) {
            warn!("main menu not detected, clicking the avatar and re-checking");
            self.click_relative(self.settings.launcher.avatar);
            sleep_ms(self.settings.launcher.avatar_settle_ms);
            if !self.wait_for_scene(MAIN_MENU, 8, 200) {
                return Err(LoginError::MainMenuNotFound);
            }
        }

        self.click_relative(self.settings.launcher.avatar);
        sleep_ms(self.settings.launcher.avatar_settle_ms);

        let mut made_progress = false;
        for _ in 0..self.settings.launcher.state_loop_ticks {
            let Some(scene) = self.classify_launcher() else {
                sleep_ms(200);
                continue;
            };
            info!("Launcher scene: {}", scene.0);

            match scene.0.as_str() {
                LOGIN_MENU => {
                    self.submit_credentials(creds)?;
                    made_progress = true;
                    break;
                }
                ACCOUNT_IS_LOGIN => {
                    self.logout_current_account()?;
                    made_progress = true;
                }
                ACCOUNT_LOGOUT => {
                    let p = self
                        .find_template(names::DISMISS, Panel::Left)
                        .ok_or_else(|| LoginError::TemplateNotFound(names::DISMISS.into()))?;
                    self.desktop.input.click(p);
                    sleep_ms(self.settings.timings.step_delay_ms);
                    made_progress = true;
                }
                ACCOUNT_LOGOUT_CONFIRM => {
                    if let Some(p) = self.find_template(names::CONTINUE, Panel::Any) {
                        self.desktop.input.click(p);
                    } else {
                        warn!("continue template not found, using the relative fallback");
                        self.click_relative(self.settings.launcher.logout_continue);
                    }
                    sleep_ms(self.settings.timings.step_delay_ms);
                    self.click_relative(self.settings.launcher.add_account);
                    made_progress = true;
                }
                MAIN_MENU => {
                    self.click_relative(self.settings.launcher.avatar);
                    sleep_ms(self.settings.launcher.avatar_settle_ms);
                }
                other => {
                    debug!("ignoring launcher scene {other}");
                    sleep_ms(200);
                }
            }
        }

        if !made_progress {
            // Launching the game on a misdetected scene would silently skip
            // the account; fail the attempt instead.
            return Err(LoginError::NoProgress);
        }

        self.wait_for_scene(MAIN_MENU, 20, 150);
        self.check_play_button_or_error()?;

        // Hover first - the launcher animates the button - then click.
        if let Some(region) = self.launcher_rect() {
            let play = region.at(
                self.settings.launcher.play_button.0,
                self.settings.launcher.play_button.1,
            );
            self.desktop.input.move_to(play);
            sleep_ms(self.settings.launcher.play_hover_ms);
            self.desktop.input.click(play);
            sleep_ms(self.settings.timings.step_delay_ms);
        }

        self.wait_for_game_window()
    }

    fn launcher_rect(&mut self) -> Option<Rect> {
        self.launcher.rect(self.desktop.windows.as_mut())
    }

    fn classify_launcher(&mut self) -> Option<(String, u32)> {
        let region = self.launcher_rect()?;
        let frame = self.desktop.screen.capture(region)?;
        self.classifier
            .classify(&frame)
            .map(|m| (m.scene, m.distance))
    }

    fn wait_for_scene(&mut self, scene: &str, ticks: u32, interval_ms: u64) -> bool {
        for _ in 0..ticks {
            if let Some((current, distance)) = self.classify_launcher() {
                if current == scene {
                    info!("Launcher scene: {scene} (dist={distance})");
                    return true;
                }
            }
            sleep_ms(interval_ms);
        }
        false
    }

    fn click_relative(&mut self, (rx, ry): (f32, f32)) {
        if let Some(region) = self.launcher_rect() {
            let p = region.at(rx, ry);
            self.desktop.input.click(p);
            sleep_ms(self.settings.timings.step_delay_ms);
        }
    }

    /// Locate a launcher UI template through the configured confidence
    /// ladder, restricted to the given panel.
    fn find_template(&mut self, name: &str, panel: Panel) -> Option<Point> {
        let region = self.launcher_rect()?.panel(panel);
        let template = self.templates.get(name)?;
        locate_once(
            self.desktop.screen.as_mut(),
            region,
            template,
            &self.settings.launcher.locate,
        )
    }

    /// Fill and submit the login form, then watch briefly for the
    /// credential-error indicator.
    fn submit_credentials(&mut self, creds: &Credentials) -> Result<(), LoginError> {
        let filled = match self.desktop.forms.as_mut() {
            Some(forms) => forms.fill_login(&creds.email, &creds.password),
            None => false,
        };
        if filled {
            info!("login form filled through the accessibility strategy");
        } else {
            self.fill_field(
                names::EMAIL_FIELD,
                self.settings.launcher.email_field,
                &creds.email,
                "email",
                false,
            );
            self.fill_field(
                names::PASSWORD_FIELD,
                self.settings.launcher.password_field,
                &creds.password,
                "password",
                true,
            );
        }

        if let Some(p) = self.find_template(names::LOGIN_BUTTON, Panel::Any) {
            info!("login button found at ({}, {})", p.x, p.y);
            self.desktop.input.click(p);
        } else {
            warn!("login button template not found, using the relative fallback");
            self.click_relative(self.settings.launcher.login_button);
        }
        sleep_ms(self.settings.timings.step_delay_ms);

        for _ in 0..self.settings.launcher.login_error_checks {
            if self.find_template(names::LOGIN_ERROR, Panel::Any).is_some() {
                warn!("credential-error indicator detected, abandoning the account");
                return Err(LoginError::InvalidCredentials);
            }
            sleep_ms(self.settings.launcher.login_error_interval_ms);
        }
        Ok(())
    }

    fn fill_field(
        &mut self,
        template: &str,
        fallback: (f32, f32),
        text: &str,
        label: &str,
        obscure: bool,
    ) {
        match self.find_template(template, Panel::Any) {
            Some(p) => {
                info!("{label} field found at ({}, {})", p.x, p.y);
                self.desktop.input.click(p);
            }
            None => {
                warn!("{label} field template not found, using the relative fallback");
                self.click_relative(fallback);
            }
        }
        sleep_ms(self.settings.timings.step_delay_ms);
        self.enter_text(text, label, obscure);
    }

    fn enter_text(&mut self, text: &str, label: &str, obscure: bool) {
        let shown = if obscure {
            "*".repeat(text.len())
        } else {
            text.to_string()
        };
        info!("entering {label}: '{shown}' ({} chars)", text.len());
        if !self.desktop.input.paste_text(text) {
            warn!("clipboard entry for {label} unavailable, typing instead");
            self.desktop.input.type_text(text);
        }
        sleep_ms(self.settings.timings.step_delay_ms);
    }

    /// Find and click the logout entry, scrolling the account list a
    /// bounded number of times if it is not in view.
    fn logout_current_account(&mut self) -> Result<(), LoginError> {
        for attempt in 0..self.settings.launcher.max_scroll_tries {
            if let Some(p) = self.find_template(names::LOGOUT, Panel::Left) {
                info!(
                    "logout entry found at ({}, {}) on attempt {}",
                    p.x,
                    p.y,
                    attempt + 1
                );
                self.desktop.input.click(p);
                sleep_ms(self.settings.timings.step_delay_ms);
                return Ok(());
            }
            debug!(
                "logout entry not visible (attempt {}/{}), scrolling the account list",
                attempt + 1,
                self.settings.launcher.max_scroll_tries
            );
            self.hover_avatar_and_scroll();
        }
        Err(LoginError::TemplateNotFound(names::LOGOUT.into()))
    }

    fn hover_avatar_and_scroll(&mut self) {
        let Some(region) = self.launcher_rect() else {
            return;
        };
        let avatar = region.at(
            self.settings.launcher.avatar.0,
            self.settings.launcher.avatar.1,
        );
        self.desktop
            .input
            .move_to(avatar.offset(self.settings.launcher.avatar_scroll_dx, 0));
        self.desktop
            .input
            .scroll(self.settings.launcher.logout_scroll_amount);
        sleep_ms(self.settings.timings.step_delay_ms);
    }

    /// After login, the Play button must show up; if it does not and the
    /// error indicator does, the credentials were bad after all.
    fn check_play_button_or_error(&mut self) -> Result<(), LoginError> {
        let mut play_visible = false;
        for _ in 0..self.settings.launcher.play_button_checks {
            if self.find_template(names::PLAY_BUTTON, Panel::Any).is_some() {
                play_visible = true;
                break;
            }
            sleep_ms(self.settings.launcher.login_error_interval_ms);
        }
        if !play_visible {
            for _ in 0..self.settings.launcher.login_error_checks {
                if self.find_template(names::LOGIN_ERROR, Panel::Any).is_some() {
                    warn!("no Play button and a credential error is showing");
                    return Err(LoginError::InvalidCredentials);
                }
                sleep_ms(self.settings.launcher.login_error_interval_ms);
            }
        }
        Ok(())
    }

    fn wait_for_game_window(&mut self) -> Result<(), LoginError> {
        let timeout = Duration::from_millis(self.settings.launcher.game_window_timeout_ms);
        let deadline = Instant::now() + timeout;
        let mut client = WindowCache::new(self.settings.windows.client_titles.clone());
        loop {
            if client.resolve(self.desktop.windows.as_mut()).is_some() {
                info!("game client window detected");
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!("game client window never appeared");
                return Err(LoginError::GameStartTimeout(timeout));
            }
            sleep_ms(self.settings.launcher.game_window_interval_ms);
        }
    }
}
