//! Application state and types for the TUI
//!
//! Holds the reader document, the selection model, the tooltip overlay
//! state machine, the settings form, and the debounce timers. Everything
//! here is synchronous and side-effect free towards the coordinator:
//! handlers queue [`CoordinatorInput`]s in `actions`, and the run loop in
//! `mod.rs` drains and sends them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{
    Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton,
    MouseEvent, MouseEventKind,
};
use ratatui::layout::Rect;
use tracing::debug;
use tui_input::{Input, InputRequest};

use glosspeek_core::provider::catalog;
use glosspeek_core::{
    CUSTOM_MODEL_SENTINEL, CoordinatorInput, CoordinatorOutput, ModelDescriptor,
    PinnedTranslation, Settings, SettingsPatch, SettingsStore, TranslationResult,
};

/// Debounce window for selection events and discovery re-triggers.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(1000);

/// Selections at or past this many characters are silently ignored, to
/// avoid translating accidental whole-page selections.
pub const MAX_SELECTION_LEN: usize = 500;

/// How long a status flash stays visible.
const FLASH_DURATION: Duration = Duration::from_millis(1500);

/// Model id used when the custom field is left empty on save.
const EMPTY_CUSTOM_FALLBACK: &str = "gpt-3.5-turbo";

/// Single-slot debounce timer: arming replaces any pending deadline, so
/// only the most recent event within the window fires.
#[derive(Debug)]
pub struct DebounceSlot {
    window: Duration,
    deadline: Option<Instant>,
}

impl DebounceSlot {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// True exactly once, when the pending deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// A position in the document, (line, character) in document coordinates.
pub type Pos = (usize, usize);

/// A selected span. `head` follows the cursor; endpoints are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Pos,
    pub head: Pos,
}

impl Selection {
    pub fn caret(pos: Pos) -> Self {
        Self {
            anchor: pos,
            head: pos,
        }
    }

    pub fn is_caret(&self) -> bool {
        self.anchor == self.head
    }

    /// Ordered (start, end) endpoints, both inclusive.
    pub fn normalized(&self) -> (Pos, Pos) {
        if self.anchor <= self.head {
            (self.anchor, self.head)
        } else {
            (self.head, self.anchor)
        }
    }

    /// Extract the selected text from the document lines.
    pub fn extract(&self, lines: &[String]) -> String {
        let ((start_line, start_col), (end_line, end_col)) = self.normalized();
        if start_line >= lines.len() {
            return String::new();
        }
        let end_line = end_line.min(lines.len() - 1);

        if start_line == end_line {
            return slice_chars(&lines[start_line], start_col, Some(end_col));
        }

        let mut parts = vec![slice_chars(&lines[start_line], start_col, None)];
        for line in &lines[start_line + 1..end_line] {
            parts.push(line.clone());
        }
        parts.push(slice_chars(&lines[end_line], 0, Some(end_col)));
        parts.join("\n")
    }
}

/// Characters `from..=to` of a line, clamped to its length.
fn slice_chars(line: &str, from: usize, to: Option<usize>) -> String {
    let chars = line.chars();
    match to {
        Some(to) if to >= from => chars.skip(from).take(to - from + 1).collect(),
        Some(_) => String::new(),
        None => chars.skip(from).collect(),
    }
}

/// The text being read, with cursor and vertical scroll.
pub struct Document {
    pub lines: Vec<String>,
    pub cursor: Pos,
    pub scroll: usize,
}

impl Document {
    pub fn new(text: &str) -> Self {
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        if lines.is_empty() {
            lines.push(String::new());
        }
        Self {
            lines,
            cursor: (0, 0),
            scroll: 0,
        }
    }

    pub fn line_len(&self, line: usize) -> usize {
        self.lines.get(line).map(|l| l.chars().count()).unwrap_or(0)
    }

    pub fn move_cursor(&mut self, d_line: isize, d_col: isize) {
        let (line, col) = self.cursor;
        let line = line.saturating_add_signed(d_line).min(self.lines.len() - 1);
        let max_col = self.line_len(line).saturating_sub(1);
        let col = col.saturating_add_signed(d_col).min(max_col);
        self.cursor = (line, col);
    }

    /// Keep the cursor line within the visible window of `height` rows.
    pub fn scroll_to_cursor(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.cursor.0 < self.scroll {
            self.scroll = self.cursor.0;
        } else if self.cursor.0 >= self.scroll + height {
            self.scroll = self.cursor.0 + 1 - height;
        }
    }
}

/// Tooltip overlay lifecycle. Idle means no tooltip; a translation request
/// in flight is `Awaiting` and carries the sequence number responses must
/// match to be rendered.
#[derive(Debug, Clone)]
pub enum Overlay {
    Idle,
    Awaiting { seq: u64 },
    Result { result: TranslationResult, pinned: bool },
    Error(String),
}

impl Overlay {
    pub fn is_idle(&self) -> bool {
        matches!(self, Overlay::Idle)
    }
}

/// Which screen is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Reader,
    Settings,
}

/// Focusable fields of the settings form, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Provider,
    BaseUrl,
    ApiKey,
    Language,
    Model,
    CustomModel,
    Pins,
}

const FIELD_ORDER: [FormField; 7] = [
    FormField::Provider,
    FormField::BaseUrl,
    FormField::ApiKey,
    FormField::Language,
    FormField::Model,
    FormField::CustomModel,
    FormField::Pins,
];

/// Settings form state. The model list always ends with a virtual
/// "Custom Model" entry at index `models.len()`.
pub struct SettingsForm {
    pub focus: FormField,
    /// Index into `catalog::all()`, or `catalog::all().len()` for custom.
    pub provider_idx: usize,
    pub base_url: Input,
    pub api_key: Input,
    pub language: Input,
    pub models: Vec<ModelDescriptor>,
    pub model_idx: usize,
    pub custom_model: Input,
    pub models_loading: bool,
    pub discovery_debounce: DebounceSlot,
    pub pin_idx: usize,
}

impl SettingsForm {
    fn from_stored(stored: &glosspeek_core::StoredSettings) -> Self {
        let providers = catalog::all();
        let provider_id = catalog::match_provider(&stored.base_url);
        let provider_idx = providers
            .iter()
            .position(|p| p.id == provider_id)
            .unwrap_or(providers.len());

        let mut form = Self {
            focus: FormField::Provider,
            provider_idx,
            base_url: Input::new(stored.base_url.clone()),
            api_key: Input::new(stored.api_key.clone()),
            language: Input::new(stored.target_language.clone()),
            models: catalog::fallback_models().to_vec(),
            model_idx: 0,
            custom_model: Input::new(stored.custom_model.clone()),
            models_loading: false,
            discovery_debounce: DebounceSlot::new(DEBOUNCE_WINDOW),
            pin_idx: 0,
        };
        if stored.model == CUSTOM_MODEL_SENTINEL {
            form.model_idx = form.models.len();
        } else {
            form.select_model(&stored.model);
        }
        form
    }

    /// Whether the virtual "Custom Model" entry is selected.
    pub fn custom_selected(&self) -> bool {
        self.model_idx >= self.models.len()
    }

    /// Select `desired` in the model list, falling back to the custom
    /// entry with the id preloaded when the list does not carry it.
    fn select_model(&mut self, desired: &str) {
        match self.models.iter().position(|m| m.id == desired) {
            Some(idx) => self.model_idx = idx,
            None => {
                self.model_idx = self.models.len();
                self.custom_model = Input::new(desired.to_string());
            }
        }
    }

    /// Replace the model list, keeping the current choice when possible.
    pub fn set_models(&mut self, models: Vec<ModelDescriptor>) {
        let desired = if self.custom_selected() {
            None
        } else {
            self.models.get(self.model_idx).map(|m| m.id.clone())
        };
        self.models = models;
        self.models_loading = false;
        match desired {
            Some(id) => self.select_model(&id),
            None => self.model_idx = self.models.len(),
        }
    }

    fn focus_next(&mut self) {
        let idx = FIELD_ORDER.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = FIELD_ORDER[(idx + 1) % FIELD_ORDER.len()];
    }

    fn focus_prev(&mut self) {
        let idx = FIELD_ORDER.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = FIELD_ORDER[(idx + FIELD_ORDER.len() - 1) % FIELD_ORDER.len()];
    }

    fn focused_input(&mut self) -> Option<&mut Input> {
        match self.focus {
            FormField::BaseUrl => Some(&mut self.base_url),
            FormField::ApiKey => Some(&mut self.api_key),
            FormField::Language => Some(&mut self.language),
            FormField::CustomModel => Some(&mut self.custom_model),
            _ => None,
        }
    }
}

/// Main TUI application
pub struct App {
    pub screen: Screen,
    pub doc: Document,
    /// Keyboard visual-selection mode
    pub selecting: bool,
    pub selection: Option<Selection>,
    /// Span kept highlighted while a tooltip is showing
    pub highlight: Option<Selection>,
    pub overlay: Overlay,
    pub enabled: bool,
    pub settings: Settings,
    pub form: SettingsForm,
    pub pins: Vec<PinnedTranslation>,
    pub select_debounce: DebounceSlot,
    pub status_flash: Option<(String, Instant)>,
    pub should_quit: bool,
    /// Reader pane in screen coordinates, updated by draw
    pub reader_area: Rect,
    /// Tooltip rect in screen coordinates, updated by draw
    pub tooltip_area: Option<Rect>,
    /// Document title shown in the status bar
    pub title: String,
    next_seq: u64,
    last_seq: u64,
    actions: Vec<CoordinatorInput>,
    store: Arc<SettingsStore>,
}

impl App {
    pub fn new(title: impl Into<String>, text: &str, store: Arc<SettingsStore>) -> Self {
        let stored = store.get();
        Self {
            screen: Screen::Reader,
            doc: Document::new(text),
            selecting: false,
            selection: None,
            highlight: None,
            overlay: Overlay::Idle,
            enabled: stored.enabled,
            settings: stored.settings(),
            form: SettingsForm::from_stored(&stored),
            pins: stored.pinned_translations.clone(),
            select_debounce: DebounceSlot::new(DEBOUNCE_WINDOW),
            status_flash: None,
            should_quit: false,
            reader_area: Rect::default(),
            tooltip_area: None,
            title: title.into(),
            next_seq: 0,
            last_seq: 0,
            actions: Vec::new(),
            store,
        }
    }

    /// Take the coordinator inputs queued since the last drain.
    pub fn drain_actions(&mut self) -> Vec<CoordinatorInput> {
        std::mem::take(&mut self.actions)
    }

    pub fn flash(&mut self, message: impl Into<String>, now: Instant) {
        self.status_flash = Some((message.into(), now));
    }

    // ----- event entry points -------------------------------------------

    pub fn handle_terminal(&mut self, event: CrosstermEvent, now: Instant) {
        match event {
            CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => {
                self.on_key(key, now)
            }
            CrosstermEvent::Mouse(mouse) => self.on_mouse(mouse, now),
            _ => {}
        }
    }

    /// Periodic tick: fires due debounce slots and expires the flash.
    pub fn tick(&mut self, now: Instant) {
        if self.select_debounce.fire(now) {
            self.check_selection();
        }
        if self.screen == Screen::Settings && self.form.discovery_debounce.fire(now) {
            self.start_discovery();
        }
        if let Some((_, since)) = self.status_flash {
            if now.duration_since(since) >= FLASH_DURATION {
                self.status_flash = None;
            }
        }
    }

    pub fn handle_output(&mut self, output: CoordinatorOutput) {
        match output {
            CoordinatorOutput::UpdateState { enabled, settings } => {
                self.enabled = enabled;
                self.settings = settings;
                if !enabled {
                    // Tooltip and pending selection handling go away with
                    // the toggle.
                    self.close_tooltip();
                    self.selection = None;
                    self.selecting = false;
                    self.select_debounce.cancel();
                }
            }
            CoordinatorOutput::Translation { seq, result } => {
                if seq != self.last_seq {
                    debug!(seq, latest = self.last_seq, "dropping stale translation");
                    return;
                }
                self.highlight = self.selection.clone();
                self.overlay = Overlay::Result {
                    result,
                    pinned: false,
                };
            }
            CoordinatorOutput::TranslationFailed { seq, error } => {
                if seq != self.last_seq {
                    debug!(seq, latest = self.last_seq, "dropping stale translation error");
                    return;
                }
                self.overlay = Overlay::Error(error);
            }
            CoordinatorOutput::PinSaved { success } => {
                if success {
                    if let Overlay::Result { pinned, .. } = &mut self.overlay {
                        *pinned = true;
                    }
                    self.pins = self.store.get().pinned_translations;
                }
            }
            CoordinatorOutput::Models { models } => {
                self.form.set_models(models);
            }
            CoordinatorOutput::ModelsFailed { error } => {
                // Discovery failure never blocks the form; fall back to the
                // static list.
                self.form.set_models(catalog::fallback_models().to_vec());
                self.flash(format!("Model discovery failed: {error}"), Instant::now());
            }
        }
    }

    // ----- keys ----------------------------------------------------------

    fn on_key(&mut self, key: KeyEvent, now: Instant) {
        // Global bindings first: quit and the enable/disable shortcut.
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => {
                    self.should_quit = true;
                    return;
                }
                KeyCode::Char('t') => {
                    self.actions.push(CoordinatorInput::toggle(!self.enabled));
                    return;
                }
                _ => {}
            }
        }
        match self.screen {
            Screen::Reader => self.reader_key(key, now),
            Screen::Settings => self.settings_key(key, now),
        }
    }

    fn reader_key(&mut self, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('s') => self.open_settings(),
            KeyCode::Char('v') => {
                self.selecting = !self.selecting;
                if self.selecting {
                    self.selection = Some(Selection::caret(self.doc.cursor));
                    self.note_selection_event(now);
                }
            }
            KeyCode::Char('p') => self.pin_current(),
            KeyCode::Esc => {
                self.selecting = false;
                self.selection = None;
                self.close_tooltip();
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_and_select(-1, 0, now),
            KeyCode::Down | KeyCode::Char('j') => self.move_and_select(1, 0, now),
            KeyCode::Left | KeyCode::Char('h') => self.move_and_select(0, -1, now),
            KeyCode::Right | KeyCode::Char('l') => self.move_and_select(0, 1, now),
            KeyCode::PageUp => {
                let page = self.reader_area.height.max(1) as isize;
                self.move_and_select(-page, 0, now);
            }
            KeyCode::PageDown => {
                let page = self.reader_area.height.max(1) as isize;
                self.move_and_select(page, 0, now);
            }
            _ => {}
        }
    }

    /// Cursor movement; in visual mode every movement is a key-up
    /// selection event and restarts the debounce.
    fn move_and_select(&mut self, d_line: isize, d_col: isize, now: Instant) {
        self.doc.move_cursor(d_line, d_col);
        if self.selecting {
            if let Some(selection) = &mut self.selection {
                selection.head = self.doc.cursor;
            } else {
                self.selection = Some(Selection::caret(self.doc.cursor));
            }
            self.note_selection_event(now);
        }
    }

    fn settings_key(&mut self, key: KeyEvent, now: Instant) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
            self.save_settings(now);
            return;
        }
        match key.code {
            KeyCode::Esc => self.screen = Screen::Reader,
            KeyCode::Tab => self.form.focus_next(),
            KeyCode::BackTab => self.form.focus_prev(),
            KeyCode::Enter => self.save_settings(now),
            _ => match self.form.focus {
                FormField::Provider => self.provider_key(key),
                FormField::Model => match key.code {
                    KeyCode::Up => self.form.model_idx = self.form.model_idx.saturating_sub(1),
                    KeyCode::Down => {
                        // One past the list is the virtual custom entry
                        self.form.model_idx = (self.form.model_idx + 1).min(self.form.models.len());
                    }
                    _ => {}
                },
                FormField::Pins => self.pins_key(key),
                _ => self.edit_focused_input(key, now),
            },
        }
    }

    fn provider_key(&mut self, key: KeyEvent) {
        let providers = catalog::all();
        let before = self.form.provider_idx;
        match key.code {
            KeyCode::Up => self.form.provider_idx = self.form.provider_idx.saturating_sub(1),
            KeyCode::Down => {
                // One past the catalog is "custom"
                self.form.provider_idx = (self.form.provider_idx + 1).min(providers.len());
            }
            _ => return,
        }
        if self.form.provider_idx == before {
            return;
        }
        if let Some(provider) = providers.get(self.form.provider_idx) {
            self.form.base_url = Input::new(provider.base_url.clone());
            // Known provider picked: refresh the model list right away when
            // a key is available.
            if !self.form.api_key.value().trim().is_empty() {
                self.start_discovery();
            }
        } else {
            self.form.base_url = Input::new(String::new());
        }
    }

    fn pins_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.form.pin_idx = self.form.pin_idx.saturating_sub(1),
            KeyCode::Down => {
                if !self.pins.is_empty() {
                    self.form.pin_idx = (self.form.pin_idx + 1).min(self.pins.len() - 1);
                }
            }
            KeyCode::Char('d') => {
                let idx = self.form.pin_idx;
                if idx < self.pins.len() {
                    if let Err(e) = self.store.update(|s| {
                        s.remove_pin(idx);
                    }) {
                        debug!("failed to remove pin: {e}");
                    }
                    self.pins = self.store.get().pinned_translations;
                    if self.form.pin_idx >= self.pins.len() {
                        self.form.pin_idx = self.pins.len().saturating_sub(1);
                    }
                }
            }
            _ => {}
        }
    }

    /// Route a key into the focused text field. Edits to the base URL or
    /// API key re-arm the discovery debounce.
    fn edit_focused_input(&mut self, key: KeyEvent, now: Instant) {
        let watched = matches!(self.form.focus, FormField::BaseUrl | FormField::ApiKey);
        let Some(input) = self.form.focused_input() else {
            return;
        };
        let request = match key.code {
            KeyCode::Char(c) => Some(InputRequest::InsertChar(c)),
            KeyCode::Backspace => Some(InputRequest::DeletePrevChar),
            KeyCode::Delete => Some(InputRequest::DeleteNextChar),
            KeyCode::Left => Some(InputRequest::GoToPrevChar),
            KeyCode::Right => Some(InputRequest::GoToNextChar),
            KeyCode::Home => Some(InputRequest::GoToStart),
            KeyCode::End => Some(InputRequest::GoToEnd),
            _ => None,
        };
        let Some(request) = request else { return };
        let changed = input.handle(request).is_some();
        if changed && watched {
            self.form.discovery_debounce.arm(now);
        }
    }

    // ----- mouse ---------------------------------------------------------

    fn on_mouse(&mut self, mouse: MouseEvent, now: Instant) {
        if self.screen != Screen::Reader {
            return;
        }
        // Clicks on the tooltip itself are not selection events.
        if let Some(area) = self.tooltip_area {
            if contains(area, mouse.column, mouse.row) {
                return;
            }
        }
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(pos) = self.pos_from_screen(mouse.column, mouse.row) {
                    self.doc.cursor = pos;
                    self.selecting = false;
                    self.selection = Some(Selection::caret(pos));
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(pos) = self.pos_from_screen(mouse.column, mouse.row) {
                    self.doc.cursor = pos;
                    if let Some(selection) = &mut self.selection {
                        selection.head = pos;
                    }
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                // A plain click leaves no selection; the debounce check then
                // closes any open tooltip.
                if self.selection.as_ref().is_some_and(Selection::is_caret) {
                    self.selection = None;
                }
                self.note_selection_event(now);
            }
            MouseEventKind::ScrollUp => self.doc.scroll = self.doc.scroll.saturating_sub(3),
            MouseEventKind::ScrollDown => {
                self.doc.scroll =
                    (self.doc.scroll + 3).min(self.doc.lines.len().saturating_sub(1));
            }
            _ => {}
        }
    }

    fn pos_from_screen(&self, column: u16, row: u16) -> Option<Pos> {
        let area = self.reader_area;
        if !contains(area, column, row) {
            return None;
        }
        let line = (row - area.y) as usize + self.doc.scroll;
        let line = line.min(self.doc.lines.len() - 1);
        let col = (column - area.x) as usize;
        let col = col.min(self.doc.line_len(line).saturating_sub(1));
        Some((line, col))
    }

    // ----- selection / overlay flow --------------------------------------

    /// Register a selection event (pointer-up or key-up). Ignored while
    /// disabled; otherwise restarts the debounce window.
    pub fn note_selection_event(&mut self, now: Instant) {
        if !self.enabled {
            debug!("selection ignored, glosspeek disabled");
            return;
        }
        self.select_debounce.arm(now);
    }

    /// Runs when the debounce fires: inspect the current selection and
    /// decide whether to issue a translation request.
    fn check_selection(&mut self) {
        if !self.enabled {
            return;
        }
        let text = match &self.selection {
            Some(selection) => selection.extract(&self.doc.lines).trim().to_string(),
            None => String::new(),
        };
        if text.is_empty() {
            self.close_tooltip();
            return;
        }
        if text.chars().count() >= MAX_SELECTION_LEN {
            debug!(len = text.chars().count(), "selection too long, ignoring");
            return;
        }
        if self.settings.api_key.is_empty() {
            self.overlay =
                Overlay::Error("API key is missing. Press s and set it in settings.".to_string());
            return;
        }

        self.next_seq += 1;
        self.last_seq = self.next_seq;
        self.overlay = Overlay::Awaiting { seq: self.last_seq };
        self.actions
            .push(CoordinatorInput::translate(self.last_seq, text));
    }

    fn pin_current(&mut self) {
        if let Overlay::Result { result, pinned } = &self.overlay {
            if *pinned {
                return;
            }
            let pin = PinnedTranslation::new(
                result.original_text.clone(),
                result.translation.clone(),
                result.pin_context(),
                result.model.clone(),
            );
            self.actions.push(CoordinatorInput::pin(pin));
        }
    }

    fn close_tooltip(&mut self) {
        self.overlay = Overlay::Idle;
        self.highlight = None;
        self.tooltip_area = None;
    }

    // ----- settings flow --------------------------------------------------

    fn open_settings(&mut self) {
        let stored = self.store.get();
        self.form = SettingsForm::from_stored(&stored);
        self.pins = stored.pinned_translations;
        self.screen = Screen::Settings;
        // With credentials on file, ask the provider; otherwise the static
        // fallback list from the catalog stays.
        if !stored.api_key.is_empty() && !stored.base_url.is_empty() {
            self.start_discovery();
        }
    }

    fn start_discovery(&mut self) {
        let base_url = self.form.base_url.value().trim().to_string();
        let api_key = self.form.api_key.value().trim().to_string();
        if base_url.is_empty() || api_key.is_empty() {
            return;
        }
        self.form.models_loading = true;
        self.actions
            .push(CoordinatorInput::fetch_models(base_url, api_key));
    }

    fn save_settings(&mut self, now: Instant) {
        let (raw_model, resolved) = if self.form.custom_selected() {
            let custom = self.form.custom_model.value().trim();
            let resolved = if custom.is_empty() {
                EMPTY_CUSTOM_FALLBACK.to_string()
            } else {
                custom.to_string()
            };
            (CUSTOM_MODEL_SENTINEL.to_string(), resolved)
        } else {
            let id = self.form.models[self.form.model_idx].id.clone();
            (id.clone(), id)
        };

        let patch = SettingsPatch {
            target_language: Some(self.form.language.value().trim().to_string()),
            api_key: Some(self.form.api_key.value().trim().to_string()),
            base_url: Some(self.form.base_url.value().trim().to_string()),
            model: Some(raw_model),
            custom_model: Some(self.form.custom_model.value().trim().to_string()),
            actual_model: Some(resolved),
        };
        self.actions.push(CoordinatorInput::update_settings(patch));
        self.flash("Saved", now);
    }
}

fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x
        && column < area.x + area.width
        && row >= area.y
        && row < area.y + area.height
}

#[cfg(test)]
mod tests {
    use super::*;
    use glosspeek_core::UsageFrequency;

    fn test_store(enabled: bool, api_key: &str) -> (tempfile::TempDir, Arc<SettingsStore>) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store =
            Arc::new(SettingsStore::open(dir.path().join("config.toml")).expect("open store"));
        let key = api_key.to_string();
        store
            .update(|s| {
                s.enabled = enabled;
                s.api_key = key;
            })
            .unwrap();
        (dir, store)
    }

    fn reader_app(enabled: bool, api_key: &str, text: &str) -> (tempfile::TempDir, App) {
        let (dir, store) = test_store(enabled, api_key);
        let mut app = App::new("test", text, store);
        app.reader_area = Rect::new(0, 0, 80, 24);
        (dir, app)
    }

    fn select(app: &mut App, anchor: Pos, head: Pos) {
        app.selection = Some(Selection { anchor, head });
    }

    fn fake_result(original: &str) -> TranslationResult {
        TranslationResult {
            original_text: original.to_string(),
            translation: "perro".to_string(),
            part_of_speech: "noun".to_string(),
            gender: Some("masculine".to_string()),
            example: "El perro ladra.".to_string(),
            model: "gpt-4o-mini".to_string(),
            usage_frequency: Some(UsageFrequency {
                frequency: "common".to_string(),
                register: "informal".to_string(),
            }),
            collocations: vec!["perro callejero".to_string()],
        }
    }

    #[test]
    fn debounce_slot_latest_event_wins() {
        let t0 = Instant::now();
        let mut slot = DebounceSlot::new(DEBOUNCE_WINDOW);
        slot.arm(t0);
        slot.arm(t0 + Duration::from_millis(600));
        assert!(!slot.fire(t0 + Duration::from_millis(1100)));
        assert!(slot.fire(t0 + Duration::from_millis(1600)));
        // One-shot: a second poll does not fire again
        assert!(!slot.fire(t0 + Duration::from_millis(9999)));
    }

    #[test]
    fn repeated_selection_events_fire_one_request() {
        let (_dir, mut app) = reader_app(true, "sk-test", "the quick brown fox");
        select(&mut app, (0, 4), (0, 8));

        let t0 = Instant::now();
        app.note_selection_event(t0);
        app.note_selection_event(t0 + Duration::from_millis(300));
        app.note_selection_event(t0 + Duration::from_millis(600));

        app.tick(t0 + Duration::from_millis(1100));
        assert!(app.drain_actions().is_empty(), "fired before the window closed");

        app.tick(t0 + Duration::from_millis(1600));
        let actions = app.drain_actions();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            CoordinatorInput::Translate { text, .. } => assert_eq!(text, "quick"),
            other => panic!("expected Translate, got {other:?}"),
        }
        assert!(matches!(app.overlay, Overlay::Awaiting { .. }));
    }

    #[test]
    fn oversized_selection_is_silently_ignored() {
        let long_line = "x".repeat(600);
        let (_dir, mut app) = reader_app(true, "sk-test", &long_line);
        select(&mut app, (0, 0), (0, 599));

        let t0 = Instant::now();
        app.note_selection_event(t0);
        app.tick(t0 + Duration::from_millis(1100));

        assert!(app.drain_actions().is_empty());
        assert!(app.overlay.is_idle());
    }

    #[test]
    fn selection_at_499_chars_is_translated() {
        let line = "y".repeat(499);
        let (_dir, mut app) = reader_app(true, "sk-test", &line);
        select(&mut app, (0, 0), (0, 498));

        let t0 = Instant::now();
        app.note_selection_event(t0);
        app.tick(t0 + Duration::from_millis(1100));

        assert_eq!(app.drain_actions().len(), 1);
    }

    #[test]
    fn missing_api_key_shows_inline_error_without_request() {
        let (_dir, mut app) = reader_app(true, "", "hola mundo");
        select(&mut app, (0, 0), (0, 3));

        let t0 = Instant::now();
        app.note_selection_event(t0);
        app.tick(t0 + Duration::from_millis(1100));

        assert!(app.drain_actions().is_empty());
        match &app.overlay {
            Overlay::Error(message) => assert!(message.contains("API key")),
            other => panic!("expected inline error, got {other:?}"),
        }
    }

    #[test]
    fn empty_selection_closes_tooltip() {
        let (_dir, mut app) = reader_app(true, "sk-test", "hola mundo");
        app.overlay = Overlay::Error("old".to_string());
        app.selection = None;

        let t0 = Instant::now();
        app.note_selection_event(t0);
        app.tick(t0 + Duration::from_millis(1100));

        assert!(app.overlay.is_idle());
    }

    #[test]
    fn disabling_removes_tooltip_and_suppresses_selection() {
        let (_dir, mut app) = reader_app(true, "sk-test", "hola mundo");
        select(&mut app, (0, 0), (0, 3));
        let t0 = Instant::now();
        app.note_selection_event(t0);
        app.tick(t0 + Duration::from_millis(1100));
        let actions = app.drain_actions();
        assert_eq!(actions.len(), 1);
        app.handle_output(CoordinatorOutput::Translation {
            seq: 1,
            result: fake_result("hola"),
        });
        assert!(matches!(app.overlay, Overlay::Result { .. }));
        assert!(app.highlight.is_some());

        app.handle_output(CoordinatorOutput::UpdateState {
            enabled: false,
            settings: Settings::default(),
        });
        assert!(app.overlay.is_idle());
        assert!(app.highlight.is_none());

        // New selection events are suppressed until re-enabled
        select(&mut app, (0, 5), (0, 9));
        app.note_selection_event(t0 + Duration::from_millis(2000));
        assert!(!app.select_debounce.is_armed());
        app.tick(t0 + Duration::from_millis(4000));
        assert!(app.drain_actions().is_empty());
    }

    #[test]
    fn stale_response_is_dropped() {
        let (_dir, mut app) = reader_app(true, "sk-test", "uno dos tres");
        let t0 = Instant::now();

        select(&mut app, (0, 0), (0, 2));
        app.note_selection_event(t0);
        app.tick(t0 + Duration::from_millis(1100));
        select(&mut app, (0, 4), (0, 6));
        app.note_selection_event(t0 + Duration::from_millis(1200));
        app.tick(t0 + Duration::from_millis(2300));
        assert_eq!(app.drain_actions().len(), 2);

        // The superseded response arrives late and must not render
        app.handle_output(CoordinatorOutput::Translation {
            seq: 1,
            result: fake_result("uno"),
        });
        assert!(matches!(app.overlay, Overlay::Awaiting { seq: 2 }));

        app.handle_output(CoordinatorOutput::Translation {
            seq: 2,
            result: fake_result("dos"),
        });
        match &app.overlay {
            Overlay::Result { result, .. } => assert_eq!(result.original_text, "dos"),
            other => panic!("expected Result, got {other:?}"),
        }
    }

    #[test]
    fn pin_goes_through_the_coordinator_once() {
        let (_dir, mut app) = reader_app(true, "sk-test", "hola");
        app.overlay = Overlay::Result {
            result: fake_result("hola"),
            pinned: false,
        };
        app.pin_current();
        let actions = app.drain_actions();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            CoordinatorInput::Pin { pin } => {
                assert_eq!(pin.text, "hola");
                assert_eq!(pin.context, "noun - El perro ladra.");
            }
            other => panic!("expected Pin, got {other:?}"),
        }

        app.handle_output(CoordinatorOutput::PinSaved { success: true });
        assert!(matches!(app.overlay, Overlay::Result { pinned: true, .. }));
        // Already pinned: no second request
        app.pin_current();
        assert!(app.drain_actions().is_empty());
    }

    #[test]
    fn save_resolves_custom_sentinel() {
        let (_dir, mut app) = reader_app(true, "sk-test", "hola");
        app.open_settings();
        app.drain_actions(); // discard the discovery trigger
        app.form.model_idx = app.form.models.len(); // the custom entry
        app.form.custom_model = Input::new("foo".to_string());

        app.save_settings(Instant::now());
        let actions = app.drain_actions();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            CoordinatorInput::UpdateSettings { patch } => {
                assert_eq!(patch.model.as_deref(), Some("custom"));
                assert_eq!(patch.actual_model.as_deref(), Some("foo"));
            }
            other => panic!("expected UpdateSettings, got {other:?}"),
        }
    }

    #[test]
    fn empty_custom_model_falls_back_on_save() {
        let (_dir, mut app) = reader_app(true, "sk-test", "hola");
        app.open_settings();
        app.drain_actions();
        app.form.model_idx = app.form.models.len();
        app.form.custom_model = Input::new(String::new());

        app.save_settings(Instant::now());
        let actions = app.drain_actions();
        match &actions[0] {
            CoordinatorInput::UpdateSettings { patch } => {
                assert_eq!(patch.actual_model.as_deref(), Some(EMPTY_CUSTOM_FALLBACK));
            }
            other => panic!("expected UpdateSettings, got {other:?}"),
        }
    }

    #[test]
    fn credential_edits_debounce_discovery() {
        let (_dir, mut app) = reader_app(true, "sk-test", "hola");
        app.open_settings();
        app.drain_actions();

        app.form.focus = FormField::ApiKey;
        let t0 = Instant::now();
        for (i, c) in "xyz".chars().enumerate() {
            app.settings_key(
                KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE),
                t0 + Duration::from_millis(i as u64 * 100),
            );
        }
        app.tick(t0 + Duration::from_millis(700));
        assert!(app.drain_actions().is_empty(), "fired before the window closed");

        app.tick(t0 + Duration::from_millis(1300));
        let actions = app.drain_actions();
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], CoordinatorInput::FetchModels { .. }));
        assert!(app.form.models_loading);
    }

    #[test]
    fn fetched_list_missing_stored_model_selects_custom() {
        let (_dir, mut app) = reader_app(true, "sk-test", "hola");
        app.open_settings();
        app.drain_actions();
        // Stored default model is gpt-4o-mini, which the fallback list does
        // not carry: the form preloads it into the custom entry.
        assert!(app.form.custom_selected());
        assert_eq!(app.form.custom_model.value(), "gpt-4o-mini");

        // A fetched list that carries it selects it directly
        app.handle_output(CoordinatorOutput::Models {
            models: vec![
                ModelDescriptor::new("gpt-4o-mini", "GPT-4o mini"),
                ModelDescriptor::new("gpt-4o", "GPT-4o"),
            ],
        });
        assert!(app.form.custom_selected(), "custom choice survives a refresh");

        app.form.model_idx = 0;
        app.handle_output(CoordinatorOutput::Models {
            models: vec![ModelDescriptor::new("o4", "O4")],
        });
        // Selection fell back to custom with the old id preloaded
        assert!(app.form.custom_selected());
        assert_eq!(app.form.custom_model.value(), "gpt-4o-mini");
    }

    #[test]
    fn discovery_failure_falls_back_to_static_list() {
        let (_dir, mut app) = reader_app(true, "sk-test", "hola");
        app.open_settings();
        app.drain_actions();
        app.form.models = Vec::new();

        app.handle_output(CoordinatorOutput::ModelsFailed {
            error: "boom".to_string(),
        });
        assert_eq!(app.form.models.len(), catalog::fallback_models().len());
        assert!(!app.form.models_loading);
    }

    #[test]
    fn selection_extract_spans_lines() {
        let lines = vec![
            "first line".to_string(),
            "second".to_string(),
            "third line".to_string(),
        ];
        let selection = Selection {
            anchor: (0, 6),
            head: (2, 4),
        };
        assert_eq!(selection.extract(&lines), "line\nsecond\nthird");
        // Reversed endpoints normalize
        let reversed = Selection {
            anchor: (2, 4),
            head: (0, 6),
        };
        assert_eq!(reversed.extract(&lines), "line\nsecond\nthird");
    }

    #[test]
    fn tooltip_clicks_are_not_selection_events() {
        let (_dir, mut app) = reader_app(true, "sk-test", "hola mundo");
        app.tooltip_area = Some(Rect::new(10, 10, 20, 5));
        let click = MouseEvent {
            kind: MouseEventKind::Up(MouseButton::Left),
            column: 12,
            row: 11,
            modifiers: KeyModifiers::NONE,
        };
        app.on_mouse(click, Instant::now());
        assert!(!app.select_debounce.is_armed());
    }

    #[test]
    fn global_shortcut_requests_toggle() {
        let (_dir, mut app) = reader_app(false, "sk-test", "hola");
        app.on_key(
            KeyEvent::new(KeyCode::Char('t'), KeyModifiers::CONTROL),
            Instant::now(),
        );
        let actions = app.drain_actions();
        assert!(matches!(
            actions[0],
            CoordinatorInput::ToggleEnabled { enabled: true }
        ));
    }
}
