//! Tabbed admin application: dashboard plus one tab per tier, with the
//! add/edit forms shown in place of the tabs.

use crate::dashboard::{fetch_stats, DashboardStats};
use crate::form::{LineForm, Saved};
use crate::store::LineStore;
use crate::table::{RecordTable, TableView};
use lines_core::{Failure, LineRecord, LinesResult, Tier};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Dashboard,
    Lines20,
    Lines40,
    Lines60,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Dashboard, Tab::Lines20, Tab::Lines40, Tab::Lines60];

    pub fn tier(self) -> Option<Tier> {
        match self {
            Tab::Dashboard => None,
            Tab::Lines20 => Some(Tier::Lines20),
            Tab::Lines40 => Some(Tier::Lines40),
            Tab::Lines60 => Some(Tier::Lines60),
        }
    }
}

impl From<Tier> for Tab {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Lines20 => Tab::Lines20,
            Tier::Lines40 => Tab::Lines40,
            Tier::Lines60 => Tab::Lines60,
        }
    }
}

/// What occupies the main area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visible {
    Tab(Tab),
    CustomerForm,
    LineForm,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    Dashboard(DashboardStats),
    Table(TableView),
    Form(LineForm),
}

#[derive(Debug, Serialize)]
pub struct AppView {
    pub active_tab: Tab,
    pub tab_strip_visible: bool,
    pub content: Content,
}

/// The customer form serves tier 40, the line form serves tiers 20 and 60.
pub struct TabbedApp {
    active: Tab,
    show_customer_form: bool,
    show_line_form: bool,
    form: Option<LineForm>,
}

impl Default for TabbedApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TabbedApp {
    pub fn new() -> Self {
        Self {
            active: Tab::Dashboard,
            show_customer_form: false,
            show_line_form: false,
            form: None,
        }
    }

    pub fn active_tab(&self) -> Tab {
        self.active
    }

    pub fn select_tab(&mut self, tab: Tab) {
        if self.form.is_none() {
            self.active = tab;
        }
    }

    pub fn visible(&self) -> Visible {
        if self.show_customer_form {
            Visible::CustomerForm
        } else if self.show_line_form {
            Visible::LineForm
        } else {
            Visible::Tab(self.active)
        }
    }

    pub fn tab_strip_visible(&self) -> bool {
        !(self.show_customer_form || self.show_line_form)
    }

    pub fn form(&self) -> Option<&LineForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut LineForm> {
        self.form.as_mut()
    }

    pub fn open_add(&mut self, tier: Tier) {
        self.open(LineForm::create(tier));
    }

    /// Floating add action.
    pub fn open_add_customer(&mut self) {
        self.open_add(Tier::Lines40);
    }

    pub fn open_edit(&mut self, tier: Tier, record: &LineRecord) {
        self.open(LineForm::edit(tier, record));
    }

    fn open(&mut self, form: LineForm) {
        let customer = form.tier == Tier::Lines40;
        self.active = form.tier.into();
        self.show_customer_form = customer;
        self.show_line_form = !customer;
        self.form = Some(form);
    }

    pub fn cancel(&mut self) {
        self.close();
    }

    /// Save the open form. Closes it on success, keeps it open on failure.
    pub fn submit(&mut self, store: &LineStore, actor: &str) -> Option<Result<Saved, Failure>> {
        let result = self.form.as_mut()?.submit(store, actor);
        if result.is_ok() {
            self.close();
        }
        Some(result)
    }

    fn close(&mut self) {
        self.show_customer_form = false;
        self.show_line_form = false;
        self.form = None;
    }

    pub fn render(&self, store: &LineStore) -> LinesResult<AppView> {
        let content = match (&self.form, self.active.tier()) {
            (Some(form), _) => Content::Form(form.clone()),
            (None, None) => Content::Dashboard(fetch_stats(store)?),
            (None, Some(tier)) => Content::Table(RecordTable::mount(tier, store).render()),
        };
        Ok(AppView {
            active_tab: self.active,
            tab_strip_visible: self.tab_strip_visible(),
            content,
        })
    }
}
